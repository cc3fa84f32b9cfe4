pub mod corporate_tax;
pub mod passive_grind;
