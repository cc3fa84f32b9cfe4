pub mod income_tax;
