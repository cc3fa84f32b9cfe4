pub mod accounts;
pub mod returns;
