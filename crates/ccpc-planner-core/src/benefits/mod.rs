pub mod cpp_benefit;
pub mod oas;
pub mod rrif;
