pub mod ipp;
