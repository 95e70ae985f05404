pub mod authorize;
pub mod doctor;
pub mod laws;
pub mod scan;
pub mod serve;
