pub mod export;
pub mod prescription;

pub use prescription::PrescriptionService;
