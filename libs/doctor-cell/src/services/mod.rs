pub mod dashboard;
pub mod doctor;

pub use dashboard::DoctorDashboardService;
pub use doctor::DoctorService;
