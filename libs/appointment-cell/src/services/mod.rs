pub mod booking;
pub mod conflict;
pub mod dashboard;
pub mod lifecycle;
pub mod queue;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use dashboard::SecretaryDashboardService;
pub use lifecycle::AppointmentLifecycleService;
pub use queue::QueueService;
