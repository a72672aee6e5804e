pub mod booking_request;
pub mod notification;

pub use booking_request::BookingRequestService;
pub use notification::NotificationService;
