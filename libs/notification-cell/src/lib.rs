pub mod models;
pub mod services;

pub use models::{NotificationData, NotificationPayload, NotificationType};
pub use services::dispatch::NotificationService;
