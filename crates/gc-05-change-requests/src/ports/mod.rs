pub mod outbound;

pub use outbound::{NotificationSink, ReviewerDirectory};
