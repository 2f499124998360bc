//! Default port implementations.

mod notifications;
mod reviewers;

pub use notifications::StoreNotificationSink;
pub use reviewers::StaticReviewerDirectory;
