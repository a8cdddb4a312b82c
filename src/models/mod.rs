pub mod error_entry;
pub mod events;
pub mod phase;
pub mod report;
pub mod session;

pub use error_entry::ErrorEntry;
pub use events::StreamEvent;
pub use phase::Phase;
pub use report::{Citation, Report};
pub use session::{Mode, Session, Status};
