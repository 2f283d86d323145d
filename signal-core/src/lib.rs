pub mod clock;
pub mod error;
pub mod types;

// Re-export common types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use types::*;
