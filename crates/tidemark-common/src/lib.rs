pub mod context;
pub mod error;
pub mod types;

pub use context::{CancelHandle, Context};
pub use error::{Error, Result};
pub use types::{Dialect, Sequence, TrackingMode, validate_table_name};
