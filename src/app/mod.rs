pub mod context;
pub mod error;

pub use context::ClientContext;
pub use error::{FeedError, Result};
