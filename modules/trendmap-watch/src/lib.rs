pub mod error;
pub mod extract;
pub mod ingest;
pub mod poller;
pub mod registry;
pub mod retention;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod trends;
pub mod watcher;

pub use error::{Result, WatchError};
