pub mod pool;
pub mod shutdown;
pub mod watcher;

pub use pool::{Rejected, Submission, WorkerPool};
pub use shutdown::CancellationToken;
pub use watcher::DirectoryWatcher;
