pub mod context;
pub mod error;
pub mod runner;
pub mod stats;

pub use context::{LoadContext, LoadState};
pub use error::LoadError;
pub use runner::{FileLoader, LoadResult};
pub use stats::{LoadStats, LoadSummary};
