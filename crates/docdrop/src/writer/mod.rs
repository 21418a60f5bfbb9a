pub mod outcome;
pub mod resolver;
pub mod upsert;

pub use outcome::{FailureCode, WriteOutcome};
pub use resolver::ConflictResolver;
pub use upsert::Upserter;
