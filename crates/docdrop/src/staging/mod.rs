//! The four-directory state machine a file moves through.
//!
//! A file's directory *is* its pipeline stage: it is claimed out of
//! `staging/` by an atomic rename into `processing/`, and leaves processing
//! exactly once, into `completed/` or `failed/`.

pub mod layout;
pub mod staged;

pub use layout::{completed_name, failed_name, processing_name, StageDirs, PROCESSING_MARKER};
pub use staged::{Stage, StagedFile};
