use crate::staging::StagedFile;

/// Progress of one File Load Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// File is in `processing/`, nothing read yet.
    Claimed,
    Loaded,
    IdResolved,
    Written,
}

pub struct LoadContext {
    // Input: exclusively owned until relocation
    pub file: StagedFile,

    pub state: LoadState,

    // Set once after resolve_id and never recomputed
    pub id: Option<String>,
}

impl LoadContext {
    pub fn new(file: StagedFile) -> Self {
        Self {
            file,
            state: LoadState::Claimed,
            id: None,
        }
    }
}
