use std::fmt;

use crate::store::RevisionToken;

/// Why a file ended up in `failed/`. The string form is part of the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    Decode,
    IdResolution,
    Store,
    Conflict,
    Resolve,
    Exception,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCode::Decode => "DECODE_ERROR",
            FailureCode::IdResolution => "ID_ERROR",
            FailureCode::Store => "STORE_ERROR",
            FailureCode::Conflict => "CONFLICT",
            FailureCode::Resolve => "RESOLVE_ERROR",
            FailureCode::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted {
        id: String,
        revision: RevisionToken,
    },
    Updated {
        id: String,
        revision: RevisionToken,
    },
    /// The first write conflicted; the reconciled document was written.
    ConflictResolved {
        id: String,
        revision: RevisionToken,
    },
    Failed {
        id: Option<String>,
        code: FailureCode,
        reason: String,
    },
}

impl WriteOutcome {
    pub fn failed(id: Option<String>, code: FailureCode, reason: impl Into<String>) -> Self {
        WriteOutcome::Failed {
            id,
            code,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, WriteOutcome::Failed { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            WriteOutcome::Inserted { id, .. }
            | WriteOutcome::Updated { id, .. }
            | WriteOutcome::ConflictResolved { id, .. } => Some(id),
            WriteOutcome::Failed { id, .. } => id.as_deref(),
        }
    }

    /// Revision written by a successful outcome.
    pub fn revision(&self) -> Option<&RevisionToken> {
        match self {
            WriteOutcome::Inserted { revision, .. }
            | WriteOutcome::Updated { revision, .. }
            | WriteOutcome::ConflictResolved { revision, .. } => Some(revision),
            WriteOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_code(&self) -> Option<FailureCode> {
        match self {
            WriteOutcome::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Inserted { id, revision } => write!(f, "inserted {} at {}", id, revision),
            WriteOutcome::Updated { id, revision } => write!(f, "updated {} to {}", id, revision),
            WriteOutcome::ConflictResolved { id, revision } => {
                write!(f, "resolved conflict on {} at {}", id, revision)
            }
            WriteOutcome::Failed { code, reason, .. } => write!(f, "failed ({}): {}", code, reason),
        }
    }
}
