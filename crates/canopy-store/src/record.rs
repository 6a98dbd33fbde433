use std::fmt;

use serde::{Deserialize, Serialize};

/// The two record kinds held by a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Post,
    Comment,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

/// A stored record together with its version.
///
/// Versions start at 1 on insert and grow by one on every successful
/// replace. Replacements name the version they were derived from, so two
/// writers racing on the same record cannot both succeed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

impl<T> Versioned<T> {
    pub fn initial(record: T) -> Self {
        Self { version: 1, record }
    }

    /// The successor of this entry holding `record`.
    pub fn next(&self, record: T) -> Self {
        Self {
            version: self.version + 1,
            record,
        }
    }

    pub fn into_record(self) -> T {
        self.record
    }
}
