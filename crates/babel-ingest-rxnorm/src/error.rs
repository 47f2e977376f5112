use babel_core::BabelError;

/// Errors raised while turning RxNorm RRF files into concordances.
///
/// Only some of these end a run. Lookup misses (`UnresolvedAtom`,
/// `UnresolvedSourceDescriptor`) are counted and the row skipped;
/// `AmbiguousSourceDescriptor` is fatal unless the ambiguity policy says to
/// skip the row.
#[derive(Debug, thiserror::Error)]
pub enum RxnormError {
    #[error("atom {atom} maps to two concepts: {first} and {second}")]
    DuplicateAtomMapping {
        atom: String,
        first: String,
        second: String,
    },

    #[error("atom {0} is not in the concept file")]
    UnresolvedAtom(String),

    #[error("source atom ({sab}, {aui}) is not in the concept file")]
    UnresolvedSourceDescriptor { sab: String, aui: String },

    #[error("source atom ({sab}, {aui}) matches {} concepts: {}", .concepts.len(), .concepts.join(", "))]
    AmbiguousSourceDescriptor {
        sab: String,
        aui: String,
        concepts: Vec<String>,
    },

    #[error("unknown addressing mode {mode:?} at line {line}")]
    UnknownAddressingMode { mode: String, line: usize },

    #[error(transparent)]
    Core(#[from] BabelError),
}

impl RxnormError {
    pub fn malformed(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        RxnormError::Core(BabelError::malformed(source_name, line, reason))
    }

    /// True for misses that skip a row rather than end the run.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            RxnormError::UnresolvedAtom(_) | RxnormError::UnresolvedSourceDescriptor { .. }
        )
    }
}

impl From<std::io::Error> for RxnormError {
    fn from(err: std::io::Error) -> Self {
        RxnormError::Core(BabelError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, RxnormError>;
