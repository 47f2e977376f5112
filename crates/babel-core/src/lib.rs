//! Babel core: turning pairwise identifier evidence into cliques.
//!
//! Pipeline:
//!
//! ```text
//!   identifier files ─┐
//!   concordances ─────┼─> GlomEngine ─> CompendiumWriter ─> compendium (NDJSON)
//!                     │                                        │
//!   concordances ─────┴────────────> ConflationBuilder <───────┘ ─> conflation
//! ```
//!
//! Key pieces:
//! 1. **Glom**: union-find over interned identifiers, refusing any merge that
//!    would put two identifiers with a unique prefix into one clique
//! 2. **Compendium**: one record per clique with a deterministic leader
//! 3. **Conflation**: links leaders across compendia with a second glom
//!
//! Rejections never abort a run; they land in the [`audit::AuditLog`].

pub mod audit;
pub mod compendium;
pub mod concordance;
pub mod config;
pub mod conflation;
pub mod curie;
pub mod error;
pub mod glom;
pub mod interner;
pub mod metadata;

// Re-export key types
pub use audit::{AuditKind, AuditLog};
pub use compendium::{CompendiumReader, CompendiumRecord, CompendiumWriter};
pub use concordance::ConcordanceTriple;
pub use config::{AmbiguityPolicy, BabelConfig, CompendiumConfig, ConflationConfig, RxnormConfig};
pub use conflation::{CompendiumIndex, Conflation, ConflationBuilder, ConflationRecord, ConflationStats, PairClass};
pub use error::{BabelError, Result};
pub use glom::{CliqueId, GlomEngine, GlomStats, MergeOutcome, UniquePrefixConflict};
pub use interner::{IdentId, IdentifierInterner};
pub use metadata::{IdentifierFile, NodeMetadata};
