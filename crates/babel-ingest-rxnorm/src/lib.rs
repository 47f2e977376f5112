//! RxNorm ingestion for Babel.
//!
//! Turns `RXNREL.RRF` into a concordance of `RXCUI` pairs, resolving atom and
//! source-descriptor references through `RXNCONSO.RRF`:
//!
//! ```text
//!   RXNCONSO ──> ConceptIndex ──┐
//!   RXNREL ──> RelRow ──> resolve ──> SingleUseFilter ──> concordance
//! ```
//!
//! Subjects that name several objects under a single-use predicate (a drug
//! with two active ingredients) are dropped, so ingredients never glom
//! through a shared product.

mod error;

pub mod concord;
pub mod index;
pub mod resolve;
pub mod rrf;
pub mod single_use;

pub use concord::{build_concordance, build_concordance_files, ConcordStats, ConcordanceBuilder, RxnormConcordance};
pub use error::{Result, RxnormError};
pub use index::ConceptIndex;
pub use resolve::resolve;
pub use rrf::{ConceptRef, ConsoRow, RelRow};
pub use single_use::{SingleUseFilter, SingleUseOutput};
