//! Resolving either side of a relationship row to a concept id.

use crate::error::{Result, RxnormError};
use crate::index::ConceptIndex;
use crate::rrf::ConceptRef;

/// Resolve a reference to its concept id. Never picks among several
/// candidate concepts.
pub fn resolve<'a>(reference: ConceptRef<'a>, index: &'a ConceptIndex) -> Result<&'a str> {
    match reference {
        ConceptRef::Concept(cui) => Ok(cui),
        ConceptRef::Atom(aui) => index
            .concept_of_atom(aui)
            .ok_or_else(|| RxnormError::UnresolvedAtom(aui.to_string())),
        ConceptRef::SourceDescriptor { sab, aui } => match index.concepts_of_descriptor(sab, aui) {
            [] => Err(RxnormError::UnresolvedSourceDescriptor {
                sab: sab.to_string(),
                aui: aui.to_string(),
            }),
            [only] => Ok(only.as_str()),
            many => Err(RxnormError::AmbiguousSourceDescriptor {
                sab: sab.to_string(),
                aui: aui.to_string(),
                concepts: many.to_vec(),
            }),
        },
    }
}
