//! Single-use predicates.
//!
//! A drug with two active ingredients links both ingredients to the drug;
//! glomming on that would make the ingredients equivalent. For predicates
//! like `has_active_ingredient` a subject therefore only yields a pair when
//! it was seen with exactly one distinct object across the whole batch.
//!
//! ```text
//!   S has_ingredient O1                 ->  (S, O1)
//!   S has_ingredient O1, S ... O2       ->  nothing for S
//! ```

use babel_core::audit::{AuditKind, AuditLog};
use std::collections::BTreeMap;
use tracing::debug;

/// A subject/predicate/object that survived the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleUseOutput {
    pub emitted: Vec<Emission>,
    /// (subject, predicate) combinations dropped for having several objects.
    pub dropped: u64,
}

/// Accumulates objects per subject for each filtered predicate. Consumed
/// once by [`SingleUseFilter::finish`].
#[derive(Debug, Clone)]
pub struct SingleUseFilter {
    /// One accumulator per predicate, in configured order.
    predicates: Vec<(String, BTreeMap<String, Vec<String>>)>,
}

impl SingleUseFilter {
    pub fn new<I, S>(predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<(String, BTreeMap<String, Vec<String>>)> = Vec::new();
        for p in predicates {
            let p = p.as_ref();
            if !list.iter().any(|(name, _)| name == p) {
                list.push((p.to_string(), BTreeMap::new()));
            }
        }
        Self { predicates: list }
    }

    pub fn is_filtered(&self, predicate: &str) -> bool {
        self.predicates.iter().any(|(name, _)| name == predicate)
    }

    /// Record a triple. Returns `false` if the predicate is not filtered,
    /// in which case the caller emits the triple itself.
    pub fn observe(&mut self, subject: &str, predicate: &str, object: &str) -> bool {
        let Some((_, by_subject)) = self.predicates.iter_mut().find(|(name, _)| name == predicate) else {
            return false;
        };
        let objects = by_subject.entry(subject.to_string()).or_default();
        if !objects.iter().any(|o| o == object) {
            objects.push(object.to_string());
        }
        true
    }

    /// Emit every (subject, predicate) with exactly one distinct object,
    /// ordered by predicate then subject. The rest are counted and recorded
    /// in `audit`.
    pub fn finish(self, audit: &mut AuditLog) -> SingleUseOutput {
        let mut out = SingleUseOutput::default();
        for (predicate, by_subject) in self.predicates {
            for (subject, mut objects) in by_subject {
                if objects.len() == 1 {
                    let object = objects.remove(0);
                    out.emitted.push(Emission {
                        subject,
                        predicate: predicate.clone(),
                        object,
                    });
                    continue;
                }
                out.dropped += 1;
                debug!(%subject, %predicate, objects = objects.len(), "dropping multi-object subject");
                let detail = format!("{subject} {predicate} has {} distinct objects", objects.len());
                let mut ids = Vec::with_capacity(objects.len() + 1);
                ids.push(subject);
                ids.extend(objects);
                audit.record(AuditKind::SingleUseDropped, detail, ids);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emission(s: &str, p: &str, o: &str) -> Emission {
        Emission {
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
        }
    }

    #[test]
    fn one_object_is_emitted_two_are_dropped() {
        let mut filter = SingleUseFilter::new(["has_ingredient"]);
        assert!(filter.observe("S1", "has_ingredient", "O1"));
        assert!(filter.observe("S2", "has_ingredient", "O1"));
        assert!(filter.observe("S2", "has_ingredient", "O2"));
        assert!(!filter.observe("S3", "has_form", "O3"));

        let mut audit = AuditLog::default();
        let out = filter.finish(&mut audit);
        assert_eq!(out.emitted, vec![emission("S1", "has_ingredient", "O1")]);
        assert_eq!(out.dropped, 1);
        assert_eq!(audit.count(AuditKind::SingleUseDropped), 1);
        assert_eq!(audit.examples(AuditKind::SingleUseDropped)[0].identifiers, ["S2", "O1", "O2"]);
    }

    #[test]
    fn repeated_rows_count_once() {
        let mut filter = SingleUseFilter::new(["has_tradename"]);
        filter.observe("S", "has_tradename", "O");
        filter.observe("S", "has_tradename", "O");
        let out = filter.finish(&mut AuditLog::default());
        assert_eq!(out.emitted, vec![emission("S", "has_tradename", "O")]);
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn counting_is_per_predicate() {
        let mut filter = SingleUseFilter::new(["has_ingredient", "has_precise_ingredient"]);
        filter.observe("S", "has_ingredient", "O1");
        filter.observe("S", "has_precise_ingredient", "O2");
        let out = filter.finish(&mut AuditLog::default());
        assert_eq!(
            out.emitted,
            vec![
                emission("S", "has_ingredient", "O1"),
                emission("S", "has_precise_ingredient", "O2"),
            ]
        );
    }

    #[test]
    fn output_is_ordered_by_predicate_then_subject() {
        let mut filter = SingleUseFilter::new(["consists_of", "has_tradename"]);
        filter.observe("9", "has_tradename", "1");
        filter.observe("2", "has_tradename", "1");
        filter.observe("5", "consists_of", "1");
        let subjects: Vec<(String, String)> = filter
            .finish(&mut AuditLog::default())
            .emitted
            .into_iter()
            .map(|e| (e.predicate, e.subject))
            .collect();
        assert_eq!(
            subjects,
            vec![
                ("consists_of".to_string(), "5".to_string()),
                ("has_tradename".to_string(), "2".to_string()),
                ("has_tradename".to_string(), "9".to_string()),
            ]
        );
    }
}
