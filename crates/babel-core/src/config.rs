//! Run configuration.
//!
//! Loaded from a JSON file; every field has a built-in default so a partial
//! file (or none at all) is valid.

use crate::audit::DEFAULT_MAX_EXAMPLES;
use crate::error::{BabelError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BabelConfig {
    /// Per-semantic-type compendium settings.
    pub compendia: Vec<CompendiumConfig>,
    pub rxnorm: RxnormConfig,
    pub conflation: ConflationConfig,
    pub audit: AuditConfig,
}

/// Settings for building one semantic type's compendium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompendiumConfig {
    /// Biolink type written on every record, e.g. `biolink:Drug`.
    pub semantic_type: String,
    /// Leader ranking, best prefix first.
    #[serde(default)]
    pub prefix_priority: Vec<String>,
    /// Ranking used to pick the preferred name; falls back to `prefix_priority`.
    #[serde(default)]
    pub label_prefix_priority: Option<Vec<String>>,
    /// No clique may hold two identifiers with one of these prefixes.
    #[serde(default)]
    pub unique_prefixes: Vec<String>,
}

impl CompendiumConfig {
    pub fn new(semantic_type: impl Into<String>) -> Self {
        Self {
            semantic_type: semantic_type.into(),
            prefix_priority: Vec::new(),
            label_prefix_priority: None,
            unique_prefixes: Vec::new(),
        }
    }

    pub fn label_priority(&self) -> &[String] {
        self.label_prefix_priority
            .as_deref()
            .unwrap_or(&self.prefix_priority)
    }
}

/// What to do when a source descriptor resolves to several concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Reject the row, record it, keep going.
    SkipRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RxnormConfig {
    /// Prefix written on emitted concept identifiers.
    pub curie_prefix: String,
    /// Relationship attributes (RELA) that are processed at all.
    pub allowed_predicates: Vec<String>,
    /// Predicates that only yield a pair when the subject has one distinct object.
    pub single_use_predicates: Vec<String>,
    pub ambiguity_policy: AmbiguityPolicy,
}

impl Default for RxnormConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            curie_prefix: "RXCUI".to_string(),
            allowed_predicates: owned(&[
                "has_form",
                "has_precise_active_ingredient",
                "has_precise_ingredient",
                "has_tradename",
                "consists_of",
                "has_ingredient",
                "has_active_ingredient",
            ]),
            single_use_predicates: owned(&[
                "has_active_ingredient",
                "has_precise_active_ingredient",
                "has_precise_ingredient",
                "has_ingredient",
                "has_tradename",
                "consists_of",
            ]),
            ambiguity_policy: AmbiguityPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflationConfig {
    /// Only index compendium members with these prefixes (empty = all).
    pub index_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub max_examples: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_examples: DEFAULT_MAX_EXAMPLES,
        }
    }
}

impl Default for BabelConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            compendia: vec![
                CompendiumConfig {
                    semantic_type: "biolink:Drug".to_string(),
                    prefix_priority: owned(&[
                        "RXCUI", "NDC", "UMLS", "PUBCHEM.COMPOUND", "CHEBI", "UNII", "DRUGBANK", "MESH",
                    ]),
                    label_prefix_priority: None,
                    unique_prefixes: owned(&["RXCUI"]),
                },
                CompendiumConfig {
                    semantic_type: "biolink:ChemicalEntity".to_string(),
                    prefix_priority: owned(&[
                        "CHEBI",
                        "UNII",
                        "PUBCHEM.COMPOUND",
                        "CHEMBL.COMPOUND",
                        "DRUGBANK",
                        "MESH",
                        "CAS",
                        "DrugCentral",
                        "GTOPDB",
                        "HMDB",
                        "KEGG.COMPOUND",
                        "UMLS",
                        "RXCUI",
                    ]),
                    label_prefix_priority: None,
                    unique_prefixes: owned(&["CHEBI", "PUBCHEM.COMPOUND", "INCHIKEY"]),
                },
                CompendiumConfig {
                    semantic_type: "biolink:AnatomicalEntity".to_string(),
                    prefix_priority: owned(&["UBERON", "GO", "CL", "UMLS", "MESH", "NCIT", "FMA"]),
                    label_prefix_priority: None,
                    unique_prefixes: owned(&["UBERON", "GO"]),
                },
                CompendiumConfig {
                    semantic_type: "biolink:CellLine".to_string(),
                    prefix_priority: owned(&["CLO"]),
                    label_prefix_priority: None,
                    unique_prefixes: Vec::new(),
                },
            ],
            rxnorm: RxnormConfig::default(),
            conflation: ConflationConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl BabelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BabelError::file(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn compendium(&self, semantic_type: &str) -> Result<&CompendiumConfig> {
        self.compendia
            .iter()
            .find(|c| c.semantic_type == semantic_type)
            .ok_or_else(|| BabelError::UnknownSemanticType(semantic_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_drug_and_chemical() {
        let config = BabelConfig::default();
        assert!(config.compendium("biolink:Drug").is_ok());
        assert!(config.compendium("biolink:ChemicalEntity").is_ok());
        assert!(matches!(
            config.compendium("biolink:Nope"),
            Err(BabelError::UnknownSemanticType(_))
        ));
        assert_eq!(config.rxnorm.ambiguity_policy, AmbiguityPolicy::Abort);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "compendia": [
                    {"semantic_type": "biolink:Gene", "prefix_priority": ["NCBIGene", "HGNC"]}
                ],
                "rxnorm": {"ambiguity_policy": "skip_row"}
            }"#,
        )
        .unwrap();

        let config = BabelConfig::load(&path).unwrap();
        let gene = config.compendium("biolink:Gene").unwrap();
        assert_eq!(gene.label_priority(), ["NCBIGene", "HGNC"]);
        assert!(gene.unique_prefixes.is_empty());
        assert_eq!(config.rxnorm.ambiguity_policy, AmbiguityPolicy::SkipRow);
        assert_eq!(config.rxnorm.curie_prefix, "RXCUI");
        assert_eq!(config.audit.max_examples, DEFAULT_MAX_EXAMPLES);
    }
}
