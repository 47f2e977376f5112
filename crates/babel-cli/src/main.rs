//! Babel CLI
//!
//! - `rxnorm-concord`: RXNCONSO + RXNREL -> concordance
//! - `compendium`: identifier files + concordances -> compendium for one semantic type
//! - `conflate`: compendia + concordances -> cross-type conflation

use anyhow::{ensure, Context, Result};
use babel_core::audit::AuditLog;
use babel_core::compendium::{write_compendium_file, CompendiumWriter};
use babel_core::concordance::{read_concordance_file, write_concordances};
use babel_core::config::BabelConfig;
use babel_core::conflation::{write_conflation_file, ConflationBuilder};
use babel_core::glom::GlomEngine;
use babel_core::metadata::{read_identifier_file, NodeMetadata};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "babel")]
#[command(author, version, about = "Babel: identifier cliques and conflations for biomedical CURIEs")]
struct Cli {
    /// JSON configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write rejection counts and examples to this JSON file
    #[arg(long, global = true)]
    audit: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an RXCUI concordance from RxNorm RRF files.
    RxnormConcord {
        /// RXNCONSO.RRF
        #[arg(long)]
        conso: PathBuf,

        /// RXNREL.RRF
        #[arg(long)]
        rel: PathBuf,

        /// Output concordance file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Glom identifiers into cliques and write a compendium.
    Compendium {
        /// Semantic type, e.g. biolink:Drug
        #[arg(long = "type")]
        semantic_type: String,

        /// Identifier files (`CURIE[\ttype]`)
        #[arg(long, num_args = 1..)]
        identifiers: Vec<PathBuf>,

        /// Concordance files (`subject\tpredicate\tobject`)
        #[arg(long, num_args = 1..)]
        concordances: Vec<PathBuf>,

        /// Label files (`CURIE\tlabel`)
        #[arg(long, num_args = 1..)]
        labels: Vec<PathBuf>,

        /// Description files (`CURIE\tdescription`)
        #[arg(long, num_args = 1..)]
        descriptions: Vec<PathBuf>,

        /// Information-content file (`CURIE\tic`)
        #[arg(long)]
        ic: Option<PathBuf>,

        /// Output compendium file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Link clique leaders across compendia.
    Conflate {
        /// Concordance files used as conflation evidence
        #[arg(long, num_args = 1..)]
        concordances: Vec<PathBuf>,

        /// Compendium files, in leader-preference order
        #[arg(long, num_args = 1.., required = true)]
        compendium: Vec<PathBuf>,

        /// Output conflation file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            BabelConfig::load(path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => BabelConfig::default(),
    };
    info!(
        config = ?cli.config,
        compendia = config.compendia.len(),
        "configuration loaded"
    );

    match cli.command {
        Commands::RxnormConcord { conso, rel, out } => {
            cmd_rxnorm_concord(&config, &conso, &rel, &out, cli.audit.as_deref())?;
        }
        Commands::Compendium {
            semantic_type,
            identifiers,
            concordances,
            labels,
            descriptions,
            ic,
            out,
        } => {
            let inputs = CompendiumInputs {
                identifiers: &identifiers,
                concordances: &concordances,
                labels: &labels,
                descriptions: &descriptions,
                ic: ic.as_deref(),
            };
            cmd_compendium(&config, &semantic_type, &inputs, &out, cli.audit.as_deref())?;
        }
        Commands::Conflate {
            concordances,
            compendium,
            out,
        } => {
            cmd_conflate(&config, &concordances, &compendium, &out, cli.audit.as_deref())?;
        }
    }
    Ok(())
}

fn new_audit(config: &BabelConfig) -> AuditLog {
    AuditLog::new(config.audit.max_examples)
}

fn write_audit(path: Option<&Path>, report: serde_json::Value) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating audit file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.flush()?;
    eprintln!("{} {}", "audit".green().bold(), path.display().to_string().bold());
    Ok(())
}

fn ensure_parent(out: &Path) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

fn cmd_rxnorm_concord(config: &BabelConfig, conso: &Path, rel: &Path, out: &Path, audit: Option<&Path>) -> Result<()> {
    eprintln!("{} RxNorm {}", "Ingesting".green().bold(), rel.display());

    let result = babel_ingest_rxnorm::build_concordance_files(&config.rxnorm, conso, rel, new_audit(config))
        .with_context(|| format!("building concordance from {}", rel.display()))?;

    ensure_parent(out)?;
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let written = write_concordances(BufWriter::new(file), &result.triples)?;

    eprintln!("  {} {} rows read", "→".yellow(), result.stats.rows);
    eprintln!(
        "  {} {} unresolved, {} ambiguous, {} dropped by single-use",
        "→".yellow(),
        result.stats.unresolved,
        result.stats.ambiguous,
        result.stats.single_use_dropped
    );
    eprintln!("{} {} ({written} pairs)", "wrote".green().bold(), out.display().to_string().bold());

    write_audit(
        audit,
        json!({ "stage": "rxnorm-concord", "stats": result.stats, "audit": result.audit }),
    )
}

struct CompendiumInputs<'a> {
    identifiers: &'a [PathBuf],
    concordances: &'a [PathBuf],
    labels: &'a [PathBuf],
    descriptions: &'a [PathBuf],
    ic: Option<&'a Path>,
}

fn cmd_compendium(
    config: &BabelConfig,
    semantic_type: &str,
    inputs: &CompendiumInputs<'_>,
    out: &Path,
    audit: Option<&Path>,
) -> Result<()> {
    let compendium = config.compendium(semantic_type)?;
    eprintln!("{} compendium {}", "Building".green().bold(), semantic_type);

    let mut glom = GlomEngine::new(&compendium.unique_prefixes).with_audit(new_audit(config));
    let mut metadata = NodeMetadata::new();

    for path in inputs.identifiers {
        let file = read_identifier_file(path).with_context(|| format!("reading identifiers {}", path.display()))?;
        for id in &file.identifiers {
            glom.add_identifier(id);
        }
        metadata.extend_types(file.types);
    }
    for path in inputs.concordances {
        let triples = read_concordance_file(path).with_context(|| format!("reading concordance {}", path.display()))?;
        let rejected = glom.merge_all(triples.iter().map(|t| t.pair()));
        eprintln!(
            "  {} {} pairs from {} ({} rejected)",
            "→".yellow(),
            triples.len(),
            path.display(),
            rejected
        );
    }
    for path in inputs.labels {
        metadata.load_label_file(path)?;
    }
    for path in inputs.descriptions {
        metadata.load_description_file(path)?;
    }
    if let Some(path) = inputs.ic {
        metadata.load_ic_file(path)?;
    }

    let records = CompendiumWriter::new(compendium, &metadata).records_from_glom(&glom)?;
    ensure_parent(out)?;
    write_compendium_file(out, &records)?;

    let stats = glom.stats();
    eprintln!(
        "  {} {} identifiers in {} cliques",
        "→".yellow(),
        glom.len(),
        records.len()
    );
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());

    write_audit(
        audit,
        json!({
            "stage": "compendium",
            "semantic_type": semantic_type,
            "stats": stats,
            "audit": glom.audit(),
        }),
    )
}

fn cmd_conflate(
    config: &BabelConfig,
    concordances: &[PathBuf],
    compendia: &[PathBuf],
    out: &Path,
    audit: Option<&Path>,
) -> Result<()> {
    eprintln!("{} {} compendia", "Conflating".green().bold(), compendia.len());

    let mut builder = ConflationBuilder::new(&config.conflation).with_audit(new_audit(config));
    let loaded = builder.load_compendia(compendia)?;
    ensure!(
        loaded >= 2,
        "conflation needs at least two distinct compendia, got {loaded}"
    );
    eprintln!("  {} {} compendia indexed", "→".yellow(), loaded);

    for path in concordances {
        let triples = read_concordance_file(path).with_context(|| format!("reading concordance {}", path.display()))?;
        builder.add_concordance(&triples);
    }

    let conflation = builder.finish();
    ensure_parent(out)?;
    write_conflation_file(out, &conflation.records)?;

    let stats = conflation.stats;
    eprintln!(
        "  {} {} pairs: {} cross-type, {} within-type, {} unresolved",
        "→".yellow(),
        stats.pairs,
        stats.cross_type,
        stats.within_type,
        stats.unresolved
    );
    eprintln!(
        "{} {} ({} records)",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        stats.records
    );

    write_audit(
        audit,
        json!({ "stage": "conflate", "stats": stats, "audit": conflation.audit }),
    )
}
