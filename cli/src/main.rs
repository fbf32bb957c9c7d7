//! glrfill - General Loss Report template filler
//!
//! Usage:
//!   glrfill placeholders <template.docx>
//!   glrfill fill <template.docx> --mapping m.json -o out.docx
//!   glrfill run <template.docx> <evidence.pdf>... -o out.docx
//!   glrfill edit <filled.docx> --edits e.json -o out.docx
//!   glrfill validate <filled.docx> --mapping m.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glrfill::config::{load_config, Config};
use glrfill::docx::Document;
use glrfill::pipeline::{FillRequest, LogProgress, Pipeline};
use glrfill::placeholder::{extract_placeholders, fill_document, finalize, FieldMapping};
use glrfill::processor::read_input;
use glrfill::sanitize::redact_path;
use glrfill::SubstitutionPolicy;

#[derive(Parser)]
#[command(name = "glrfill", version, about = "Fill GLR report templates from scanned evidence")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Path to a JSON config file
    #[arg(long, env = "GLRFILL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the field names found in a template
    Placeholders { template: PathBuf },

    /// Fill a template from a JSON mapping of field names to values
    Fill {
        template: PathBuf,
        #[arg(long)]
        mapping: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the configured substitution policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// OCR the evidence, map it onto the template and fill it
    Run {
        template: PathBuf,
        #[arg(required = true)]
        evidence: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the field mapping that was used
        #[arg(long)]
        mapping_out: Option<PathBuf>,
        /// Also write the fill report (text, mapping, warnings) as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Apply reviewer edits to a filled document
    Edit {
        document: PathBuf,
        #[arg(long)]
        edits: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Ask the validation model to review a filled document
    Validate {
        document: PathBuf,
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Unified,
    FastPathFirst,
}

impl From<PolicyArg> for SubstitutionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Unified => SubstitutionPolicy::Unified,
            PolicyArg::FastPathFirst => SubstitutionPolicy::FastPathFirst,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", redact_path(path)))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Placeholders { template } => cmd_placeholders(&template),
        Commands::Fill {
            template,
            mapping,
            output,
            policy,
        } => {
            let policy = policy.map(Into::into).unwrap_or(config.substitution.policy);
            cmd_fill(&template, &mapping, &output, policy, config.substitution.raw_pass)
        }
        Commands::Run {
            template,
            evidence,
            output,
            mapping_out,
            report,
        } => cmd_run(
            &config,
            &template,
            &evidence,
            &output,
            mapping_out.as_deref(),
            report.as_deref(),
        ),
        Commands::Edit {
            document,
            edits,
            output,
        } => cmd_edit(&document, &edits, &output),
        Commands::Validate { document, mapping } => cmd_validate(&config, &document, mapping.as_deref()),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `info` filter.
fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn cmd_placeholders(template: &Path) -> Result<()> {
    let document = Document::load(&read_input(template)?)
        .with_context(|| format!("{} is not a usable DOCX", redact_path(template)))?;
    for name in extract_placeholders(&document) {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_fill(
    template: &Path,
    mapping: &Path,
    output: &Path,
    policy: SubstitutionPolicy,
    raw_pass: bool,
) -> Result<()> {
    let mapping = read_mapping(mapping)?;
    let mut document = Document::load(&read_input(template)?)
        .with_context(|| format!("{} is not a usable DOCX", redact_path(template)))?;

    let stats = fill_document(&mut document, &mapping, policy);
    let bytes = if raw_pass {
        finalize(&document, &mapping)?
    } else {
        document.save()?
    };
    write_output(output, &bytes)?;

    info!(
        changed = stats.paragraphs_changed(),
        rebuilt = stats.paragraphs_rebuilt,
        "Template filled"
    );
    report_leftovers(&bytes);
    Ok(())
}

fn cmd_run(
    config: &Config,
    template: &Path,
    evidence: &[PathBuf],
    output: &Path,
    mapping_out: Option<&Path>,
    report_out: Option<&Path>,
) -> Result<()> {
    let request = FillRequest {
        template: read_input(template)?,
        evidence: evidence
            .iter()
            .map(|path| read_input(path))
            .collect::<Result<_, _>>()?,
    };

    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.run(request, &LogProgress)?;

    write_output(output, &report.document)?;
    if let Some(path) = mapping_out {
        write_output(path, &serde_json::to_vec_pretty(&report.mapping)?)?;
    }
    if let Some(path) = report_out {
        write_output(path, &serde_json::to_vec_pretty(&report)?)?;
    }
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn cmd_edit(document: &Path, edits: &Path, output: &Path) -> Result<()> {
    let edits = read_mapping(edits)?;
    let outcome = Pipeline::apply_edits(&read_input(document)?, &edits)?;
    write_output(output, &outcome.bytes)?;
    info!(entries = ?outcome.rewritten_entries, "Edits applied");
    Ok(())
}

fn cmd_validate(config: &Config, document: &Path, mapping: Option<&Path>) -> Result<()> {
    let mapping = match mapping {
        Some(path) => read_mapping(path)?,
        None => FieldMapping::new(),
    };
    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.validate(&read_input(document)?, &mapping);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_mapping(path: &Path) -> Result<FieldMapping> {
    let bytes = read_input(path)?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} must be a JSON object of strings", redact_path(path)))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(file = %redact_path(path), bytes = bytes.len(), "Wrote output");
    Ok(())
}

fn report_leftovers(bytes: &[u8]) {
    if let Ok(document) = Document::load(bytes) {
        let left = extract_placeholders(&document);
        if !left.is_empty() {
            warn!(fields = %left.join(", "), "Placeholders left in output");
        }
    }
}
