use clap::{Parser, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "credshacl")]
/// Validates JSON-LD credentials against SHACL shapes
///
/// Exits with 0 if every input conforms, 1 if at least one does not
/// and 2 if an input or the shapes can not be loaded.
pub struct Args {
    /// JSON-LD documents to validate
    ///
    /// They must have a .json or .jsonld extension.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    pub input: Vec<PathBuf>,
    /// File with the SHACL shapes
    ///
    /// Its format is guessed from the extension (.ttl, .nt, .rdf, .owl, .jsonld...).
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub shapes: PathBuf,
    /// Ontology whose rdfs:subClassOf, rdfs:subPropertyOf, rdfs:domain and rdfs:range statements are used for inference
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub ontology: Vec<PathBuf>,
    /// Local copy of a remote JSON-LD context, written URL=FILE
    ///
    /// Remote contexts are never fetched, each one used by an input must be mapped.
    #[arg(short, long, value_name = "URL=FILE")]
    pub context: Vec<String>,
    /// Entailments materialized before validation
    #[arg(long, value_enum, default_value_t = Inference::Rdfs)]
    pub inference: Inference,
    /// Which sh:or and sh:and branch results are kept as details
    #[arg(long, value_enum, default_value_t = Composition::First)]
    pub composition: Composition,
    /// Output format of the validation reports
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Evaluates the focus nodes of a shape on all cores
    #[arg(long)]
    pub parallel: bool,
    /// Format of the log lines written to stderr
    ///
    /// The verbosity is set with the RUST_LOG environment variable.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Inference {
    /// No materialization, class constraints still follow rdfs:subClassOf
    None,
    /// Superclasses and superproperties
    Subsumption,
    /// Subsumption plus rdfs:domain and rdfs:range typing
    Rdfs,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Composition {
    /// Details of the first failing branch
    First,
    /// Details of every failing branch
    All,
    /// No details
    Summary,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human readable report
    Text,
    /// sh:ValidationReport graph in Turtle
    Turtle,
    /// JSON object
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
