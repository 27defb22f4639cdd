#![allow(clippy::print_stderr)]
use crate::cli::{Args, Composition, Inference, LogFormat, OutputFormat};
use anyhow::{Context, ensure};
use clap::Parser;
use credshacl::io::{load_document, load_graph_from_path};
use credshacl::{
    CompositionReport, ContextMap, InferenceMode, ValidationOptions, ValidationReport, Validator,
};
use std::ffi::OsStr;
use std::io::{Write, stdout};
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_format);
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

/// Returns whether every input conforms.
fn run(args: &Args) -> anyhow::Result<bool> {
    for input in &args.input {
        check_input(input)?;
    }
    let contexts = context_map(&args.context)?;

    let mut options = ValidationOptions::default()
        .with_inference(args.inference.into())
        .with_composition_report(args.composition.into())
        .with_parallel(args.parallel);
    for ontology in &args.ontology {
        let graph = load_graph_from_path(ontology)
            .with_context(|| format!("Failed to load the ontology {}", ontology.display()))?;
        options = options.with_ontology(graph);
    }
    let shapes = load_graph_from_path(&args.shapes)
        .with_context(|| format!("Failed to load the shapes {}", args.shapes.display()))?;
    let validator = Validator::from_graph(shapes)
        .with_context(|| format!("Invalid shapes in {}", args.shapes.display()))?
        .with_options(options);
    info!(
        shapes = validator.shapes().len(),
        inputs = args.input.len(),
        "Shapes loaded"
    );

    let mut all_conform = true;
    let mut out = stdout().lock();
    for input in &args.input {
        let data = load_document(input, &contexts)
            .with_context(|| format!("Failed to load {}", input.display()))?;
        let report = validator.validate(&data);
        info!(
            input = %input.display(),
            conforms = report.conforms(),
            results = report.results().len(),
            "Validated"
        );
        all_conform &= report.conforms();
        if args.input.len() > 1 {
            write_header(&mut out, input, args.format)?;
        }
        write_report(&mut out, &report, args.format)?;
    }
    out.flush()?;
    Ok(all_conform)
}

fn check_input(path: &Path) -> anyhow::Result<()> {
    ensure!(path.is_file(), "The input file {} does not exist", path.display());
    let extension = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    ensure!(
        matches!(extension, "json" | "jsonld"),
        "The input file {} must have a .json or .jsonld extension",
        path.display()
    );
    Ok(())
}

fn context_map(mappings: &[String]) -> anyhow::Result<ContextMap> {
    let mut contexts = ContextMap::new();
    for mapping in mappings {
        let (url, file) = mapping
            .rsplit_once('=')
            .with_context(|| format!("The context mapping '{mapping}' is not of the form URL=FILE"))?;
        contexts
            .insert_file(url, file)
            .with_context(|| format!("Failed to load the context {url} from {file}"))?;
    }
    Ok(contexts)
}

fn write_header(out: &mut impl Write, input: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "== {} ==", input.display())?,
        OutputFormat::Turtle => writeln!(out, "# {}", input.display())?,
        // Each JSON report is a standalone document
        OutputFormat::Json => (),
    }
    Ok(())
}

fn write_report(
    out: &mut impl Write,
    report: &ValidationReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => write!(out, "{report}")?,
        OutputFormat::Turtle => write!(out, "{}", report.to_turtle()?)?,
        OutputFormat::Json => writeln!(out, "{}", report.to_json()?)?,
    }
    Ok(())
}

impl From<Inference> for InferenceMode {
    fn from(inference: Inference) -> Self {
        match inference {
            Inference::None => Self::None,
            Inference::Subsumption => Self::Subsumption,
            Inference::Rdfs => Self::Rdfs,
        }
    }
}

impl From<Composition> for CompositionReport {
    fn from(composition: Composition) -> Self {
        match composition {
            Composition::First => Self::FirstFailingBranch,
            Composition::All => Self::AllBranches,
            Composition::Summary => Self::Summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[test]
    fn test_context_mapping_splits_on_last_equal_sign() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let file = dir.child("ctx.json");
        file.write_str(r#"{"@context": {"ex": "http://example.org/"}}"#)?;
        let contexts = context_map(&[format!(
            "https://example.org/ctx?v=1={}",
            file.path().display()
        )])?;
        assert!(
            contexts.get("https://example.org/ctx?v=1").is_some(),
            "the query string must stay in the URL"
        );
        Ok(())
    }

    #[test]
    fn test_context_mapping_without_file() {
        assert!(
            context_map(&["https://example.org/ctx".to_owned()]).is_err(),
            "a mapping needs a file"
        );
    }

    #[test]
    fn test_input_extension() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let turtle = dir.child("cred.ttl");
        turtle.touch()?;
        let json = dir.child("cred.jsonld");
        json.write_str("{}")?;
        assert!(check_input(turtle.path()).is_err(), "turtle inputs are rejected");
        assert!(check_input(json.path()).is_ok(), "JSON-LD inputs are accepted");
        assert!(
            check_input(dir.child("missing.json").path()).is_err(),
            "missing inputs are rejected"
        );
        Ok(())
    }
}
