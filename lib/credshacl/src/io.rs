//! Loading of shapes, ontologies and credential documents.
//!
//! Every RDF serialization supported by [`oxrdfio`] can be loaded. JSON-LD documents go
//! through a [`ContextMap`] first so that remote `@context` references resolve to local
//! files and no network access is ever needed.

use crate::error::{Error, ParseError};
use crate::graph::Graph;
use crate::report::ValidationReport;
use crate::validator::{ValidationOptions, Validator};
use oxrdfio::{RdfFormat, RdfParser};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Parses a graph. Triples of named graphs are merged into the result.
pub fn load_graph(
    reader: impl Read,
    format: RdfFormat,
    base_iri: Option<&str>,
) -> Result<Graph, ParseError> {
    let mut parser = RdfParser::from_format(format);
    if let Some(base_iri) = base_iri {
        parser = parser
            .with_base_iri(base_iri)
            .map_err(|e| ParseError::InvalidBaseIri {
                iri: base_iri.into(),
                message: e.to_string(),
            })?;
    }
    let mut graph = Graph::new();
    for quad in parser.for_reader(reader) {
        graph.add_triple(quad?.into());
    }
    debug!(triples = graph.len(), format = format.name(), "Parsed graph");
    Ok(graph)
}

/// Parses a file, guessing its format from its extension.
///
/// The `file:` URL of the file is used as base IRI.
pub fn load_graph_from_path(path: impl AsRef<Path>) -> Result<Graph, ParseError> {
    load_document(path, &ContextMap::new())
}

/// Parses a file like [`load_graph_from_path`], resolving JSON-LD contexts with `contexts`.
pub fn load_document(path: impl AsRef<Path>, contexts: &ContextMap) -> Result<Graph, ParseError> {
    let path = path.as_ref();
    let format = format_from_path(path)?;
    let base_iri = base_iri_for_path(path)?;
    let file = File::open(path).map_err(|e| ParseError::io(path, e))?;
    let reader = BufReader::new(file);
    let graph = if matches!(format, RdfFormat::JsonLd { .. }) {
        load_json_ld(reader, contexts, Some(base_iri.as_str()))?
    } else {
        load_graph(reader, format, Some(base_iri.as_str()))?
    };
    debug!(path = %path.display(), triples = graph.len(), "Loaded file");
    Ok(graph)
}

/// Parses a JSON-LD document after inlining its mapped remote contexts.
pub fn load_json_ld(
    reader: impl Read,
    contexts: &ContextMap,
    base_iri: Option<&str>,
) -> Result<Graph, ParseError> {
    let mut document: Value = serde_json::from_reader(reader)?;
    contexts.inline(&mut document)?;
    let bytes = serde_json::to_vec(&document)?;
    load_graph(bytes.as_slice(), json_ld_format(), base_iri)
}

/// Guesses the RDF format of a file from its extension.
pub fn format_from_path(path: &Path) -> Result<RdfFormat, ParseError> {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ParseError::UnsupportedFormat {
            path: path.into(),
            message: "the file name has no extension".into(),
        })?;
    match extension.as_str() {
        "owl" | "xml" => Some(RdfFormat::RdfXml),
        "json" => Some(json_ld_format()),
        extension => RdfFormat::from_extension(extension),
    }
    .ok_or_else(|| ParseError::UnsupportedFormat {
        path: path.into(),
        message: format!("the extension '{extension}' is not a known RDF serialization"),
    })
}

fn json_ld_format() -> RdfFormat {
    RdfFormat::from_extension("jsonld").unwrap_or(RdfFormat::NQuads)
}

fn base_iri_for_path(path: &Path) -> Result<Url, ParseError> {
    let absolute = path.canonicalize().map_err(|e| ParseError::io(path, e))?;
    Url::from_file_path(&absolute).map_err(|()| ParseError::InvalidBase { path: absolute })
}

/// Local copies of remote JSON-LD context documents, keyed by URL.
///
/// ```
/// use credshacl::io::{ContextMap, load_json_ld};
/// use serde_json::json;
///
/// let mut contexts = ContextMap::new();
/// contexts.insert(
///     "https://example.org/context.jsonld",
///     json!({ "@context": { "name": "http://schema.org/name" } }),
/// );
/// let graph = load_json_ld(
///     r#"{ "@context": "https://example.org/context.jsonld", "@id": "http://example.org/a", "name": "A" }"#
///         .as_bytes(),
///     &contexts,
///     None,
/// )?;
/// assert_eq!(graph.len(), 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextMap {
    documents: FxHashMap<String, Value>,
}

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the context document served at `url`.
    pub fn insert(&mut self, url: impl Into<String>, document: Value) {
        self.documents.insert(url.into(), document);
    }

    /// Registers the context document served at `url` from a local JSON file.
    pub fn insert_file(
        &mut self,
        url: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ParseError::io(path, e))?;
        let document = serde_json::from_reader(BufReader::new(file))?;
        self.insert(url, document);
        Ok(())
    }

    pub fn get(&self, url: &str) -> Option<&Value> {
        self.documents.get(url)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Replaces every mapped context reference of `document` by the context it points to.
    ///
    /// Relative references are left to the JSON-LD parser. Unmapped absolute references
    /// are an error.
    pub fn inline(&self, document: &mut Value) -> Result<(), ParseError> {
        self.inline_in(document, &mut Vec::new())
    }

    fn inline_in(&self, value: &mut Value, in_progress: &mut Vec<String>) -> Result<(), ParseError> {
        match value {
            Value::Object(entries) => {
                for (key, entry) in entries.iter_mut() {
                    if key == "@context" {
                        self.inline_context(entry, in_progress)?;
                    } else {
                        self.inline_in(entry, in_progress)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.inline_in(item, in_progress)?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn inline_context(
        &self,
        context: &mut Value,
        in_progress: &mut Vec<String>,
    ) -> Result<(), ParseError> {
        match context {
            Value::String(url) => {
                let url = url.clone();
                if let Some(resolved) = self.resolve(&url, in_progress)? {
                    *context = resolved;
                }
            }
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for mut item in items.drain(..) {
                    self.inline_context(&mut item, in_progress)?;
                    match item {
                        Value::Array(nested) => resolved.extend(nested),
                        item => resolved.push(item),
                    }
                }
                *items = resolved;
            }
            // Scoped contexts of term definitions
            Value::Object(_) => self.inline_in(context, in_progress)?,
            _ => (),
        }
        Ok(())
    }

    fn resolve(
        &self,
        url: &str,
        in_progress: &mut Vec<String>,
    ) -> Result<Option<Value>, ParseError> {
        let Some(document) = self.documents.get(url) else {
            return if Url::parse(url).is_ok() {
                Err(ParseError::UnresolvedContext { url: url.into() })
            } else {
                Ok(None)
            };
        };
        if in_progress.iter().any(|u| u == url) {
            return Err(ParseError::RecursiveContext { url: url.into() });
        }
        let mut context = document
            .get("@context")
            .cloned()
            .unwrap_or_else(|| document.clone());
        in_progress.push(url.into());
        self.inline_context(&mut context, in_progress)?;
        in_progress.pop();
        debug!(url, "Inlined JSON-LD context");
        Ok(Some(context))
    }
}

/// Validates one document against the shapes of a file.
///
/// JSON-LD documents must only use inline contexts, use [`Validator`] with
/// [`load_document`] to provide remote ones.
pub fn validate_document(
    path: impl AsRef<Path>,
    shapes_path: impl AsRef<Path>,
    options: ValidationOptions,
) -> Result<ValidationReport, Error> {
    let shapes = load_graph_from_path(shapes_path)?;
    let validator = Validator::from_graph(shapes)?.with_options(options);
    let data = load_graph_from_path(path)?;
    Ok(validator.validate(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode, Triple};
    use serde_json::json;

    fn credentials_context() -> ContextMap {
        let mut contexts = ContextMap::new();
        contexts.insert(
            "https://www.w3.org/2018/credentials/v1",
            json!({
                "@context": {
                    "id": "@id",
                    "type": "@type",
                    "VerifiableCredential": "https://www.w3.org/2018/credentials#VerifiableCredential",
                    "issuer": { "@id": "https://www.w3.org/2018/credentials#issuer", "@type": "@id" }
                }
            }),
        );
        contexts
    }

    #[test]
    fn test_load_turtle() {
        let graph = load_graph(
            "<http://example.org/a> <http://example.org/p> \"v\" .".as_bytes(),
            RdfFormat::Turtle,
            None,
        )
        .unwrap();
        assert!(graph.contains(&Triple::new(
            NamedNode::new_unchecked("http://example.org/a"),
            NamedNode::new_unchecked("http://example.org/p"),
            Literal::new_simple_literal("v"),
        )));
    }

    #[test]
    fn test_syntax_error() {
        let result = load_graph("<http://example.org/a> .".as_bytes(), RdfFormat::Turtle, None);
        assert!(matches!(result, Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_inline_remote_context() {
        let mut document = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1", { "ex": "http://example.org/" }],
            "id": "http://example.org/cred1",
            "type": "VerifiableCredential",
            "issuer": "http://example.org/org"
        });
        credentials_context().inline(&mut document).unwrap();
        assert_eq!(document["@context"].as_array().map(Vec::len), Some(2));
        assert_eq!(document["@context"][0]["type"], "@type");

        let graph = load_json_ld(
            serde_json::to_vec(&document).unwrap().as_slice(),
            &ContextMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_unmapped_remote_context() {
        let mut document = json!({ "@context": "https://example.org/unknown", "@id": "http://example.org/a" });
        assert!(matches!(
            ContextMap::new().inline(&mut document),
            Err(ParseError::UnresolvedContext { url }) if url == "https://example.org/unknown"
        ));
    }

    #[test]
    fn test_recursive_context() {
        let mut contexts = ContextMap::new();
        contexts.insert("https://example.org/a", json!({ "@context": "https://example.org/b" }));
        contexts.insert("https://example.org/b", json!({ "@context": ["https://example.org/a"] }));
        let mut document = json!({ "@context": "https://example.org/a" });
        assert!(matches!(
            contexts.inline(&mut document),
            Err(ParseError::RecursiveContext { .. })
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            format_from_path(Path::new("shapes.ttl")).unwrap(),
            RdfFormat::Turtle
        );
        assert_eq!(
            format_from_path(Path::new("edc.OWL")).unwrap(),
            RdfFormat::RdfXml
        );
        assert!(matches!(
            format_from_path(Path::new("credential.json")).unwrap(),
            RdfFormat::JsonLd { .. }
        ));
        assert!(matches!(
            format_from_path(Path::new("notes.txt")),
            Err(ParseError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_graph_from_path("/nonexistent/credential.jsonld"),
            Err(ParseError::Io { .. })
        ));
    }
}
