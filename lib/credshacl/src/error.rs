//! Error types.
//!
//! Only parsing and shape loading can fail. Data-quality findings are reported as
//! [`Violation`](crate::Violation)s, never as errors.

use oxrdf::{NamedNode, Term};
use std::io;
use std::path::PathBuf;

/// Any failure that prevents a validation run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A document or a shapes file could not be read or parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A shape is structurally invalid.
    #[error(transparent)]
    ShapeDefinition(#[from] ShapeDefinitionError),
}

/// A document or a shapes file could not be read or parsed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The serialization is not supported.
    #[error("Unsupported RDF format for {}: {message}", path.display())]
    UnsupportedFormat { path: PathBuf, message: String },
    /// The RDF syntax is invalid.
    #[error("Invalid RDF syntax: {0}")]
    Syntax(#[from] oxrdfio::RdfParseError),
    /// The JSON of a JSON-LD document or context is invalid.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The file path can not be turned into a base IRI.
    #[error("The path {} can not be used as a base IRI", path.display())]
    InvalidBase { path: PathBuf },
    /// The base IRI given to the parser is invalid.
    #[error("Invalid base IRI '{iri}': {message}")]
    InvalidBaseIri { iri: String, message: String },
    /// A JSON-LD document refers to a remote context that is not in the context map.
    #[error("The JSON-LD context {url} is not available locally, map it to a file")]
    UnresolvedContext { url: String },
    /// A JSON-LD context ends up including itself.
    #[error("The JSON-LD context {url} includes itself")]
    RecursiveContext { url: String },
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A shape is structurally invalid.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeDefinitionError {
    /// A required parameter is missing.
    #[error("Missing required property {property} for shape {shape}")]
    MissingProperty { shape: Term, property: NamedNode },

    /// A parameter has a value of the wrong kind.
    #[error("Invalid value for property {property} in shape {shape}: expected {expected}, got {actual}")]
    InvalidPropertyValue {
        shape: Term,
        property: NamedNode,
        expected: String,
        actual: Term,
    },

    /// The property path can not be interpreted.
    #[error("Invalid property path in shape {shape}: {message}")]
    InvalidPropertyPath { shape: Term, message: String },

    /// An RDF list is malformed.
    #[error("Invalid RDF list in shape {shape}: {message}")]
    InvalidRdfList { shape: Term, message: String },

    /// The `sh:pattern` is not a valid regular expression.
    #[error("Invalid regex pattern '{pattern}' in shape {shape}: {message}")]
    InvalidRegex {
        shape: Term,
        pattern: String,
        message: String,
    },
}

impl ShapeDefinitionError {
    pub(crate) fn missing_property(shape: impl Into<Term>, property: impl Into<NamedNode>) -> Self {
        Self::MissingProperty {
            shape: shape.into(),
            property: property.into(),
        }
    }

    pub(crate) fn invalid_property_value(
        shape: impl Into<Term>,
        property: impl Into<NamedNode>,
        expected: impl Into<String>,
        actual: impl Into<Term>,
    ) -> Self {
        Self::InvalidPropertyValue {
            shape: shape.into(),
            property: property.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn invalid_property_path(shape: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidPropertyPath {
            shape: shape.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_rdf_list(shape: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidRdfList {
            shape: shape.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_regex(
        shape: impl Into<Term>,
        pattern: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRegex {
            shape: shape.into(),
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
