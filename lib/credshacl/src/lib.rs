#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod constraint;
mod error;
mod graph;
mod inference;
pub mod io;
mod model;
mod path;
mod report;
mod validator;
pub mod vocab;

pub use constraint::{Constraint, ConstraintComponent, NodeKind, Pattern};
pub use error::{Error, ParseError, ShapeDefinitionError};
pub use graph::{Graph, TriplesMatching};
pub use inference::{ClosureCache, Fingerprint, InferenceMode, SchemaClosure};
pub use io::{ContextMap, validate_document};
pub use model::{Shape, ShapeId, ShapeKind, ShapesGraph, Target};
pub use oxrdfio::RdfFormat;
pub use path::PropertyPath;
pub use report::{Severity, ValidationReport, Violation};
pub use validator::{CompositionReport, ValidationOptions, Validator};
