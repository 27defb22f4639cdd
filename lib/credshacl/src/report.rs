//! SHACL [validation report](https://www.w3.org/TR/shacl/#validation-report).

use crate::constraint::ConstraintComponent;
use crate::graph::Graph;
use crate::model::ShapeId;
use crate::path::PropertyPath;
use crate::vocab::{rdf, sh, xsd};
use oxrdf::{BlankNode, Literal, NamedNodeRef, Term, Triple};
use oxttl::TurtleSerializer;
use serde::Serialize;
use std::fmt;
use std::io;

/// Severity of a validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// The only severity that makes a report non-conforming.
    #[default]
    Violation,
    Warning,
    Info,
}

impl Severity {
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Violation => sh::VIOLATION,
            Self::Warning => sh::WARNING,
            Self::Info => sh::INFO,
        }
    }

    pub fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        if iri == sh::VIOLATION {
            Some(Self::Violation)
        } else if iri == sh::WARNING {
            Some(Self::Warning)
        } else if iri == sh::INFO {
            Some(Self::Info)
        } else {
            None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Violation => "Violation",
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

/// A single validation result.
///
/// Built once during evaluation and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub focus_node: Term,
    /// Set for results of property shapes.
    pub result_path: Option<PropertyPath>,
    /// The offending value node, if the constraint is about a single value.
    pub value: Option<Term>,
    pub source_shape: ShapeId,
    pub source_constraint_component: ConstraintComponent,
    pub message: Option<String>,
    pub severity: Severity,
    /// Results of nested shapes explaining a logical constraint failure.
    pub details: Vec<Violation>,
}

impl Violation {
    pub fn new(
        focus_node: Term,
        source_shape: ShapeId,
        source_constraint_component: ConstraintComponent,
    ) -> Self {
        Self {
            focus_node,
            result_path: None,
            value: None,
            source_shape,
            source_constraint_component,
            message: None,
            severity: Severity::Violation,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: Option<PropertyPath>) -> Self {
        self.result_path = path;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Term) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Vec<Violation>) -> Self {
        self.details = details;
        self
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "\t".repeat(indent);
        let label = match self.severity {
            Severity::Violation => "Constraint Violation",
            Severity::Warning => "Constraint Warning",
            Severity::Info => "Constraint Info",
        };
        let component = self.source_constraint_component;
        let iri = component.iri().as_str();
        let local = iri.strip_prefix(sh::NAMESPACE).unwrap_or(iri);
        writeln!(f, "{pad}{label} in {local} ({iri}):")?;
        writeln!(f, "{pad}\tSeverity: sh:{}", self.severity)?;
        writeln!(f, "{pad}\tSource Shape: {}", self.source_shape)?;
        writeln!(f, "{pad}\tFocus Node: {}", self.focus_node)?;
        if let Some(path) = &self.result_path {
            writeln!(f, "{pad}\tResult Path: {path}")?;
        }
        if let Some(value) = &self.value {
            writeln!(f, "{pad}\tValue Node: {value}")?;
        }
        if let Some(message) = &self.message {
            writeln!(f, "{pad}\tMessage: {message}")?;
        }
        if !self.details.is_empty() {
            writeln!(f, "{pad}\tDetails:")?;
            for detail in &self.details {
                detail.write_block(f, indent + 2)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_block(f, 0)
    }
}

/// The outcome of validating one data graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    results: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff there is no result of severity [`Severity::Violation`].
    pub fn conforms(&self) -> bool {
        self.results.iter().all(|r| r.severity != Severity::Violation)
    }

    /// The results in evaluation order.
    pub fn results(&self) -> &[Violation] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Violation> {
        self.results
    }

    pub fn violation_count(&self) -> usize {
        self.count(Severity::Violation)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    fn count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    pub fn add_result(&mut self, result: Violation) {
        self.results.push(result);
    }

    pub fn merge(&mut self, other: Self) {
        self.results.extend(other.results);
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Converts the report to a `sh:ValidationReport` RDF graph.
    ///
    /// Blank node labels are derived from result positions so equal reports give equal graphs.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        let report = BlankNode::new_unchecked("report");
        graph.add_triple(Triple::new(
            report.clone(),
            rdf::TYPE,
            sh::VALIDATION_REPORT,
        ));
        graph.add_triple(Triple::new(
            report.clone(),
            sh::CONFORMS,
            Literal::new_typed_literal(self.conforms().to_string(), xsd::BOOLEAN),
        ));
        for (i, result) in self.results.iter().enumerate() {
            let node = BlankNode::new_unchecked(format!("result{i}"));
            graph.add_triple(Triple::new(report.clone(), sh::RESULT, node.clone()));
            add_result_to_graph(&mut graph, &node, result);
        }
        graph
    }

    /// Serializes [`to_graph`](Self::to_graph) as Turtle.
    pub fn to_turtle(&self) -> io::Result<String> {
        let mut serializer = TurtleSerializer::new()
            .with_prefix("sh", sh::NAMESPACE)
            .and_then(|s| s.with_prefix("xsd", "http://www.w3.org/2001/XMLSchema#"))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .for_writer(Vec::new());
        for triple in &self.to_graph() {
            serializer.serialize_triple(triple)?;
        }
        String::from_utf8(serializer.finish()?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// Terms are written in N-Triples syntax.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport::from(self))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation Report")?;
        writeln!(
            f,
            "Conforms: {}",
            if self.conforms() { "True" } else { "False" }
        )?;
        if self.results.is_empty() {
            return Ok(());
        }
        writeln!(
            f,
            "Results ({}): {} violation(s), {} warning(s), {} info",
            self.results.len(),
            self.violation_count(),
            self.warning_count(),
            self.info_count()
        )?;
        for result in &self.results {
            result.write_block(f, 0)?;
        }
        Ok(())
    }
}

impl FromIterator<Violation> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

fn add_result_to_graph(graph: &mut Graph, node: &BlankNode, result: &Violation) {
    graph.add_triple(Triple::new(
        node.clone(),
        rdf::TYPE,
        sh::VALIDATION_RESULT,
    ));
    graph.add_triple(Triple::new(
        node.clone(),
        sh::FOCUS_NODE,
        result.focus_node.clone(),
    ));
    if let Some(path) = &result.result_path {
        let path = path.to_graph(graph, &format!("{}_path", node.as_str()));
        graph.add_triple(Triple::new(node.clone(), sh::RESULT_PATH, path));
    }
    if let Some(value) = &result.value {
        graph.add_triple(Triple::new(node.clone(), sh::VALUE, value.clone()));
    }
    graph.add_triple(Triple::new(
        node.clone(),
        sh::SOURCE_SHAPE,
        result.source_shape.to_term(),
    ));
    graph.add_triple(Triple::new(
        node.clone(),
        sh::SOURCE_CONSTRAINT_COMPONENT,
        result.source_constraint_component.iri(),
    ));
    if let Some(message) = &result.message {
        graph.add_triple(Triple::new(
            node.clone(),
            sh::RESULT_MESSAGE,
            Literal::new_simple_literal(message),
        ));
    }
    graph.add_triple(Triple::new(
        node.clone(),
        sh::RESULT_SEVERITY,
        result.severity.iri(),
    ));
    for (i, detail) in result.details.iter().enumerate() {
        let detail_node = BlankNode::new_unchecked(format!("{}_{i}", node.as_str()));
        graph.add_triple(Triple::new(node.clone(), sh::DETAIL, detail_node.clone()));
        add_result_to_graph(graph, &detail_node, detail);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    conforms: bool,
    violations: usize,
    warnings: usize,
    infos: usize,
    results: Vec<JsonResult<'a>>,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    severity: Severity,
    #[serde(rename = "focusNode")]
    focus_node: String,
    #[serde(rename = "resultPath", skip_serializing_if = "Option::is_none")]
    result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "sourceShape")]
    source_shape: String,
    #[serde(rename = "sourceConstraintComponent")]
    source_constraint_component: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<JsonResult<'a>>,
}

impl<'a> From<&'a ValidationReport> for JsonReport<'a> {
    fn from(report: &'a ValidationReport) -> Self {
        Self {
            conforms: report.conforms(),
            violations: report.violation_count(),
            warnings: report.warning_count(),
            infos: report.info_count(),
            results: report.results.iter().map(JsonResult::from).collect(),
        }
    }
}

impl<'a> From<&'a Violation> for JsonResult<'a> {
    fn from(result: &'a Violation) -> Self {
        Self {
            severity: result.severity,
            focus_node: result.focus_node.to_string(),
            result_path: result.result_path.as_ref().map(ToString::to_string),
            value: result.value.as_ref().map(ToString::to_string),
            source_shape: result.source_shape.to_string(),
            source_constraint_component: result.source_constraint_component.iri().as_str(),
            message: result.message.as_deref(),
            details: result.details.iter().map(JsonResult::from).collect(),
        }
    }
}
