//! SHACL validation engine.
//!
//! A [`Validator`] owns a [`ShapesGraph`] and evaluates it against data graphs:
//! the schema closure of the shapes graph and of the configured ontologies is looked up in a
//! [`ClosureCache`], the data graph is expanded with the entailed triples, then every targeted
//! shape is evaluated on its sorted focus nodes.

use crate::constraint::{Constraint, ConstraintComponent};
use crate::error::ShapeDefinitionError;
use crate::graph::Graph;
use crate::inference::{
    ClosureCache, Fingerprint, InferenceMode, SchemaClosure, has_schema_statements,
};
use crate::model::{Shape, ShapeId, ShapesGraph};
use crate::path::PropertyPath;
use crate::report::{ValidationReport, Violation};
use crate::vocab::xsd;
use oxrdf::{Literal, NamedNode, NamedNodeRef, Term, TermRef};
use oxsdatatypes::{
    Boolean, Date, DateTime, DayTimeDuration, Decimal, Double, Duration, Float, GDay, GMonth,
    GMonthDay, GYear, GYearMonth, Time, YearMonthDuration,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default maximum nesting of shape references.
const DEFAULT_MAX_DEPTH: usize = 50;

/// Which nested results are attached as details to the result of a logical constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompositionReport {
    /// The results of the first member shape that failed.
    #[default]
    FirstFailingBranch,
    /// The results of every member shape that failed.
    AllBranches,
    /// No details, only the summary message.
    Summary,
}

impl CompositionReport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstFailingBranch => "first",
            Self::AllBranches => "all",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for CompositionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompositionReport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::FirstFailingBranch),
            "all" => Ok(Self::AllBranches),
            "summary" => Ok(Self::Summary),
            _ => Err(format!(
                "unknown composition report '{s}', expected one of first, all or summary"
            )),
        }
    }
}

/// Options of a [`Validator`].
///
/// ```
/// use credshacl::{CompositionReport, InferenceMode, ValidationOptions};
///
/// let options = ValidationOptions::default()
///     .with_inference(InferenceMode::Subsumption)
///     .with_composition_report(CompositionReport::AllBranches)
///     .with_parallel(true);
/// assert!(options.parallel());
/// ```
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    inference: InferenceMode,
    composition_report: CompositionReport,
    parallel: bool,
    max_depth: usize,
    ontologies: Vec<Arc<Graph>>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            inference: InferenceMode::default(),
            composition_report: CompositionReport::default(),
            parallel: false,
            max_depth: DEFAULT_MAX_DEPTH,
            ontologies: Vec::new(),
        }
    }
}

impl ValidationOptions {
    /// Sets which entailed triples are added to data graphs before evaluation.
    #[must_use]
    pub fn with_inference(mut self, inference: InferenceMode) -> Self {
        self.inference = inference;
        self
    }

    #[must_use]
    pub fn with_composition_report(mut self, composition_report: CompositionReport) -> Self {
        self.composition_report = composition_report;
        self
    }

    /// Evaluates the focus nodes of a shape on the rayon thread pool.
    ///
    /// Results are still reported in focus node order.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets how deep shape references (`sh:node`, `sh:and`...) are followed.
    /// Deeper nodes are considered conforming.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Adds a graph whose `rdfs:subClassOf`, `rdfs:subPropertyOf`, `rdfs:domain` and
    /// `rdfs:range` statements are part of the schema closure.
    #[must_use]
    pub fn with_ontology(mut self, ontology: impl Into<Arc<Graph>>) -> Self {
        self.ontologies.push(ontology.into());
        self
    }

    pub fn inference(&self) -> InferenceMode {
        self.inference
    }

    pub fn composition_report(&self) -> CompositionReport {
        self.composition_report
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn ontologies(&self) -> &[Arc<Graph>] {
        &self.ontologies
    }
}

/// Validates data graphs against a shapes graph.
///
/// ```
/// use credshacl::Validator;
/// use credshacl::io::load_graph;
/// use oxrdfio::RdfFormat;
///
/// let shapes = load_graph(
///     r#"
///     @prefix sh: <http://www.w3.org/ns/shacl#> .
///     @prefix ex: <http://example.org/> .
///     ex:CredentialShape a sh:NodeShape ;
///         sh:targetClass ex:EuropeanDigitalCredential ;
///         sh:property [ sh:path ex:issuer ; sh:minCount 1 ] .
///     "#
///     .as_bytes(),
///     RdfFormat::Turtle,
///     None,
/// )?;
/// let data = load_graph(
///     "<http://example.org/cred1> a <http://example.org/EuropeanDigitalCredential> .".as_bytes(),
///     RdfFormat::Turtle,
///     None,
/// )?;
/// let report = Validator::from_graph(shapes)?.validate(&data);
/// assert!(!report.conforms());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    shapes: ShapesGraph,
    schema: Graph,
    /// Fingerprint of the shapes graph and of the ontologies.
    fingerprint: Fingerprint,
    options: ValidationOptions,
    cache: Arc<ClosureCache>,
}

impl Validator {
    /// Creates a validator from already extracted shapes.
    ///
    /// The schema closure is then only built from the ontologies and the data graphs.
    pub fn new(shapes: ShapesGraph) -> Self {
        Self {
            shapes,
            schema: Graph::new(),
            fingerprint: Fingerprint::of(&[]),
            options: ValidationOptions::default(),
            cache: Arc::new(ClosureCache::new()),
        }
    }

    /// Extracts the shapes of `shapes_graph`. Its schema statements are kept for the closure.
    pub fn from_graph(shapes_graph: Graph) -> Result<Self, ShapeDefinitionError> {
        let mut validator = Self::new(ShapesGraph::from_graph(&shapes_graph)?);
        validator.schema = shapes_graph;
        let fingerprint = Fingerprint::of(&validator.schema_sources());
        validator.fingerprint = fingerprint;
        Ok(validator)
    }

    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        let fingerprint = Fingerprint::of(&self.schema_sources());
        self.fingerprint = fingerprint;
        self
    }

    /// Shares a closure cache with other validators.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ClosureCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn shapes(&self) -> &ShapesGraph {
        &self.shapes
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ClosureCache> {
        &self.cache
    }

    /// Returns the schema closure used to validate `data`.
    ///
    /// The closure of the shapes graph and of the ontologies is cached. Data graphs with their
    /// own schema statements get a closure of their own that is not kept.
    pub fn closure(&self, data: &Graph) -> Arc<SchemaClosure> {
        let mut sources = self.schema_sources();
        if !has_schema_statements(data) {
            return self.cache.get_or_compute_with(self.fingerprint, &sources);
        }
        debug!("The data graph has schema statements, its closure is not cached");
        sources.push(data);
        Arc::new(SchemaClosure::from_graphs(&sources))
    }

    fn schema_sources(&self) -> Vec<&Graph> {
        let mut sources = vec![&self.schema];
        sources.extend(self.options.ontologies.iter().map(AsRef::as_ref));
        sources
    }

    /// Validates a data graph.
    ///
    /// Results are ordered by shape declaration order, then focus node order, then
    /// constraint order. The same inputs always give the same report.
    pub fn validate(&self, data: &Graph) -> ValidationReport {
        let closure = self.closure(data);
        let expanded = closure.expand(data, self.options.inference);
        let context = ValidationContext {
            shapes: &self.shapes,
            data: &expanded,
            asserted: data,
            closure: &closure,
            options: &self.options,
        };

        let mut report = ValidationReport::new();
        let mut focus_node_count = 0;
        for shape in &self.shapes {
            if shape.deactivated || !shape.has_targets() {
                continue;
            }
            let focus_nodes = context.focus_nodes(shape);
            focus_node_count += focus_nodes.len();
            let results: Vec<Vec<Violation>> = if self.options.parallel {
                focus_nodes
                    .par_iter()
                    .map(|focus| context.validate_focus(shape, focus))
                    .collect()
            } else {
                focus_nodes
                    .iter()
                    .map(|focus| context.validate_focus(shape, focus))
                    .collect()
            };
            let before = report.results().len();
            for result in results.into_iter().flatten() {
                report.add_result(result);
            }
            debug!(
                shape = %shape.id,
                focus_nodes = focus_nodes.len(),
                results = report.results().len() - before,
                "Evaluated shape"
            );
        }

        info!(
            conforms = report.conforms(),
            focus_nodes = focus_node_count,
            violations = report.violation_count(),
            warnings = report.warning_count(),
            infos = report.info_count(),
            inference = %self.options.inference,
            "Validation finished"
        );
        report
    }

    /// Evaluates one shape on one focus node of `data`, whatever the targets of the shape.
    pub fn evaluate(&self, shape: &ShapeId, data: &Graph, focus: TermRef<'_>) -> Vec<Violation> {
        let Some(shape) = self.shapes.get(shape) else {
            warn!(%shape, "Evaluated shape is not defined, the node is treated as conforming");
            return Vec::new();
        };
        let closure = self.closure(data);
        let expanded = closure.expand(data, self.options.inference);
        let context = ValidationContext {
            shapes: &self.shapes,
            data: &expanded,
            asserted: data,
            closure: &closure,
            options: &self.options,
        };
        context.validate_focus(shape, &focus.into_owned())
    }
}

/// (shape, focus node) pairs currently being evaluated.
type Visited = FxHashSet<(ShapeId, Term)>;

struct ValidationContext<'a> {
    shapes: &'a ShapesGraph,
    /// The data graph with the entailed triples.
    data: &'a Graph,
    /// The data graph as loaded, used by closed shapes.
    asserted: &'a Graph,
    closure: &'a SchemaClosure,
    options: &'a ValidationOptions,
}

/// A focus node of a shape and its value nodes.
struct FocusValues<'a> {
    shape: &'a Shape,
    node: &'a Term,
    values: &'a [Term],
}

impl FocusValues<'_> {
    fn violation(&self, component: ConstraintComponent, message: impl Into<String>) -> Violation {
        let result = Violation::new(self.node.clone(), self.shape.id.clone(), component)
            .with_path(self.shape.path().cloned())
            .with_severity(self.shape.severity);
        match &self.shape.message {
            Some(message) => result.with_message(message.clone()),
            None => result.with_message(message),
        }
    }
}

impl ValidationContext<'_> {
    /// Distinct focus nodes of the shape sorted by term kind then N-Triples form.
    fn focus_nodes(&self, shape: &Shape) -> Vec<Term> {
        let mut nodes = Vec::new();
        for target in &shape.targets {
            target.find_focus_nodes(self.data, self.closure, &mut nodes);
        }
        nodes.sort_by_cached_key(|node| (term_kind_rank(node), node.to_string()));
        nodes.dedup();
        nodes
    }

    fn validate_focus(&self, shape: &Shape, focus: &Term) -> Vec<Violation> {
        self.validate_shape(shape, focus, &mut Visited::default(), 0)
    }

    fn validate_shape(
        &self,
        shape: &Shape,
        focus: &Term,
        visited: &mut Visited,
        depth: usize,
    ) -> Vec<Violation> {
        if shape.deactivated {
            return Vec::new();
        }
        if depth > self.options.max_depth {
            warn!(
                shape = %shape.id,
                focus = %focus,
                "Maximum shape nesting depth reached, the node is treated as conforming"
            );
            return Vec::new();
        }
        let key = (shape.id.clone(), focus.clone());
        if !visited.insert(key.clone()) {
            // Already being evaluated higher in the stack
            return Vec::new();
        }

        let values = match shape.path() {
            None => vec![focus.clone()],
            Some(path) => path.evaluate(self.data, focus.as_ref()),
        };
        let at = FocusValues {
            shape,
            node: focus,
            values: &values,
        };
        let mut results = Vec::new();
        for constraint in &shape.constraints {
            self.validate_constraint(&at, constraint, visited, depth, &mut results);
        }
        for property in &shape.property_shapes {
            let Some(property) = self.shapes.get(property) else {
                continue;
            };
            for value in &values {
                results.extend(self.validate_shape(property, value, visited, depth + 1));
            }
        }

        visited.remove(&key);
        results
    }

    /// Results of validating `node` against a referenced shape. Empty iff it conforms.
    fn member_results(
        &self,
        shape: &ShapeId,
        node: &Term,
        visited: &mut Visited,
        depth: usize,
    ) -> Vec<Violation> {
        match self.shapes.get(shape) {
            Some(shape) => self.validate_shape(shape, node, visited, depth + 1),
            None => Vec::new(),
        }
    }

    fn details(&self, failing: Vec<Vec<Violation>>) -> Vec<Violation> {
        match self.options.composition_report {
            CompositionReport::FirstFailingBranch => failing.into_iter().next().unwrap_or_default(),
            CompositionReport::AllBranches => failing.into_iter().flatten().collect(),
            CompositionReport::Summary => Vec::new(),
        }
    }

    fn validate_constraint(
        &self,
        at: &FocusValues<'_>,
        constraint: &Constraint,
        visited: &mut Visited,
        depth: usize,
        out: &mut Vec<Violation>,
    ) {
        let values = at.values;
        match constraint {
            // === Cardinality ===
            Constraint::MinCount(min) => {
                if values.len() < *min {
                    out.push(at.violation(
                        ConstraintComponent::MinCount,
                        format!("Expected at least {min} value(s), got {}", values.len()),
                    ));
                }
            }
            Constraint::MaxCount(max) => {
                if values.len() > *max {
                    out.push(at.violation(
                        ConstraintComponent::MaxCount,
                        format!("Expected at most {max} value(s), got {}", values.len()),
                    ));
                }
            }

            // === Value type ===
            Constraint::Datatype(datatype) => {
                for value in values {
                    let message = match value {
                        Term::Literal(literal) if literal.datatype() == datatype.as_ref() => {
                            if is_well_formed(literal) {
                                continue;
                            }
                            format!("Value {value} is not a valid lexical form of {datatype}")
                        }
                        _ => format!("Value {value} does not have datatype {datatype}"),
                    };
                    out.push(
                        at.violation(ConstraintComponent::Datatype, message)
                            .with_value(value.clone()),
                    );
                }
            }
            Constraint::NodeKind(kind) => {
                for value in values {
                    if !kind.matches(value) {
                        out.push(
                            at.violation(
                                ConstraintComponent::NodeKind,
                                format!("Value {value} is not of node kind {}", kind.iri()),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::Class(class) => {
                for value in values {
                    if !self
                        .closure
                        .is_instance_of(self.data, value.as_ref(), class.as_ref().into())
                    {
                        out.push(
                            at.violation(
                                ConstraintComponent::Class,
                                format!("Value {value} is not an instance of {class}"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }

            // === String based ===
            Constraint::Pattern(pattern) => {
                for value in values {
                    if !lexical_form(value).is_some_and(|text| pattern.is_match(text)) {
                        out.push(
                            at.violation(
                                ConstraintComponent::Pattern,
                                format!("Value {value} does not match pattern {pattern}"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::MinLength(min) => {
                for value in values {
                    if !lexical_form(value).is_some_and(|text| text.chars().count() >= *min) {
                        out.push(
                            at.violation(
                                ConstraintComponent::MinLength,
                                format!("Value {value} is shorter than {min} character(s)"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::MaxLength(max) => {
                for value in values {
                    if !lexical_form(value).is_some_and(|text| text.chars().count() <= *max) {
                        out.push(
                            at.violation(
                                ConstraintComponent::MaxLength,
                                format!("Value {value} is longer than {max} character(s)"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::LanguageIn(ranges) => {
                for value in values {
                    let matches = match value {
                        Term::Literal(literal) => literal
                            .language()
                            .is_some_and(|tag| ranges.iter().any(|range| lang_matches(tag, range))),
                        _ => false,
                    };
                    if !matches {
                        out.push(
                            at.violation(
                                ConstraintComponent::LanguageIn,
                                format!(
                                    "Value {value} does not have one of the language tags {}",
                                    ranges.join(", ")
                                ),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::UniqueLang => {
                let mut seen = FxHashSet::default();
                let mut reported = FxHashSet::default();
                for value in values {
                    let Term::Literal(literal) = value else {
                        continue;
                    };
                    let Some(tag) = literal.language() else {
                        continue;
                    };
                    let tag = tag.to_ascii_lowercase();
                    if !seen.insert(tag.clone()) && reported.insert(tag.clone()) {
                        out.push(at.violation(
                            ConstraintComponent::UniqueLang,
                            format!("Language tag \"{tag}\" is used by more than one value"),
                        ));
                    }
                }
            }

            // === Value range ===
            Constraint::MinInclusive(bound) => self.validate_range(
                at,
                ConstraintComponent::MinInclusive,
                bound,
                |o| o.is_ge(),
                "greater than or equal to",
                out,
            ),
            Constraint::MaxInclusive(bound) => self.validate_range(
                at,
                ConstraintComponent::MaxInclusive,
                bound,
                |o| o.is_le(),
                "less than or equal to",
                out,
            ),
            Constraint::MinExclusive(bound) => self.validate_range(
                at,
                ConstraintComponent::MinExclusive,
                bound,
                |o| o.is_gt(),
                "greater than",
                out,
            ),
            Constraint::MaxExclusive(bound) => self.validate_range(
                at,
                ConstraintComponent::MaxExclusive,
                bound,
                |o| o.is_lt(),
                "less than",
                out,
            ),

            // === Other values ===
            Constraint::In(allowed) => {
                for value in values {
                    if !allowed.contains(value) {
                        out.push(
                            at.violation(
                                ConstraintComponent::In,
                                format!("Value {value} is not in the allowed list"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::HasValue(expected) => {
                if !values.contains(expected) {
                    out.push(at.violation(
                        ConstraintComponent::HasValue,
                        format!("Missing expected value {expected}"),
                    ));
                }
            }
            Constraint::Closed { ignored_properties } => {
                let allowed: FxHashSet<&NamedNode> = at
                    .shape
                    .property_shapes
                    .iter()
                    .filter_map(|id| self.shapes.get(id)?.path()?.as_predicate())
                    .chain(ignored_properties)
                    .collect();
                for value in values {
                    for triple in self.asserted.triples_for_subject(value.as_ref()) {
                        if allowed.contains(&triple.predicate) {
                            continue;
                        }
                        out.push(
                            Violation::new(
                                value.clone(),
                                at.shape.id.clone(),
                                ConstraintComponent::Closed,
                            )
                            .with_path(Some(PropertyPath::predicate(triple.predicate.clone())))
                            .with_value(triple.object.clone())
                            .with_severity(at.shape.severity)
                            .with_message(at.shape.message.clone().unwrap_or_else(|| {
                                format!("Unexpected property {}", triple.predicate)
                            })),
                        );
                    }
                }
            }

            // === Property pairs ===
            Constraint::Equals(property) => {
                let others = self.property_values(at.node, property);
                for value in values.iter().filter(|v| !others.contains(v)) {
                    out.push(
                        at.violation(
                            ConstraintComponent::Equals,
                            format!("Value {value} is not a value of {property}"),
                        )
                        .with_value(value.clone()),
                    );
                }
                for other in others.iter().filter(|o| !values.contains(o)) {
                    out.push(
                        at.violation(
                            ConstraintComponent::Equals,
                            format!("Value {other} of {property} is missing"),
                        )
                        .with_value(other.clone()),
                    );
                }
            }
            Constraint::Disjoint(property) => {
                let others = self.property_values(at.node, property);
                for value in values.iter().filter(|v| others.contains(v)) {
                    out.push(
                        at.violation(
                            ConstraintComponent::Disjoint,
                            format!("Value {value} is also a value of {property}"),
                        )
                        .with_value(value.clone()),
                    );
                }
            }
            Constraint::LessThan(property) => {
                self.validate_pair_order(at, ConstraintComponent::LessThan, property, out);
            }
            Constraint::LessThanOrEquals(property) => {
                self.validate_pair_order(at, ConstraintComponent::LessThanOrEquals, property, out);
            }

            // === Logical ===
            Constraint::Not(negated) => {
                for value in values {
                    if self.member_results(negated, value, visited, depth).is_empty() {
                        out.push(
                            at.violation(
                                ConstraintComponent::Not,
                                format!("Value {value} conforms to the negated shape {negated}"),
                            )
                            .with_value(value.clone()),
                        );
                    }
                }
            }
            Constraint::And(members) => {
                let stop_early =
                    self.options.composition_report != CompositionReport::AllBranches;
                for value in values {
                    let mut failing = Vec::new();
                    for member in members {
                        let results = self.member_results(member, value, visited, depth);
                        if !results.is_empty() {
                            failing.push(results);
                            if stop_early {
                                break;
                            }
                        }
                    }
                    if !failing.is_empty() {
                        out.push(
                            at.violation(
                                ConstraintComponent::And,
                                format!("Value {value} does not conform to every shape of sh:and"),
                            )
                            .with_value(value.clone())
                            .with_details(self.details(failing)),
                        );
                    }
                }
            }
            Constraint::Or(members) => {
                for value in values {
                    let mut failing = Vec::new();
                    let mut conforms = false;
                    for member in members {
                        let results = self.member_results(member, value, visited, depth);
                        if results.is_empty() {
                            conforms = true;
                            break;
                        }
                        failing.push(results);
                    }
                    if !conforms {
                        out.push(
                            at.violation(
                                ConstraintComponent::Or,
                                format!("Value {value} does not conform to any shape of sh:or"),
                            )
                            .with_value(value.clone())
                            .with_details(self.details(failing)),
                        );
                    }
                }
            }
            Constraint::Xone(members) => {
                for value in values {
                    let mut failing = Vec::new();
                    let mut conforming = 0;
                    for member in members {
                        let results = self.member_results(member, value, visited, depth);
                        if results.is_empty() {
                            conforming += 1;
                        } else {
                            failing.push(results);
                        }
                    }
                    if conforming != 1 {
                        let details = if conforming == 0 {
                            self.details(failing)
                        } else {
                            Vec::new()
                        };
                        out.push(
                            at.violation(
                                ConstraintComponent::Xone,
                                format!(
                                    "Value {value} conforms to {conforming} shapes of sh:xone, expected exactly 1"
                                ),
                            )
                            .with_value(value.clone())
                            .with_details(details),
                        );
                    }
                }
            }
            Constraint::Node(node_shape) => {
                for value in values {
                    let results = self.member_results(node_shape, value, visited, depth);
                    if results.is_empty() {
                        continue;
                    }
                    let details = if self.options.composition_report == CompositionReport::Summary
                    {
                        Vec::new()
                    } else {
                        results
                    };
                    out.push(
                        at.violation(
                            ConstraintComponent::Node,
                            format!("Value {value} does not conform to shape {node_shape}"),
                        )
                        .with_value(value.clone())
                        .with_details(details),
                    );
                }
            }
            Constraint::QualifiedValueShape {
                shape,
                min_count,
                max_count,
            } => {
                let conforming = values
                    .iter()
                    .filter(|value| self.member_results(shape, value, visited, depth).is_empty())
                    .count();
                if let Some(min) = min_count {
                    if conforming < *min {
                        out.push(at.violation(
                            ConstraintComponent::QualifiedValueShape,
                            format!(
                                "Expected at least {min} value(s) conforming to {shape}, got {conforming}"
                            ),
                        ));
                    }
                }
                if let Some(max) = max_count {
                    if conforming > *max {
                        out.push(at.violation(
                            ConstraintComponent::QualifiedValueShape,
                            format!(
                                "Expected at most {max} value(s) conforming to {shape}, got {conforming}"
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn validate_range(
        &self,
        at: &FocusValues<'_>,
        component: ConstraintComponent,
        bound: &Literal,
        accept: fn(Ordering) -> bool,
        relation: &str,
        out: &mut Vec<Violation>,
    ) {
        let bound_term = Term::from(bound.clone());
        for value in at.values {
            if !compare_terms(value, &bound_term).is_some_and(accept) {
                out.push(
                    at.violation(
                        component,
                        format!("Value {value} is not {relation} {bound}"),
                    )
                    .with_value(value.clone()),
                );
            }
        }
    }

    fn validate_pair_order(
        &self,
        at: &FocusValues<'_>,
        component: ConstraintComponent,
        property: &NamedNode,
        out: &mut Vec<Violation>,
    ) {
        let (accept, relation): (fn(Ordering) -> bool, &str) =
            if component == ConstraintComponent::LessThan {
                (Ordering::is_lt, "less than")
            } else {
                (Ordering::is_le, "less than or equal to")
            };
        let others = self.property_values(at.node, property);
        for value in at.values {
            for other in &others {
                if !compare_terms(value, other).is_some_and(accept) {
                    out.push(
                        at.violation(
                            component,
                            format!("Value {value} is not {relation} {other} ({property})"),
                        )
                        .with_value(value.clone()),
                    );
                }
            }
        }
    }

    fn property_values(&self, node: &Term, property: &NamedNode) -> Vec<Term> {
        self.data
            .objects_for_subject_predicate(node.as_ref(), property.as_ref())
            .cloned()
            .collect()
    }
}

fn term_kind_rank(term: &Term) -> u8 {
    match term {
        Term::NamedNode(_) => 0,
        Term::BlankNode(_) => 1,
        Term::Literal(_) => 2,
    }
}

/// The string a pattern or length constraint looks at. Blank nodes have none.
fn lexical_form(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(node) => Some(node.as_str()),
        Term::BlankNode(_) => None,
        Term::Literal(literal) => Some(literal.value()),
    }
}

/// Basic filtering of RFC 4647.
fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return true;
    }
    tag.get(..range.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(range))
        && matches!(tag.as_bytes().get(range.len()), None | Some(b'-'))
}

const INTEGER_TYPES: [NamedNodeRef<'static>; 13] = [
    xsd::INTEGER,
    xsd::LONG,
    xsd::INT,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

/// A literal read in the value space of its datatype.
#[derive(Debug, Clone, Copy)]
enum LiteralValue<'a> {
    Decimal(Decimal),
    Double(Double),
    Boolean(Boolean),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    Duration(Duration),
    String(&'a str),
    /// Well-formed but without an order.
    Unordered,
    /// Not in the lexical space of its datatype.
    Invalid,
}

fn literal_value(literal: &Literal) -> LiteralValue<'_> {
    fn parsed<T: FromStr>(
        value: &str,
        into: impl FnOnce(T) -> LiteralValue<'static>,
    ) -> LiteralValue<'static> {
        value.parse().map_or(LiteralValue::Invalid, into)
    }
    fn checked<T: FromStr>(value: &str) -> LiteralValue<'static> {
        value
            .parse::<T>()
            .map_or(LiteralValue::Invalid, |_| LiteralValue::Unordered)
    }

    let value = literal.value();
    let datatype = literal.datatype();
    if datatype == xsd::STRING {
        LiteralValue::String(value)
    } else if INTEGER_TYPES.contains(&datatype) {
        integer_value(value, datatype)
    } else if datatype == xsd::DECIMAL {
        parsed(value, LiteralValue::Decimal)
    } else if datatype == xsd::DOUBLE {
        parsed(value, LiteralValue::Double)
    } else if datatype == xsd::FLOAT {
        parsed(value, |f: Float| LiteralValue::Double(f.into()))
    } else if datatype == xsd::BOOLEAN {
        parsed(value, LiteralValue::Boolean)
    } else if datatype == xsd::DATE_TIME || datatype == xsd::DATE_TIME_STAMP {
        match DateTime::from_str(value) {
            Ok(date_time)
                if datatype == xsd::DATE_TIME || date_time.timezone_offset().is_some() =>
            {
                LiteralValue::DateTime(date_time)
            }
            _ => LiteralValue::Invalid,
        }
    } else if datatype == xsd::DATE {
        parsed(value, LiteralValue::Date)
    } else if datatype == xsd::TIME {
        parsed(value, LiteralValue::Time)
    } else if datatype == xsd::DURATION {
        parsed(value, LiteralValue::Duration)
    } else if datatype == xsd::DAY_TIME_DURATION {
        parsed(value, |d: DayTimeDuration| LiteralValue::Duration(d.into()))
    } else if datatype == xsd::YEAR_MONTH_DURATION {
        parsed(value, |d: YearMonthDuration| LiteralValue::Duration(d.into()))
    } else if datatype == xsd::G_YEAR {
        checked::<GYear>(value)
    } else if datatype == xsd::G_YEAR_MONTH {
        checked::<GYearMonth>(value)
    } else if datatype == xsd::G_MONTH {
        checked::<GMonth>(value)
    } else if datatype == xsd::G_MONTH_DAY {
        checked::<GMonthDay>(value)
    } else if datatype == xsd::G_DAY {
        checked::<GDay>(value)
    } else {
        LiteralValue::Unordered
    }
}

/// Integers are unbounded: values out of the `Decimal` range are well-formed but unordered.
fn integer_value(value: &str, datatype: NamedNodeRef<'_>) -> LiteralValue<'static> {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return LiteralValue::Invalid;
    }
    let zero = digits.bytes().all(|b| b == b'0');
    let negative = value.starts_with('-') && !zero;
    if !integer_in_range(value, digits, negative, zero, datatype) {
        return LiteralValue::Invalid;
    }
    Decimal::from_str(value).map_or(LiteralValue::Unordered, LiteralValue::Decimal)
}

fn integer_in_range(
    value: &str,
    digits: &str,
    negative: bool,
    zero: bool,
    datatype: NamedNodeRef<'_>,
) -> bool {
    if datatype == xsd::LONG {
        value.parse::<i64>().is_ok()
    } else if datatype == xsd::INT {
        value.parse::<i32>().is_ok()
    } else if datatype == xsd::SHORT {
        value.parse::<i16>().is_ok()
    } else if datatype == xsd::BYTE {
        value.parse::<i8>().is_ok()
    } else if datatype == xsd::NON_NEGATIVE_INTEGER {
        !negative
    } else if datatype == xsd::POSITIVE_INTEGER {
        !negative && !zero
    } else if datatype == xsd::NON_POSITIVE_INTEGER {
        negative || zero
    } else if datatype == xsd::NEGATIVE_INTEGER {
        negative
    } else if datatype == xsd::UNSIGNED_LONG {
        !negative && digits.parse::<u64>().is_ok()
    } else if datatype == xsd::UNSIGNED_INT {
        !negative && digits.parse::<u32>().is_ok()
    } else if datatype == xsd::UNSIGNED_SHORT {
        !negative && digits.parse::<u16>().is_ok()
    } else if datatype == xsd::UNSIGNED_BYTE {
        !negative && digits.parse::<u8>().is_ok()
    } else {
        true
    }
}

/// Checks the lexical form of literals of the supported XSD datatypes.
fn is_well_formed(literal: &Literal) -> bool {
    !matches!(literal_value(literal), LiteralValue::Invalid)
}

/// Compares two terms in the XSD value space. `None` if they are not comparable.
fn compare_terms(a: &Term, b: &Term) -> Option<Ordering> {
    let (Term::Literal(a), Term::Literal(b)) = (a, b) else {
        return None;
    };
    match (literal_value(a), literal_value(b)) {
        (LiteralValue::Decimal(a), LiteralValue::Decimal(b)) => Some(a.cmp(&b)),
        (LiteralValue::Decimal(a), LiteralValue::Double(b)) => Double::from(a).partial_cmp(&b),
        (LiteralValue::Double(a), LiteralValue::Decimal(b)) => a.partial_cmp(&Double::from(b)),
        (LiteralValue::Double(a), LiteralValue::Double(b)) => a.partial_cmp(&b),
        (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => Some(a.cmp(&b)),
        (LiteralValue::DateTime(a), LiteralValue::DateTime(b)) => a.partial_cmp(&b),
        (LiteralValue::Date(a), LiteralValue::Date(b)) => a.partial_cmp(&b),
        (LiteralValue::Time(a), LiteralValue::Time(b)) => a.partial_cmp(&b),
        (LiteralValue::Duration(a), LiteralValue::Duration(b)) => a.partial_cmp(&b),
        (LiteralValue::String(a), LiteralValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_graph;
    use crate::report::Severity;
    use oxrdfio::RdfFormat;

    const PREFIXES: &str = "
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix ex: <http://example.org/> .
    ";

    fn turtle(data: &str) -> Graph {
        load_graph(format!("{PREFIXES}{data}").as_bytes(), RdfFormat::Turtle, None).unwrap()
    }

    fn validator(shapes: &str) -> Validator {
        Validator::from_graph(turtle(shapes)).unwrap()
    }

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn typed(value: &str, datatype: NamedNodeRef<'_>) -> Term {
        Literal::new_typed_literal(value, datatype).into()
    }

    const CREDENTIAL_SHAPE: &str = "
        ex:CredentialShape a sh:NodeShape ;
            sh:targetClass ex:EuropeanDigitalCredential ;
            sh:property [ sh:path ex:issuer ; sh:minCount 1 ; sh:datatype xsd:string ] .
    ";

    #[test]
    fn test_empty_shapes_conform() {
        let report = Validator::new(ShapesGraph::new()).validate(&turtle("ex:a ex:p ex:b ."));
        assert!(report.conforms());
        assert!(report.is_empty());
    }

    #[test]
    fn test_missing_issuer() {
        let report = validator(CREDENTIAL_SHAPE)
            .validate(&turtle("ex:cred1 a ex:EuropeanDigitalCredential ."));
        assert!(!report.conforms());
        assert_eq!(report.results().len(), 1);
        let result = &report.results()[0];
        assert_eq!(result.focus_node, ex("cred1").into());
        assert_eq!(result.source_constraint_component, ConstraintComponent::MinCount);
        assert_eq!(result.result_path, Some(PropertyPath::predicate(ex("issuer"))));
    }

    #[test]
    fn test_issuer_string_conforms() {
        let report = validator(CREDENTIAL_SHAPE).validate(&turtle(
            r#"ex:cred1 a ex:EuropeanDigitalCredential ; ex:issuer "Org A" ."#,
        ));
        assert!(report.conforms(), "{report}");
    }

    #[test]
    fn test_datatype_rejects_ill_formed_literals() {
        let validator = validator(
            "ex:S sh:targetNode ex:a ; sh:property [ sh:path ex:age ; sh:datatype xsd:integer ] .",
        );
        assert!(validator.validate(&turtle(r#"ex:a ex:age 42 ."#)).conforms());
        let report = validator.validate(&turtle(r#"ex:a ex:age "forty"^^xsd:integer ."#));
        assert_eq!(report.violation_count(), 1);
        assert!(report.results()[0]
            .message
            .as_deref()
            .is_some_and(|m| m.contains("lexical form")));
        let report = validator.validate(&turtle(r#"ex:a ex:age "42" ."#));
        assert_eq!(report.violation_count(), 1);
    }

    #[test]
    fn test_datatype_accepts_unbounded_integers() {
        let validator = validator(
            "
            ex:S sh:targetNode ex:a ;
                sh:property [ sh:path ex:serial ; sh:datatype xsd:integer ] ;
                sh:property [ sh:path ex:nonce ; sh:datatype xsd:unsignedLong ] ;
                sh:property [ sh:path ex:count ; sh:datatype xsd:positiveInteger ] .
            ",
        );
        let report = validator.validate(&turtle(
            r#"ex:a ex:serial "123456789012345678901234567890"^^xsd:integer ;
                ex:nonce "18446744073709551615"^^xsd:unsignedLong ;
                ex:count "+99999999999999999999999999"^^xsd:positiveInteger ."#,
        ));
        assert!(report.conforms(), "{report}");

        let report = validator.validate(&turtle(
            r#"ex:a ex:serial "12a"^^xsd:integer ;
                ex:nonce "18446744073709551616"^^xsd:unsignedLong ;
                ex:count "-0"^^xsd:positiveInteger ."#,
        ));
        assert_eq!(report.violation_count(), 3, "{report}");
    }

    #[test]
    fn test_bounded_integer_types() {
        let validator = validator(
            "ex:S sh:targetNode ex:a ; sh:property [ sh:path ex:level ; sh:datatype xsd:byte ] .",
        );
        assert!(
            validator
                .validate(&turtle(r#"ex:a ex:level "-128"^^xsd:byte ."#))
                .conforms()
        );
        assert_eq!(
            validator
                .validate(&turtle(r#"ex:a ex:level "128"^^xsd:byte ."#))
                .violation_count(),
            1
        );
    }

    #[test]
    fn test_huge_integers_are_not_comparable() {
        let validator = validator(
            "ex:S sh:targetNode ex:a ; sh:property [ sh:path ex:serial ; sh:minInclusive 0 ] .",
        );
        let report = validator.validate(&turtle(
            r#"ex:a ex:serial "123456789012345678901234567890"^^xsd:integer, 42 ."#,
        ));
        assert_eq!(report.violation_count(), 1, "{report}");
        assert_eq!(
            report.results()[0].source_constraint_component,
            ConstraintComponent::MinInclusive
        );
    }

    #[test]
    fn test_class_follows_three_hop_chain() {
        let validator = validator(
            "
            ex:S sh:targetNode ex:cred ; sh:property [ sh:path ex:issuer ; sh:class ex:Agent ] .
            ex:University rdfs:subClassOf ex:Organisation .
            ex:Organisation rdfs:subClassOf ex:LegalEntity .
            ex:LegalEntity rdfs:subClassOf ex:Agent .
            ",
        );
        let data = turtle("ex:cred ex:issuer ex:uni . ex:uni a ex:University .");
        for mode in [InferenceMode::None, InferenceMode::Subsumption, InferenceMode::Rdfs] {
            let validator = validator
                .clone()
                .with_options(ValidationOptions::default().with_inference(mode));
            assert!(validator.validate(&data).conforms(), "{mode}");
        }
        let report = validator.validate(&turtle("ex:cred ex:issuer ex:nobody ."));
        assert_eq!(report.violation_count(), 1);
    }

    #[test]
    fn test_rdfs_domain_adds_focus_nodes() {
        let validator = validator(
            "
            ex:S sh:targetClass ex:Credential ; sh:property [ sh:path ex:issuer ; sh:minCount 1 ] .
            ex:validFrom rdfs:domain ex:Credential .
            ",
        );
        let data = turtle(r#"ex:c ex:validFrom "2024-01-01"^^xsd:date ."#);
        assert_eq!(validator.validate(&data).violation_count(), 1);
        let none = validator
            .with_options(ValidationOptions::default().with_inference(InferenceMode::None));
        assert!(none.validate(&data).conforms());
    }

    #[test]
    fn test_not_yields_single_violation() {
        let validator = validator(
            "
            ex:S sh:targetNode ex:a, ex:b ; sh:not ex:HasName .
            ex:HasName sh:property [ sh:path ex:name ; sh:minCount 1 ] .
            ",
        );
        let report = validator.validate(&turtle(r#"ex:a ex:name "A" ."#));
        assert_eq!(report.results().len(), 1);
        assert_eq!(report.results()[0].focus_node, ex("a").into());
        assert_eq!(
            report.results()[0].source_constraint_component,
            ConstraintComponent::Not
        );
    }

    #[test]
    fn test_or_details_follow_composition_report() {
        let shapes = "
            ex:S sh:targetNode ex:a ; sh:or ( ex:HasName ex:HasLabel ) .
            ex:HasName sh:property [ sh:path ex:name ; sh:minCount 1 ] .
            ex:HasLabel sh:property [ sh:path ex:label ; sh:minCount 1 ] .
        ";
        let data = turtle("ex:a ex:p ex:b .");
        let details = |composition| {
            let report = validator(shapes)
                .with_options(ValidationOptions::default().with_composition_report(composition))
                .validate(&data);
            assert_eq!(report.results().len(), 1);
            report.results()[0].details.len()
        };
        assert_eq!(details(CompositionReport::FirstFailingBranch), 1);
        assert_eq!(details(CompositionReport::AllBranches), 2);
        assert_eq!(details(CompositionReport::Summary), 0);
        assert!(validator(shapes)
            .validate(&turtle(r#"ex:a ex:label "A" ."#))
            .conforms());
    }

    #[test]
    fn test_empty_or_never_conforms() {
        let report = validator("ex:S sh:targetNode ex:a ; sh:or () .")
            .validate(&turtle("ex:a ex:p ex:b ."));
        assert!(!report.conforms());
        assert_eq!(report.results().len(), 1);
        assert_eq!(
            report.results()[0].source_constraint_component,
            ConstraintComponent::Or
        );
        assert!(report.results()[0].details.is_empty());
    }

    #[test]
    fn test_and_and_xone() {
        let validator = validator(
            "
            ex:S sh:targetNode ex:a ; sh:and ( ex:HasName ex:HasLabel ) ; sh:xone ( ex:HasName ex:HasLabel ) .
            ex:HasName sh:property [ sh:path ex:name ; sh:minCount 1 ] .
            ex:HasLabel sh:property [ sh:path ex:label ; sh:minCount 1 ] .
            ",
        );
        let report = validator.validate(&turtle(r#"ex:a ex:name "A" ; ex:label "A" ."#));
        let components: Vec<_> = report
            .results()
            .iter()
            .map(|r| r.source_constraint_component)
            .collect();
        assert_eq!(components, vec![ConstraintComponent::Xone]);
        let report = validator.validate(&turtle(r#"ex:a ex:name "A" ."#));
        let components: Vec<_> = report
            .results()
            .iter()
            .map(|r| r.source_constraint_component)
            .collect();
        assert_eq!(components, vec![ConstraintComponent::And]);
    }

    #[test]
    fn test_cyclic_shape_references_terminate() {
        let validator = validator(
            "
            ex:Person sh:targetClass ex:Person ;
                sh:property [ sh:path ex:knows ; sh:node ex:Person ] ;
                sh:property [ sh:path ex:name ; sh:minCount 1 ] .
            ",
        );
        let data = turtle(
            r#"
            ex:alice a ex:Person ; ex:name "Alice" ; ex:knows ex:bob .
            ex:bob a ex:Person ; ex:name "Bob" ; ex:knows ex:alice .
            "#,
        );
        assert!(validator.validate(&data).conforms());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let validator = validator(CREDENTIAL_SHAPE);
        let mut data = String::new();
        for i in 0..64 {
            data.push_str(&format!("ex:cred{i} a ex:EuropeanDigitalCredential .\n"));
            if i % 3 == 0 {
                data.push_str(&format!("ex:cred{i} ex:issuer \"Org {i}\" .\n"));
            }
        }
        let data = turtle(&data);
        let sequential = validator.validate(&data);
        let parallel = validator
            .with_options(ValidationOptions::default().with_parallel(true))
            .validate(&data);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.violation_count(), 42);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = validator(CREDENTIAL_SHAPE);
        let data = turtle("ex:b a ex:EuropeanDigitalCredential . ex:a a ex:EuropeanDigitalCredential .");
        let first = validator.validate(&data);
        assert_eq!(first, validator.validate(&data));
        let focus: Vec<_> = first.results().iter().map(|r| r.focus_node.clone()).collect();
        assert_eq!(focus, vec![Term::from(ex("a")), ex("b").into()]);
    }

    #[test]
    fn test_warnings_keep_conformance() {
        let report = validator(
            "ex:S sh:targetNode ex:a ; sh:severity sh:Warning ; sh:property [ sh:path ex:name ; sh:minCount 1 ; sh:severity sh:Warning ] .",
        )
        .validate(&turtle("ex:a ex:p ex:b ."));
        assert!(report.conforms());
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.results()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_value_ranges() {
        let validator = validator(
            r#"
            ex:S sh:targetNode ex:c ;
                sh:property [ sh:path ex:validFrom ; sh:minInclusive "2020-01-01T00:00:00Z"^^xsd:dateTime ] ;
                sh:property [ sh:path ex:score ; sh:maxExclusive 10 ] .
            "#,
        );
        let report = validator.validate(&turtle(
            r#"ex:c ex:validFrom "2019-05-01T00:00:00Z"^^xsd:dateTime ; ex:score 9.5, 10.0, "high" ."#,
        ));
        let values: Vec<_> = report.results().iter().filter_map(|r| r.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                typed("2019-05-01T00:00:00Z", xsd::DATE_TIME),
                typed("10.0", xsd::DECIMAL),
                Literal::new_simple_literal("high").into(),
            ]
        );
    }

    #[test]
    fn test_string_constraints() {
        let validator = validator(
            r#"
            ex:S sh:targetNode ex:a ;
                sh:property [ sh:path ex:code ; sh:pattern "^[A-Z]{2}$" ; sh:maxLength 2 ] ;
                sh:property [ sh:path ex:title ; sh:languageIn ( "en" "fr" ) ; sh:uniqueLang true ] .
            "#,
        );
        let report = validator.validate(&turtle(
            r#"ex:a ex:code "FR", "fra" ; ex:title "Diploma"@en-GB, "Degree"@en, "Diplom"@de ."#,
        ));
        let components: Vec<_> = report
            .results()
            .iter()
            .map(|r| r.source_constraint_component)
            .collect();
        assert_eq!(
            components,
            vec![
                ConstraintComponent::Pattern,
                ConstraintComponent::MaxLength,
                ConstraintComponent::LanguageIn,
            ]
        );
        let report = validator.validate(&turtle(r#"ex:a ex:title "A"@en, "B"@EN ."#));
        assert_eq!(report.results().len(), 1);
        assert_eq!(
            report.results()[0].source_constraint_component,
            ConstraintComponent::UniqueLang
        );
    }

    #[test]
    fn test_closed_shape() {
        let validator = validator(
            "
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            ex:S sh:targetNode ex:a ; sh:closed true ; sh:ignoredProperties ( rdf:type ) ;
                sh:property [ sh:path ex:name ] .
            ",
        );
        let report = validator.validate(&turtle(r#"ex:a a ex:T ; ex:name "A" ; ex:extra 1 ."#));
        assert_eq!(report.results().len(), 1);
        assert_eq!(
            report.results()[0].result_path,
            Some(PropertyPath::predicate(ex("extra")))
        );
    }

    #[test]
    fn test_property_pairs() {
        let validator = validator(
            "ex:S sh:targetNode ex:c ; sh:property [ sh:path ex:validFrom ; sh:lessThan ex:validUntil ; sh:disjoint ex:issued ] .",
        );
        let data = turtle(
            r#"ex:c ex:validFrom "2024-01-01"^^xsd:date ; ex:validUntil "2025-01-01"^^xsd:date ."#,
        );
        assert!(validator.validate(&data).conforms());
        let data = turtle(
            r#"ex:c ex:validFrom "2026-01-01"^^xsd:date ; ex:validUntil "2025-01-01"^^xsd:date ; ex:issued "2026-01-01"^^xsd:date ."#,
        );
        let components: Vec<_> = validator
            .validate(&data)
            .results()
            .iter()
            .map(|r| r.source_constraint_component)
            .collect();
        assert_eq!(
            components,
            vec![ConstraintComponent::Disjoint, ConstraintComponent::LessThan]
        );
    }

    #[test]
    fn test_qualified_value_shape() {
        let validator = validator(
            "
            ex:S sh:targetNode ex:c ;
                sh:property [ sh:path ex:evidence ; sh:qualifiedValueShape [ sh:class ex:Document ] ; sh:qualifiedMinCount 1 ] .
            ",
        );
        assert!(validator
            .validate(&turtle("ex:c ex:evidence ex:d, ex:x . ex:d a ex:Document ."))
            .conforms());
        assert_eq!(
            validator
                .validate(&turtle("ex:c ex:evidence ex:x ."))
                .violation_count(),
            1
        );
    }

    #[test]
    fn test_deactivated_shape_is_skipped() {
        let report = validator(
            "ex:S sh:targetNode ex:a ; sh:deactivated true ; sh:property [ sh:path ex:name ; sh:minCount 1 ] .",
        )
        .validate(&turtle("ex:a ex:p ex:b ."));
        assert!(report.conforms());
    }

    #[test]
    fn test_evaluate_single_shape() {
        let validator = validator(CREDENTIAL_SHAPE);
        let results = validator.evaluate(
            &ShapeId::Named(ex("CredentialShape")),
            &turtle("ex:x ex:p ex:y ."),
            ex("x").as_ref().into(),
        );
        assert_eq!(results.len(), 1);
        assert!(validator
            .evaluate(&ShapeId::Named(ex("Unknown")), &Graph::new(), ex("x").as_ref().into())
            .is_empty());
    }

    #[test]
    fn test_shared_cache_is_reused() {
        let cache = Arc::new(ClosureCache::new());
        let validator = validator(CREDENTIAL_SHAPE).with_cache(Arc::clone(&cache));
        validator.validate(&turtle("ex:a a ex:EuropeanDigitalCredential ."));
        validator.validate(&turtle("ex:b a ex:EuropeanDigitalCredential ."));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_data_schema_statements_are_not_cached() {
        let cache = Arc::new(ClosureCache::new());
        let validator = validator(CREDENTIAL_SHAPE).with_cache(Arc::clone(&cache));
        validator.validate(&turtle("ex:a a ex:EuropeanDigitalCredential ."));
        assert_eq!(cache.len(), 1);
        for i in 0..3 {
            let report = validator.validate(&turtle(&format!(
                "ex:Diploma{i} rdfs:subClassOf ex:EuropeanDigitalCredential . ex:d a ex:Diploma{i} ."
            )));
            assert_eq!(report.violation_count(), 1, "{report}");
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_language_ranges() {
        assert!(lang_matches("en-GB", "en"));
        assert!(lang_matches("EN", "en"));
        assert!(!lang_matches("eng", "en"));
        assert!(lang_matches("de", "*"));
    }

    #[test]
    fn test_parse_composition_report() {
        assert_eq!("all".parse(), Ok(CompositionReport::AllBranches));
        assert!("everything".parse::<CompositionReport>().is_err());
    }
}
