//! SHACL shapes and their extraction from a shapes graph.
//!
//! - [`ShapeId`] identifies a shape (IRI or blank node)
//! - [`Shape`] is a node shape or a property shape with its targets and constraints
//! - [`Target`] selects focus nodes in a data graph
//! - [`ShapesGraph`] is the arena holding every shape of a shapes graph in declaration order

use crate::constraint::{Constraint, NodeKind, Pattern};
use crate::error::ShapeDefinitionError;
use crate::graph::Graph;
use crate::inference::SchemaClosure;
use crate::path::{PropertyPath, read_list};
use crate::report::Severity;
use crate::vocab::{rdf, rdfs, sh, xsd};
use oxrdf::{BlankNode, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TermRef};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::slice;
use tracing::{debug, warn};

/// Identifier of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeId {
    Named(NamedNode),
    Blank(BlankNode),
}

impl ShapeId {
    /// Returns `None` for literals, which can not identify a shape.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::NamedNode(n) => Some(Self::Named(n.clone())),
            Term::BlankNode(b) => Some(Self::Blank(b.clone())),
            Term::Literal(_) => None,
        }
    }

    pub fn to_term(&self) -> Term {
        match self {
            Self::Named(n) => n.clone().into(),
            Self::Blank(b) => b.clone().into(),
        }
    }

    pub fn as_term(&self) -> TermRef<'_> {
        match self {
            Self::Named(n) => n.as_ref().into(),
            Self::Blank(b) => b.as_ref().into(),
        }
    }

    pub fn as_named(&self) -> Option<&NamedNode> {
        match self {
            Self::Named(n) => Some(n),
            Self::Blank(_) => None,
        }
    }
}

impl From<NamedNode> for ShapeId {
    fn from(n: NamedNode) -> Self {
        Self::Named(n)
    }
}

impl From<BlankNode> for ShapeId {
    fn from(b: BlankNode) -> Self {
        Self::Blank(b)
    }
}

impl From<NamedOrBlankNode> for ShapeId {
    fn from(node: NamedOrBlankNode) -> Self {
        match node {
            NamedOrBlankNode::NamedNode(n) => Self::Named(n),
            NamedOrBlankNode::BlankNode(b) => Self::Blank(b),
        }
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(n) => write!(f, "{n}"),
            Self::Blank(b) => write!(f, "{b}"),
        }
    }
}

/// Target declaration selecting focus nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// sh:targetClass, instances of subclasses included.
    Class(NamedNode),
    /// sh:targetNode
    Node(Term),
    /// sh:targetSubjectsOf
    SubjectsOf(NamedNode),
    /// sh:targetObjectsOf
    ObjectsOf(NamedNode),
    /// The shape is also an `rdfs:Class`.
    Implicit(NamedNode),
}

impl Target {
    /// Appends the focus nodes selected in `graph`. Duplicates are left to the caller.
    pub fn find_focus_nodes(&self, graph: &Graph, closure: &SchemaClosure, out: &mut Vec<Term>) {
        match self {
            Self::Class(class) | Self::Implicit(class) => {
                for class in closure.subclasses(class.as_ref().into()) {
                    out.extend(
                        graph
                            .subjects_for_predicate_object(rdf::TYPE, class.as_ref())
                            .map(|s| s.clone().into()),
                    );
                }
            }
            Self::Node(node) => out.push(node.clone()),
            Self::SubjectsOf(predicate) => out.extend(
                graph
                    .triples_for_predicate(predicate.as_ref())
                    .map(|t| t.subject.clone().into()),
            ),
            Self::ObjectsOf(predicate) => out.extend(
                graph
                    .triples_for_predicate(predicate.as_ref())
                    .map(|t| t.object.clone()),
            ),
        }
    }
}

/// Whether a shape validates focus nodes or the values reached through a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    Node,
    Property(PropertyPath),
}

/// A node shape or a property shape.
#[derive(Debug, Clone)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub targets: Vec<Target>,
    /// Sorted by component, values of one component in shapes graph order.
    pub constraints: Vec<Constraint>,
    /// Property shapes attached with `sh:property`.
    pub property_shapes: Vec<ShapeId>,
    pub severity: Severity,
    pub deactivated: bool,
    pub name: Option<String>,
    pub message: Option<String>,
}

impl Shape {
    pub fn new(id: ShapeId, kind: ShapeKind) -> Self {
        Self {
            id,
            kind,
            targets: Vec::new(),
            constraints: Vec::new(),
            property_shapes: Vec::new(),
            severity: Severity::Violation,
            deactivated: false,
            name: None,
            message: None,
        }
    }

    pub fn path(&self) -> Option<&PropertyPath> {
        match &self.kind {
            ShapeKind::Node => None,
            ShapeKind::Property(path) => Some(path),
        }
    }

    pub fn is_property_shape(&self) -> bool {
        matches!(self.kind, ShapeKind::Property(_))
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// Arena of all the shapes of a shapes graph.
///
/// Shapes are kept in declaration order, the order in which they first appear in the
/// shapes graph. References between shapes are plain [`ShapeId`]s resolved by lookup,
/// so cyclic references are representable.
#[derive(Debug, Clone, Default)]
pub struct ShapesGraph {
    shapes: Vec<Shape>,
    index: FxHashMap<ShapeId, usize>,
}

impl ShapesGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts every shape of an RDF graph.
    pub fn from_graph(graph: &Graph) -> Result<Self, ShapeDefinitionError> {
        let mut shapes = Self::new();
        for id in discover_shapes(graph)? {
            if graph.triples_for_subject(id.as_term()).next().is_none() {
                warn!(shape = %id, "Referenced shape is not defined, it is treated as an empty shape");
            }
            let shape = parse_shape(graph, id)?;
            shapes.add(shape);
        }
        for shape in &shapes.shapes {
            for property in &shape.property_shapes {
                if shapes.get(property).is_some_and(|p| !p.is_property_shape()) {
                    return Err(ShapeDefinitionError::missing_property(
                        property.to_term(),
                        sh::PATH,
                    ));
                }
            }
        }
        debug!(
            shapes = shapes.len(),
            targeted = shapes.iter().filter(|s| s.has_targets()).count(),
            "Loaded shapes graph"
        );
        Ok(shapes)
    }

    /// Adds a shape, replacing any previous shape with the same id in place.
    pub fn add(&mut self, shape: Shape) {
        if let Some(position) = self.index.get(&shape.id) {
            if let Some(slot) = self.shapes.get_mut(*position) {
                *slot = shape;
            }
        } else {
            self.index.insert(shape.id.clone(), self.shapes.len());
            self.shapes.push(shape);
        }
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(*self.index.get(id)?)
    }

    /// Iterates over the shapes in declaration order.
    pub fn iter(&self) -> slice::Iter<'_, Shape> {
        self.shapes.iter()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ShapesGraph {
    type Item = &'a Shape;
    type IntoIter = slice::Iter<'a, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

const TARGET_PREDICATES: [NamedNodeRef<'static>; 4] = [
    sh::TARGET_CLASS,
    sh::TARGET_NODE,
    sh::TARGET_SUBJECTS_OF,
    sh::TARGET_OBJECTS_OF,
];

/// Predicates whose subject is a shape.
const SHAPE_PARAMETERS: [NamedNodeRef<'static>; 35] = [
    sh::TARGET_CLASS,
    sh::TARGET_NODE,
    sh::TARGET_SUBJECTS_OF,
    sh::TARGET_OBJECTS_OF,
    sh::PROPERTY,
    sh::PATH,
    sh::SEVERITY,
    sh::DEACTIVATED,
    sh::MIN_COUNT,
    sh::MAX_COUNT,
    sh::DATATYPE,
    sh::NODE_KIND,
    sh::PATTERN,
    sh::IN,
    sh::CLASS,
    sh::AND,
    sh::OR,
    sh::NOT,
    sh::MIN_INCLUSIVE,
    sh::MAX_INCLUSIVE,
    sh::MIN_EXCLUSIVE,
    sh::MAX_EXCLUSIVE,
    sh::MIN_LENGTH,
    sh::MAX_LENGTH,
    sh::LANGUAGE_IN,
    sh::UNIQUE_LANG,
    sh::HAS_VALUE,
    sh::NODE,
    sh::XONE,
    sh::QUALIFIED_VALUE_SHAPE,
    sh::CLOSED,
    sh::EQUALS,
    sh::DISJOINT,
    sh::LESS_THAN,
    sh::LESS_THAN_OR_EQUALS,
];

/// Predicates whose object is a shape.
const SHAPE_REFERENCES: [NamedNodeRef<'static>; 4] =
    [sh::PROPERTY, sh::NODE, sh::NOT, sh::QUALIFIED_VALUE_SHAPE];

/// Predicates whose object is a list of shapes.
const SHAPE_LIST_REFERENCES: [NamedNodeRef<'static>; 3] = [sh::AND, sh::OR, sh::XONE];

/// Lists the shapes of the graph in order of first appearance.
fn discover_shapes(graph: &Graph) -> Result<Vec<ShapeId>, ShapeDefinitionError> {
    let mut found = Vec::new();
    let mut seen = FxHashSet::default();
    let mut register = |id: ShapeId| {
        if seen.insert(id.clone()) {
            found.push(id);
        }
    };
    for triple in graph {
        let predicate = triple.predicate.as_ref();
        let declares_shape = predicate == rdf::TYPE
            && [sh::NODE_SHAPE, sh::PROPERTY_SHAPE, sh::SHAPE]
                .iter()
                .any(|class| triple.object.as_ref() == TermRef::from(*class));
        if declares_shape || SHAPE_PARAMETERS.contains(&predicate) {
            register(triple.subject.clone().into());
        }
        if SHAPE_REFERENCES.contains(&predicate) {
            let subject = Term::from(triple.subject.clone());
            register(shape_reference(&subject, predicate, &triple.object)?);
        }
        if SHAPE_LIST_REFERENCES.contains(&predicate) {
            let subject = Term::from(triple.subject.clone());
            for member in read_list(graph, triple.object.as_ref(), subject.as_ref())? {
                register(shape_reference(&subject, predicate, &member)?);
            }
        }
    }
    Ok(found)
}

fn shape_reference(
    shape: &Term,
    predicate: NamedNodeRef<'_>,
    value: &Term,
) -> Result<ShapeId, ShapeDefinitionError> {
    ShapeId::from_term(value).ok_or_else(|| {
        ShapeDefinitionError::invalid_property_value(
            shape.clone(),
            predicate,
            "an IRI or a blank node",
            value.clone(),
        )
    })
}

fn parse_shape(graph: &Graph, id: ShapeId) -> Result<Shape, ShapeDefinitionError> {
    let term = id.to_term();
    let params = Parameters {
        graph,
        shape: &term,
    };
    let kind = if let Some(path) = params.first(sh::PATH) {
        ShapeKind::Property(PropertyPath::parse(graph, path.as_ref(), term.as_ref())?)
    } else if params.has_type(sh::PROPERTY_SHAPE) {
        return Err(ShapeDefinitionError::missing_property(term, sh::PATH));
    } else {
        ShapeKind::Node
    };
    let mut shape = Shape::new(id, kind);
    parse_targets(&params, &mut shape)?;
    parse_constraints(&params, &mut shape)?;
    parse_metadata(&params, &mut shape)?;
    Ok(shape)
}

fn parse_targets(params: &Parameters<'_>, shape: &mut Shape) -> Result<(), ShapeDefinitionError> {
    for predicate in TARGET_PREDICATES {
        for value in params.values(predicate) {
            let target = if predicate == sh::TARGET_NODE {
                Target::Node(value.clone())
            } else {
                let iri = params.expect_iri(predicate, value)?;
                match predicate {
                    p if p == sh::TARGET_CLASS => Target::Class(iri),
                    p if p == sh::TARGET_SUBJECTS_OF => Target::SubjectsOf(iri),
                    _ => Target::ObjectsOf(iri),
                }
            };
            shape.targets.push(target);
        }
    }
    // Implicit class target
    if let ShapeId::Named(class) = &shape.id {
        let is_shape = [sh::NODE_SHAPE, sh::PROPERTY_SHAPE, sh::SHAPE]
            .into_iter()
            .any(|t| params.has_type(t));
        if is_shape && params.has_type(rdfs::CLASS) {
            shape.targets.push(Target::Implicit(class.clone()));
        }
    }
    Ok(())
}

fn parse_constraints(
    params: &Parameters<'_>,
    shape: &mut Shape,
) -> Result<(), ShapeDefinitionError> {
    let constraints = &mut shape.constraints;

    // sh:minCount
    for count in params.counts(sh::MIN_COUNT)? {
        constraints.push(Constraint::MinCount(count));
    }

    // sh:maxCount
    for count in params.counts(sh::MAX_COUNT)? {
        constraints.push(Constraint::MaxCount(count));
    }

    // sh:datatype
    for datatype in params.iris(sh::DATATYPE)? {
        constraints.push(Constraint::Datatype(datatype));
    }

    // sh:nodeKind
    for value in params.values(sh::NODE_KIND) {
        let kind = match value {
            Term::NamedNode(iri) => NodeKind::from_iri(iri.as_ref()),
            _ => None,
        }
        .ok_or_else(|| {
            ShapeDefinitionError::invalid_property_value(
                params.shape.clone(),
                sh::NODE_KIND,
                "one of the six SHACL node kinds",
                value.clone(),
            )
        })?;
        constraints.push(Constraint::NodeKind(kind));
    }

    // sh:pattern
    let flags = params.strings(sh::FLAGS)?.into_iter().next();
    for source in params.strings(sh::PATTERN)? {
        let pattern = Pattern::new(source.clone(), flags.clone()).map_err(|message| {
            ShapeDefinitionError::invalid_regex(params.shape.clone(), source, message)
        })?;
        constraints.push(Constraint::Pattern(pattern));
    }

    // sh:in
    for head in params.values(sh::IN) {
        constraints.push(Constraint::In(params.list(head)?));
    }

    // sh:class
    for class in params.iris(sh::CLASS)? {
        constraints.push(Constraint::Class(class));
    }

    // sh:and, sh:or
    for head in params.values(sh::AND) {
        constraints.push(Constraint::And(params.shape_list(sh::AND, head)?));
    }
    for head in params.values(sh::OR) {
        constraints.push(Constraint::Or(params.shape_list(sh::OR, head)?));
    }

    // sh:not
    for value in params.values(sh::NOT) {
        constraints.push(Constraint::Not(shape_reference(
            params.shape,
            sh::NOT,
            value,
        )?));
    }

    // Value ranges
    let ranges: [(NamedNodeRef<'_>, fn(Literal) -> Constraint); 4] = [
        (sh::MIN_INCLUSIVE, Constraint::MinInclusive),
        (sh::MAX_INCLUSIVE, Constraint::MaxInclusive),
        (sh::MIN_EXCLUSIVE, Constraint::MinExclusive),
        (sh::MAX_EXCLUSIVE, Constraint::MaxExclusive),
    ];
    for (predicate, build) in ranges {
        for literal in params.literals(predicate)? {
            constraints.push(build(literal));
        }
    }

    // sh:minLength, sh:maxLength
    for length in params.counts(sh::MIN_LENGTH)? {
        constraints.push(Constraint::MinLength(length));
    }
    for length in params.counts(sh::MAX_LENGTH)? {
        constraints.push(Constraint::MaxLength(length));
    }

    // sh:languageIn
    for head in params.values(sh::LANGUAGE_IN) {
        let languages = params
            .list(head)?
            .into_iter()
            .map(|tag| match tag {
                Term::Literal(tag) => Ok(tag.value().to_owned()),
                other => Err(ShapeDefinitionError::invalid_property_value(
                    params.shape.clone(),
                    sh::LANGUAGE_IN,
                    "a list of language tag literals",
                    other,
                )),
            })
            .collect::<Result<_, _>>()?;
        constraints.push(Constraint::LanguageIn(languages));
    }

    // sh:uniqueLang
    if params.boolean(sh::UNIQUE_LANG)? == Some(true) {
        constraints.push(Constraint::UniqueLang);
    }

    // sh:hasValue
    for value in params.values(sh::HAS_VALUE) {
        constraints.push(Constraint::HasValue(value.clone()));
    }

    // sh:node
    for value in params.values(sh::NODE) {
        constraints.push(Constraint::Node(shape_reference(
            params.shape,
            sh::NODE,
            value,
        )?));
    }

    // sh:xone
    for head in params.values(sh::XONE) {
        constraints.push(Constraint::Xone(params.shape_list(sh::XONE, head)?));
    }

    // sh:qualifiedValueShape
    let qualified_min = params.counts(sh::QUALIFIED_MIN_COUNT)?.into_iter().next();
    let qualified_max = params.counts(sh::QUALIFIED_MAX_COUNT)?.into_iter().next();
    for value in params.values(sh::QUALIFIED_VALUE_SHAPE) {
        constraints.push(Constraint::QualifiedValueShape {
            shape: shape_reference(params.shape, sh::QUALIFIED_VALUE_SHAPE, value)?,
            min_count: qualified_min,
            max_count: qualified_max,
        });
    }

    // sh:closed
    if params.boolean(sh::CLOSED)? == Some(true) {
        let mut ignored_properties = Vec::new();
        for head in params.values(sh::IGNORED_PROPERTIES) {
            for property in params.list(head)? {
                ignored_properties.push(params.expect_iri(sh::IGNORED_PROPERTIES, &property)?);
            }
        }
        constraints.push(Constraint::Closed { ignored_properties });
    }

    // Property pairs
    let pairs: [(NamedNodeRef<'_>, fn(NamedNode) -> Constraint); 4] = [
        (sh::EQUALS, Constraint::Equals),
        (sh::DISJOINT, Constraint::Disjoint),
        (sh::LESS_THAN, Constraint::LessThan),
        (sh::LESS_THAN_OR_EQUALS, Constraint::LessThanOrEquals),
    ];
    for (predicate, build) in pairs {
        for property in params.iris(predicate)? {
            constraints.push(build(property));
        }
    }

    constraints.sort_by_key(Constraint::component);

    // sh:property
    for value in params.values(sh::PROPERTY) {
        shape
            .property_shapes
            .push(shape_reference(params.shape, sh::PROPERTY, value)?);
    }
    Ok(())
}

fn parse_metadata(params: &Parameters<'_>, shape: &mut Shape) -> Result<(), ShapeDefinitionError> {
    shape.deactivated = params.boolean(sh::DEACTIVATED)?.unwrap_or(false);

    if let Some(severity) = params.first(sh::SEVERITY) {
        shape.severity = match severity {
            Term::NamedNode(iri) => Severity::from_iri(iri.as_ref()),
            _ => None,
        }
        .ok_or_else(|| {
            ShapeDefinitionError::invalid_property_value(
                params.shape.clone(),
                sh::SEVERITY,
                "sh:Violation, sh:Warning or sh:Info",
                severity.clone(),
            )
        })?;
    }

    shape.name = params.strings(sh::NAME)?.into_iter().next();
    shape.message = params.strings(sh::MESSAGE)?.into_iter().next();
    Ok(())
}

/// Typed access to the parameters of one shape.
struct Parameters<'a> {
    graph: &'a Graph,
    shape: &'a Term,
}

impl<'a> Parameters<'a> {
    fn values(&self, predicate: NamedNodeRef<'_>) -> impl Iterator<Item = &'a Term> + use<'a> {
        self.graph
            .objects_for_subject_predicate(self.shape.as_ref(), predicate)
    }

    fn first(&self, predicate: NamedNodeRef<'_>) -> Option<&'a Term> {
        self.values(predicate).next()
    }

    fn has_type(&self, class: NamedNodeRef<'_>) -> bool {
        self.values(rdf::TYPE)
            .any(|t| t.as_ref() == TermRef::from(class))
    }

    fn invalid(&self, predicate: NamedNodeRef<'_>, expected: &str, actual: &Term) -> ShapeDefinitionError {
        ShapeDefinitionError::invalid_property_value(
            self.shape.clone(),
            predicate,
            expected,
            actual.clone(),
        )
    }

    fn expect_iri(
        &self,
        predicate: NamedNodeRef<'_>,
        value: &Term,
    ) -> Result<NamedNode, ShapeDefinitionError> {
        match value {
            Term::NamedNode(iri) => Ok(iri.clone()),
            _ => Err(self.invalid(predicate, "an IRI", value)),
        }
    }

    fn iris(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<NamedNode>, ShapeDefinitionError> {
        self.values(predicate)
            .map(|value| self.expect_iri(predicate, value))
            .collect()
    }

    fn literals(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<Literal>, ShapeDefinitionError> {
        self.values(predicate)
            .map(|value| match value {
                Term::Literal(literal) => Ok(literal.clone()),
                _ => Err(self.invalid(predicate, "a literal", value)),
            })
            .collect()
    }

    fn strings(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<String>, ShapeDefinitionError> {
        Ok(self
            .literals(predicate)?
            .iter()
            .map(|literal| literal.value().to_owned())
            .collect())
    }

    /// Non-negative integers.
    fn counts(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<usize>, ShapeDefinitionError> {
        self.values(predicate)
            .map(|value| match value {
                Term::Literal(literal)
                    if literal.language().is_none()
                        && literal.datatype() != xsd::BOOLEAN =>
                {
                    literal
                        .value()
                        .trim()
                        .trim_start_matches('+')
                        .parse::<usize>()
                        .map_err(|_| self.invalid(predicate, "a non-negative integer", value))
                }
                _ => Err(self.invalid(predicate, "a non-negative integer", value)),
            })
            .collect()
    }

    fn boolean(&self, predicate: NamedNodeRef<'_>) -> Result<Option<bool>, ShapeDefinitionError> {
        let Some(value) = self.first(predicate) else {
            return Ok(None);
        };
        match value {
            Term::Literal(literal) => match literal.value() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(self.invalid(predicate, "a boolean", value)),
            },
            _ => Err(self.invalid(predicate, "a boolean", value)),
        }
    }

    fn list(&self, head: &Term) -> Result<Vec<Term>, ShapeDefinitionError> {
        read_list(self.graph, head.as_ref(), self.shape.as_ref())
    }

    fn shape_list(
        &self,
        predicate: NamedNodeRef<'_>,
        head: &Term,
    ) -> Result<Vec<ShapeId>, ShapeDefinitionError> {
        self.list(head)?
            .iter()
            .map(|member| shape_reference(self.shape, predicate, member))
            .collect()
    }
}
