//! SHACL [property paths](https://www.w3.org/TR/shacl/#property-paths).

use crate::error::ShapeDefinitionError;
use crate::graph::Graph;
use crate::vocab::{rdf, sh};
use oxrdf::{BlankNode, NamedNode, NamedNodeRef, Term, TermRef, Triple};
use rustc_hash::FxHashSet;
use std::fmt;

/// A property path leading from a focus node to its value nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    /// An IRI.
    Predicate(NamedNode),
    /// An RDF list of at least two paths, followed one after the other.
    Sequence(Vec<PropertyPath>),
    /// `sh:alternativePath`
    Alternative(Vec<PropertyPath>),
    /// `sh:inversePath`
    Inverse(Box<PropertyPath>),
    /// `sh:zeroOrMorePath`
    ZeroOrMore(Box<PropertyPath>),
    /// `sh:oneOrMorePath`
    OneOrMore(Box<PropertyPath>),
    /// `sh:zeroOrOnePath`
    ZeroOrOne(Box<PropertyPath>),
}

impl PropertyPath {
    pub fn predicate(predicate: impl Into<NamedNode>) -> Self {
        Self::Predicate(predicate.into())
    }

    pub fn inverse(path: Self) -> Self {
        Self::Inverse(Box::new(path))
    }

    pub fn zero_or_more(path: Self) -> Self {
        Self::ZeroOrMore(Box::new(path))
    }

    pub fn one_or_more(path: Self) -> Self {
        Self::OneOrMore(Box::new(path))
    }

    pub fn zero_or_one(path: Self) -> Self {
        Self::ZeroOrOne(Box::new(path))
    }

    /// Reads the path rooted at `term` in a shapes graph.
    ///
    /// `shape` is only used to point at the faulty shape in errors.
    pub fn parse(
        graph: &Graph,
        term: TermRef<'_>,
        shape: TermRef<'_>,
    ) -> Result<Self, ShapeDefinitionError> {
        Self::parse_with_guard(graph, term, shape, &mut FxHashSet::default())
    }

    fn parse_with_guard(
        graph: &Graph,
        term: TermRef<'_>,
        shape: TermRef<'_>,
        in_progress: &mut FxHashSet<Term>,
    ) -> Result<Self, ShapeDefinitionError> {
        let node = match term {
            TermRef::NamedNode(node) => return Ok(Self::Predicate(node.into_owned())),
            TermRef::BlankNode(_) => term,
            TermRef::Literal(_) => {
                return Err(ShapeDefinitionError::invalid_property_path(
                    shape.into_owned(),
                    format!("{term} is a literal, a path must be an IRI or a blank node"),
                ));
            }
        };
        if !in_progress.insert(node.into_owned()) {
            return Err(ShapeDefinitionError::invalid_property_path(
                shape.into_owned(),
                format!("the path {node} contains itself"),
            ));
        }

        let unary = |predicate: NamedNodeRef<'_>| graph.object_for_subject_predicate(node, predicate);
        let path = if let Some(list) = unary(sh::ALTERNATIVE_PATH) {
            let members = Self::parse_list(graph, list.as_ref(), shape, in_progress)?;
            if members.len() < 2 {
                return Err(ShapeDefinitionError::invalid_property_path(
                    shape.into_owned(),
                    "sh:alternativePath needs at least two members",
                ));
            }
            Self::Alternative(members)
        } else if let Some(inner) = unary(sh::INVERSE_PATH) {
            Self::inverse(Self::parse_with_guard(graph, inner.as_ref(), shape, in_progress)?)
        } else if let Some(inner) = unary(sh::ZERO_OR_MORE_PATH) {
            Self::zero_or_more(Self::parse_with_guard(graph, inner.as_ref(), shape, in_progress)?)
        } else if let Some(inner) = unary(sh::ONE_OR_MORE_PATH) {
            Self::one_or_more(Self::parse_with_guard(graph, inner.as_ref(), shape, in_progress)?)
        } else if let Some(inner) = unary(sh::ZERO_OR_ONE_PATH) {
            Self::zero_or_one(Self::parse_with_guard(graph, inner.as_ref(), shape, in_progress)?)
        } else if unary(rdf::FIRST).is_some() {
            let members = Self::parse_list(graph, node, shape, in_progress)?;
            if members.len() < 2 {
                return Err(ShapeDefinitionError::invalid_property_path(
                    shape.into_owned(),
                    "a sequence path needs at least two members",
                ));
            }
            Self::Sequence(members)
        } else {
            return Err(ShapeDefinitionError::invalid_property_path(
                shape.into_owned(),
                format!("{node} is not a known kind of path"),
            ));
        };
        in_progress.remove(&node.into_owned());
        Ok(path)
    }

    fn parse_list(
        graph: &Graph,
        head: TermRef<'_>,
        shape: TermRef<'_>,
        in_progress: &mut FxHashSet<Term>,
    ) -> Result<Vec<Self>, ShapeDefinitionError> {
        read_list(graph, head, shape)?
            .iter()
            .map(|member| Self::parse_with_guard(graph, member.as_ref(), shape, in_progress))
            .collect()
    }

    /// Returns the distinct value nodes reached from `focus` in discovery order.
    ///
    /// Terminates on cyclic data: repetition operators never revisit a node.
    pub fn evaluate(&self, graph: &Graph, focus: TermRef<'_>) -> Vec<Term> {
        let mut values = Vec::new();
        let mut seen = FxHashSet::default();
        self.evaluate_into(graph, focus, &mut |value: Term| {
            if seen.insert(value.clone()) {
                values.push(value);
            }
        });
        values
    }

    fn evaluate_into(&self, graph: &Graph, focus: TermRef<'_>, emit: &mut dyn FnMut(Term)) {
        match self {
            Self::Predicate(predicate) => {
                for value in graph.objects_for_subject_predicate(focus, predicate.as_ref()) {
                    emit(value.clone());
                }
            }
            Self::Inverse(inner) => match inner.as_ref() {
                Self::Predicate(predicate) => {
                    for subject in graph.subjects_for_predicate_object(predicate.as_ref(), focus) {
                        emit(subject.clone().into());
                    }
                }
                inner => {
                    // Walk back from every subject of the graph
                    for subject in graph.subjects() {
                        if inner.evaluate(graph, subject.as_ref()).iter().any(|v| v.as_ref() == focus) {
                            emit(subject.clone());
                        }
                    }
                }
            },
            Self::Sequence(steps) => {
                let mut current = vec![focus.into_owned()];
                for step in steps {
                    let mut next = Vec::new();
                    let mut seen = FxHashSet::default();
                    for node in &current {
                        step.evaluate_into(graph, node.as_ref(), &mut |value: Term| {
                            if seen.insert(value.clone()) {
                                next.push(value);
                            }
                        });
                    }
                    current = next;
                }
                for value in current {
                    emit(value);
                }
            }
            Self::Alternative(members) => {
                for member in members {
                    member.evaluate_into(graph, focus, emit);
                }
            }
            Self::ZeroOrMore(inner) => {
                emit(focus.into_owned());
                inner.reachable(graph, focus, emit);
            }
            Self::OneOrMore(inner) => inner.reachable(graph, focus, emit),
            Self::ZeroOrOne(inner) => {
                emit(focus.into_owned());
                inner.evaluate_into(graph, focus, emit);
            }
        }
    }

    /// Breadth-first walk over one or more repetitions of `self`.
    fn reachable(&self, graph: &Graph, focus: TermRef<'_>, emit: &mut dyn FnMut(Term)) {
        let mut visited = FxHashSet::default();
        let mut frontier = vec![focus.into_owned()];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in &frontier {
                self.evaluate_into(graph, node.as_ref(), &mut |value: Term| {
                    if visited.insert(value.clone()) {
                        next.push(value);
                    }
                });
            }
            for value in &next {
                emit(value.clone());
            }
            frontier = next;
        }
    }

    /// Writes the SHACL form of the path into `graph` and returns its root node.
    ///
    /// Blank nodes of the path are labelled from `label`.
    pub fn to_graph(&self, graph: &mut Graph, label: &str) -> Term {
        let (predicate, inner) = match self {
            Self::Predicate(p) => return p.clone().into(),
            Self::Sequence(paths) => return write_list(graph, paths, label),
            Self::Alternative(paths) => {
                let root = BlankNode::new_unchecked(label);
                let list = write_list(graph, paths, &format!("{label}_alt"));
                graph.add_triple(Triple::new(root.clone(), sh::ALTERNATIVE_PATH, list));
                return root.into();
            }
            Self::Inverse(inner) => (sh::INVERSE_PATH, inner),
            Self::ZeroOrMore(inner) => (sh::ZERO_OR_MORE_PATH, inner),
            Self::OneOrMore(inner) => (sh::ONE_OR_MORE_PATH, inner),
            Self::ZeroOrOne(inner) => (sh::ZERO_OR_ONE_PATH, inner),
        };
        let root = BlankNode::new_unchecked(label);
        let inner = inner.to_graph(graph, &format!("{label}_in"));
        graph.add_triple(Triple::new(root.clone(), predicate, inner));
        root.into()
    }

    pub fn as_predicate(&self) -> Option<&NamedNode> {
        match self {
            Self::Predicate(p) => Some(p),
            _ => None,
        }
    }
}

impl From<NamedNode> for PropertyPath {
    fn from(predicate: NamedNode) -> Self {
        Self::Predicate(predicate)
    }
}

/// SPARQL property path syntax.
impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(p) => write!(f, "{p}"),
            Self::Sequence(paths) => write_joined(f, paths, " / "),
            Self::Alternative(paths) => write_joined(f, paths, " | "),
            Self::Inverse(p) => write!(f, "^{p}"),
            Self::ZeroOrMore(p) => write!(f, "{p}*"),
            Self::OneOrMore(p) => write!(f, "{p}+"),
            Self::ZeroOrOne(p) => write!(f, "{p}?"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, paths: &[PropertyPath], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{path}")?;
    }
    f.write_str(")")
}

fn write_list(graph: &mut Graph, members: &[PropertyPath], label: &str) -> Term {
    let mut head = Term::from(rdf::NIL.into_owned());
    for (i, member) in members.iter().enumerate().rev() {
        let cell = BlankNode::new_unchecked(format!("{label}_{i}"));
        let value = member.to_graph(graph, &format!("{label}_{i}v"));
        graph.add_triple(Triple::new(cell.clone(), rdf::FIRST, value));
        graph.add_triple(Triple::new(cell.clone(), rdf::REST, head));
        head = cell.into();
    }
    head
}

/// Reads the members of a well-formed RDF list.
pub(crate) fn read_list(
    graph: &Graph,
    head: TermRef<'_>,
    shape: TermRef<'_>,
) -> Result<Vec<Term>, ShapeDefinitionError> {
    let mut members = Vec::new();
    let mut visited = FxHashSet::default();
    let mut current = head.into_owned();
    loop {
        if current.as_ref() == TermRef::from(rdf::NIL) {
            return Ok(members);
        }
        if current.is_literal() {
            return Err(ShapeDefinitionError::invalid_rdf_list(
                shape.into_owned(),
                format!("{current} can not be a list node"),
            ));
        }
        if !visited.insert(current.clone()) {
            return Err(ShapeDefinitionError::invalid_rdf_list(
                shape.into_owned(),
                format!("the list loops back to {current}"),
            ));
        }
        let first = graph
            .object_for_subject_predicate(current.as_ref(), rdf::FIRST)
            .ok_or_else(|| {
                ShapeDefinitionError::invalid_rdf_list(
                    shape.into_owned(),
                    format!("{current} has no rdf:first"),
                )
            })?;
        members.push(first.clone());
        current = graph
            .object_for_subject_predicate(current.as_ref(), rdf::REST)
            .ok_or_else(|| {
                ShapeDefinitionError::invalid_rdf_list(
                    shape.into_owned(),
                    format!("{current} has no rdf:rest"),
                )
            })?
            .clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn chain() -> Graph {
        // a -p-> b -p-> c -p-> a, b -q-> d
        let mut graph = Graph::new();
        graph.add_triple(Triple::new(ex("a"), ex("p"), ex("b")));
        graph.add_triple(Triple::new(ex("b"), ex("p"), ex("c")));
        graph.add_triple(Triple::new(ex("c"), ex("p"), ex("a")));
        graph.add_triple(Triple::new(ex("b"), ex("q"), ex("d")));
        graph
    }

    #[test]
    fn test_predicate_path() {
        let graph = chain();
        let values = PropertyPath::predicate(ex("p")).evaluate(&graph, ex("a").as_ref().into());
        assert_eq!(values, vec![Term::from(ex("b"))]);
    }

    #[test]
    fn test_inverse_path() {
        let graph = chain();
        let values = PropertyPath::inverse(PropertyPath::predicate(ex("q")))
            .evaluate(&graph, ex("d").as_ref().into());
        assert_eq!(values, vec![Term::from(ex("b"))]);
    }

    #[test]
    fn test_inverse_of_sequence() {
        let graph = chain();
        let path = PropertyPath::inverse(PropertyPath::Sequence(vec![
            PropertyPath::predicate(ex("p")),
            PropertyPath::predicate(ex("q")),
        ]));
        assert_eq!(
            path.evaluate(&graph, ex("d").as_ref().into()),
            vec![Term::from(ex("a"))]
        );
    }

    #[test]
    fn test_sequence_and_alternative() {
        let graph = chain();
        let sequence = PropertyPath::Sequence(vec![
            PropertyPath::predicate(ex("p")),
            PropertyPath::predicate(ex("q")),
        ]);
        assert_eq!(
            sequence.evaluate(&graph, ex("a").as_ref().into()),
            vec![Term::from(ex("d"))]
        );
        let alternative = PropertyPath::Alternative(vec![
            PropertyPath::predicate(ex("p")),
            PropertyPath::predicate(ex("q")),
        ]);
        assert_eq!(
            alternative.evaluate(&graph, ex("b").as_ref().into()),
            vec![Term::from(ex("c")), Term::from(ex("d"))]
        );
    }

    #[test]
    fn test_repetitions_terminate_on_cycles() {
        let graph = chain();
        let a = ex("a");
        let zero_or_more = PropertyPath::zero_or_more(PropertyPath::predicate(ex("p")));
        assert_eq!(
            zero_or_more.evaluate(&graph, a.as_ref().into()),
            vec![Term::from(ex("a")), ex("b").into(), ex("c").into()]
        );
        let one_or_more = PropertyPath::one_or_more(PropertyPath::predicate(ex("p")));
        assert_eq!(
            one_or_more.evaluate(&graph, a.as_ref().into()),
            vec![Term::from(ex("b")), ex("c").into(), ex("a").into()]
        );
        let zero_or_one = PropertyPath::zero_or_one(PropertyPath::predicate(ex("p")));
        assert_eq!(
            zero_or_one.evaluate(&graph, a.as_ref().into()),
            vec![Term::from(ex("a")), ex("b").into()]
        );
    }

    #[test]
    fn test_parse_complex_path() {
        let mut shapes = Graph::new();
        let shape = BlankNode::default();
        let path = BlankNode::default();
        let list = BlankNode::default();
        let rest = BlankNode::default();
        let inverse = BlankNode::default();
        shapes.add_triple(Triple::new(path.clone(), sh::ALTERNATIVE_PATH, list.clone()));
        shapes.add_triple(Triple::new(list.clone(), rdf::FIRST, ex("p")));
        shapes.add_triple(Triple::new(list, rdf::REST, rest.clone()));
        shapes.add_triple(Triple::new(rest.clone(), rdf::FIRST, inverse.clone()));
        shapes.add_triple(Triple::new(rest, rdf::REST, rdf::NIL));
        shapes.add_triple(Triple::new(inverse, sh::INVERSE_PATH, ex("q")));

        let parsed = PropertyPath::parse(&shapes, path.as_ref().into(), shape.as_ref().into())
            .unwrap();
        assert_eq!(
            parsed,
            PropertyPath::Alternative(vec![
                PropertyPath::predicate(ex("p")),
                PropertyPath::inverse(PropertyPath::predicate(ex("q"))),
            ])
        );
        assert_eq!(
            parsed.to_string(),
            "(<http://example.org/p> | ^<http://example.org/q>)"
        );
    }

    #[test]
    fn test_written_path_parses_back() {
        let path = PropertyPath::Sequence(vec![
            PropertyPath::predicate(ex("p")),
            PropertyPath::Alternative(vec![
                PropertyPath::zero_or_more(PropertyPath::predicate(ex("q"))),
                PropertyPath::inverse(PropertyPath::predicate(ex("r"))),
            ]),
        ]);
        let mut graph = Graph::new();
        let root = path.to_graph(&mut graph, "path");
        let shape = ex("Shape");
        assert_eq!(
            PropertyPath::parse(&graph, root.as_ref(), shape.as_ref().into()).unwrap(),
            path
        );
        let mut again = Graph::new();
        path.to_graph(&mut again, "path");
        assert_eq!(graph, again);
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        let mut shapes = Graph::new();
        let shape = ex("Shape");
        let broken = BlankNode::default();
        shapes.add_triple(Triple::new(broken.clone(), rdf::FIRST, ex("p")));
        assert!(matches!(
            PropertyPath::parse(&shapes, broken.as_ref().into(), shape.as_ref().into()),
            Err(ShapeDefinitionError::InvalidRdfList { .. })
        ));

        let unknown = BlankNode::default();
        shapes.add_triple(Triple::new(unknown.clone(), ex("whatever"), ex("p")));
        assert!(matches!(
            PropertyPath::parse(&shapes, unknown.as_ref().into(), shape.as_ref().into()),
            Err(ShapeDefinitionError::InvalidPropertyPath { .. })
        ));

        let literal = oxrdf::Literal::from("p");
        assert!(matches!(
            PropertyPath::parse(&shapes, literal.as_ref().into(), shape.as_ref().into()),
            Err(ShapeDefinitionError::InvalidPropertyPath { .. })
        ));
    }
}
