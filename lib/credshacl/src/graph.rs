//! In-memory indexed [RDF graph](https://www.w3.org/TR/rdf11-concepts/#dfn-graph).
//!
//! Usage example:
//! ```
//! use credshacl::Graph;
//! use oxrdf::{NamedNodeRef, TripleRef};
//!
//! let mut graph = Graph::new();
//!
//! // insertion
//! let ex = NamedNodeRef::new("http://example.com")?;
//! assert!(graph.insert(TripleRef::new(ex, ex, ex)));
//! assert!(!graph.insert(TripleRef::new(ex, ex, ex)));
//!
//! // pattern matching
//! let results: Vec<_> = graph.triples_matching(Some(ex.into()), None, None).collect();
//! assert_eq!(results.len(), 1);
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use oxrdf::{NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TermRef, Triple, TripleRef};
use rustc_hash::{FxHashMap, FxHashSet};
use std::slice;

/// An in-memory set of triples indexed by subject, predicate and object.
///
/// Triples keep the position of their first insertion so that every iteration order
/// exposed by the graph is reproducible for identical input.
/// The graph only grows: there is no removal.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    triples: Vec<Triple>,
    contained: FxHashSet<Triple>,
    by_subject: FxHashMap<Term, Vec<usize>>,
    by_predicate: FxHashMap<NamedNode, Vec<usize>>,
    by_object: FxHashMap<Term, Vec<usize>>,
    subjects: Vec<Term>,
    objects: Vec<Term>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a triple. Returns `false` if it was already present.
    pub fn insert<'a>(&mut self, triple: impl Into<TripleRef<'a>>) -> bool {
        let triple = triple.into();
        if self.contains(triple) {
            return false;
        }
        self.add_triple(triple.into_owned())
    }

    /// Inserts an owned triple. Returns `false` if it was already present.
    pub fn add_triple(&mut self, triple: Triple) -> bool {
        if self.contained.contains(&triple) {
            return false;
        }
        let position = self.triples.len();
        let subject = Term::from(triple.subject.clone());
        let subject_positions = self.by_subject.entry(subject.clone()).or_default();
        if subject_positions.is_empty() {
            self.subjects.push(subject);
        }
        subject_positions.push(position);
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .push(position);
        let object_positions = self.by_object.entry(triple.object.clone()).or_default();
        if object_positions.is_empty() {
            self.objects.push(triple.object.clone());
        }
        object_positions.push(position);
        self.contained.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    /// Checks if the graph contains the given triple.
    pub fn contains<'a>(&self, triple: impl Into<TripleRef<'a>>) -> bool {
        self.contained.contains(&triple.into().into_owned())
    }

    /// Returns the number of triples in this graph.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Checks if this graph contains a triple.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Returns all the triples contained by the graph in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    /// Returns the triples matching a pattern. `None` components are wildcards.
    ///
    /// The returned iterator is lazy and cheap to clone, cloning it restarts the scan.
    /// When at least one component is bound the smallest matching index is walked.
    pub fn triples_matching(
        &self,
        subject: Option<TermRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> TriplesMatching<'_> {
        let mut candidates: Option<&[usize]> = None;
        let mut missing = false;
        if let Some(subject) = subject {
            Self::narrow(
                &mut candidates,
                &mut missing,
                self.by_subject.get(&subject.into_owned()),
            );
        }
        if let Some(predicate) = predicate {
            Self::narrow(
                &mut candidates,
                &mut missing,
                self.by_predicate.get(&predicate.into_owned()),
            );
        }
        if let Some(object) = object {
            Self::narrow(
                &mut candidates,
                &mut missing,
                self.by_object.get(&object.into_owned()),
            );
        }
        let candidates = if missing {
            let nothing: &[usize] = &[];
            Candidates::Indexed(nothing.iter())
        } else if let Some(positions) = candidates {
            Candidates::Indexed(positions.iter())
        } else {
            Candidates::All(self.triples.iter())
        };
        TriplesMatching {
            triples: &self.triples,
            candidates,
            subject: subject.map(TermRef::into_owned),
            predicate: predicate.map(NamedNodeRef::into_owned),
            object: object.map(TermRef::into_owned),
        }
    }

    fn narrow<'a>(
        candidates: &mut Option<&'a [usize]>,
        missing: &mut bool,
        positions: Option<&'a Vec<usize>>,
    ) {
        match positions {
            Some(positions) => {
                if candidates.is_none_or(|current| positions.len() < current.len()) {
                    *candidates = Some(positions);
                }
            }
            None => *missing = true,
        }
    }

    /// Returns the distinct subjects of the graph in first-seen order.
    pub fn subjects(&self) -> slice::Iter<'_, Term> {
        self.subjects.iter()
    }

    /// Returns the distinct objects of the graph in first-seen order.
    pub fn objects(&self) -> slice::Iter<'_, Term> {
        self.objects.iter()
    }

    /// Triples with the given subject, in insertion order.
    pub fn triples_for_subject<'a>(
        &'a self,
        subject: TermRef<'_>,
    ) -> impl Iterator<Item = &'a Triple> + use<'a> {
        self.triples_matching(Some(subject), None, None)
    }

    /// Triples with the given predicate, in insertion order.
    pub fn triples_for_predicate<'a>(
        &'a self,
        predicate: NamedNodeRef<'_>,
    ) -> impl Iterator<Item = &'a Triple> + use<'a> {
        self.triples_matching(None, Some(predicate), None)
    }

    /// Objects of the triples with the given subject and predicate.
    pub fn objects_for_subject_predicate<'a>(
        &'a self,
        subject: TermRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> impl Iterator<Item = &'a Term> + use<'a> {
        self.triples_matching(Some(subject), Some(predicate), None)
            .map(|t| &t.object)
    }

    /// The first object of [`objects_for_subject_predicate`](Self::objects_for_subject_predicate).
    pub fn object_for_subject_predicate<'a>(
        &'a self,
        subject: TermRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> Option<&'a Term> {
        self.objects_for_subject_predicate(subject, predicate).next()
    }

    /// Subjects of the triples with the given predicate and object.
    pub fn subjects_for_predicate_object<'a>(
        &'a self,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> impl Iterator<Item = &'a NamedOrBlankNode> + use<'a> {
        self.triples_matching(None, Some(predicate), Some(object))
            .map(|t| &t.subject)
    }
}

impl PartialEq for Graph {
    /// Set equality, insertion order is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.contained == other.contained
    }
}

impl Eq for Graph {}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Self::new();
        graph.extend(iter);
        graph
    }
}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.add_triple(triple);
        }
    }
}

#[derive(Clone)]
enum Candidates<'a> {
    All(slice::Iter<'a, Triple>),
    Indexed(slice::Iter<'a, usize>),
}

/// Iterator returned by [`Graph::triples_matching`].
#[derive(Clone)]
#[must_use]
pub struct TriplesMatching<'a> {
    triples: &'a [Triple],
    candidates: Candidates<'a>,
    subject: Option<Term>,
    predicate: Option<NamedNode>,
    object: Option<Term>,
}

impl TriplesMatching<'_> {
    fn matches(&self, triple: &Triple) -> bool {
        self.subject
            .as_ref()
            .is_none_or(|s| TermRef::from(triple.subject.as_ref()) == s.as_ref())
            && self
                .predicate
                .as_ref()
                .is_none_or(|p| triple.predicate == *p)
            && self.object.as_ref().is_none_or(|o| triple.object == *o)
    }
}

impl<'a> Iterator for TriplesMatching<'a> {
    type Item = &'a Triple;

    fn next(&mut self) -> Option<&'a Triple> {
        loop {
            let triple = match &mut self.candidates {
                Candidates::All(iter) => iter.next()?,
                Candidates::Indexed(iter) => {
                    let position = *iter.next()?;
                    self.triples.get(position)?
                }
            };
            if self.matches(triple) {
                return Some(triple);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{BlankNode, Literal};

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.add_triple(Triple::new(ex("alice"), ex("knows"), ex("bob")));
        graph.add_triple(Triple::new(ex("alice"), ex("name"), Literal::from("Alice")));
        graph.add_triple(Triple::new(ex("bob"), ex("knows"), ex("carol")));
        graph.add_triple(Triple::new(ex("bob"), ex("name"), Literal::from("Bob")));
        graph
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut graph = sample();
        assert_eq!(graph.len(), 4);
        assert!(!graph.add_triple(Triple::new(ex("alice"), ex("knows"), ex("bob"))));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_wildcards() {
        let graph = sample();
        let alice = ex("alice");
        let knows = ex("knows");
        assert_eq!(graph.triples_matching(None, None, None).count(), 4);
        assert_eq!(
            graph
                .triples_matching(Some(alice.as_ref().into()), None, None)
                .count(),
            2
        );
        assert_eq!(
            graph
                .triples_matching(None, Some(knows.as_ref()), None)
                .count(),
            2
        );
        assert_eq!(
            graph
                .triples_matching(Some(alice.as_ref().into()), Some(knows.as_ref()), None)
                .count(),
            1
        );
        let bob = ex("bob");
        assert_eq!(
            graph
                .triples_matching(None, None, Some(bob.as_ref().into()))
                .count(),
            1
        );
    }

    #[test]
    fn test_unknown_component_matches_nothing() {
        let graph = sample();
        let nobody = ex("nobody");
        assert_eq!(
            graph
                .triples_matching(Some(nobody.as_ref().into()), None, None)
                .count(),
            0
        );
        let literal = Literal::from("Alice");
        assert_eq!(
            graph
                .triples_matching(Some(literal.as_ref().into()), None, None)
                .count(),
            0
        );
    }

    #[test]
    fn test_matching_is_restartable() {
        let graph = sample();
        let knows = ex("knows");
        let iter = graph.triples_matching(None, Some(knows.as_ref()), None);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_subjects_and_objects() {
        let graph = sample();
        let subjects: Vec<_> = graph.subjects().cloned().collect();
        assert_eq!(subjects, vec![Term::from(ex("alice")), Term::from(ex("bob"))]);
        assert_eq!(graph.objects().count(), 4);
    }

    #[test]
    fn test_literal_identity() {
        let mut graph = Graph::new();
        let s = BlankNode::default();
        graph.add_triple(Triple::new(s.clone(), ex("p"), Literal::from("1")));
        graph.add_triple(Triple::new(
            s.clone(),
            ex("p"),
            Literal::new_typed_literal("1", oxrdf::vocab::xsd::INTEGER),
        ));
        graph.add_triple(Triple::new(
            s.clone(),
            ex("p"),
            Literal::new_language_tagged_literal_unchecked("1", "en"),
        ));
        graph.add_triple(Triple::new(s, ex("p"), Literal::from("1")));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_lookup_helpers() {
        let graph = sample();
        let alice = ex("alice");
        let name = ex("name");
        assert_eq!(
            graph.object_for_subject_predicate(alice.as_ref().into(), name.as_ref()),
            Some(&Term::from(Literal::from("Alice")))
        );
        let knows = ex("knows");
        let carol = ex("carol");
        let subjects: Vec<_> = graph
            .subjects_for_predicate_object(knows.as_ref(), carol.as_ref().into())
            .collect();
        assert_eq!(subjects, vec![&NamedOrBlankNode::from(ex("bob"))]);
    }
}
