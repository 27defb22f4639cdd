//! RDFS-style entailment over class and property hierarchies.
//!
//! A [`SchemaClosure`] collects the `rdfs:subClassOf`, `rdfs:subPropertyOf`, `rdfs:domain` and
//! `rdfs:range` assertions of a set of graphs and computes the reflexive-transitive closure of
//! both hierarchies. [`SchemaClosure::expand`] then materializes the entailed triples into a copy
//! of a data graph so that constraint evaluation only has to look at explicit facts.

use crate::graph::Graph;
use crate::vocab::{rdf, rdfs};
use oxrdf::{NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TermRef, Triple};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Which entailments are materialized before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InferenceMode {
    /// The data graph is validated as is.
    ///
    /// `sh:class` and class targets still follow `rdfs:subClassOf` chains.
    None,
    /// Superclass types and superproperty triples are added.
    Subsumption,
    /// [`Subsumption`](Self::Subsumption) plus `rdfs:domain` and `rdfs:range` typing.
    #[default]
    Rdfs,
}

impl InferenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Subsumption => "subsumption",
            Self::Rdfs => "rdfs",
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "subsumption" => Ok(Self::Subsumption),
            "rdfs" => Ok(Self::Rdfs),
            _ => Err(format!(
                "unknown inference mode '{s}', expected none, subsumption or rdfs"
            )),
        }
    }
}

/// Identifies the schema statements a [`SchemaClosure`] was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hashes the schema statements of the given graphs.
    ///
    /// The statements are sorted first so the fingerprint does not depend on the order
    /// of the graphs nor on the order of their triples.
    pub fn of(graphs: &[&Graph]) -> Self {
        let mut statements = schema_statements(graphs)
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        statements.sort_unstable();
        statements.dedup();
        let mut hasher = FxHasher::default();
        statements.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The closed class and property hierarchies of a set of graphs.
#[derive(Debug, Clone)]
pub struct SchemaClosure {
    classes: Hierarchy<Term>,
    properties: Hierarchy<NamedNode>,
    domains: FxHashMap<NamedNode, Vec<Term>>,
    ranges: FxHashMap<NamedNode, Vec<Term>>,
    fingerprint: Fingerprint,
}

impl SchemaClosure {
    /// Collects the schema statements of all the given graphs and closes them.
    pub fn from_graphs(graphs: &[&Graph]) -> Self {
        Self::with_fingerprint(graphs, Fingerprint::of(graphs))
    }

    /// Like [`from_graphs`](Self::from_graphs) when `fingerprint` is already known to be the
    /// [`Fingerprint::of`] `graphs`.
    pub fn with_fingerprint(graphs: &[&Graph], fingerprint: Fingerprint) -> Self {
        let mut class_edges = Vec::new();
        let mut property_edges = Vec::new();
        let mut domains = FxHashMap::<NamedNode, Vec<Term>>::default();
        let mut ranges = FxHashMap::<NamedNode, Vec<Term>>::default();
        for triple in schema_statements(graphs) {
            let subject = Term::from(triple.subject.clone());
            match triple.predicate.as_ref() {
                p if p == rdfs::SUB_CLASS_OF => {
                    if !triple.object.is_literal() {
                        class_edges.push((subject, triple.object.clone()));
                    }
                }
                p if p == rdfs::SUB_PROPERTY_OF => {
                    if let (Term::NamedNode(sub), Term::NamedNode(sup)) = (subject, &triple.object)
                    {
                        property_edges.push((sub, sup.clone()));
                    }
                }
                p if p == rdfs::DOMAIN => {
                    if let Term::NamedNode(property) = subject {
                        push_unique(domains.entry(property).or_default(), &triple.object);
                    }
                }
                p if p == rdfs::RANGE => {
                    if let Term::NamedNode(property) = subject {
                        push_unique(ranges.entry(property).or_default(), &triple.object);
                    }
                }
                _ => (),
            }
        }
        let classes = Hierarchy::close(class_edges);
        let properties = Hierarchy::close(property_edges);
        debug!(
            classes = classes.len(),
            properties = properties.len(),
            class_iterations = classes.iterations,
            property_iterations = properties.iterations,
            "Computed schema closure"
        );
        Self {
            classes,
            properties,
            domains,
            ranges,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// The class itself followed by all its direct and indirect superclasses.
    pub fn superclasses(&self, class: TermRef<'_>) -> Vec<Term> {
        self.classes.ancestors(&class.into_owned())
    }

    /// The class itself followed by all its direct and indirect subclasses.
    pub fn subclasses(&self, class: TermRef<'_>) -> Vec<Term> {
        self.classes.descendants(&class.into_owned())
    }

    /// The property itself followed by all its direct and indirect superproperties.
    pub fn superproperties(&self, property: NamedNodeRef<'_>) -> Vec<NamedNode> {
        self.properties.ancestors(&property.into_owned())
    }

    /// Reflexive: every class is a subclass of itself.
    pub fn is_subclass_of(&self, sub: TermRef<'_>, sup: TermRef<'_>) -> bool {
        sub == sup
            || self
                .classes
                .is_ancestor(&sub.into_owned(), &sup.into_owned())
    }

    /// Checks if `node` is an instance of `class` in `graph`, following subclass chains.
    pub fn is_instance_of(&self, graph: &Graph, node: TermRef<'_>, class: TermRef<'_>) -> bool {
        graph
            .objects_for_subject_predicate(node, rdf::TYPE)
            .any(|t| self.is_subclass_of(t.as_ref(), class))
    }

    /// Returns a copy of `data` with the entailed triples of the given mode added.
    ///
    /// Passes repeat until one of them adds nothing. Each pass only looks at the triples
    /// added by the previous one because every rule has a single data premise.
    pub fn expand(&self, data: &Graph, mode: InferenceMode) -> Graph {
        let mut graph = data.clone();
        if mode == InferenceMode::None {
            return graph;
        }
        let mut start = 0;
        let mut passes = 0;
        loop {
            passes += 1;
            let end = graph.len();
            let mut entailed = Vec::new();
            for triple in graph.iter().skip(start) {
                self.entail(triple, mode, &mut entailed);
            }
            start = end;
            let mut added = 0;
            for triple in entailed {
                if graph.add_triple(triple) {
                    added += 1;
                }
            }
            if added == 0 {
                break;
            }
        }
        debug!(
            mode = %mode,
            passes,
            asserted = data.len(),
            entailed = graph.len() - data.len(),
            "Expanded data graph"
        );
        graph
    }

    fn entail(&self, triple: &Triple, mode: InferenceMode, out: &mut Vec<Triple>) {
        if triple.predicate.as_ref() == rdf::TYPE && !triple.object.is_literal() {
            for class in self.classes.strict_ancestors(&triple.object) {
                out.push(Triple::new(
                    triple.subject.clone(),
                    rdf::TYPE,
                    class.clone(),
                ));
            }
        }
        for property in self.properties.strict_ancestors(&triple.predicate) {
            out.push(Triple::new(
                triple.subject.clone(),
                property.clone(),
                triple.object.clone(),
            ));
        }
        if mode != InferenceMode::Rdfs {
            return;
        }
        if let Some(domains) = self.domains.get(&triple.predicate) {
            for class in domains {
                out.push(Triple::new(
                    triple.subject.clone(),
                    rdf::TYPE,
                    class.clone(),
                ));
            }
        }
        if let Some(ranges) = self.ranges.get(&triple.predicate) {
            let object = match &triple.object {
                Term::NamedNode(n) => NamedOrBlankNode::from(n.clone()),
                Term::BlankNode(b) => NamedOrBlankNode::from(b.clone()),
                Term::Literal(_) => return,
            };
            for class in ranges {
                out.push(Triple::new(object.clone(), rdf::TYPE, class.clone()));
            }
        }
    }
}

/// Keeps the closures of previously seen schemas.
///
/// Loading a large ontology once and validating many documents against it only pays for the
/// closure the first time.
#[derive(Debug, Default)]
pub struct ClosureCache {
    entries: Mutex<FxHashMap<Fingerprint, Arc<SchemaClosure>>>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached closure of the graphs, computing it on a miss.
    pub fn get_or_compute(&self, graphs: &[&Graph]) -> Arc<SchemaClosure> {
        self.get_or_compute_with(Fingerprint::of(graphs), graphs)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) when the fingerprint of `graphs` is
    /// already known.
    pub fn get_or_compute_with(
        &self,
        fingerprint: Fingerprint,
        graphs: &[&Graph],
    ) -> Arc<SchemaClosure> {
        if let Some(closure) = self.lock().get(&fingerprint) {
            debug!(%fingerprint, "Schema closure cache hit");
            return Arc::clone(closure);
        }
        let closure = Arc::new(SchemaClosure::with_fingerprint(graphs, fingerprint));
        self.lock()
            .entry(fingerprint)
            .or_insert_with(|| Arc::clone(&closure));
        closure
    }

    /// Drops the closure with the given fingerprint. Returns whether it was cached.
    pub fn invalidate(&self, fingerprint: Fingerprint) -> bool {
        self.lock().remove(&fingerprint).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<Fingerprint, Arc<SchemaClosure>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether the graph has `rdfs:subClassOf`, `rdfs:subPropertyOf`, `rdfs:domain` or
/// `rdfs:range` statements.
pub(crate) fn has_schema_statements(graph: &Graph) -> bool {
    schema_statements(&[graph]).next().is_some()
}

fn schema_statements<'a>(graphs: &'a [&'a Graph]) -> impl Iterator<Item = &'a Triple> + 'a {
    graphs.iter().flat_map(|graph| {
        [
            rdfs::SUB_CLASS_OF,
            rdfs::SUB_PROPERTY_OF,
            rdfs::DOMAIN,
            rdfs::RANGE,
        ]
        .into_iter()
        .flat_map(move |predicate| graph.triples_for_predicate(predicate))
    })
}

fn push_unique<T: PartialEq + Clone>(values: &mut Vec<T>, value: &T) {
    if !values.contains(value) {
        values.push(value.clone());
    }
}

/// A closed partial order stored as dense indexes in first-seen order.
#[derive(Debug, Clone)]
struct Hierarchy<T> {
    nodes: Vec<T>,
    ids: FxHashMap<T, usize>,
    ancestors: Vec<Vec<usize>>,
    descendants: Vec<Vec<usize>>,
    iterations: usize,
}

impl<T: Clone + Eq + Hash> Hierarchy<T> {
    fn close(edges: Vec<(T, T)>) -> Self {
        let mut nodes = Vec::new();
        let mut ids = FxHashMap::default();
        let mut id = |node: T, nodes: &mut Vec<T>| {
            *ids.entry(node.clone()).or_insert_with(|| {
                nodes.push(node);
                nodes.len() - 1
            })
        };
        let mut direct = Vec::with_capacity(edges.len());
        for (sub, sup) in edges {
            let sub = id(sub, &mut nodes);
            let sup = id(sup, &mut nodes);
            direct.push((sub, sup));
        }

        let mut closure = vec![FxHashSet::<usize>::default(); nodes.len()];
        for (sub, sup) in direct {
            closure[sub].insert(sup);
        }

        // Iterate until no set grows. Each set is bounded by the node count so this terminates,
        // cycles included.
        let mut changed = true;
        let mut iterations = 0;
        while changed {
            changed = false;
            iterations += 1;
            for node in 0..closure.len() {
                let additions = closure[node]
                    .iter()
                    .flat_map(|sup| closure[*sup].iter().copied())
                    .filter(|candidate| !closure[node].contains(candidate))
                    .collect::<Vec<_>>();
                if !additions.is_empty() {
                    changed = true;
                    closure[node].extend(additions);
                }
            }
        }

        let mut ancestors = Vec::with_capacity(closure.len());
        let mut descendants = vec![Vec::new(); closure.len()];
        for (node, sups) in closure.into_iter().enumerate() {
            let mut sups = sups
                .into_iter()
                .filter(|sup| *sup != node)
                .collect::<Vec<_>>();
            sups.sort_unstable();
            for sup in &sups {
                descendants[*sup].push(node);
            }
            ancestors.push(sups);
        }
        Self {
            nodes,
            ids,
            ancestors,
            descendants,
            iterations,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn strict_ancestors<'a>(&'a self, node: &T) -> impl Iterator<Item = &'a T> + use<'a, T> {
        self.ids
            .get(node)
            .and_then(|id| self.ancestors.get(*id))
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(*id))
    }

    fn ancestors(&self, node: &T) -> Vec<T> {
        let mut result = vec![node.clone()];
        result.extend(self.strict_ancestors(node).cloned());
        result
    }

    fn descendants(&self, node: &T) -> Vec<T> {
        let mut result = vec![node.clone()];
        if let Some(subs) = self.ids.get(node).and_then(|id| self.descendants.get(*id)) {
            result.extend(subs.iter().filter_map(|id| self.nodes.get(*id)).cloned());
        }
        result
    }

    fn is_ancestor(&self, node: &T, ancestor: &T) -> bool {
        let (Some(node), Some(ancestor)) = (self.ids.get(node), self.ids.get(ancestor)) else {
            return false;
        };
        self.ancestors
            .get(*node)
            .is_some_and(|sups| sups.binary_search(ancestor).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Literal;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn sub_class(graph: &mut Graph, sub: &str, sup: &str) {
        graph.add_triple(Triple::new(ex(sub), rdfs::SUB_CLASS_OF, ex(sup)));
    }

    #[test]
    fn test_three_hop_chain() {
        let mut schema = Graph::new();
        sub_class(&mut schema, "A", "B");
        sub_class(&mut schema, "B", "C");
        sub_class(&mut schema, "C", "D");
        let closure = SchemaClosure::from_graphs(&[&schema]);
        let a = Term::from(ex("A"));
        let d = Term::from(ex("D"));
        assert!(closure.is_subclass_of(a.as_ref(), d.as_ref()));
        assert!(!closure.is_subclass_of(d.as_ref(), a.as_ref()));
        assert_eq!(
            closure.superclasses(a.as_ref()),
            vec![a.clone(), ex("B").into(), ex("C").into(), d.clone()]
        );
        assert_eq!(closure.subclasses(d.as_ref()).len(), 4);
    }

    #[test]
    fn test_cycle_terminates_and_is_equivalence() {
        let mut schema = Graph::new();
        sub_class(&mut schema, "A", "B");
        sub_class(&mut schema, "B", "C");
        sub_class(&mut schema, "C", "A");
        let closure = SchemaClosure::from_graphs(&[&schema]);
        for (x, y) in [("A", "C"), ("C", "B"), ("B", "A")] {
            let x = Term::from(ex(x));
            let y = Term::from(ex(y));
            assert!(closure.is_subclass_of(x.as_ref(), y.as_ref()));
        }
        assert_eq!(closure.superclasses(ex("A").as_ref().into()).len(), 3);
    }

    #[test]
    fn test_unknown_class_is_its_own_superclass() {
        let closure = SchemaClosure::from_graphs(&[]);
        let x = Term::from(ex("X"));
        assert_eq!(closure.superclasses(x.as_ref()), vec![x.clone()]);
        assert!(closure.is_subclass_of(x.as_ref(), x.as_ref()));
    }

    #[test]
    fn test_expand_types_and_properties() {
        let mut schema = Graph::new();
        sub_class(&mut schema, "EuropeanDigitalCredential", "Credential");
        schema.add_triple(Triple::new(
            ex("awardingBody"),
            rdfs::SUB_PROPERTY_OF,
            ex("issuer"),
        ));
        let mut data = Graph::new();
        data.add_triple(Triple::new(
            ex("cred1"),
            rdf::TYPE,
            ex("EuropeanDigitalCredential"),
        ));
        data.add_triple(Triple::new(ex("cred1"), ex("awardingBody"), ex("orgA")));
        let closure = SchemaClosure::from_graphs(&[&schema]);

        let expanded = closure.expand(&data, InferenceMode::Subsumption);
        assert!(expanded.contains(&Triple::new(ex("cred1"), rdf::TYPE, ex("Credential"))));
        assert!(expanded.contains(&Triple::new(ex("cred1"), ex("issuer"), ex("orgA"))));
        assert_eq!(expanded.len(), 4);

        let untouched = closure.expand(&data, InferenceMode::None);
        assert_eq!(untouched, data);
    }

    #[test]
    fn test_expand_domain_and_range() {
        let mut schema = Graph::new();
        schema.add_triple(Triple::new(ex("issuer"), rdfs::DOMAIN, ex("Credential")));
        schema.add_triple(Triple::new(ex("issuer"), rdfs::RANGE, ex("Organisation")));
        schema.add_triple(Triple::new(ex("name"), rdfs::RANGE, ex("Text")));
        sub_class(&mut schema, "Organisation", "Agent");
        let mut data = Graph::new();
        data.add_triple(Triple::new(ex("cred1"), ex("issuer"), ex("orgA")));
        data.add_triple(Triple::new(ex("orgA"), ex("name"), Literal::from("Org A")));
        let closure = SchemaClosure::from_graphs(&[&schema]);

        let expanded = closure.expand(&data, InferenceMode::Rdfs);
        assert!(expanded.contains(&Triple::new(ex("cred1"), rdf::TYPE, ex("Credential"))));
        assert!(expanded.contains(&Triple::new(ex("orgA"), rdf::TYPE, ex("Organisation"))));
        assert!(expanded.contains(&Triple::new(ex("orgA"), rdf::TYPE, ex("Agent"))));
        // Literals are never typed by ranges
        assert_eq!(expanded.len(), 5);

        let subsumption_only = closure.expand(&data, InferenceMode::Subsumption);
        assert_eq!(subsumption_only.len(), 2);
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut schema = Graph::new();
        sub_class(&mut schema, "A", "B");
        sub_class(&mut schema, "B", "A");
        let mut data = Graph::new();
        data.add_triple(Triple::new(ex("x"), rdf::TYPE, ex("A")));
        let closure = SchemaClosure::from_graphs(&[&schema]);
        let once = closure.expand(&data, InferenceMode::Rdfs);
        let twice = closure.expand(&once, InferenceMode::Rdfs);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_fingerprint_ignores_order_and_non_schema_triples() {
        let mut first = Graph::new();
        sub_class(&mut first, "A", "B");
        sub_class(&mut first, "B", "C");
        let mut second = Graph::new();
        sub_class(&mut second, "B", "C");
        sub_class(&mut second, "A", "B");
        second.add_triple(Triple::new(ex("x"), rdf::TYPE, ex("A")));
        assert_eq!(Fingerprint::of(&[&first]), Fingerprint::of(&[&second]));
        sub_class(&mut second, "C", "D");
        assert_ne!(Fingerprint::of(&[&first]), Fingerprint::of(&[&second]));
    }

    #[test]
    fn test_cache() {
        let mut schema = Graph::new();
        sub_class(&mut schema, "A", "B");
        let cache = ClosureCache::new();
        let first = cache.get_or_compute(&[&schema]);
        let second = cache.get_or_compute(&[&schema]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(first.fingerprint()));
        assert!(!cache.invalidate(first.fingerprint()));
        let third = cache.get_or_compute(&[&schema]);
        assert!(!Arc::ptr_eq(&first, &third));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_with_known_fingerprint() {
        let mut schema = Graph::new();
        let cache = ClosureCache::new();
        assert!(!has_schema_statements(&schema));
        sub_class(&mut schema, "A", "B");
        assert!(has_schema_statements(&schema));
        let fingerprint = Fingerprint::of(&[&schema]);
        let closure = cache.get_or_compute_with(fingerprint, &[&schema]);
        assert_eq!(closure.fingerprint(), fingerprint);
        assert!(Arc::ptr_eq(&closure, &cache.get_or_compute(&[&schema])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("rdfs".parse(), Ok(InferenceMode::Rdfs));
        assert_eq!("none".parse(), Ok(InferenceMode::None));
        assert!("owl".parse::<InferenceMode>().is_err());
    }
}
