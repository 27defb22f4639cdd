//! SHACL Core constraint components.

use crate::model::ShapeId;
use oxrdf::{Literal, NamedNode, NamedNodeRef, Term};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;

/// A constraint declared by a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    // === Cardinality ===
    /// sh:minCount
    MinCount(usize),
    /// sh:maxCount
    MaxCount(usize),

    // === Value type ===
    /// sh:datatype, also rejects ill-formed lexical forms.
    Datatype(NamedNode),
    /// sh:nodeKind
    NodeKind(NodeKind),

    // === String based ===
    /// sh:pattern with its optional sh:flags.
    Pattern(Pattern),

    // === Enumeration ===
    /// sh:in
    In(Vec<Term>),

    /// sh:class, satisfied by instances of subclasses too.
    Class(NamedNode),

    // === Logical ===
    /// sh:and
    And(Vec<ShapeId>),
    /// sh:or
    Or(Vec<ShapeId>),
    /// sh:not
    Not(ShapeId),

    // === Value range ===
    MinInclusive(Literal),
    MaxInclusive(Literal),
    MinExclusive(Literal),
    MaxExclusive(Literal),

    MinLength(usize),
    MaxLength(usize),
    LanguageIn(Vec<String>),
    UniqueLang,
    HasValue(Term),

    // === Shape based ===
    /// sh:node
    Node(ShapeId),
    /// sh:xone
    Xone(Vec<ShapeId>),
    /// sh:qualifiedValueShape with sh:qualifiedMinCount and sh:qualifiedMaxCount.
    QualifiedValueShape {
        shape: ShapeId,
        min_count: Option<usize>,
        max_count: Option<usize>,
    },

    /// sh:closed, the predicates of the shape's property shapes are allowed implicitly.
    Closed { ignored_properties: Vec<NamedNode> },

    // === Property pairs ===
    Equals(NamedNode),
    Disjoint(NamedNode),
    LessThan(NamedNode),
    LessThanOrEquals(NamedNode),
}

impl Constraint {
    pub fn component(&self) -> ConstraintComponent {
        match self {
            Self::MinCount(_) => ConstraintComponent::MinCount,
            Self::MaxCount(_) => ConstraintComponent::MaxCount,
            Self::Datatype(_) => ConstraintComponent::Datatype,
            Self::NodeKind(_) => ConstraintComponent::NodeKind,
            Self::Pattern(_) => ConstraintComponent::Pattern,
            Self::In(_) => ConstraintComponent::In,
            Self::Class(_) => ConstraintComponent::Class,
            Self::And(_) => ConstraintComponent::And,
            Self::Or(_) => ConstraintComponent::Or,
            Self::Not(_) => ConstraintComponent::Not,
            Self::MinInclusive(_) => ConstraintComponent::MinInclusive,
            Self::MaxInclusive(_) => ConstraintComponent::MaxInclusive,
            Self::MinExclusive(_) => ConstraintComponent::MinExclusive,
            Self::MaxExclusive(_) => ConstraintComponent::MaxExclusive,
            Self::MinLength(_) => ConstraintComponent::MinLength,
            Self::MaxLength(_) => ConstraintComponent::MaxLength,
            Self::LanguageIn(_) => ConstraintComponent::LanguageIn,
            Self::UniqueLang => ConstraintComponent::UniqueLang,
            Self::HasValue(_) => ConstraintComponent::HasValue,
            Self::Node(_) => ConstraintComponent::Node,
            Self::Xone(_) => ConstraintComponent::Xone,
            Self::QualifiedValueShape { .. } => ConstraintComponent::QualifiedValueShape,
            Self::Closed { .. } => ConstraintComponent::Closed,
            Self::Equals(_) => ConstraintComponent::Equals,
            Self::Disjoint(_) => ConstraintComponent::Disjoint,
            Self::LessThan(_) => ConstraintComponent::LessThan,
            Self::LessThanOrEquals(_) => ConstraintComponent::LessThanOrEquals,
        }
    }
}

macro_rules! components {
    ($($variant:ident => $name:literal,)*) => {
        /// The kind of a [`Constraint`].
        ///
        /// Variants are declared in evaluation order: the constraints of a shape are
        /// sorted by component before evaluation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ConstraintComponent {
            $($variant,)*
        }

        impl ConstraintComponent {
            /// The `sh:...ConstraintComponent` IRI.
            pub fn iri(self) -> NamedNodeRef<'static> {
                match self {
                    $(Self::$variant => NamedNodeRef::new_unchecked(concat!(
                        "http://www.w3.org/ns/shacl#",
                        stringify!($variant),
                        "ConstraintComponent"
                    )),)*
                }
            }

            /// The local name of the constraint parameter, e.g. `minCount`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        impl FromStr for ConstraintComponent {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    _ => Err(format!("unknown constraint component '{s}'")),
                }
            }
        }
    };
}

components! {
    MinCount => "minCount",
    MaxCount => "maxCount",
    Datatype => "datatype",
    NodeKind => "nodeKind",
    Pattern => "pattern",
    In => "in",
    Class => "class",
    And => "and",
    Or => "or",
    Not => "not",
    MinInclusive => "minInclusive",
    MaxInclusive => "maxInclusive",
    MinExclusive => "minExclusive",
    MaxExclusive => "maxExclusive",
    MinLength => "minLength",
    MaxLength => "maxLength",
    LanguageIn => "languageIn",
    UniqueLang => "uniqueLang",
    HasValue => "hasValue",
    Node => "node",
    Xone => "xone",
    QualifiedValueShape => "qualifiedValueShape",
    Closed => "closed",
    Equals => "equals",
    Disjoint => "disjoint",
    LessThan => "lessThan",
    LessThanOrEquals => "lessThanOrEquals",
}

impl fmt::Display for ConstraintComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sh:{}", self.name())
    }
}

/// The value of `sh:nodeKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Iri,
    Literal,
    BlankNode,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    pub fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        use crate::vocab::sh;
        Some(match iri {
            i if i == sh::IRI => Self::Iri,
            i if i == sh::LITERAL => Self::Literal,
            i if i == sh::BLANK_NODE => Self::BlankNode,
            i if i == sh::BLANK_NODE_OR_IRI => Self::BlankNodeOrIri,
            i if i == sh::BLANK_NODE_OR_LITERAL => Self::BlankNodeOrLiteral,
            i if i == sh::IRI_OR_LITERAL => Self::IriOrLiteral,
            _ => return None,
        })
    }

    pub fn iri(self) -> NamedNodeRef<'static> {
        use crate::vocab::sh;
        match self {
            Self::Iri => sh::IRI,
            Self::Literal => sh::LITERAL,
            Self::BlankNode => sh::BLANK_NODE,
            Self::BlankNodeOrIri => sh::BLANK_NODE_OR_IRI,
            Self::BlankNodeOrLiteral => sh::BLANK_NODE_OR_LITERAL,
            Self::IriOrLiteral => sh::IRI_OR_LITERAL,
        }
    }

    pub fn matches(self, term: &Term) -> bool {
        match term {
            Term::NamedNode(_) => matches!(
                self,
                Self::Iri | Self::BlankNodeOrIri | Self::IriOrLiteral
            ),
            Term::BlankNode(_) => matches!(
                self,
                Self::BlankNode | Self::BlankNodeOrIri | Self::BlankNodeOrLiteral
            ),
            Term::Literal(_) => matches!(
                self,
                Self::Literal | Self::BlankNodeOrLiteral | Self::IriOrLiteral
            ),
        }
    }
}

/// A compiled `sh:pattern`.
///
/// Compilation happens when shapes are loaded so evaluation never fails on a bad expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    flags: Option<String>,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern with [SPARQL `REGEX` flags](https://www.w3.org/TR/xpath-functions/#flags).
    pub fn new(source: impl Into<String>, flags: Option<String>) -> Result<Self, String> {
        let source = source.into();
        let mut literal = false;
        let mut builder_source = source.clone();
        let mut case_insensitive = false;
        let mut multi_line = false;
        let mut dot_matches_new_line = false;
        let mut ignore_whitespace = false;
        for flag in flags.as_deref().unwrap_or_default().chars() {
            match flag {
                'i' => case_insensitive = true,
                'm' => multi_line = true,
                's' => dot_matches_new_line = true,
                'x' => ignore_whitespace = true,
                'q' => literal = true,
                _ => return Err(format!("unsupported regex flag '{flag}'")),
            }
        }
        if literal {
            builder_source = regex::escape(&source);
        }
        let regex = RegexBuilder::new(&builder_source)
            .case_insensitive(case_insensitive)
            .multi_line(multi_line)
            .dot_matches_new_line(dot_matches_new_line)
            .ignore_whitespace(ignore_whitespace && !literal)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            source,
            flags,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Option<&str> {
        self.flags.as_deref()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)?;
        if let Some(flags) = &self.flags {
            f.write_str(flags)?;
        }
        Ok(())
    }
}
