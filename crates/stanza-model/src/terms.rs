//! Terms and unification.
//!
//! A [`Term`] is a closed sum (IRI, literal, blank node, list, `none`, opaque
//! object) tagged with a [`Type`] and a variable flag. Equality and hashing
//! are structural over the sum plus the variable flag; the type tag and the
//! synthetic list identity do not participate.
//!
//! Fresh blank labels and list identities come from an explicit per-run
//! [`IdSource`], so independent expansion runs are reproducible.

use crate::types::{Type, TypeRegistry};
use crate::vocab;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// An IRI reference, stored in full.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Iri(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Iri(s.to_string())
    }
}

impl From<String> for Iri {
    fn from(s: String) -> Self {
        Iri(s)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The label of a blank node or of a blank-based variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlankLabel(String);

impl BlankLabel {
    pub fn new(label: impl Into<String>) -> Self {
        BlankLabel(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synthetic identity of a list occurrence. Distinguishes structurally equal
/// lists during rewriting; never part of term equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListId(pub u64);

/// Per-run allocator of fresh blank labels and list identities.
#[derive(Debug, Default)]
pub struct IdSource {
    blank: AtomicU64,
    list: AtomicU64,
}

impl IdSource {
    pub fn new() -> Self {
        IdSource::default()
    }

    pub fn fresh_blank(&self) -> BlankLabel {
        let n = self.blank.fetch_add(1, Ordering::Relaxed);
        BlankLabel(format!("b{n}"))
    }

    pub fn fresh_list(&self) -> ListId {
        ListId(self.list.fetch_add(1, Ordering::Relaxed))
    }
}

/// An RDF-style literal: a lexical value with a datatype, and a language tag
/// for `rdf:langString`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub datatype: Iri,
    pub language: Option<String>,
}

impl Literal {
    pub fn typed(value: impl Into<String>, datatype: impl Into<Iri>) -> Self {
        Literal {
            value: value.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// A plain literal; typed as `xsd:string`.
    pub fn plain(value: impl Into<String>) -> Self {
        Literal::typed(value, vocab::XSD_STRING)
    }

    pub fn language_tagged(value: impl Into<String>, tag: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            datatype: Iri::from(vocab::RDF_LANG_STRING),
            language: Some(tag.into()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.language {
            Some(tag) => write!(f, "\"{}\"@{}", self.value, tag),
            None => write!(f, "\"{}\"^^{}", self.value, self.datatype),
        }
    }
}

/// The closed sum of term shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TermKind {
    Iri(Iri),
    Literal(Literal),
    Blank(BlankLabel),
    List { id: ListId, items: Vec<Term> },
    None,
    Object(String),
}

/// A term: shape, type tag and variable flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    kind: TermKind,
    ty: Type,
    variable: bool,
}

impl Term {
    /// An IRI constant; typed `LUB<IRI>`.
    pub fn iri(iri: impl Into<Iri>) -> Term {
        Term {
            kind: TermKind::Iri(iri.into()),
            ty: Type::lub(Type::iri()),
            variable: false,
        }
    }

    /// A literal constant; typed by its datatype if registered, else
    /// `Literal`.
    pub fn literal(literal: Literal, registry: &TypeRegistry) -> Term {
        let ty = registry
            .get(&literal.datatype)
            .unwrap_or_else(Type::literal);
        Term {
            kind: TermKind::Literal(literal),
            ty,
            variable: false,
        }
    }

    /// An `xsd:string` constant.
    pub fn string_literal(value: impl Into<String>) -> Term {
        Term {
            kind: TermKind::Literal(Literal::plain(value)),
            ty: Type::basic(vocab::XSD_STRING),
            variable: false,
        }
    }

    /// A blank-node constant; typed `LUB<Top>`.
    pub fn blank(label: impl Into<String>) -> Term {
        Term {
            kind: TermKind::Blank(BlankLabel::new(label)),
            ty: Type::lub(Type::Top),
            variable: false,
        }
    }

    pub fn fresh_blank(ids: &IdSource) -> Term {
        Term {
            kind: TermKind::Blank(ids.fresh_blank()),
            ty: Type::lub(Type::Top),
            variable: false,
        }
    }

    /// The missing-value marker; typed `Bottom` so it fits any parameter.
    pub fn none() -> Term {
        Term {
            kind: TermKind::None,
            ty: Type::Bottom,
            variable: false,
        }
    }

    /// An opaque foreign value; typed `LUB<Top>`.
    pub fn object(tag: impl Into<String>) -> Term {
        Term {
            kind: TermKind::Object(tag.into()),
            ty: Type::lub(Type::Top),
            variable: false,
        }
    }

    /// A list term with a fresh identity. Empty lists are typed `List<Bot>`,
    /// non-empty lists `NEList<LUB<Top>>`.
    pub fn list(items: Vec<Term>, ids: &IdSource) -> Term {
        Term::list_with_id(items, ids.fresh_list())
    }

    pub(crate) fn list_with_id(items: Vec<Term>, id: ListId) -> Term {
        let ty = intrinsic_list_type(&items);
        Term {
            kind: TermKind::List { id, items },
            ty,
            variable: false,
        }
    }

    /// A variable with no declared type (i.e. `Top`).
    pub fn variable(name: impl Into<String>) -> Term {
        Term {
            kind: TermKind::Blank(BlankLabel::new(name)),
            ty: Type::Top,
            variable: true,
        }
    }

    pub fn typed_variable(name: impl Into<String>, ty: Type) -> Term {
        Term {
            kind: TermKind::Blank(BlankLabel::new(name)),
            ty,
            variable: true,
        }
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    pub fn term_type(&self) -> &Type {
        &self.ty
    }

    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// True for blank-node constants; variables are never blank constants.
    pub fn is_blank(&self) -> bool {
        !self.variable && matches!(self.kind, TermKind::Blank(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, TermKind::None)
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, TermKind::List { .. })
    }

    pub fn items(&self) -> Option<&[Term]> {
        match &self.kind {
            TermKind::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn list_id(&self) -> Option<ListId> {
        match &self.kind {
            TermKind::List { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The declared type a variable takes from this term's type: the outer
    /// `Lub` wrappers stripped.
    pub fn variable_type(&self) -> Type {
        self.ty.remove_lub()
    }

    pub fn with_type(mut self, ty: Type) -> Term {
        self.ty = ty;
        self
    }

    pub fn with_variable(mut self, variable: bool) -> Term {
        self.variable = variable;
        self
    }

    /// One-way unification.
    ///
    /// A variable takes the other side. `none` matches only `none`. Two
    /// non-variable lists match itemwise when equally long; the result keeps
    /// the other list's identity. Any other non-variable term matches only a
    /// structurally equal non-variable term.
    pub fn unify(&self, other: &Term) -> Option<Term> {
        if self.variable {
            return Some(other.clone());
        }
        match (&self.kind, &other.kind) {
            (TermKind::List { items: a, .. }, TermKind::List { id, items: b }) => {
                if other.variable || a.len() != b.len() {
                    return None;
                }
                let items = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| unify_terms(x, y))
                    .collect::<Option<Vec<_>>>()?;
                Some(Term::list_with_id(items, *id))
            }
            (TermKind::None, TermKind::None) => Some(other.clone()),
            _ => {
                if !other.variable && self == other {
                    Some(other.clone())
                } else {
                    None
                }
            }
        }
    }
}

/// Symmetric unification: variable handling is one-sided, so try both
/// directions.
pub fn unify_terms(t1: &Term, t2: &Term) -> Option<Term> {
    t1.unify(t2).or_else(|| t2.unify(t1))
}

fn intrinsic_list_type(items: &[Term]) -> Type {
    if items.is_empty() {
        Type::list(Type::Bottom)
    } else {
        Type::ne_list(Type::lub(Type::Top))
    }
}

impl TermKind {
    fn structural_eq(&self, other: &TermKind) -> bool {
        match (self, other) {
            (TermKind::Iri(a), TermKind::Iri(b)) => a == b,
            (TermKind::Literal(a), TermKind::Literal(b)) => a == b,
            (TermKind::Blank(a), TermKind::Blank(b)) => a == b,
            (TermKind::List { items: a, .. }, TermKind::List { items: b, .. }) => a == b,
            (TermKind::None, TermKind::None) => true,
            (TermKind::Object(a), TermKind::Object(b)) => a == b,
            _ => false,
        }
    }

    fn structural_hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TermKind::Iri(iri) => iri.hash(state),
            TermKind::Literal(lit) => lit.hash(state),
            TermKind::Blank(label) => label.hash(state),
            TermKind::List { items, .. } => {
                for item in items {
                    item.hash(state);
                }
            }
            TermKind::None => {}
            TermKind::Object(tag) => tag.hash(state),
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.variable == other.variable && self.kind.structural_eq(&other.kind)
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variable.hash(state);
        self.kind.structural_hash(state);
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Blank(label) if self.variable => write!(f, "?{label}"),
            TermKind::Blank(label) => write!(f, "_:{label}"),
            _ => {
                if self.variable {
                    write!(f, "?")?;
                }
                match &self.kind {
                    TermKind::Iri(iri) => write!(f, "{iri}"),
                    TermKind::Literal(lit) => write!(f, "{lit}"),
                    TermKind::List { items, .. } => {
                        write!(f, "(")?;
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{item}")?;
                        }
                        write!(f, ")")
                    }
                    TermKind::None => write!(f, "none"),
                    TermKind::Object(tag) => write!(f, "{tag}"),
                    TermKind::Blank(_) => unreachable!(),
                }
            }
        }
    }
}
