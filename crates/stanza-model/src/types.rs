//! The type lattice and the registry of basic types.
//!
//! Types order terms by what they may denote:
//! - `Top` accepts everything, `Bottom` is below everything
//! - basic types form an externally supplied tree (the [`TypeRegistry`])
//! - `List<T>` and `NEList<T>` are covariant list constructors, with
//!   `NEList<T>` below `List<T>`
//! - `Lub<T>` marks the type of a constant: transparent to the subtype
//!   relation, so a constant is accepted wherever a sub- or supertype of `T`
//!   is declared
//!
//! `is_subtype_of` is reflexive and transitive; `is_compatible_with(a, b)`
//! holds iff `a <= b` or `b <= a` and is therefore symmetric.

use crate::terms::Iri;
use crate::vocab;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Top,
    Bottom,
    Basic(Iri),
    Lub(Box<Type>),
    List(Box<Type>),
    NeList(Box<Type>),
}

impl Type {
    pub fn basic(iri: impl Into<Iri>) -> Type {
        Type::Basic(iri.into())
    }

    pub fn lub(inner: Type) -> Type {
        Type::Lub(Box::new(inner))
    }

    pub fn list(inner: Type) -> Type {
        Type::List(Box::new(inner))
    }

    pub fn ne_list(inner: Type) -> Type {
        Type::NeList(Box::new(inner))
    }

    /// The stock IRI type.
    pub fn iri() -> Type {
        Type::basic(vocab::IRI)
    }

    /// The stock literal type.
    pub fn literal() -> Type {
        Type::basic(vocab::LITERAL)
    }

    pub fn is_list_type(&self) -> bool {
        matches!(self, Type::List(_) | Type::NeList(_))
    }

    /// The element type of a list type.
    pub fn inner(&self) -> Option<&Type> {
        match self {
            Type::List(inner) | Type::NeList(inner) => Some(inner),
            _ => None,
        }
    }

    /// Strips an outer `Lub` wrapper, recursing through list constructors.
    /// This is the declared type a variable gets from a constant.
    pub fn remove_lub(&self) -> Type {
        match self {
            Type::Lub(inner) => inner.remove_lub(),
            Type::List(inner) => Type::list(inner.remove_lub()),
            Type::NeList(inner) => Type::ne_list(inner.remove_lub()),
            other => other.clone(),
        }
    }

    pub fn is_subtype_of(&self, other: &Type, registry: &TypeRegistry) -> bool {
        match (self, other) {
            (Type::Lub(a), b) => a.is_subtype_of(b, registry),
            (a, Type::Lub(b)) => a.is_subtype_of(b, registry),
            (_, Type::Top) => true,
            (Type::Bottom, _) => true,
            (Type::Top, _) => false,
            (_, Type::Bottom) => false,
            (Type::Basic(a), Type::Basic(b)) => registry.is_subtype_of(a, b),
            (Type::List(a), Type::List(b)) => a.is_subtype_of(b, registry),
            (Type::NeList(a), Type::List(b)) | (Type::NeList(a), Type::NeList(b)) => {
                a.is_subtype_of(b, registry)
            }
            _ => false,
        }
    }

    pub fn is_compatible_with(&self, other: &Type, registry: &TypeRegistry) -> bool {
        self.is_subtype_of(other, registry) || other.is_subtype_of(self, registry)
    }
}

fn local_name(iri: &Iri) -> &str {
    let s = iri.as_str();
    s.rsplit(|c| c == '#' || c == '/').next().unwrap_or(s)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Top => f.write_str("Top"),
            Type::Bottom => f.write_str("Bot"),
            Type::Basic(iri) => f.write_str(local_name(iri)),
            Type::Lub(inner) => write!(f, "LUB<{inner}>"),
            Type::List(inner) => write!(f, "List<{inner}>"),
            Type::NeList(inner) => write!(f, "NEList<{inner}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeRegistryError {
    #[error("type {0} is already registered")]
    Duplicate(Iri),
    #[error("unknown supertype {0}")]
    UnknownParent(Iri),
}

/// The tree of basic types, stored as a transitive supertype closure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    supertypes: AHashMap<Iri, AHashSet<Iri>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// The stock hierarchy: IRI and Literal at the roots, the usual class,
    /// property and XSD datatype subtrees below them.
    pub fn standard() -> TypeRegistry {
        let mut reg = TypeRegistry::default();
        reg.insert(vocab::IRI, None);
        reg.insert(vocab::LITERAL, None);

        reg.insert(vocab::RDFS_CLASS, Some(vocab::IRI));
        reg.insert(vocab::OWL_CLASS, Some(vocab::RDFS_CLASS));
        reg.insert(vocab::RDFS_DATATYPE, Some(vocab::RDFS_CLASS));
        reg.insert(vocab::RDF_PROPERTY, Some(vocab::IRI));
        reg.insert(vocab::OWL_OBJECT_PROPERTY, Some(vocab::RDF_PROPERTY));
        reg.insert(vocab::OWL_DATATYPE_PROPERTY, Some(vocab::RDF_PROPERTY));
        reg.insert(vocab::OWL_ANNOTATION_PROPERTY, Some(vocab::RDF_PROPERTY));

        reg.insert(vocab::RDF_LANG_STRING, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_STRING, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_BOOLEAN, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_DECIMAL, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_INTEGER, Some(vocab::XSD_DECIMAL));
        reg.insert(vocab::XSD_LONG, Some(vocab::XSD_INTEGER));
        reg.insert(vocab::XSD_INT, Some(vocab::XSD_LONG));
        reg.insert(vocab::XSD_DOUBLE, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_FLOAT, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_DATE_TIME, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_DATE, Some(vocab::LITERAL));
        reg.insert(vocab::XSD_ANY_URI, Some(vocab::LITERAL));
        reg
    }

    // Parent must already be present; builders validate before calling.
    fn insert(&mut self, iri: &str, parent: Option<&str>) {
        let mut supers = AHashSet::new();
        if let Some(p) = parent {
            let p = Iri::from(p);
            if let Some(ancestors) = self.supertypes.get(&p) {
                supers.extend(ancestors.iter().cloned());
            }
            supers.insert(p);
        }
        self.supertypes.insert(Iri::from(iri), supers);
    }

    pub fn contains(&self, iri: &Iri) -> bool {
        self.supertypes.contains_key(iri)
    }

    /// The basic type registered under `iri`, if any.
    pub fn get(&self, iri: &Iri) -> Option<Type> {
        self.contains(iri).then(|| Type::Basic(iri.clone()))
    }

    /// Reflexive-transitive subtype test between registered basic types.
    pub fn is_subtype_of(&self, a: &Iri, b: &Iri) -> bool {
        a == b
            || self
                .supertypes
                .get(a)
                .is_some_and(|supers| supers.contains(b))
    }

    pub fn iris(&self) -> impl Iterator<Item = &Iri> {
        self.supertypes.keys()
    }

    pub fn len(&self) -> usize {
        self.supertypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }
}

/// Builds a [`TypeRegistry`] parent-first, rejecting duplicates and unknown
/// parents.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    registry: TypeRegistry,
}

impl TypeRegistryBuilder {
    /// Registers a type directly below `Top`.
    pub fn root(self, iri: impl Into<Iri>) -> Result<Self, TypeRegistryError> {
        self.add(iri.into(), None)
    }

    /// Registers a type below an already registered parent.
    pub fn subtype(
        self,
        iri: impl Into<Iri>,
        parent: impl Into<Iri>,
    ) -> Result<Self, TypeRegistryError> {
        self.add(iri.into(), Some(parent.into()))
    }

    fn add(mut self, iri: Iri, parent: Option<Iri>) -> Result<Self, TypeRegistryError> {
        if self.registry.contains(&iri) {
            return Err(TypeRegistryError::Duplicate(iri));
        }
        if let Some(p) = &parent {
            if !self.registry.contains(p) {
                return Err(TypeRegistryError::UnknownParent(p.clone()));
            }
        }
        self.registry
            .insert(iri.as_str(), parent.as_ref().map(Iri::as_str));
        Ok(self)
    }

    pub fn build(self) -> TypeRegistry {
        self.registry
    }
}
