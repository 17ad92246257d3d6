//! Core data model for Stanza template libraries.
//!
//! A template library is a set of named signatures, base templates and
//! templates. This crate holds everything below the store layer:
//! - `terms`: the closed term sum (IRIs, literals, blank nodes, lists,
//!   `none`, opaque objects) with structural equality and unification
//! - `types`: the type lattice (Top, Bottom, basic types, LUB, List, NEList)
//!   and the registry of basic types
//! - `elements`: parameters, signatures, templates, instances, arguments and
//!   the three list expanders
//! - `substitution`: parameter-to-argument binding and its application
//! - `system`: severity-ordered diagnostics and the `Outcome` carrier
//! - `errors`: the typed error vocabulary behind those diagnostics

pub mod elements;
pub mod errors;
pub mod substitution;
pub mod system;
pub mod terms;
pub mod types;
pub mod vocab;

pub use elements::{
    Argument, BaseTemplate, Instance, ListExpander, Parameter, Signature, Template,
};
pub use errors::TemplateError;
pub use substitution::Substitution;
pub use system::{Message, Outcome, OutcomeStream, Severity};
pub use terms::{BlankLabel, IdSource, Iri, ListId, Literal, Term, TermKind};
pub use types::{Type, TypeRegistry, TypeRegistryBuilder, TypeRegistryError};
