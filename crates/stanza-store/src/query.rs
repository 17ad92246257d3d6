//! Tuple-binding query engine over a template store.
//!
//! A [`Query`] is a conjunctive query with negation-as-failure, evaluated as
//! a lazy stream of [`Tuple`]s (immutable name-to-value bindings). Base
//! relations read the store; each relation filters when its variables are
//! bound and enumerates consistent extensions when they are not, so the same
//! query text works in both directions.
//!
//! Caller obligations, not enforced: the free variables of a negated
//! subquery must be bound by the enclosing query, and value-anchored
//! relations (everything except `template`) need their anchor variable
//! bound. A variable bound to a value of the wrong shape yields no
//! solutions.

use crate::store::TemplateStore;
use ahash::{AHashMap, AHashSet};
use stanza_model::elements::{Argument, Instance, ListExpander, Parameter};
use stanza_model::substitution::Substitution;
use stanza_model::terms::{unify_terms, Iri, Term};
use stanza_model::types::Type;
use std::fmt;

/// The closed sum of values a query variable can be bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Iri(Iri),
    Term(Term),
    Type(Type),
    Int(usize),
    Instance(Instance),
    Parameters(Vec<Parameter>),
    Arguments(Vec<Argument>),
    Instances(Vec<Instance>),
    Substitution(Substitution),
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(v) => write!(f, "{v}"),
            Value::Term(v) => write!(f, "{v}"),
            Value::Type(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Instance(v) => write!(f, "{v}"),
            Value::Parameters(v) => write_list(f, v),
            Value::Arguments(v) => write_list(f, v),
            Value::Instances(v) => write_list(f, v),
            Value::Substitution(v) => write!(f, "{v}"),
        }
    }
}

/// An immutable variable binding; `bind` returns an extended copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    map: AHashMap<String, Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Tuple::default()
    }

    pub fn bind(&self, name: &str, value: Value) -> Tuple {
        let mut map = self.map.clone();
        map.insert(name.to_string(), value);
        Tuple { map }
    }

    pub fn has_bound(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    pub fn iri(&self, name: &str) -> Option<&Iri> {
        match self.map.get(name) {
            Some(Value::Iri(v)) => Some(v),
            _ => None,
        }
    }

    pub fn term(&self, name: &str) -> Option<&Term> {
        match self.map.get(name) {
            Some(Value::Term(v)) => Some(v),
            _ => None,
        }
    }

    pub fn ty(&self, name: &str) -> Option<&Type> {
        match self.map.get(name) {
            Some(Value::Type(v)) => Some(v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<usize> {
        match self.map.get(name) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        match self.map.get(name) {
            Some(Value::Instance(v)) => Some(v),
            _ => None,
        }
    }

    pub fn parameters(&self, name: &str) -> Option<&[Parameter]> {
        match self.map.get(name) {
            Some(Value::Parameters(v)) => Some(v),
            _ => None,
        }
    }

    pub fn arguments(&self, name: &str) -> Option<&[Argument]> {
        match self.map.get(name) {
            Some(Value::Arguments(v)) => Some(v),
            _ => None,
        }
    }

    pub fn instances(&self, name: &str) -> Option<&[Instance]> {
        match self.map.get(name) {
            Some(Value::Instances(v)) => Some(v),
            _ => None,
        }
    }

    pub fn substitution(&self, name: &str) -> Option<&Substitution> {
        match self.map.get(name) {
            Some(Value::Substitution(v)) => Some(v),
            _ => None,
        }
    }

    /// Display string of a bound value, for diagnostic texts.
    pub fn show(&self, name: &str) -> String {
        match self.map.get(name) {
            Some(value) => value.to_string(),
            None => format!("?{name}"),
        }
    }

    /// Indices are 0-based internally but reported 1-based.
    pub fn end_user_index(&self, name: &str) -> String {
        match self.int(name) {
            Some(i) => (i + 1).to_string(),
            None => format!("?{name}"),
        }
    }
}

type V = String;

/// Base relations over the store and the model vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    Template(V),
    Parameters { template: V, params: V },
    Length { list: V, length: V },
    Index { list: V, index: V, value: V },
    HasOccurrenceAt { term: V, level: V, inside: V },
    TermType { term: V, ty: V },
    InnerTypeAt { ty: V, level: V, inner: V },
    InnerType { ty: V, inner: V },
    IsSubtypeOf { sub: V, sup: V },
    IsCompatibleWith { left: V, right: V },
    IsOptional { params: V, index: V },
    IsNonBlank { params: V, index: V },
    HasListExpander { args: V, index: V },
    IsVariable(V),
    IsNotNone(V),
    IsBlank(V),
    IsListType(V),
    HasExpansionModifier(V),
    HasCrossModifier(V),
    HasZipMinModifier(V),
    HasZipMaxModifier(V),
    Body { template: V, body: V },
    InstanceIn { body: V, instance: V },
    InstanceIri { instance: V, iri: V },
    Arguments { instance: V, args: V },
    IsUndefined(V),
    IsSignature(V),
    IsBase(V),
    UnifiesVal { left: V, right: V, unifier: V },
    IsDependencyOf { instance: V, template: V },
    DependsTransitive { template: V, target: V },
}

/// A query over the store: base relations composed with conjunction,
/// disjunction, negation-as-failure, distinctness and explicit bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
    Not(Box<Query>),
    Distinct(Box<Query>),
    NotEquals(V, V),
    RemoveSymmetry(V, V),
    Bind(V, Value),
    Relation(Relation),
}

pub type TupleStream<'a> = Box<dyn Iterator<Item = Tuple> + 'a>;

impl Query {
    // ========================================================================
    // Connectives
    // ========================================================================

    pub fn and(self, other: Query) -> Query {
        Query::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Query) -> Query {
        Query::Or(Box::new(self), Box::new(other))
    }

    /// Negation as failure: keeps the tuple iff `query` has no solutions.
    pub fn not(query: Query) -> Query {
        Query::Not(Box::new(query))
    }

    pub fn distinct(query: Query) -> Query {
        Query::Distinct(Box::new(query))
    }

    pub fn not_equals(a: &str, b: &str) -> Query {
        Query::NotEquals(a.to_string(), b.to_string())
    }

    /// Keeps only the canonically ordered half of each symmetric pair.
    pub fn remove_symmetry(a: &str, b: &str) -> Query {
        Query::RemoveSymmetry(a.to_string(), b.to_string())
    }

    pub fn bind_value(var: &str, value: Value) -> Query {
        Query::Bind(var.to_string(), value)
    }

    // ========================================================================
    // Base relations
    // ========================================================================

    pub fn template(template: &str) -> Query {
        Query::Relation(Relation::Template(template.to_string()))
    }

    pub fn parameters(template: &str, params: &str) -> Query {
        Query::Relation(Relation::Parameters {
            template: template.to_string(),
            params: params.to_string(),
        })
    }

    pub fn length(list: &str, length: &str) -> Query {
        Query::Relation(Relation::Length {
            list: list.to_string(),
            length: length.to_string(),
        })
    }

    pub fn index(list: &str, index: &str, value: &str) -> Query {
        Query::Relation(Relation::Index {
            list: list.to_string(),
            index: index.to_string(),
            value: value.to_string(),
        })
    }

    pub fn has_occurrence_at(term: &str, level: &str, inside: &str) -> Query {
        Query::Relation(Relation::HasOccurrenceAt {
            term: term.to_string(),
            level: level.to_string(),
            inside: inside.to_string(),
        })
    }

    pub fn term_type(term: &str, ty: &str) -> Query {
        Query::Relation(Relation::TermType {
            term: term.to_string(),
            ty: ty.to_string(),
        })
    }

    pub fn inner_type_at(ty: &str, level: &str, inner: &str) -> Query {
        Query::Relation(Relation::InnerTypeAt {
            ty: ty.to_string(),
            level: level.to_string(),
            inner: inner.to_string(),
        })
    }

    pub fn inner_type(ty: &str, inner: &str) -> Query {
        Query::Relation(Relation::InnerType {
            ty: ty.to_string(),
            inner: inner.to_string(),
        })
    }

    pub fn is_subtype_of(sub: &str, sup: &str) -> Query {
        Query::Relation(Relation::IsSubtypeOf {
            sub: sub.to_string(),
            sup: sup.to_string(),
        })
    }

    pub fn is_compatible_with(left: &str, right: &str) -> Query {
        Query::Relation(Relation::IsCompatibleWith {
            left: left.to_string(),
            right: right.to_string(),
        })
    }

    pub fn is_optional(params: &str, index: &str) -> Query {
        Query::Relation(Relation::IsOptional {
            params: params.to_string(),
            index: index.to_string(),
        })
    }

    pub fn is_non_blank(params: &str, index: &str) -> Query {
        Query::Relation(Relation::IsNonBlank {
            params: params.to_string(),
            index: index.to_string(),
        })
    }

    pub fn has_list_expander(args: &str, index: &str) -> Query {
        Query::Relation(Relation::HasListExpander {
            args: args.to_string(),
            index: index.to_string(),
        })
    }

    pub fn is_variable(term: &str) -> Query {
        Query::Relation(Relation::IsVariable(term.to_string()))
    }

    pub fn is_not_none(term: &str) -> Query {
        Query::Relation(Relation::IsNotNone(term.to_string()))
    }

    pub fn is_blank(term: &str) -> Query {
        Query::Relation(Relation::IsBlank(term.to_string()))
    }

    pub fn is_list_type(ty: &str) -> Query {
        Query::Relation(Relation::IsListType(ty.to_string()))
    }

    pub fn has_expansion_modifier(instance: &str) -> Query {
        Query::Relation(Relation::HasExpansionModifier(instance.to_string()))
    }

    pub fn has_cross_modifier(instance: &str) -> Query {
        Query::Relation(Relation::HasCrossModifier(instance.to_string()))
    }

    pub fn has_zip_min_modifier(instance: &str) -> Query {
        Query::Relation(Relation::HasZipMinModifier(instance.to_string()))
    }

    pub fn has_zip_max_modifier(instance: &str) -> Query {
        Query::Relation(Relation::HasZipMaxModifier(instance.to_string()))
    }

    pub fn body(template: &str, body: &str) -> Query {
        Query::Relation(Relation::Body {
            template: template.to_string(),
            body: body.to_string(),
        })
    }

    pub fn instance_in(body: &str, instance: &str) -> Query {
        Query::Relation(Relation::InstanceIn {
            body: body.to_string(),
            instance: instance.to_string(),
        })
    }

    pub fn instance_iri(instance: &str, iri: &str) -> Query {
        Query::Relation(Relation::InstanceIri {
            instance: instance.to_string(),
            iri: iri.to_string(),
        })
    }

    pub fn arguments(instance: &str, args: &str) -> Query {
        Query::Relation(Relation::Arguments {
            instance: instance.to_string(),
            args: args.to_string(),
        })
    }

    pub fn is_undefined(template: &str) -> Query {
        Query::Relation(Relation::IsUndefined(template.to_string()))
    }

    pub fn is_signature(template: &str) -> Query {
        Query::Relation(Relation::IsSignature(template.to_string()))
    }

    pub fn is_base(template: &str) -> Query {
        Query::Relation(Relation::IsBase(template.to_string()))
    }

    pub fn unifies_val(left: &str, right: &str, unifier: &str) -> Query {
        Query::Relation(Relation::UnifiesVal {
            left: left.to_string(),
            right: right.to_string(),
            unifier: unifier.to_string(),
        })
    }

    pub fn is_dependency_of(instance: &str, template: &str) -> Query {
        Query::Relation(Relation::IsDependencyOf {
            instance: instance.to_string(),
            template: template.to_string(),
        })
    }

    pub fn depends_transitive(template: &str, target: &str) -> Query {
        Query::Relation(Relation::DependsTransitive {
            template: template.to_string(),
            target: target.to_string(),
        })
    }

    // ========================================================================
    // Shortcuts
    //
    // Helper variables are derived from the input variable names, so query
    // construction is deterministic and shortcut instances with different
    // inputs never collide.
    // ========================================================================

    pub fn parameter_index(template: &str, index: &str, param: &str) -> Query {
        let params = format!("__params_{template}_{index}");
        Query::parameters(template, &params).and(Query::index(&params, index, param))
    }

    pub fn argument_index(instance: &str, index: &str, arg: &str) -> Query {
        let args = format!("__args_{instance}_{index}");
        Query::arguments(instance, &args).and(Query::index(&args, index, arg))
    }

    pub fn body_instance(template: &str, instance: &str) -> Query {
        let body = format!("__body_{template}_{instance}");
        Query::body(template, &body).and(Query::instance_in(&body, instance))
    }

    /// The type the argument at `index` of `instance` is used as, at list
    /// nesting `level`. For a flagged argument one list layer of the
    /// parameter type is consumed by the expander.
    pub fn used_as_type(instance: &str, index: &str, level: &str, ty: &str) -> Query {
        let temp = format!("__iri_{instance}");
        let param = format!("__param_{instance}_{index}");
        let param_type = format!("__ptype_{instance}_{index}");
        let args = format!("__args_{instance}_{index}");
        let outer = format!("__outer_{instance}_{index}");

        Query::instance_iri(instance, &temp)
            .and(Query::parameter_index(&temp, index, &param))
            .and(Query::arguments(instance, &args))
            .and(Query::term_type(&param, &param_type))
            .and(
                Query::has_list_expander(&args, index)
                    .and(Query::inner_type_at(&param_type, level, &outer))
                    .and(Query::inner_type(&outer, ty))
                    .or(Query::not(Query::has_list_expander(&args, index))
                        .and(Query::inner_type_at(&param_type, level, ty))),
            )
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    pub fn eval<'a>(&'a self, engine: &'a QueryEngine<'a>) -> TupleStream<'a> {
        self.solve(engine, Tuple::new())
    }

    pub fn solve<'a>(&'a self, engine: &'a QueryEngine<'a>, tuple: Tuple) -> TupleStream<'a> {
        match self {
            Query::And(left, right) => Box::new(
                left.solve(engine, tuple)
                    .flat_map(move |t| right.solve(engine, t)),
            ),
            Query::Or(left, right) => Box::new(
                left.solve(engine, tuple.clone())
                    .chain(right.solve(engine, tuple)),
            ),
            Query::Not(query) => {
                if query.solve(engine, tuple.clone()).next().is_none() {
                    Box::new(std::iter::once(tuple))
                } else {
                    Box::new(std::iter::empty())
                }
            }
            Query::Distinct(query) => {
                let mut seen: Vec<Tuple> = Vec::new();
                Box::new(query.solve(engine, tuple).filter(move |t| {
                    if seen.contains(t) {
                        false
                    } else {
                        seen.push(t.clone());
                        true
                    }
                }))
            }
            Query::NotEquals(a, b) => match (tuple.get(a), tuple.get(b)) {
                (Some(x), Some(y)) if x != y => Box::new(std::iter::once(tuple)),
                _ => Box::new(std::iter::empty()),
            },
            Query::RemoveSymmetry(a, b) => {
                if tuple.show(a) <= tuple.show(b) {
                    Box::new(std::iter::once(tuple))
                } else {
                    Box::new(std::iter::empty())
                }
            }
            Query::Bind(var, value) => Box::new(std::iter::once(tuple.bind(var, value.clone()))),
            Query::Relation(relation) => Box::new(engine.solve(relation, tuple).into_iter()),
        }
    }
}

/// Evaluates base relations against one store.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'s> {
    store: &'s TemplateStore,
}

impl<'s> QueryEngine<'s> {
    pub fn new(store: &'s TemplateStore) -> Self {
        QueryEngine { store }
    }

    pub fn store(&self) -> &'s TemplateStore {
        self.store
    }

    fn solve(&self, relation: &Relation, tuple: Tuple) -> Vec<Tuple> {
        match relation {
            Relation::Template(template) => self.template(tuple, template),
            Relation::Parameters { template, params } => self.parameters(tuple, template, params),
            Relation::Length { list, length } => self.length(tuple, list, length),
            Relation::Index { list, index, value } => self.index(tuple, list, index, value),
            Relation::HasOccurrenceAt {
                term,
                level,
                inside,
            } => self.has_occurrence_at(tuple, term, level, inside),
            Relation::TermType { term, ty } => self.term_type(tuple, term, ty),
            Relation::InnerTypeAt { ty, level, inner } => {
                self.inner_type_at(tuple, ty, level, inner)
            }
            Relation::InnerType { ty, inner } => self.inner_type(tuple, ty, inner),
            Relation::IsSubtypeOf { sub, sup } => self.type_test(tuple, sub, sup, |a, b, reg| {
                a.is_subtype_of(b, reg)
            }),
            Relation::IsCompatibleWith { left, right } => {
                self.type_test(tuple, left, right, |a, b, reg| a.is_compatible_with(b, reg))
            }
            Relation::IsOptional { params, index } => {
                self.parameter_flag(tuple, params, index, |p| p.optional)
            }
            Relation::IsNonBlank { params, index } => {
                self.parameter_flag(tuple, params, index, |p| p.non_blank)
            }
            Relation::HasListExpander { args, index } => self.argument_flag(tuple, args, index),
            Relation::IsVariable(term) => {
                self.term_test(tuple, term, |t| t.is_variable())
            }
            Relation::IsNotNone(term) => self.term_test(tuple, term, |t| !t.is_none()),
            Relation::IsBlank(term) => self.term_test(tuple, term, |t| t.is_blank()),
            Relation::IsListType(ty) => match tuple.ty(ty) {
                Some(t) if t.is_list_type() => vec![tuple],
                _ => Vec::new(),
            },
            Relation::HasExpansionModifier(instance) => {
                self.modifier_test(tuple, instance, |e| e.is_some())
            }
            Relation::HasCrossModifier(instance) => {
                self.modifier_test(tuple, instance, |e| e == Some(ListExpander::Cross))
            }
            Relation::HasZipMinModifier(instance) => {
                self.modifier_test(tuple, instance, |e| e == Some(ListExpander::ZipMin))
            }
            Relation::HasZipMaxModifier(instance) => {
                self.modifier_test(tuple, instance, |e| e == Some(ListExpander::ZipMax))
            }
            Relation::Body { template, body } => self.body(tuple, template, body),
            Relation::InstanceIn { body, instance } => self.instance_in(tuple, body, instance),
            Relation::InstanceIri { instance, iri } => self.instance_iri(tuple, instance, iri),
            Relation::Arguments { instance, args } => self.arguments(tuple, instance, args),
            Relation::IsUndefined(template) => {
                self.store_test(tuple, template, |store, iri| !store.contains(iri))
            }
            Relation::IsSignature(template) => {
                self.store_test(tuple, template, TemplateStore::contains_signature)
            }
            Relation::IsBase(template) => {
                self.store_test(tuple, template, TemplateStore::contains_base)
            }
            Relation::UnifiesVal {
                left,
                right,
                unifier,
            } => self.unifies_val(tuple, left, right, unifier),
            Relation::IsDependencyOf { instance, template } => {
                self.is_dependency_of(tuple, instance, template)
            }
            Relation::DependsTransitive { template, target } => {
                self.depends_transitive(tuple, template, target)
            }
        }
    }

    fn template(&self, tuple: Tuple, template: &str) -> Vec<Tuple> {
        if tuple.has_bound(template) {
            return match tuple.iri(template) {
                Some(iri) if self.store.contains_definition_of(iri) => vec![tuple],
                _ => Vec::new(),
            };
        }
        self.store
            .template_iris()
            .map(|iri| tuple.bind(template, Value::Iri(iri.clone())))
            .collect()
    }

    fn parameters(&self, tuple: Tuple, template: &str, params: &str) -> Vec<Tuple> {
        let signature = match tuple.iri(template).and_then(|iri| self.store.signature_of(iri)) {
            Some(s) => s,
            None => return Vec::new(),
        };
        if tuple.has_bound(params) {
            return match tuple.parameters(params) {
                Some(bound) if bound == signature.parameters.as_slice() => vec![tuple],
                _ => Vec::new(),
            };
        }
        let bound = tuple.bind(params, Value::Parameters(signature.parameters.clone()));
        vec![bound]
    }

    fn list_len(&self, tuple: &Tuple, list: &str) -> Option<usize> {
        match tuple.get(list) {
            Some(Value::Parameters(v)) => Some(v.len()),
            Some(Value::Arguments(v)) => Some(v.len()),
            Some(Value::Instances(v)) => Some(v.len()),
            _ => None,
        }
    }

    /// Element values of an indexable binding. Parameter and argument lists
    /// index to their terms.
    fn list_values(&self, tuple: &Tuple, list: &str) -> Option<Vec<Value>> {
        match tuple.get(list) {
            Some(Value::Parameters(v)) => {
                Some(v.iter().map(|p| Value::Term(p.term.clone())).collect())
            }
            Some(Value::Arguments(v)) => {
                Some(v.iter().map(|a| Value::Term(a.term.clone())).collect())
            }
            Some(Value::Instances(v)) => {
                Some(v.iter().map(|i| Value::Instance(i.clone())).collect())
            }
            _ => None,
        }
    }

    fn length(&self, tuple: Tuple, list: &str, length: &str) -> Vec<Tuple> {
        let actual = match self.list_len(&tuple, list) {
            Some(n) => n,
            None => return Vec::new(),
        };
        if tuple.has_bound(length) {
            return match tuple.int(length) {
                Some(bound) if bound == actual => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(length, Value::Int(actual))]
    }

    fn index(&self, tuple: Tuple, list: &str, index: &str, value: &str) -> Vec<Tuple> {
        let values = match self.list_values(&tuple, list) {
            Some(v) => v,
            None => return Vec::new(),
        };
        if tuple.has_bound(index) {
            let i = match tuple.int(index) {
                Some(i) if i < values.len() => i,
                _ => return Vec::new(),
            };
            if tuple.has_bound(value) {
                return match tuple.get(value) {
                    Some(bound) if *bound == values[i] => vec![tuple],
                    _ => Vec::new(),
                };
            }
            let element = values[i].clone();
            return vec![tuple.bind(value, element)];
        }
        let bound_value = tuple.get(value).cloned();
        values
            .into_iter()
            .enumerate()
            .filter(|(_, v)| bound_value.as_ref().map_or(true, |bound| bound == v))
            .map(|(i, v)| tuple.bind(index, Value::Int(i)).bind(value, v))
            .collect()
    }

    fn has_occurrence_at(
        &self,
        tuple: Tuple,
        term: &str,
        level: &str,
        inside: &str,
    ) -> Vec<Tuple> {
        let bound = match tuple.term(term) {
            Some(t) => t.clone(),
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        find_occurrences(&tuple, &bound, level, inside, 0, &mut out);
        out
    }

    fn term_type(&self, tuple: Tuple, term: &str, ty: &str) -> Vec<Tuple> {
        let actual = match tuple.term(term) {
            Some(t) => t.term_type().clone(),
            None => return Vec::new(),
        };
        if tuple.has_bound(ty) {
            return match tuple.ty(ty) {
                Some(bound) if *bound == actual => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(ty, Value::Type(actual))]
    }

    fn inner_type_at(&self, tuple: Tuple, ty: &str, level: &str, inner: &str) -> Vec<Tuple> {
        let bound = match tuple.ty(ty) {
            Some(t) => t.clone(),
            None => return Vec::new(),
        };
        if let Some(target) = tuple.int(level) {
            let mut current = &bound;
            for _ in 0..target {
                match current.inner() {
                    Some(next) => current = next,
                    None => return Vec::new(),
                }
            }
            if tuple.has_bound(inner) {
                return match tuple.ty(inner) {
                    Some(b) if b == current => vec![tuple],
                    _ => Vec::new(),
                };
            }
            let found = current.clone();
            return vec![tuple.bind(inner, Value::Type(found))];
        }
        // Level unbound: every nesting depth is a solution.
        let mut out = Vec::new();
        let mut current = Some(&bound);
        let mut depth = 0usize;
        while let Some(t) = current {
            out.push(
                tuple
                    .bind(level, Value::Int(depth))
                    .bind(inner, Value::Type(t.clone())),
            );
            current = t.inner();
            depth += 1;
        }
        out
    }

    fn inner_type(&self, tuple: Tuple, ty: &str, inner: &str) -> Vec<Tuple> {
        let bound = match tuple.ty(ty) {
            Some(t) => t.clone(),
            None => return Vec::new(),
        };
        let next = match bound.inner() {
            Some(t) => t.clone(),
            None => return Vec::new(),
        };
        if tuple.has_bound(inner) {
            return match tuple.ty(inner) {
                Some(b) if *b == next => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(inner, Value::Type(next))]
    }

    fn type_test(
        &self,
        tuple: Tuple,
        left: &str,
        right: &str,
        test: impl Fn(&Type, &Type, &stanza_model::types::TypeRegistry) -> bool,
    ) -> Vec<Tuple> {
        match (tuple.ty(left), tuple.ty(right)) {
            (Some(a), Some(b)) if test(a, b, self.store.registry()) => vec![tuple],
            _ => Vec::new(),
        }
    }

    fn bind_indices(&self, tuple: &Tuple, len: usize, index: &str) -> Vec<Tuple> {
        if tuple.has_bound(index) {
            return match tuple.int(index) {
                Some(i) if i < len => vec![tuple.clone()],
                _ => Vec::new(),
            };
        }
        (0..len)
            .map(|i| tuple.bind(index, Value::Int(i)))
            .collect()
    }

    fn parameter_flag(
        &self,
        tuple: Tuple,
        params: &str,
        index: &str,
        flag: impl Fn(&Parameter) -> bool,
    ) -> Vec<Tuple> {
        let list: Vec<Parameter> = match tuple.parameters(params) {
            Some(p) => p.to_vec(),
            None => return Vec::new(),
        };
        self.bind_indices(&tuple, list.len(), index)
            .into_iter()
            .filter(|t| t.int(index).is_some_and(|i| flag(&list[i])))
            .collect()
    }

    fn argument_flag(&self, tuple: Tuple, args: &str, index: &str) -> Vec<Tuple> {
        let list: Vec<Argument> = match tuple.arguments(args) {
            Some(a) => a.to_vec(),
            None => return Vec::new(),
        };
        self.bind_indices(&tuple, list.len(), index)
            .into_iter()
            .filter(|t| t.int(index).is_some_and(|i| list[i].list_expander))
            .collect()
    }

    fn term_test(&self, tuple: Tuple, term: &str, test: impl Fn(&Term) -> bool) -> Vec<Tuple> {
        match tuple.term(term) {
            Some(t) if test(t) => vec![tuple],
            _ => Vec::new(),
        }
    }

    fn modifier_test(
        &self,
        tuple: Tuple,
        instance: &str,
        test: impl Fn(Option<ListExpander>) -> bool,
    ) -> Vec<Tuple> {
        match tuple.instance(instance) {
            Some(ins) if test(ins.list_expander) => vec![tuple],
            _ => Vec::new(),
        }
    }

    fn body(&self, tuple: Tuple, template: &str, body: &str) -> Vec<Tuple> {
        let pattern = match tuple.iri(template).and_then(|iri| self.store.template(iri)) {
            Some(t) => t.pattern().to_vec(),
            None => return Vec::new(),
        };
        if tuple.has_bound(body) {
            return match tuple.instances(body) {
                Some(bound) if bound == pattern.as_slice() => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(body, Value::Instances(pattern))]
    }

    fn instance_in(&self, tuple: Tuple, body: &str, instance: &str) -> Vec<Tuple> {
        let instances: Vec<Instance> = match tuple.instances(body) {
            Some(i) => i.to_vec(),
            None => return Vec::new(),
        };
        if tuple.has_bound(instance) {
            return match tuple.instance(instance) {
                Some(bound) if instances.contains(bound) => vec![tuple],
                _ => Vec::new(),
            };
        }
        instances
            .into_iter()
            .map(|ins| tuple.bind(instance, Value::Instance(ins)))
            .collect()
    }

    fn instance_iri(&self, tuple: Tuple, instance: &str, iri: &str) -> Vec<Tuple> {
        let actual = match tuple.instance(instance) {
            Some(ins) => ins.iri.clone(),
            None => return Vec::new(),
        };
        if tuple.has_bound(iri) {
            return match tuple.iri(iri) {
                Some(bound) if *bound == actual => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(iri, Value::Iri(actual))]
    }

    fn arguments(&self, tuple: Tuple, instance: &str, args: &str) -> Vec<Tuple> {
        let actual = match tuple.instance(instance) {
            Some(ins) => ins.arguments.clone(),
            None => return Vec::new(),
        };
        if tuple.has_bound(args) {
            return match tuple.arguments(args) {
                Some(bound) if bound == actual.as_slice() => vec![tuple],
                _ => Vec::new(),
            };
        }
        vec![tuple.bind(args, Value::Arguments(actual))]
    }

    fn store_test(
        &self,
        tuple: Tuple,
        template: &str,
        test: impl Fn(&TemplateStore, &Iri) -> bool,
    ) -> Vec<Tuple> {
        match tuple.iri(template) {
            Some(iri) if test(self.store, iri) => vec![tuple],
            _ => Vec::new(),
        }
    }

    fn unifies_val(&self, tuple: Tuple, left: &str, right: &str, unifier: &str) -> Vec<Tuple> {
        let (a, b) = match (tuple.term(left), tuple.term(right)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return Vec::new(),
        };
        if tuple.has_bound(unifier) {
            return match tuple.substitution(unifier) {
                Some(s) if s.get(&a) == s.get(&b) => vec![tuple],
                _ => Vec::new(),
            };
        }
        let unified = match unify_terms(&a, &b) {
            Some(u) => u,
            None => return Vec::new(),
        };
        let mut map = AHashMap::new();
        map.insert(a, unified.clone());
        map.insert(b, unified);
        vec![tuple.bind(unifier, Value::Substitution(Substitution::new(map)))]
    }

    fn is_dependency_of(&self, tuple: Tuple, instance: &str, template: &str) -> Vec<Tuple> {
        let users = match tuple.iri(instance).and_then(|iri| self.store.depends_on(iri)) {
            Some(u) => u.clone(),
            None => return Vec::new(),
        };
        if tuple.has_bound(template) {
            return match tuple.iri(template) {
                Some(bound) if users.contains(bound) => vec![tuple],
                _ => Vec::new(),
            };
        }
        users
            .into_iter()
            .map(|iri| tuple.bind(template, Value::Iri(iri)))
            .collect()
    }

    /// Breadth-first walk of the dependency relation; termination on cyclic
    /// graphs is guaranteed by the visited set.
    fn depends_transitive(&self, tuple: Tuple, template: &str, target: &str) -> Vec<Tuple> {
        let mut next = match tuple.iri(template).and_then(|iri| self.store.dependencies(iri)) {
            Some(deps) => deps,
            None => return Vec::new(),
        };
        let bound_target = tuple.iri(target).cloned();
        let mut visited: AHashSet<Iri> = AHashSet::new();
        let mut out = Vec::new();
        while !next.is_empty() {
            let mut frontier = AHashSet::new();
            for iri in next {
                if let Some(bound) = &bound_target {
                    if *bound == iri {
                        return vec![tuple];
                    }
                }
                if visited.insert(iri.clone()) {
                    out.push(tuple.bind(target, Value::Iri(iri.clone())));
                    if let Some(more) = self.store.dependencies(&iri) {
                        frontier.extend(more.into_iter());
                    }
                }
            }
            next = frontier;
        }
        if bound_target.is_some() {
            Vec::new()
        } else {
            out
        }
    }
}

fn find_occurrences(
    tuple: &Tuple,
    term: &Term,
    level: &str,
    inside: &str,
    current: usize,
    out: &mut Vec<Tuple>,
) {
    if let Some(bound) = tuple.int(level) {
        if current > bound {
            return;
        }
    }
    // Lists are transparent: only their leaves are occurrences.
    if let Some(items) = term.items() {
        for item in items {
            find_occurrences(tuple, item, level, inside, current + 1, out);
        }
        return;
    }
    if let Some(bound) = tuple.int(level) {
        if current != bound {
            return;
        }
    }
    let with_level = tuple.bind(level, Value::Int(current));
    if with_level.has_bound(inside) {
        if with_level.term(inside) == Some(term) {
            out.push(with_level);
        }
        return;
    }
    out.push(with_level.bind(inside, Value::Term(term.clone())));
}
