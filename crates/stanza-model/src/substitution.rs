//! Binding parameters to arguments and applying the binding.
//!
//! Application rewrites terms recursively. Blank nodes that the binding does
//! not mention are body-local: they are renamed to fresh blanks, memoized so
//! every occurrence across one substitution gets the same fresh label.

use crate::elements::{Argument, Instance, Parameter};
use crate::errors::TemplateError;
use crate::terms::{IdSource, Iri, Term, TermKind};
use ahash::AHashMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    map: AHashMap<Term, Term>,
}

impl Substitution {
    pub fn new(map: AHashMap<Term, Term>) -> Self {
        Substitution { map }
    }

    pub fn empty() -> Self {
        Substitution::default()
    }

    /// Binds `parameters` to `arguments` positionally.
    ///
    /// The lengths must match. A `none` argument at a defaulted parameter
    /// takes the default; a blank-node default is instantiated fresh per
    /// expansion. A `none` at a non-defaulted parameter stays `none` here;
    /// whether that discards the instance is the expansion engine's call.
    pub fn from_arguments(
        template: &Iri,
        arguments: &[Argument],
        parameters: &[Parameter],
        ids: &IdSource,
    ) -> Result<Self, TemplateError> {
        if arguments.len() != parameters.len() {
            return Err(TemplateError::ArityMismatch {
                instance: template.clone(),
                expected: parameters.len(),
                actual: arguments.len(),
            });
        }
        let mut map = AHashMap::with_capacity(parameters.len());
        for (arg, param) in arguments.iter().zip(parameters) {
            let value = if arg.term.is_none() {
                match &param.default_value {
                    Some(default) if default.is_blank() => Term::fresh_blank(ids),
                    Some(default) => default.clone(),
                    None => arg.term.clone(),
                }
            } else {
                arg.term.clone()
            };
            map.insert(param.term.clone(), value);
        }
        Ok(Substitution { map })
    }

    pub fn get(&self, variable: &Term) -> Option<&Term> {
        self.map.get(variable)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn apply_term(&mut self, term: &Term, ids: &IdSource) -> Term {
        if let Some(image) = self.map.get(term) {
            return image.clone();
        }
        match term.kind() {
            TermKind::List { items, .. } => {
                let items = items.iter().map(|item| self.apply_term(item, ids)).collect();
                Term::list(items, ids)
            }
            TermKind::Blank(_) if !term.is_variable() => {
                let fresh = Term::fresh_blank(ids);
                self.map.insert(term.clone(), fresh.clone());
                fresh
            }
            _ => term.clone(),
        }
    }

    /// Rewrites argument terms; expander flags pass through untouched, list
    /// interpretation happens at expansion time.
    pub fn apply_arguments(&mut self, arguments: &[Argument], ids: &IdSource) -> Vec<Argument> {
        arguments
            .iter()
            .map(|arg| Argument {
                term: self.apply_term(&arg.term, ids),
                list_expander: arg.list_expander,
            })
            .collect()
    }

    pub fn apply_instance(&mut self, instance: &Instance, ids: &IdSource) -> Instance {
        Instance {
            iri: instance.iri.clone(),
            arguments: self.apply_arguments(&instance.arguments, ids),
            list_expander: instance.list_expander,
        }
    }

    pub fn apply_instances(&mut self, instances: &[Instance], ids: &IdSource) -> Vec<Instance> {
        instances
            .iter()
            .map(|ins| self.apply_instance(ins, ids))
            .collect()
    }

    /// Union of two bindings; a variable bound by both must have equal
    /// images.
    pub fn merge(&self, other: &Substitution) -> Option<Substitution> {
        let mut map = self.map.clone();
        for (var, image) in &other.map {
            match map.get(var) {
                Some(existing) if existing != image => return None,
                _ => {
                    map.insert(var.clone(), image.clone());
                }
            }
        }
        Some(Substitution { map })
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .map
            .iter()
            .map(|(k, v)| format!("{k} -> {v}"))
            .collect();
        entries.sort();
        write!(f, "{{{}}}", entries.join(", "))
    }
}
