//! The template store: a frozen map from IRIs to signatures, base templates
//! and templates, plus the dependency indexes derived from template bodies.
//!
//! The store is built by a single writer during the load phase and treated as
//! read-only afterwards; engines borrow it without locking.

use crate::checks::{self, Check};
use crate::query::QueryEngine;
use ahash::{AHashMap, AHashSet};
use stanza_model::elements::{BaseTemplate, Parameter, Signature, Template};
use stanza_model::errors::TemplateError;
use stanza_model::system::Message;
use stanza_model::terms::{Iri, Term};
use stanza_model::types::{Type, TypeRegistry};
use stanza_model::vocab;
use std::sync::Arc;
use tracing::{debug, warn};

/// One store entry: a bare signature, a base template or a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateObject {
    Signature(Signature),
    Base(BaseTemplate),
    Template(Template),
}

impl TemplateObject {
    pub fn signature(&self) -> &Signature {
        match self {
            TemplateObject::Signature(s) => s,
            TemplateObject::Base(b) => &b.signature,
            TemplateObject::Template(t) => t.signature(),
        }
    }

    pub fn iri(&self) -> &Iri {
        &self.signature().iri
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.signature().parameters
    }

    pub fn validate(&self) -> Vec<Message> {
        match self {
            TemplateObject::Signature(s) => s.validate(),
            TemplateObject::Base(b) => b.signature.validate(),
            TemplateObject::Template(t) => t.validate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    entries: AHashMap<Iri, TemplateObject>,
    // Reverse dependencies: for each IRI, the templates whose body uses it.
    used_by: AHashMap<Iri, AHashSet<Iri>>,
    registry: Arc<TypeRegistry>,
}

impl TemplateStore {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        TemplateStore {
            entries: AHashMap::new(),
            used_by: AHashMap::new(),
            registry,
        }
    }

    /// A store over the standard type registry.
    pub fn standard() -> Self {
        TemplateStore::new(Arc::new(TypeRegistry::standard()))
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_arc(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Adds an entry. Re-adding identical content is a no-op (`Ok(false)`);
    /// a template may replace a previously added bare signature with equal
    /// parameters; any other addition under an existing IRI is rejected.
    pub fn add(&mut self, object: TemplateObject) -> Result<bool, TemplateError> {
        let iri = object.iri().clone();
        match self.entries.get(&iri) {
            None => {
                debug!(template = %iri, "adding store entry");
                self.index_dependencies(&object);
                self.entries.insert(iri, object);
                Ok(true)
            }
            Some(existing) if *existing == object => Ok(false),
            Some(TemplateObject::Signature(existing)) => match &object {
                TemplateObject::Template(t) if t.parameters() == existing.parameters => {
                    debug!(template = %iri, "upgrading signature to template");
                    self.index_dependencies(&object);
                    self.entries.insert(iri, object);
                    Ok(true)
                }
                _ => self.reject(iri),
            },
            Some(existing) => {
                // A bare signature matching an existing definition is a no-op.
                if let TemplateObject::Signature(s) = &object {
                    if s.parameters == existing.signature().parameters {
                        return Ok(false);
                    }
                }
                self.reject(iri)
            }
        }
    }

    fn reject(&self, iri: Iri) -> Result<bool, TemplateError> {
        warn!(template = %iri, "rejecting conflicting store entry");
        Err(TemplateError::ConflictingDefinition(iri))
    }

    fn index_dependencies(&mut self, object: &TemplateObject) {
        if let TemplateObject::Template(t) = object {
            for instance in t.pattern() {
                self.used_by
                    .entry(instance.iri.clone())
                    .or_default()
                    .insert(t.iri().clone());
            }
        }
    }

    pub fn add_signature(&mut self, signature: Signature) -> Result<bool, TemplateError> {
        self.add(TemplateObject::Signature(signature))
    }

    pub fn add_base_template(&mut self, base: BaseTemplate) -> Result<bool, TemplateError> {
        self.add(TemplateObject::Base(base))
    }

    pub fn add_template(&mut self, template: Template) -> Result<bool, TemplateError> {
        self.add(TemplateObject::Template(template))
    }

    /// Installs the built-in `Triple` and `NullableTriple` base templates.
    pub fn add_standard_bases(&mut self) -> Result<(), TemplateError> {
        let triple = Signature::new(
            vocab::TRIPLE,
            vec![
                Parameter::new(Term::typed_variable("subject", Type::iri())).non_blank(),
                Parameter::new(Term::typed_variable("predicate", Type::iri())).non_blank(),
                Parameter::new(Term::typed_variable("object", Type::Top)),
            ],
        );
        let nullable = Signature::new(
            vocab::NULLABLE_TRIPLE,
            vec![
                Parameter::new(Term::typed_variable("subject", Type::iri()))
                    .non_blank()
                    .optional(),
                Parameter::new(Term::typed_variable("predicate", Type::iri()))
                    .non_blank()
                    .optional(),
                Parameter::new(Term::typed_variable("object", Type::Top)).optional(),
            ],
        );
        self.add_base_template(BaseTemplate::new(triple))?;
        self.add_base_template(BaseTemplate::new(nullable))?;
        Ok(())
    }

    pub fn get(&self, iri: &Iri) -> Option<&TemplateObject> {
        self.entries.get(iri)
    }

    pub fn contains(&self, iri: &Iri) -> bool {
        self.entries.contains_key(iri)
    }

    /// True iff the entry is a bare signature (neither base nor template).
    pub fn contains_signature(&self, iri: &Iri) -> bool {
        matches!(self.entries.get(iri), Some(TemplateObject::Signature(_)))
    }

    pub fn contains_base(&self, iri: &Iri) -> bool {
        matches!(self.entries.get(iri), Some(TemplateObject::Base(_)))
    }

    /// True iff the entry is a template with a body.
    pub fn contains_definition_of(&self, iri: &Iri) -> bool {
        matches!(self.entries.get(iri), Some(TemplateObject::Template(_)))
    }

    pub fn signature_of(&self, iri: &Iri) -> Option<&Signature> {
        self.entries.get(iri).map(TemplateObject::signature)
    }

    pub fn template(&self, iri: &Iri) -> Option<&Template> {
        match self.entries.get(iri) {
            Some(TemplateObject::Template(t)) => Some(t),
            _ => None,
        }
    }

    pub fn base_template(&self, iri: &Iri) -> Option<&BaseTemplate> {
        match self.entries.get(iri) {
            Some(TemplateObject::Base(b)) => Some(b),
            _ => None,
        }
    }

    pub fn iris(&self) -> impl Iterator<Item = &Iri> {
        self.entries.keys()
    }

    pub fn template_iris(&self) -> impl Iterator<Item = &Iri> {
        self.all_templates().map(Template::iri)
    }

    pub fn all_templates(&self) -> impl Iterator<Item = &Template> {
        self.entries.values().filter_map(|o| match o {
            TemplateObject::Template(t) => Some(t),
            _ => None,
        })
    }

    pub fn all_base_templates(&self) -> impl Iterator<Item = &BaseTemplate> {
        self.entries.values().filter_map(|o| match o {
            TemplateObject::Base(b) => Some(b),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The IRIs a template's body uses, one level deep.
    pub fn dependencies(&self, iri: &Iri) -> Option<AHashSet<Iri>> {
        self.template(iri)
            .map(|t| t.pattern().iter().map(|ins| ins.iri.clone()).collect())
    }

    /// The templates whose body uses `iri` (reverse dependency index).
    pub fn depends_on(&self, iri: &Iri) -> Option<&AHashSet<Iri>> {
        self.used_by.get(iri)
    }

    /// IRIs referenced by some template body but not present in the store.
    pub fn missing_dependencies(&self) -> Vec<Iri> {
        let mut missing: Vec<Iri> = self
            .used_by
            .keys()
            .filter(|iri| !self.contains(iri))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Runs the full check catalogue plus per-entry structural validation.
    pub fn check_templates(&self) -> Vec<Message> {
        self.check_templates_with(&checks::all_checks())
    }

    /// Runs only the checks that stay silent on missing definitions; used
    /// when external references are legitimate.
    pub fn check_templates_for_errors_only(&self) -> Vec<Message> {
        self.check_templates_with(&checks::fails_on_error_checks())
    }

    pub fn check_templates_with(&self, checks: &[Check]) -> Vec<Message> {
        let engine = QueryEngine::new(self);
        let mut messages: Vec<Message> =
            self.entries.values().flat_map(TemplateObject::validate).collect();
        for check in checks {
            messages.extend(check.run(&engine));
        }
        messages
    }
}
