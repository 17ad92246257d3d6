//! Recursive instance expansion.
//!
//! Expansion rewrites an instance into the instances of its template's body,
//! under the substitution binding parameters to arguments, until only base
//! template instances remain. Each step is lazy and each branch is isolated:
//! a diagnostic aborts only the branch that produced it.
//!
//! [`NonCheckingExpander`] trusts its input (fast path for already-verified
//! libraries); [`CheckingExpander`] validates every instance against its
//! signature before expanding it.

use crate::store::{TemplateObject, TemplateStore};
use stanza_model::elements::{Instance, Signature, Template};
use stanza_model::errors::TemplateError;
use stanza_model::substitution::Substitution;
use stanza_model::system::{Message, Outcome, OutcomeStream};
use stanza_model::terms::{IdSource, Iri, Term};
use tracing::debug;

pub trait Expander {
    fn store(&self) -> &TemplateStore;

    fn ids(&self) -> &IdSource;

    /// Depth limit for template-body recursion; `None` means unbounded.
    fn max_depth(&self) -> Option<u32>;

    /// Validation run on every instance before it is expanded. The default
    /// accepts everything.
    fn check_instance(&self, _instance: &Instance) -> Vec<Message> {
        Vec::new()
    }

    /// Expands one instance to exhaustion.
    fn expand_instance<'a>(&'a self, instance: &Instance) -> OutcomeStream<'a, Instance>
    where
        Self: Sized,
    {
        expand_rec(self, instance.clone(), Vec::new(), 0)
    }

    /// Expands every body instance of `template` to exhaustion, keeping
    /// instances whose expansion must wait for concrete arguments.
    fn expand_template(&self, template: &Template) -> Outcome<Template>
    where
        Self: Sized,
    {
        let from = template.signature();
        let ancestors = vec![template.iri().clone()];
        let expanded = template
            .pattern()
            .iter()
            .flat_map(|ins| expand_in_template(self, ins.clone(), from, ancestors.clone(), 0));
        Outcome::aggregate(expanded)
            .map(|pattern| Template::new(template.signature().clone(), pattern))
    }

    /// Expands every template of the store into a new store holding the same
    /// base templates and depth-exhausted template bodies.
    fn expand_all(&self) -> Outcome<TemplateStore>
    where
        Self: Sized,
    {
        let source = self.store();
        let mut target = TemplateStore::new(source.registry_arc());
        let mut messages = Vec::new();
        for base in source.all_base_templates() {
            if let Err(e) = target.add_base_template(base.clone()) {
                messages.push(Message::from(e));
            }
        }
        for template in source.all_templates() {
            let (value, mut msgs) = self.expand_template(template).into_parts();
            messages.append(&mut msgs);
            if let Some(expanded) = value {
                if let Err(e) = target.add_template(expanded) {
                    messages.push(Message::from(e));
                }
            }
        }
        Outcome::ok_with(target, messages)
    }
}

/// Expands instances without validating them first.
#[derive(Debug)]
pub struct NonCheckingExpander<'s> {
    store: &'s TemplateStore,
    ids: IdSource,
    max_depth: Option<u32>,
}

impl<'s> NonCheckingExpander<'s> {
    pub fn new(store: &'s TemplateStore) -> Self {
        NonCheckingExpander {
            store,
            ids: IdSource::new(),
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

impl Expander for NonCheckingExpander<'_> {
    fn store(&self) -> &TemplateStore {
        self.store
    }

    fn ids(&self) -> &IdSource {
        &self.ids
    }

    fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }
}

/// Validates every instance against its signature before expanding it.
#[derive(Debug)]
pub struct CheckingExpander<'s> {
    store: &'s TemplateStore,
    ids: IdSource,
    max_depth: Option<u32>,
}

impl<'s> CheckingExpander<'s> {
    pub fn new(store: &'s TemplateStore) -> Self {
        CheckingExpander {
            store,
            ids: IdSource::new(),
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

impl Expander for CheckingExpander<'_> {
    fn store(&self) -> &TemplateStore {
        self.store
    }

    fn ids(&self) -> &IdSource {
        &self.ids
    }

    fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }

    fn check_instance(&self, instance: &Instance) -> Vec<Message> {
        let signature = match self.store.get(&instance.iri) {
            None => {
                return vec![Message::from(TemplateError::UndefinedTemplate(
                    instance.iri.clone(),
                ))]
            }
            Some(TemplateObject::Signature(_)) => {
                return vec![Message::from(TemplateError::SignatureOnly(
                    instance.iri.clone(),
                ))]
            }
            Some(object) => object.signature(),
        };
        check_argument_list(self.store, instance, signature)
    }
}

fn check_argument_list(
    store: &TemplateStore,
    instance: &Instance,
    signature: &Signature,
) -> Vec<Message> {
    let mut messages = Vec::new();

    let arity = signature.parameters.len();
    let actual = instance.arguments.len();
    if actual != arity {
        messages.push(Message::from(TemplateError::ArityMismatch {
            instance: instance.iri.clone(),
            expected: arity,
            actual,
        }));
    }

    let registry = store.registry();
    for (argument, parameter) in instance.arguments.iter().zip(&signature.parameters) {
        let mut arg_type = argument.term.term_type().clone();
        if argument.list_expander {
            match arg_type.inner() {
                Some(inner) => arg_type = inner.clone(),
                None => {
                    messages.push(Message::from(TemplateError::ExpanderOnNonListArgument {
                        instance: instance.iri.clone(),
                        argument: argument.to_string(),
                    }));
                    continue;
                }
            }
        }

        let param_type = parameter.param_type();
        if !arg_type.is_compatible_with(param_type, registry) {
            messages.push(Message::from(TemplateError::IncompatibleArgumentType {
                argument: argument.to_string(),
                argument_type: arg_type.to_string(),
                parameter: parameter.to_string(),
                parameter_type: param_type.to_string(),
            }));
        }

        if argument.term.is_blank() && parameter.non_blank {
            messages.push(Message::from(TemplateError::BlankArgumentToNonBlank {
                argument: argument.to_string(),
                parameter: parameter.to_string(),
            }));
        }
    }

    messages
}

fn once<'a>(outcome: Outcome<Instance>) -> OutcomeStream<'a, Instance> {
    Box::new(std::iter::once(outcome))
}

fn fail<'a>(error: TemplateError) -> OutcomeStream<'a, Instance> {
    once(Outcome::fail(Message::from(error)))
}

/// A `none` argument at a non-optional, non-defaulted position makes the
/// whole instance meaningless; the instance is dropped with a diagnostic.
fn discarded_at(instance: &Instance, signature: &Signature) -> Option<TemplateError> {
    instance
        .arguments
        .iter()
        .zip(&signature.parameters)
        .find(|(arg, param)| arg.term.is_none() && !param.optional && !param.is_defaulted())
        .map(|(_, param)| TemplateError::MissingArgumentValue {
            instance: instance.iri.clone(),
            parameter: param.term.to_string(),
        })
}

/// Terminal cases: a base-template instance without a modifier, or a list
/// expander over a variable or blank (nothing to enumerate yet).
fn cannot_expand(store: &TemplateStore, instance: &Instance) -> bool {
    if store.contains_base(&instance.iri) && !instance.has_list_expander() {
        return true;
    }
    instance.has_list_expander()
        && instance
            .arguments
            .iter()
            .any(|arg| arg.list_expander && (arg.term.is_variable() || arg.term.is_blank()))
}

fn expand_rec<'a, E: Expander>(
    expander: &'a E,
    instance: Instance,
    ancestors: Vec<Iri>,
    depth: u32,
) -> OutcomeStream<'a, Instance> {
    let errors = expander.check_instance(&instance);
    if errors.iter().any(Message::is_failure) {
        return once(Outcome::fail_with(errors));
    }

    let store = expander.store();
    let signature = match store.get(&instance.iri) {
        Some(TemplateObject::Base(b)) => &b.signature,
        Some(TemplateObject::Template(t)) => t.signature(),
        Some(TemplateObject::Signature(_)) => {
            return fail(TemplateError::SignatureOnly(instance.iri.clone()))
        }
        None => return fail(TemplateError::UndefinedTemplate(instance.iri.clone())),
    };

    if let Some(error) = discarded_at(&instance, signature) {
        return fail(error);
    }
    if cannot_expand(store, &instance) {
        return once(Outcome::ok(instance));
    }

    if let Some(list_expander) = instance.list_expander {
        debug!(instance = %instance, "expanding list modifier");
        let rows = list_expander.expand(&instance.arguments);
        let iri = instance.iri;
        return Box::new(rows.into_iter().flat_map(move |arguments| {
            expand_rec(
                expander,
                Instance::new(iri.clone(), arguments),
                ancestors.clone(),
                depth,
            )
        }));
    }

    // A template instance from here on.
    if ancestors.contains(&instance.iri) {
        return fail(TemplateError::CyclicDependency(instance.iri.clone()));
    }
    if let Some(limit) = expander.max_depth() {
        if depth >= limit {
            return fail(TemplateError::DepthLimitExceeded {
                iri: instance.iri.clone(),
                limit,
            });
        }
    }
    let template = match store.template(&instance.iri) {
        Some(t) => t,
        None => return fail(TemplateError::SignatureOnly(instance.iri.clone())),
    };

    let substitution = Substitution::from_arguments(
        &instance.iri,
        &instance.arguments,
        template.parameters(),
        expander.ids(),
    );
    let mut substitution = match substitution {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    debug!(instance = %instance, "expanding template instance");
    let body = substitution.apply_instances(template.pattern(), expander.ids());
    let mut ancestors = ancestors;
    ancestors.push(instance.iri.clone());
    Box::new(body.into_iter().flat_map(move |ins| {
        expand_rec(expander, ins, ancestors.clone(), depth + 1)
    }))
}

/// True when `instance`, used inside the body of `from`, must be kept as is:
/// it is terminal anyway, or one of its arguments is a variable that is
/// optional in `from` but flows into a non-optional position of `to`, so
/// expanding it now could drop instances a concrete argument would keep.
fn keep_unexpanded(
    store: &TemplateStore,
    instance: &Instance,
    from: &Signature,
    to: &Signature,
) -> bool {
    if cannot_expand(store, instance) {
        return true;
    }
    instance
        .arguments
        .iter()
        .zip(&to.parameters)
        .any(|(arg, to_param)| {
            arg.term.is_variable() && !to_param.optional && is_optional_variable(from, &arg.term)
        })
}

fn is_optional_variable(signature: &Signature, term: &Term) -> bool {
    signature
        .parameters
        .iter()
        .any(|p| p.optional && p.term == *term)
}

fn expand_in_template<'a, E: Expander>(
    expander: &'a E,
    instance: Instance,
    from: &'a Signature,
    ancestors: Vec<Iri>,
    depth: u32,
) -> OutcomeStream<'a, Instance> {
    let store = expander.store();
    let to = match store.get(&instance.iri) {
        None => return fail(TemplateError::UndefinedTemplate(instance.iri.clone())),
        Some(TemplateObject::Signature(_)) => {
            return fail(TemplateError::SignatureOnly(instance.iri.clone()))
        }
        Some(object) => object.signature(),
    };

    if keep_unexpanded(store, &instance, from, to) {
        return once(Outcome::ok(instance));
    }
    if let Some(error) = discarded_at(&instance, to) {
        return fail(error);
    }

    if let Some(list_expander) = instance.list_expander {
        let rows = list_expander.expand(&instance.arguments);
        let iri = instance.iri;
        return Box::new(rows.into_iter().flat_map(move |arguments| {
            expand_in_template(
                expander,
                Instance::new(iri.clone(), arguments),
                from,
                ancestors.clone(),
                depth,
            )
        }));
    }

    if store.contains_base(&instance.iri) {
        return once(Outcome::ok(instance));
    }

    if ancestors.contains(&instance.iri) {
        return fail(TemplateError::CyclicDependency(instance.iri.clone()));
    }
    if let Some(limit) = expander.max_depth() {
        if depth >= limit {
            return fail(TemplateError::DepthLimitExceeded {
                iri: instance.iri.clone(),
                limit,
            });
        }
    }
    let template = match store.template(&instance.iri) {
        Some(t) => t,
        None => return fail(TemplateError::SignatureOnly(instance.iri.clone())),
    };
    let substitution = Substitution::from_arguments(
        &instance.iri,
        &instance.arguments,
        template.parameters(),
        expander.ids(),
    );
    let mut substitution = match substitution {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let body = substitution.apply_instances(template.pattern(), expander.ids());
    let mut ancestors = ancestors;
    ancestors.push(instance.iri.clone());
    Box::new(body.into_iter().flat_map(move |ins| {
        expand_in_template(expander, ins, from, ancestors.clone(), depth + 1)
    }))
}
