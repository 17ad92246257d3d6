//! Template library elements: parameters, signatures, templates, instances,
//! arguments and the three list expanders.

use crate::errors::TemplateError;
use crate::system::Message;
use crate::terms::{Iri, Term, TermKind};
use crate::types::Type;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declared parameter: a variable term with modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub term: Term,
    pub optional: bool,
    pub non_blank: bool,
    pub default_value: Option<Term>,
}

impl Parameter {
    /// A plain required parameter. The term is forced to be a variable.
    pub fn new(term: Term) -> Self {
        Parameter {
            term: term.with_variable(true),
            optional: false,
            non_blank: false,
            default_value: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn non_blank(mut self) -> Self {
        self.non_blank = true;
        self
    }

    pub fn with_default(mut self, default_value: Term) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn is_defaulted(&self) -> bool {
        self.default_value.is_some()
    }

    pub fn param_type(&self) -> &Type {
        self.term.term_type()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "?")?;
        }
        if self.non_blank {
            write!(f, "!")?;
        }
        write!(f, "{} : {}", self.term, self.term.term_type())?;
        if let Some(d) = &self.default_value {
            write!(f, " = {d}")?;
        }
        Ok(())
    }
}

/// A named parameter list, possibly annotated with instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub iri: Iri,
    pub parameters: Vec<Parameter>,
    pub annotations: Vec<Instance>,
}

impl Signature {
    pub fn new(iri: impl Into<Iri>, parameters: Vec<Parameter>) -> Self {
        Signature {
            iri: iri.into(),
            parameters,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<Instance>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Reports duplicate parameter variables.
    pub fn validate(&self) -> Vec<Message> {
        let mut seen = AHashSet::new();
        let mut messages = Vec::new();
        for param in &self.parameters {
            if !seen.insert(&param.term) {
                messages.push(Message::from(TemplateError::DuplicateParameterVariable {
                    signature: self.iri.clone(),
                    variable: param.term.to_string(),
                }));
            }
        }
        messages
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.iri)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "]")
    }
}

/// A signature with no body; expansion stops here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTemplate {
    pub signature: Signature,
}

impl BaseTemplate {
    pub fn new(signature: Signature) -> Self {
        BaseTemplate { signature }
    }

    pub fn iri(&self) -> &Iri {
        &self.signature.iri
    }
}

/// A signature plus a pattern of instances defining it.
///
/// The pattern is rewritten on construction: every occurrence of a parameter
/// variable, also inside nested lists, is flagged as a variable and takes the
/// parameter's declared type. Variables are typed by declaration, not by
/// first use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    signature: Signature,
    pattern: Vec<Instance>,
}

impl Template {
    pub fn new(signature: Signature, pattern: Vec<Instance>) -> Self {
        let declared: AHashMap<Term, Type> = signature
            .parameters
            .iter()
            .map(|p| (p.term.clone(), p.term.term_type().clone()))
            .collect();
        let pattern = pattern
            .into_iter()
            .map(|ins| retype_instance(ins, &declared))
            .collect();
        Template { signature, pattern }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn iri(&self) -> &Iri {
        &self.signature.iri
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.signature.parameters
    }

    pub fn pattern(&self) -> &[Instance] {
        &self.pattern
    }

    /// Signature validation plus per-instance modifier validation.
    pub fn validate(&self) -> Vec<Message> {
        let mut messages = self.signature.validate();
        for ins in &self.pattern {
            messages.extend(ins.validate());
        }
        messages
    }
}

fn retype_instance(instance: Instance, declared: &AHashMap<Term, Type>) -> Instance {
    let arguments = instance
        .arguments
        .into_iter()
        .map(|arg| Argument {
            term: retype_term(arg.term, declared),
            list_expander: arg.list_expander,
        })
        .collect();
    Instance {
        arguments,
        ..instance
    }
}

fn retype_term(term: Term, declared: &AHashMap<Term, Type>) -> Term {
    if let Some(ty) = declared.get(&term) {
        return term.with_type(ty.clone()).with_variable(true);
    }
    match term.kind() {
        TermKind::List { id, items } => {
            let id = *id;
            let items = items
                .iter()
                .map(|item| retype_term(item.clone(), declared))
                .collect();
            Term::list_with_id(items, id)
        }
        _ => term,
    }
}

/// An argument of an instance; `list_expander` marks it for expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub term: Term,
    pub list_expander: bool,
}

impl Argument {
    pub fn new(term: Term) -> Self {
        Argument {
            term,
            list_expander: false,
        }
    }

    pub fn expandable(term: Term) -> Self {
        Argument {
            term,
            list_expander: true,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list_expander {
            write!(f, "++")?;
        }
        write!(f, "{}", self.term)
    }
}

/// The three list expansion modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListExpander {
    Cross,
    ZipMin,
    ZipMax,
}

impl ListExpander {
    /// Expands `arguments` into rows of unflagged arguments.
    ///
    /// Flagged list arguments contribute their elements; a flagged `none`
    /// behaves as the singleton `(none)`. Unflagged arguments pass through
    /// once per row. Callers must have checked that flagged terms are lists
    /// or `none`; any other flagged term passes through as a singleton.
    pub fn expand(&self, arguments: &[Argument]) -> Vec<Vec<Argument>> {
        match self {
            ListExpander::Cross => cross(arguments),
            ListExpander::ZipMin => zip(arguments, false),
            ListExpander::ZipMax => zip(arguments, true),
        }
    }
}

fn elements(argument: &Argument) -> Vec<Term> {
    match argument.term.items() {
        Some(items) => items.to_vec(),
        None => vec![argument.term.clone()],
    }
}

fn cross(arguments: &[Argument]) -> Vec<Vec<Argument>> {
    let mut rows: Vec<Vec<Argument>> = vec![Vec::new()];
    for arg in arguments {
        if !arg.list_expander {
            for row in &mut rows {
                row.push(arg.clone());
            }
        } else {
            let values = elements(arg);
            let mut next = Vec::with_capacity(rows.len() * values.len());
            for row in rows {
                for value in &values {
                    let mut extended = row.clone();
                    extended.push(Argument::new(value.clone()));
                    next.push(extended);
                }
            }
            rows = next;
        }
    }
    rows
}

fn zip(arguments: &[Argument], pad_to_max: bool) -> Vec<Vec<Argument>> {
    let expanded: Vec<Option<Vec<Term>>> = arguments
        .iter()
        .map(|arg| arg.list_expander.then(|| elements(arg)))
        .collect();
    let lengths = expanded.iter().flatten().map(Vec::len);
    let rows = if pad_to_max {
        lengths.max().unwrap_or(0)
    } else {
        lengths.min().unwrap_or(0)
    };
    (0..rows)
        .map(|i| {
            arguments
                .iter()
                .zip(&expanded)
                .map(|(arg, values)| match values {
                    None => arg.clone(),
                    Some(values) => {
                        Argument::new(values.get(i).cloned().unwrap_or_else(Term::none))
                    }
                })
                .collect()
        })
        .collect()
}

impl fmt::Display for ListExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListExpander::Cross => "cross",
            ListExpander::ZipMin => "zipMin",
            ListExpander::ZipMax => "zipMax",
        };
        f.write_str(name)
    }
}

/// A use of a template, base template or signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub iri: Iri,
    pub arguments: Vec<Argument>,
    pub list_expander: Option<ListExpander>,
}

impl Instance {
    pub fn new(iri: impl Into<Iri>, arguments: Vec<Argument>) -> Self {
        Instance {
            iri: iri.into(),
            arguments,
            list_expander: None,
        }
    }

    pub fn with_list_expander(
        iri: impl Into<Iri>,
        expander: ListExpander,
        arguments: Vec<Argument>,
    ) -> Self {
        Instance {
            iri: iri.into(),
            arguments,
            list_expander: Some(expander),
        }
    }

    pub fn has_list_expander(&self) -> bool {
        self.list_expander.is_some()
    }

    /// A list expander must be present iff at least one argument is flagged.
    pub fn validate(&self) -> Vec<Message> {
        let flagged = self.arguments.iter().any(|a| a.list_expander);
        match (&self.list_expander, flagged) {
            (Some(_), false) => vec![Message::from(
                TemplateError::ExpanderWithoutListArguments {
                    instance: self.iri.clone(),
                },
            )],
            (None, true) => vec![Message::from(TemplateError::ListArgumentsWithoutExpander {
                instance: self.iri.clone(),
            })],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(expander) = &self.list_expander {
            write!(f, "{expander} | ")?;
        }
        write!(f, "{}(", self.iri)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}
