//! Typed error vocabulary for checking, expansion and store maintenance.
//!
//! Every variant knows its own [`Severity`], so errors convert uniformly into
//! diagnostic [`Message`]s at the reporting boundary.

use crate::system::{Message, Severity};
use crate::terms::Iri;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    // Structural
    #[error("wrong number of arguments: {instance} expects {expected} argument(s), but got {actual}")]
    ArityMismatch {
        instance: Iri,
        expected: usize,
        actual: usize,
    },

    #[error("instance of {instance} has a list expander but no argument marked for expansion")]
    ExpanderWithoutListArguments { instance: Iri },

    #[error("instance of {instance} has arguments marked for list expansion but no list expander")]
    ListArgumentsWithoutExpander { instance: Iri },

    #[error("argument {argument} to {instance} is marked for list expansion but is not a list")]
    ExpanderOnNonListArgument { instance: Iri, argument: String },

    #[error("no value for the non-optional parameter {parameter} in instance of {instance}")]
    MissingArgumentValue { instance: Iri, parameter: String },

    // Reference
    #[error("missing definition of {0}")]
    UndefinedTemplate(Iri),

    #[error("{0} is a signature without a definition and cannot be expanded")]
    SignatureOnly(Iri),

    // Type
    #[error("argument {argument} of type {argument_type} is incompatible with parameter {parameter} of type {parameter_type}")]
    IncompatibleArgumentType {
        argument: String,
        argument_type: String,
        parameter: String,
        parameter_type: String,
    },

    #[error("blank node {argument} given to the non-blank parameter {parameter}")]
    BlankArgumentToNonBlank { argument: String, parameter: String },

    // Graph shape
    #[error("parameter variable {variable} is declared more than once in {signature}")]
    DuplicateParameterVariable { signature: Iri, variable: String },

    #[error("parameter {parameter} of {template} is not used in the pattern")]
    UnusedParameter { template: Iri, parameter: String },

    // Cycles and limits
    #[error("template {0} transitively depends on itself")]
    CyclicDependency(Iri),

    #[error("expansion of {iri} exceeded the depth limit {limit}")]
    DepthLimitExceeded { iri: Iri, limit: u32 },

    // Store
    #[error("conflicting definitions of {0}")]
    ConflictingDefinition(Iri),
}

impl TemplateError {
    pub fn severity(&self) -> Severity {
        match self {
            TemplateError::DuplicateParameterVariable { .. }
            | TemplateError::UnusedParameter { .. } => Severity::Warning,
            TemplateError::CyclicDependency(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl From<TemplateError> for Message {
    fn from(err: TemplateError) -> Message {
        Message::new(err.severity(), err.to_string())
    }
}
