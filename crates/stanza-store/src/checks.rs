//! The static check catalogue run over a template store before expansion.
//!
//! Each [`Check`] pairs a [`Query`] with a message builder: every solution of
//! the query is one finding. The catalogue splits into two groups:
//! - checks that report missing definitions, skipped when a store is allowed
//!   to reference external templates
//! - checks over the definitions that are present
//!
//! Structural per-entry validation (duplicate parameter variables, expansion
//! modifier and flagged-argument agreement) lives on the model types and is
//! run by the store alongside this catalogue.

use crate::query::{Query, QueryEngine, Tuple};
use stanza_model::system::Message;
use tracing::debug;

pub struct Check {
    name: &'static str,
    query: Query,
    message: fn(&Tuple) -> Message,
}

impl Check {
    pub fn new(name: &'static str, query: Query, message: fn(&Tuple) -> Message) -> Self {
        Check {
            name,
            query,
            message,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All findings of this check, deduplicated in first-seen order.
    pub fn run(&self, engine: &QueryEngine<'_>) -> Vec<Message> {
        debug!(check = self.name, "running check");
        let mut messages: Vec<Message> = Vec::new();
        for tuple in self.query.eval(engine) {
            let message = (self.message)(&tuple);
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
        messages
    }
}

/// Checks that stay silent unless a used template has no store entry.
pub fn fails_on_missing_information_checks() -> Vec<Check> {
    vec![undefined_template()]
}

/// Checks over the definitions present in the store.
pub fn fails_on_error_checks() -> Vec<Check> {
    vec![
        wrong_number_of_arguments(),
        inconsistent_non_blank_flags(),
        blank_argument_to_non_blank(),
        expander_on_non_list_argument(),
        cyclic_dependency(),
        unused_parameter(),
        undefined_parameter(),
        conflicting_used_types(),
        incompatible_intrinsic_type(),
    ]
}

pub fn all_checks() -> Vec<Check> {
    let mut checks = fails_on_missing_information_checks();
    checks.extend(fails_on_error_checks());
    checks
}

fn undefined_template() -> Check {
    Check::new(
        "undefined_template",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::instance_iri("ins", "used"))
            .and(Query::is_undefined("used")),
        |t| {
            Message::error(format!(
                "missing definition of {}, used in the body of {}",
                t.show("used"),
                t.show("temp"),
            ))
        },
    )
}

fn wrong_number_of_arguments() -> Check {
    Check::new(
        "wrong_number_of_arguments",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::instance_iri("ins", "used"))
            .and(Query::parameters("used", "params"))
            .and(Query::length("params", "expected"))
            .and(Query::arguments("ins", "args"))
            .and(Query::length("args", "actual"))
            .and(Query::not_equals("expected", "actual")),
        |t| {
            Message::error(format!(
                "wrong number of arguments: the instance {} in the body of {} has {} argument(s), \
                 but {} expects {}",
                t.show("ins"),
                t.show("temp"),
                t.show("actual"),
                t.show("used"),
                t.show("expected"),
            ))
        },
    )
}

/// A parameter that admits blank nodes flows into a non-blank position.
fn inconsistent_non_blank_flags() -> Check {
    Check::new(
        "inconsistent_non_blank_flags",
        Query::template("temp")
            .and(Query::parameters("temp", "params"))
            .and(Query::index("params", "index", "val"))
            .and(Query::not(Query::is_non_blank("params", "index")))
            .and(Query::body_instance("temp", "ins"))
            .and(Query::argument_index("ins", "index2", "val"))
            .and(Query::instance_iri("ins", "used"))
            .and(Query::parameters("used", "params2"))
            .and(Query::is_non_blank("params2", "index2")),
        |t| {
            Message::warning(format!(
                "parameter {} ({}) of {} admits blank nodes, but is passed to the \
                 non-blank parameter {} of {}",
                t.show("val"),
                t.end_user_index("index"),
                t.show("temp"),
                t.end_user_index("index2"),
                t.show("used"),
            ))
        },
    )
}

fn blank_argument_to_non_blank() -> Check {
    Check::new(
        "blank_argument_to_non_blank",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::argument_index("ins", "index", "arg"))
            .and(Query::is_blank("arg"))
            .and(Query::instance_iri("ins", "used"))
            .and(Query::parameters("used", "params"))
            .and(Query::is_non_blank("params", "index")),
        |t| {
            Message::error(format!(
                "blank node {} is passed to the non-blank parameter {} of {} \
                 in the body of {}",
                t.show("arg"),
                t.end_user_index("index"),
                t.show("used"),
                t.show("temp"),
            ))
        },
    )
}

fn expander_on_non_list_argument() -> Check {
    Check::new(
        "expander_on_non_list_argument",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::arguments("ins", "args"))
            .and(Query::has_list_expander("args", "index"))
            .and(Query::index("args", "index", "arg"))
            .and(Query::is_not_none("arg"))
            .and(Query::term_type("arg", "argtype"))
            .and(Query::not(Query::is_list_type("argtype"))),
        |t| {
            Message::error(format!(
                "argument {} ({}) in the instance {} of {} is marked for list \
                 expansion, but its type {} is not a list type",
                t.show("arg"),
                t.end_user_index("index"),
                t.show("ins"),
                t.show("temp"),
                t.show("argtype"),
            ))
        },
    )
}

fn cyclic_dependency() -> Check {
    Check::new(
        "cyclic_dependency",
        Query::template("temp").and(Query::depends_transitive("temp", "temp")),
        |t| {
            Message::error(format!(
                "template {} transitively depends on itself",
                t.show("temp"),
            ))
        },
    )
}

fn unused_parameter() -> Check {
    Check::new(
        "unused_parameter",
        Query::template("temp")
            .and(Query::parameter_index("temp", "index", "val"))
            .and(Query::not(
                Query::body_instance("temp", "ins")
                    .and(Query::argument_index("ins", "index2", "arg"))
                    .and(Query::has_occurrence_at("arg", "level", "val")),
            )),
        |t| {
            Message::warning(format!(
                "parameter {} ({}) of {} does not occur in the template body",
                t.show("val"),
                t.end_user_index("index"),
                t.show("temp"),
            ))
        },
    )
}

/// A variable occurring in the body that is not declared as a parameter.
fn undefined_parameter() -> Check {
    Check::new(
        "undefined_parameter",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::argument_index("ins", "index", "arg"))
            .and(Query::has_occurrence_at("arg", "level", "val"))
            .and(Query::is_variable("val"))
            .and(Query::not(Query::parameter_index("temp", "index2", "val"))),
        |t| {
            Message::error(format!(
                "variable {} occurs in the body of {}, but is not one of its parameters",
                t.show("val"),
                t.show("temp"),
            ))
        },
    )
}

/// One term used at two positions whose types are unrelated in the lattice.
fn conflicting_used_types() -> Check {
    Check::new(
        "conflicting_used_types",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins1"))
            .and(Query::argument_index("ins1", "index1", "arg1"))
            .and(Query::has_occurrence_at("arg1", "level1", "val"))
            .and(Query::is_not_none("val"))
            .and(Query::used_as_type("ins1", "index1", "level1", "type1"))
            .and(Query::body_instance("temp", "ins2"))
            .and(Query::argument_index("ins2", "index2", "arg2"))
            .and(Query::has_occurrence_at("arg2", "level2", "val"))
            .and(Query::used_as_type("ins2", "index2", "level2", "type2"))
            .and(Query::remove_symmetry("type1", "type2"))
            .and(Query::not(Query::is_subtype_of("type1", "type2")))
            .and(Query::not(Query::is_subtype_of("type2", "type1"))),
        |t| {
            Message::error(format!(
                "conflicting use of {} in the body of {}: used both as {} and as {}",
                t.show("val"),
                t.show("temp"),
                t.show("type1"),
                t.show("type2"),
            ))
        },
    )
}

/// A term whose own type is incompatible with the type it is used as.
fn incompatible_intrinsic_type() -> Check {
    Check::new(
        "incompatible_intrinsic_type",
        Query::template("temp")
            .and(Query::body_instance("temp", "ins"))
            .and(Query::argument_index("ins", "index", "arg"))
            .and(Query::has_occurrence_at("arg", "level", "val"))
            .and(Query::is_not_none("val"))
            .and(Query::term_type("val", "valtype"))
            .and(Query::used_as_type("ins", "index", "level", "used"))
            .and(Query::not(Query::is_compatible_with("valtype", "used"))),
        |t| {
            Message::error(format!(
                "the term {} of type {} is used as the incompatible type {} in the \
                 instance {} of {}",
                t.show("val"),
                t.show("valtype"),
                t.show("used"),
                t.show("ins"),
                t.show("temp"),
            ))
        },
    )
}
