//! The static check catalogue, exercised one finding at a time, plus the
//! silence of a well-formed library.

use stanza_model::elements::{
    Argument, Instance, ListExpander, Parameter, Signature, Template,
};
use stanza_model::system::{Message, Severity};
use stanza_model::terms::Term;
use stanza_model::types::Type;
use stanza_model::vocab;
use stanza_store::{fails_on_error_checks, fails_on_missing_information_checks, TemplateStore};

fn ex(suffix: &str) -> String {
    format!("http://example.org/{suffix}")
}

fn base_store() -> TemplateStore {
    let mut store = TemplateStore::standard();
    store.add_standard_bases().expect("bases");
    store
}

fn run_error_checks(store: &TemplateStore) -> Vec<Message> {
    store.check_templates_with(&fails_on_error_checks())
}

#[test]
fn a_well_formed_library_is_silent() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("Greeting"),
                vec![Parameter::new(Term::variable("who")).non_blank()],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::variable("who")),
                    Argument::new(Term::iri(ex("says"))),
                    Argument::new(Term::string_literal("hello")),
                ],
            )],
        ))
        .expect("add");
    let messages = store.check_templates();
    assert!(messages.is_empty(), "unexpected findings: {messages:?}");
}

#[test]
fn undefined_template_is_reported_by_the_missing_information_group() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(ex("Outer"), vec![Parameter::new(Term::variable("x"))]),
            vec![Instance::new(
                ex("Nowhere"),
                vec![Argument::new(Term::variable("x"))],
            )],
        ))
        .expect("add");

    let missing = store.check_templates_with(&fails_on_missing_information_checks());
    assert_eq!(missing.len(), 1);
    assert!(missing[0].text.contains("missing definition"));
    assert!(missing[0].text.contains(&ex("Nowhere")));

    // The error group tolerates external references.
    assert!(run_error_checks(&store).is_empty());
}

#[test]
fn wrong_number_of_arguments_is_reported() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("Short"),
                vec![Parameter::new(Term::variable("s")).non_blank()],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::variable("s")),
                    Argument::new(Term::iri(ex("p"))),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("wrong number of arguments"));
    assert!(messages[0].text.contains('3') && messages[0].text.contains('2'));
}

#[test]
fn blank_admitting_parameter_at_non_blank_position_is_a_warning() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(ex("Loose"), vec![Parameter::new(Term::variable("s"))]),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::variable("s")),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::iri(ex("o"))),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert!(messages[0].text.contains("non-blank"));
}

#[test]
fn blank_argument_at_non_blank_parameter_is_an_error() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("Blanked"),
                vec![Parameter::new(Term::variable("o"))],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::blank("node")),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::variable("o")),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Error);
    assert!(messages[0].text.contains("blank node"));
}

#[test]
fn list_expander_on_a_non_list_argument_is_reported() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("BadCross"),
                vec![Parameter::new(Term::variable("s")).non_blank()],
            ),
            vec![Instance::with_list_expander(
                vocab::TRIPLE,
                ListExpander::Cross,
                vec![
                    Argument::new(Term::variable("s")),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::expandable(Term::string_literal("not-a-list")),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("not a list type"));
}

#[test]
fn cyclic_dependencies_are_reported_for_every_member() {
    let mut store = base_store();
    for (name, uses) in [("A", "B"), ("B", "A")] {
        store
            .add_template(Template::new(
                Signature::new(ex(name), vec![Parameter::new(Term::variable("x"))]),
                vec![Instance::new(
                    ex(uses),
                    vec![Argument::new(Term::variable("x"))],
                )],
            ))
            .expect("add");
    }
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|m| m.text.contains("depends on itself")));
}

#[test]
fn unused_parameters_are_warnings() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("Wasteful"),
                vec![
                    Parameter::new(Term::variable("s")).non_blank(),
                    Parameter::new(Term::variable("unused")),
                ],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::variable("s")),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::iri(ex("o"))),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert!(messages[0].text.contains("does not occur"));
    assert!(messages[0].text.contains("unused"));
}

#[test]
fn body_variables_missing_from_the_parameter_list_are_reported() {
    let mut store = base_store();
    store
        .add_template(Template::new(
            Signature::new(
                ex("Ghostly"),
                vec![Parameter::new(Term::variable("s")).non_blank()],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::variable("s")),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::variable("ghost")),
                ],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("ghost"));
    assert!(messages[0].text.contains("not one of its parameters"));
}

#[test]
fn one_variable_used_at_two_unrelated_types_is_reported() {
    let mut store = base_store();
    store
        .add_signature(Signature::new(
            ex("WantsInt"),
            vec![Parameter::new(Term::typed_variable(
                "i",
                Type::basic(vocab::XSD_INTEGER),
            ))],
        ))
        .expect("int");
    store
        .add_signature(Signature::new(
            ex("WantsString"),
            vec![Parameter::new(Term::typed_variable(
                "s",
                Type::basic(vocab::XSD_STRING),
            ))],
        ))
        .expect("string");
    store
        .add_template(Template::new(
            Signature::new(ex("Torn"), vec![Parameter::new(Term::variable("x"))]),
            vec![
                Instance::new(ex("WantsInt"), vec![Argument::new(Term::variable("x"))]),
                Instance::new(ex("WantsString"), vec![Argument::new(Term::variable("x"))]),
            ],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("conflicting use"));
}

#[test]
fn a_term_incompatible_with_its_use_site_is_reported() {
    let mut store = base_store();
    store
        .add_signature(Signature::new(
            ex("WantsInt"),
            vec![Parameter::new(Term::typed_variable(
                "i",
                Type::basic(vocab::XSD_INTEGER),
            ))],
        ))
        .expect("int");
    store
        .add_template(Template::new(
            Signature::new(ex("Mismatched"), Vec::new()),
            vec![Instance::new(
                ex("WantsInt"),
                vec![Argument::new(Term::string_literal("five"))],
            )],
        ))
        .expect("add");
    let messages = run_error_checks(&store);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("incompatible"));
}

#[test]
fn duplicate_parameter_variables_surface_through_validation() {
    let mut store = base_store();
    store
        .add_signature(Signature::new(
            ex("Doubled"),
            vec![
                Parameter::new(Term::variable("x")),
                Parameter::new(Term::variable("x")),
            ],
        ))
        .expect("add");
    let messages = store.check_templates();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].severity, Severity::Warning);
    assert!(messages[0].text.contains("declared more than once"));
}
