//! Expansion engine behavior: rewriting to base instances, list expansion
//! modes, fault isolation, cycle and depth handling, and the checking
//! variant's per-instance validation.

use stanza_model::elements::{
    Argument, Instance, ListExpander, Parameter, Signature, Template,
};
use stanza_model::system::{Outcome, Severity};
use stanza_model::terms::{IdSource, Iri, Term};
use stanza_model::vocab;
use stanza_store::{CheckingExpander, Expander, NonCheckingExpander, TemplateStore};

fn ex(suffix: &str) -> String {
    format!("http://example.org/{suffix}")
}

fn greeting_template() -> Template {
    Template::new(
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
    )
}

fn library() -> TemplateStore {
    let mut store = TemplateStore::standard();
    store.add_standard_bases().expect("bases");
    store.add_template(greeting_template()).expect("greeting");
    store
        .add_template(Template::new(
            Signature::new(ex("Outer"), vec![Parameter::new(Term::variable("x"))]),
            vec![Instance::new(
                ex("Greeting"),
                vec![Argument::new(Term::variable("x"))],
            )],
        ))
        .expect("outer");
    store
}

fn collect(stream: impl Iterator<Item = Outcome<Instance>>) -> Vec<Outcome<Instance>> {
    stream.collect()
}

#[test]
fn base_instances_pass_through_unchanged() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(
        vocab::TRIPLE,
        vec![
            Argument::new(Term::iri(ex("s"))),
            Argument::new(Term::iri(ex("p"))),
            Argument::new(Term::iri(ex("o"))),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].value(), Some(&instance));
    assert!(outcomes[0].messages().is_empty());
}

#[test]
fn template_instances_expand_to_base_instances() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("Greeting"), vec![Argument::new(Term::iri(ex("alice")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    let expanded = outcomes[0].value().expect("expanded");
    assert_eq!(expanded.iri, Iri::from(vocab::TRIPLE));
    assert_eq!(expanded.arguments[0].term, Term::iri(ex("alice")));
    assert_eq!(expanded.arguments[2].term, Term::string_literal("hello"));
}

#[test]
fn expansion_follows_nested_templates() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("Outer"), vec![Argument::new(Term::iri(ex("bob")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    let expanded = outcomes[0].value().expect("expanded");
    assert_eq!(expanded.iri, Iri::from(vocab::TRIPLE));
    assert_eq!(expanded.arguments[0].term, Term::iri(ex("bob")));
}

#[test]
fn cross_expander_emits_one_instance_per_element() {
    let store = library();
    let ids = IdSource::new();
    let expander = NonCheckingExpander::new(&store);
    let values = Term::list(
        vec![Term::iri(ex("a")), Term::iri(ex("b")), Term::iri(ex("c"))],
        &ids,
    );
    let instance = Instance::with_list_expander(
        vocab::TRIPLE,
        ListExpander::Cross,
        vec![
            Argument::new(Term::iri(ex("s"))),
            Argument::new(Term::iri(ex("p"))),
            Argument::expandable(values),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 3);
    let objects: Vec<&Term> = outcomes
        .iter()
        .map(|o| &o.value().expect("row").arguments[2].term)
        .collect();
    assert_eq!(
        objects,
        vec![&Term::iri(ex("a")), &Term::iri(ex("b")), &Term::iri(ex("c"))]
    );
}

#[test]
fn zip_min_stops_at_the_shortest_list() {
    let store = library();
    let ids = IdSource::new();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::with_list_expander(
        vocab::NULLABLE_TRIPLE,
        ListExpander::ZipMin,
        vec![
            Argument::expandable(Term::list(
                vec![Term::iri(ex("a")), Term::iri(ex("b"))],
                &ids,
            )),
            Argument::new(Term::iri(ex("p"))),
            Argument::expandable(Term::list(vec![Term::iri(ex("x"))], &ids)),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    let row = outcomes[0].value().expect("row");
    assert_eq!(row.arguments[0].term, Term::iri(ex("a")));
    assert_eq!(row.arguments[2].term, Term::iri(ex("x")));
}

#[test]
fn zip_max_pads_short_lists_with_none() {
    let store = library();
    let ids = IdSource::new();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::with_list_expander(
        vocab::NULLABLE_TRIPLE,
        ListExpander::ZipMax,
        vec![
            Argument::expandable(Term::list(
                vec![Term::iri(ex("a")), Term::iri(ex("b"))],
                &ids,
            )),
            Argument::new(Term::iri(ex("p"))),
            Argument::expandable(Term::list(vec![Term::iri(ex("x"))], &ids)),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 2);
    let second = outcomes[1].value().expect("row");
    assert_eq!(second.arguments[0].term, Term::iri(ex("b")));
    assert!(second.arguments[2].term.is_none());
}

#[test]
fn flagged_variable_keeps_the_instance_unexpanded() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::with_list_expander(
        vocab::TRIPLE,
        ListExpander::Cross,
        vec![
            Argument::new(Term::iri(ex("s"))),
            Argument::new(Term::iri(ex("p"))),
            Argument::expandable(Term::variable("xs")),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    let kept = outcomes[0].value().expect("kept");
    assert!(kept.has_list_expander());
}

#[test]
fn defaults_fill_missing_argument_values() {
    let mut store = library();
    store
        .add_template(Template::new(
            Signature::new(
                ex("WithDefault"),
                vec![Parameter::new(Term::variable("x")).with_default(Term::iri(ex("d")))],
            ),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::iri(ex("s"))),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::variable("x")),
                ],
            )],
        ))
        .expect("add");
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("WithDefault"), vec![Argument::new(Term::none())]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    let expanded = outcomes[0].value().expect("expanded");
    assert_eq!(expanded.arguments[2].term, Term::iri(ex("d")));
}

#[test]
fn none_at_a_non_optional_parameter_discards_the_instance() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("Greeting"), vec![Argument::new(Term::none())]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    assert_eq!(outcomes[0].most_severe(), Some(Severity::Error));
    assert!(outcomes[0].messages()[0].text.contains("non-optional"));
}

#[test]
fn arity_mismatch_yields_a_single_error() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(
        ex("Greeting"),
        vec![
            Argument::new(Term::iri(ex("a"))),
            Argument::new(Term::iri(ex("b"))),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    let text = &outcomes[0].messages()[0].text;
    assert!(text.contains("wrong number of arguments"));
    assert!(text.contains('1') && text.contains('2'));
}

#[test]
fn cyclic_templates_fail_fatally_without_diverging() {
    let mut store = TemplateStore::standard();
    store.add_standard_bases().expect("bases");
    store
        .add_template(Template::new(
            Signature::new(ex("A"), vec![Parameter::new(Term::variable("x"))]),
            vec![Instance::new(
                ex("B"),
                vec![Argument::new(Term::variable("x"))],
            )],
        ))
        .expect("a");
    store
        .add_template(Template::new(
            Signature::new(ex("B"), vec![Parameter::new(Term::variable("x"))]),
            vec![Instance::new(
                ex("A"),
                vec![Argument::new(Term::variable("x"))],
            )],
        ))
        .expect("b");

    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("A"), vec![Argument::new(Term::iri(ex("v")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].most_severe(), Some(Severity::Fatal));
    assert!(outcomes[0].messages()[0].text.contains("depends on itself"));

    // An unrelated instance expands despite the cycle elsewhere.
    let triple = Instance::new(
        vocab::TRIPLE,
        vec![
            Argument::new(Term::iri(ex("s"))),
            Argument::new(Term::iri(ex("p"))),
            Argument::new(Term::iri(ex("o"))),
        ],
    );
    let ok = collect(expander.expand_instance(&triple));
    assert!(ok[0].has_value());
}

#[test]
fn depth_limit_aborts_deep_recursion() {
    let store = library();
    let expander = NonCheckingExpander::new(&store).with_max_depth(1);
    let instance = Instance::new(ex("Outer"), vec![Argument::new(Term::iri(ex("v")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    assert!(outcomes[0].messages()[0].text.contains("depth limit"));
}

#[test]
fn checking_expander_rejects_incompatible_argument_types() {
    let store = library();
    let expander = CheckingExpander::new(&store);
    // A literal where Triple expects an IRI subject.
    let instance = Instance::new(
        vocab::TRIPLE,
        vec![
            Argument::new(Term::string_literal("oops")),
            Argument::new(Term::iri(ex("p"))),
            Argument::new(Term::iri(ex("o"))),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    assert!(outcomes[0].messages()[0].text.contains("incompatible"));
}

#[test]
fn checking_expander_rejects_blank_at_non_blank_parameter() {
    let store = library();
    let expander = CheckingExpander::new(&store);
    let instance = Instance::new(
        vocab::TRIPLE,
        vec![
            Argument::new(Term::blank("b0")),
            Argument::new(Term::iri(ex("p"))),
            Argument::new(Term::iri(ex("o"))),
        ],
    );
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    assert!(outcomes[0].messages()[0].text.contains("non-blank"));
}

#[test]
fn checking_expander_reports_undefined_templates() {
    let store = library();
    let expander = CheckingExpander::new(&store);
    let instance = Instance::new(ex("Nowhere"), vec![Argument::new(Term::iri(ex("v")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].messages()[0].text.contains("missing definition"));
}

#[test]
fn a_bare_signature_cannot_be_expanded() {
    let mut store = library();
    store
        .add_signature(Signature::new(
            ex("SigOnly"),
            vec![Parameter::new(Term::variable("x"))],
        ))
        .expect("signature");

    let expander = NonCheckingExpander::new(&store);
    let instance = Instance::new(ex("SigOnly"), vec![Argument::new(Term::iri(ex("v")))]);
    let outcomes = collect(expander.expand_instance(&instance));
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].has_value());
    let text = &outcomes[0].messages()[0].text;
    // The entry exists, so this is not a missing definition.
    assert!(text.contains("signature without a definition"));
    assert!(!text.contains("missing definition"));
}

#[test]
fn expand_template_keeps_optional_flow_unexpanded() {
    let mut store = TemplateStore::standard();
    store.add_standard_bases().expect("bases");
    store
        .add_template(Template::new(
            Signature::new(ex("Inner"), vec![Parameter::new(Term::variable("i"))]),
            vec![Instance::new(
                vocab::TRIPLE,
                vec![
                    Argument::new(Term::iri(ex("s"))),
                    Argument::new(Term::iri(ex("p"))),
                    Argument::new(Term::variable("i")),
                ],
            )],
        ))
        .expect("inner");
    let from = Template::new(
        Signature::new(
            ex("From"),
            vec![Parameter::new(Term::variable("o")).optional()],
        ),
        vec![Instance::new(
            ex("Inner"),
            vec![Argument::new(Term::variable("o"))],
        )],
    );
    store.add_template(from.clone()).expect("from");

    let expander = NonCheckingExpander::new(&store);
    let outcome = expander.expand_template(&from);
    let expanded = outcome.value().expect("template");
    // ?o is optional in From but Inner's parameter is not; expanding now
    // would lose the instance a concrete argument could keep.
    assert_eq!(expanded.pattern().len(), 1);
    assert_eq!(expanded.pattern()[0].iri, Iri::from(ex("Inner")));
}

#[test]
fn expand_all_copies_bases_and_exhausts_template_bodies() {
    let store = library();
    let expander = NonCheckingExpander::new(&store);
    let outcome = expander.expand_all();
    let target = outcome.value().expect("store");

    assert!(target.contains_base(&Iri::from(vocab::TRIPLE)));
    let outer = target.template(&Iri::from(ex("Outer"))).expect("outer");
    assert_eq!(outer.pattern().len(), 1);
    assert_eq!(outer.pattern()[0].iri, Iri::from(vocab::TRIPLE));
}
