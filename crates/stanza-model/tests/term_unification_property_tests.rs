use proptest::prelude::*;
use stanza_model::substitution::Substitution;
use stanza_model::terms::{unify_terms, IdSource, Term};

fn name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9]{0,8}").unwrap()
}

fn leaf_term() -> impl Strategy<Value = Term> {
    prop_oneof![
        name().prop_map(|n| Term::iri(format!("http://example.org/{n}"))),
        name().prop_map(|n| Term::string_literal(n)),
        name().prop_map(|n| Term::blank(n)),
        name().prop_map(|n| Term::variable(n)),
        Just(Term::none()),
    ]
}

fn term() -> impl Strategy<Value = Term> {
    leaf_term().prop_recursive(3, 12, 3, |inner| {
        proptest::collection::vec(inner, 0..3)
            .prop_map(|items| Term::list(items, &IdSource::new()))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn a_variable_unifies_to_the_other_side(t in term(), n in name()) {
        let var = Term::variable(n);
        prop_assert_eq!(var.unify(&t), Some(t));
    }

    #[test]
    fn every_term_unifies_with_itself(t in term()) {
        prop_assert_eq!(unify_terms(&t, &t), Some(t.clone()));
    }

    #[test]
    fn unification_success_is_symmetric(a in term(), b in term()) {
        prop_assert_eq!(
            unify_terms(&a, &b).is_some(),
            unify_terms(&b, &a).is_some()
        );
    }

    #[test]
    fn equality_ignores_list_identity(items in proptest::collection::vec(leaf_term(), 0..4)) {
        let first = Term::list(items.clone(), &IdSource::new());
        let second = Term::list(items, &IdSource::new());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn intrinsic_list_types_track_emptiness(items in proptest::collection::vec(leaf_term(), 0..4)) {
        let list = Term::list(items.clone(), &IdSource::new());
        let shown = list.term_type().to_string();
        if items.is_empty() {
            prop_assert_eq!(shown, "List<Bot>");
        } else {
            prop_assert_eq!(shown, "NEList<LUB<Top>>");
        }
    }

    #[test]
    fn empty_substitution_only_renames_blanks(t in term()) {
        let ids = IdSource::new();
        let mut subst = Substitution::empty();
        let applied = subst.apply_term(&t, &ids);
        let had_blanks = t.to_string().contains("_:");
        if !had_blanks {
            prop_assert_eq!(applied, t);
        }
    }
}
