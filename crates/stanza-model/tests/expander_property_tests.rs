use proptest::prelude::*;
use stanza_model::elements::{Argument, ListExpander};
use stanza_model::terms::{IdSource, Term};

fn iri_items(len: usize) -> Vec<Term> {
    (0..len)
        .map(|i| Term::iri(format!("http://example.org/e{i}")))
        .collect()
}

fn flagged_list(len: usize, ids: &IdSource) -> Argument {
    Argument::expandable(Term::list(iri_items(len), ids))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn cross_emits_the_product_of_flagged_lengths(m in 1usize..6, n in 1usize..6) {
        let ids = IdSource::new();
        let args = vec![
            Argument::new(Term::iri("http://example.org/fixed")),
            flagged_list(m, &ids),
            flagged_list(n, &ids),
        ];
        let rows = ListExpander::Cross.expand(&args);
        prop_assert_eq!(rows.len(), m * n);
        for row in &rows {
            // Non-flagged arguments pass through once per row, unflagged.
            prop_assert_eq!(row.len(), args.len());
            prop_assert_eq!(&row[0].term, &args[0].term);
            prop_assert!(row.iter().all(|a| !a.list_expander));
        }
    }

    #[test]
    fn zip_min_truncates_to_the_shortest_flagged_list(m in 1usize..6, n in 1usize..6) {
        let ids = IdSource::new();
        let args = vec![flagged_list(m, &ids), flagged_list(n, &ids)];
        let rows = ListExpander::ZipMin.expand(&args);
        prop_assert_eq!(rows.len(), m.min(n));
        for row in &rows {
            prop_assert!(row.iter().all(|a| !a.term.is_none()));
        }
    }

    #[test]
    fn zip_max_pads_the_shorter_flagged_list_with_none(m in 1usize..6, n in 1usize..6) {
        let ids = IdSource::new();
        let args = vec![flagged_list(m, &ids), flagged_list(n, &ids)];
        let rows = ListExpander::ZipMax.expand(&args);
        prop_assert_eq!(rows.len(), m.max(n));
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row[0].term.is_none(), i >= m);
            prop_assert_eq!(row[1].term.is_none(), i >= n);
        }
    }
}
