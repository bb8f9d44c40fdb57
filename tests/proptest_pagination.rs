use cvatkit::api::models::Label;
use cvatkit::api::pagination::PagedFetcher;
use cvatkit::CvatError;
use proptest::prelude::*;
use serde_json::json;

mod common;
mod proptest_helpers;

use common::MockTransport;

/// Serve `sizes.len()` pages holding `sizes[i]` labels each, all claiming
/// `count` items in total. Returns the first page's URL.
fn serve_pages(mock: &MockTransport, sizes: &[usize], count: usize) -> String {
    let url = |page: usize| format!("{}api/labels?page={page}", common::HOST);
    let mut next_id = 1u64;
    for (page, &size) in sizes.iter().enumerate() {
        let results: Vec<_> = (0..size)
            .map(|_| {
                let id = next_id;
                next_id += 1;
                json!({"id": id, "name": format!("label-{id}"), "attributes": []})
            })
            .collect();
        let next = (page + 1 < sizes.len()).then(|| url(page + 1));
        mock.json(
            &url(page),
            json!({"count": count, "next": next, "results": results}),
        );
    }
    url(0)
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn all_pages_are_collected_in_order(sizes in prop::collection::vec(0usize..6, 1..6)) {
        let mock = MockTransport::new();
        let total: usize = sizes.iter().sum();
        let first = serve_pages(&mock, &sizes, total);

        let labels: Vec<Label> = PagedFetcher::new(&mock).fetch_all(&first, &[]).expect("fetch");
        let ids: Vec<u64> = labels.iter().map(|l| l.id.as_u64()).collect();
        prop_assert_eq!(ids, (1..=total as u64).collect::<Vec<_>>());
        prop_assert_eq!(mock.requests().len(), sizes.len());
    }

    #[test]
    fn any_count_disagreement_is_fatal(
        sizes in prop::collection::vec(0usize..6, 1..6),
        skew in prop_oneof![-3i64..0, 1i64..4],
    ) {
        let mock = MockTransport::new();
        let total: usize = sizes.iter().sum();
        let claimed = (total as i64 + skew).max(0) as usize;
        prop_assume!(claimed != total);
        let first = serve_pages(&mock, &sizes, claimed);

        let err = PagedFetcher::new(&mock).fetch_all::<Label>(&first, &[]).unwrap_err();
        match err {
            CvatError::PageCountMismatch { expected, actual, .. } => {
                prop_assert_eq!(expected, claimed);
                prop_assert_eq!(actual, total);
            }
            other => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
