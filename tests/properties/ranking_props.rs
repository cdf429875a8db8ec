use proptest::prelude::*;

use contrib_rank::SearchParams;
use contrib_rank::model::OpportunityType;
use contrib_rank::storage::Dataset;

use super::common;

const WORDS: &[&str] = &[
    "fix", "search", "index", "docs", "typescript", "parser", "test", "flaky", "cache", "guide",
];

fn title() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(WORDS), 1..5).prop_map(|w| w.join(" "))
}

fn dataset() -> impl Strategy<Value = Dataset> {
    proptest::collection::vec(
        (title(), proptest::option::of(proptest::array::uniform4(-1.0f32..1.0))),
        0..12,
    )
    .prop_map(|rows| {
        let repo = common::repository("repo", "fixture");
        let opportunities = rows
            .into_iter()
            .map(|(title, embedding)| {
                let mut o = common::opportunity(repo.id, &title, OpportunityType::Feature);
                o.title_embedding = embedding.map(|e| e.to_vec());
                o
            })
            .collect();
        Dataset {
            repositories: vec![repo],
            opportunities,
            ..Dataset::default()
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_results_are_capped_and_ordered(
        dataset in dataset(),
        query in title(),
        limit in 1i64..8,
        threshold in 0.0f64..1.0,
    ) {
        let mut engine = common::mock_engine(&dataset);
        let params = SearchParams::new(&query).threshold(threshold).limit(limit);
        let results = engine.hybrid_search_opportunities(&params).unwrap();

        prop_assert!(results.len() <= usize::try_from(limit).unwrap());
        for pair in results.windows(2) {
            prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        prop_assert!(results.iter().all(|r| r.relevance_score >= threshold));
    }

    #[test]
    fn test_threshold_is_monotonic(
        dataset in dataset(),
        query in title(),
        vector in proptest::array::uniform4(-1.0f32..1.0),
        low in 0.0f64..1.0,
        raise in 0.0f64..1.0,
    ) {
        let mut engine = common::mock_engine(&dataset);
        let base = SearchParams::new(&query).vector(Some(&vector)).limit(100);
        let loose = engine.hybrid_search_opportunities(&base.threshold(low)).unwrap();
        let strict = engine
            .hybrid_search_opportunities(&base.threshold((low + raise).min(1.0)))
            .unwrap();
        prop_assert!(strict.len() <= loose.len());
    }

    #[test]
    fn test_empty_query_scores_are_neutral(dataset in dataset()) {
        let mut engine = common::mock_engine(&dataset);
        let params = SearchParams::new("").weights(1.0, 0.0).threshold(0.0).limit(100);
        let results = engine.hybrid_search_opportunities(&params).unwrap();
        prop_assert_eq!(results.len(), dataset.opportunities.len());
        prop_assert!(results.iter().all(|r| r.relevance_score > 0.4 && r.relevance_score < 0.6));
    }

    #[test]
    fn test_mock_and_sqlite_agree(dataset in dataset(), query in title()) {
        let params = SearchParams::new(&query).threshold(0.0).limit(100);
        let mock = common::mock_engine(&dataset)
            .hybrid_search_opportunities(&params)
            .unwrap();
        let sqlite = common::sqlite_engine(&dataset)
            .hybrid_search_opportunities(&params)
            .unwrap();
        let ids = |rows: &[contrib_rank::model::RankedOpportunity]| {
            rows.iter().map(|r| r.opportunity.id).collect::<Vec<_>>()
        };
        prop_assert_eq!(ids(&mock), ids(&sqlite));
    }
}
