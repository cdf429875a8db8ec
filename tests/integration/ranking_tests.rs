use chrono::Utc;

use contrib_rank::{RankError, SearchParams};

use super::common::{self, Catalog};

#[test]
fn test_strategies_agree_on_order_and_scores() {
    let catalog = Catalog::new();
    let vector = [1.0, 0.0, 0.0, 0.0];
    let params = SearchParams::new("search")
        .vector(Some(&vector))
        .weights(0.4, 0.6)
        .threshold(0.0)
        .limit(10);

    let mut runs = Vec::new();
    for mut engine in common::engines(&catalog.dataset) {
        let opportunities = engine.hybrid_search_opportunities(&params).unwrap();
        let repositories = engine.hybrid_search_repositories(&params).unwrap();
        runs.push((opportunities, repositories));
    }

    let (mock, sqlite) = (&runs[0], &runs[1]);
    assert_eq!(mock.0.len(), sqlite.0.len());
    for (a, b) in mock.0.iter().zip(&sqlite.0) {
        assert_eq!(a.opportunity.id, b.opportunity.id);
        assert!((a.relevance_score - b.relevance_score).abs() < 1e-6);
    }
    assert_eq!(mock.1.len(), sqlite.1.len());
    for (a, b) in mock.1.iter().zip(&sqlite.1) {
        assert_eq!(a.repository.id, b.repository.id);
        assert!((a.health_score - b.health_score).abs() < 1e-9);
    }
}

#[test]
fn test_repeated_calls_return_identical_results() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let params = SearchParams::new("").threshold(0.0).limit(10);
        let first = engine.hybrid_search_opportunities(&params).unwrap();
        let second = engine.hybrid_search_opportunities(&params).unwrap();
        assert_eq!(first, second);
        // Empty query: every candidate ties on the neutral score, ordered by id.
        assert!(first.windows(2).all(|w| w[0].opportunity.id < w[1].opportunity.id));
    }
}

#[test]
fn test_raising_threshold_never_adds_results() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let mut previous = usize::MAX;
        for threshold in [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let params = SearchParams::new("indexer test")
                .threshold(threshold)
                .limit(50);
            let count = engine.hybrid_search_opportunities(&params).unwrap().len();
            assert!(count <= previous, "threshold {threshold}");
            previous = count;
        }
    }
}

#[test]
fn test_zero_vector_weight_ignores_supplied_vector() {
    let catalog = Catalog::new();
    // Orthogonal to every stored opportunity embedding in the catalog's search repo.
    let vector = [0.0, 0.0, 1.0, 0.0];
    for mut engine in common::engines(&catalog.dataset) {
        let text_only = SearchParams::new("TypeScript type errors")
            .vector(Some(&vector))
            .weights(1.0, 0.0)
            .threshold(0.5)
            .limit(5);
        let results = engine.hybrid_search_opportunities(&text_only).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].opportunity.id, catalog.typescript_fix);
        assert!((results[0].relevance_score - 0.9).abs() < 1e-9);

        let blended = text_only.weights(1.0, 1.0).threshold(0.0);
        let results = engine.hybrid_search_opportunities(&blended).unwrap();
        let fix = results
            .iter()
            .find(|r| r.opportunity.id == catalog.typescript_fix)
            .unwrap();
        assert!((fix.relevance_score - 0.45).abs() < 1e-9);
    }
}

#[test]
fn test_vector_only_search_orders_by_similarity() {
    let catalog = Catalog::new();
    let vector = [1.0, 0.0, 0.0, 0.0];
    for mut engine in common::engines(&catalog.dataset) {
        let params = SearchParams::new("")
            .vector(Some(&vector))
            .weights(0.0, 1.0)
            .threshold(0.55)
            .limit(10);
        let results = engine.hybrid_search_opportunities(&params).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].opportunity.id, catalog.typescript_fix);
        assert!((results[0].relevance_score - 1.0).abs() < 1e-6);
        assert!((results[1].relevance_score - 0.6).abs() < 1e-6);
    }
}

#[test]
fn test_query_vector_width_is_checked_before_search() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let short = [1.0, 0.0, 0.0];
        let params = SearchParams::new("search").vector(Some(&short)).limit(5);
        assert!(matches!(
            engine.hybrid_search_repositories(&params),
            Err(RankError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            engine.search_similar_users(&short, 0.0, 5),
            Err(RankError::DimensionMismatch { .. })
        ));
    }
}

#[test]
fn test_similar_users_need_a_profile_embedding() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let users = engine
            .search_similar_users(&[0.0, 1.0, 0.0, 0.0], 0.5, 10)
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user.id, catalog.alice);
        assert!((users[0].similarity_score - 1.0).abs() < 1e-6);
    }
}

#[test]
fn test_hostile_query_text_is_scored_not_rejected() {
    let catalog = Catalog::new();
    let hostile = [
        "'; DROP TABLE opportunities; --",
        "<script>alert(1)</script>",
        "\"\"\"''' %_ \\",
    ];
    for mut engine in common::engines(&catalog.dataset) {
        for query in hostile {
            let params = SearchParams::new(query).threshold(0.0).limit(10);
            let results = engine.hybrid_search_opportunities(&params).unwrap();
            assert_eq!(results.len(), 4, "{query}");
            assert!(
                results
                    .iter()
                    .all(|r| (0.1..=1.0).contains(&r.relevance_score))
            );
        }
        let oversized = "x".repeat(100_000);
        let params = SearchParams::new(&oversized).threshold(0.0).limit(10);
        assert_eq!(engine.hybrid_search_opportunities(&params).unwrap().len(), 4);
    }
}

#[test]
fn test_trending_window_and_engagement_floor() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let trending = engine
            .trending_opportunities_at(24, 5, 10, Utc::now())
            .unwrap();
        assert_eq!(trending.len(), 2);
        assert_eq!(trending[0].opportunity.id, catalog.typescript_fix);
        assert!((trending[0].trending_score - 37.0).abs() < 1e-9);
        assert!((trending[1].trending_score - 11.4).abs() < 1e-9);

        let capped = engine.trending_opportunities(24, 5, 1).unwrap();
        assert_eq!(capped.len(), 1);
    }
}

#[test]
fn test_widest_trending_window_includes_every_opportunity() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let trending = engine.trending_opportunities(u32::MAX, 0, 10).unwrap();
        assert_eq!(trending.len(), 4, "{}", engine.strategy());
        assert_eq!(trending[0].opportunity.id, catalog.typescript_fix);
    }
}

#[test]
fn test_health_report_averages_completed_outcomes() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let report = engine.repository_health_metrics(catalog.search_repo).unwrap();
        assert_eq!(report.repository_id, catalog.search_repo);
        assert!((report.avg_completion_hours - 6.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&report.health_score));
        assert!(!report.recommendations.is_empty());

        let docs = engine.repository_health_metrics(catalog.docs_repo).unwrap();
        assert!(docs.avg_completion_hours.abs() < f64::EPSILON);
    }
}

#[test]
fn test_matches_for_unknown_user() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            engine.matching_opportunities_for_user(missing, 0.0, 5),
            Err(RankError::UserNotFound(id)) if id == missing
        ));
    }
}

#[test]
fn test_matches_are_newest_first() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let matches = engine
            .matching_opportunities_for_user(catalog.alice, 0.0, 10)
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].opportunity.created_at > matches[1].opportunity.created_at);
        assert_eq!(matches[0].opportunity.title, "Write a getting started guide");
    }
}
