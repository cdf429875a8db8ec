use std::thread;

use uuid::Uuid;

use contrib_rank::model::OpportunityType;
use contrib_rank::storage::{Connection, Dataset, MockDatabase, SqliteBackend};
use contrib_rank::{RankError, SearchEngine, SearchParams};

use super::common::{self, Catalog, DIMS};

#[test]
fn test_phrase_in_title_ranks_above_half() {
    let repo = common::repository("search-kit", "Full text search toolkit");
    let fix = common::opportunity(
        repo.id,
        "Fix TypeScript type errors in search module",
        OpportunityType::BugFix,
    );
    let dataset = Dataset {
        repositories: vec![repo],
        opportunities: vec![fix.clone()],
        ..Dataset::default()
    };

    for mut engine in common::engines(&dataset) {
        let params = SearchParams::new("TypeScript type errors")
            .weights(1.0, 0.0)
            .threshold(0.01)
            .limit(10);
        let results = engine.hybrid_search_opportunities(&params).unwrap();
        assert_eq!(results.len(), 1, "{:?}", engine.strategy());
        assert_eq!(results[0].opportunity.id, fix.id);
        assert!(results[0].relevance_score > 0.5);
    }
}

#[test]
fn test_zero_weights_rejected_everywhere() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let vector = [1.0, 0.0, 0.0, 0.0];
        let params = SearchParams::new("anything")
            .vector(Some(&vector))
            .weights(0.0, 0.0)
            .threshold(0.0)
            .limit(5);

        let err = engine.hybrid_search_opportunities(&params).unwrap_err();
        assert!(matches!(err, RankError::InvalidWeights { .. }));
        let err = engine.hybrid_search_repositories(&params).unwrap_err();
        assert!(matches!(err, RankError::InvalidWeights { .. }));
    }
}

#[test]
fn test_zero_limit_rejected_everywhere() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let params = SearchParams::new("search").limit(0);
        assert!(matches!(
            engine.hybrid_search_opportunities(&params),
            Err(RankError::InvalidLimit(0))
        ));
        assert!(matches!(
            engine.trending_opportunities(24, 0, 0),
            Err(RankError::InvalidLimit(0))
        ));
        assert!(matches!(
            engine.search_similar_users(&[0.0, 1.0, 0.0, 0.0], 0.0, -3),
            Err(RankError::InvalidLimit(-3))
        ));
        assert!(matches!(
            engine.matching_opportunities_for_user(catalog.alice, 0.0, 0),
            Err(RankError::InvalidLimit(0))
        ));
    }
}

#[test]
fn test_unrelated_query_at_high_threshold_is_empty() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let params = SearchParams::new("quantum chemistry")
            .threshold(0.8)
            .limit(10);
        assert!(engine.hybrid_search_opportunities(&params).unwrap().is_empty());
        assert!(engine.hybrid_search_repositories(&params).unwrap().is_empty());
    }
}

#[test]
fn test_health_of_unknown_repository() {
    let catalog = Catalog::new();
    for mut engine in common::engines(&catalog.dataset) {
        let missing = Uuid::new_v4();
        let err = engine.repository_health_metrics(missing).unwrap_err();
        assert!(matches!(err, RankError::RepositoryNotFound(id) if id == missing));
    }
}

fn assert_disjoint_matches(alice: &mut SearchEngine, bob: &mut SearchEngine, catalog: &Catalog) {
    let (alice_matches, bob_matches) = thread::scope(|scope| {
        let a = scope.spawn(|| alice.matching_opportunities_for_user(catalog.alice, 0.0, 10));
        let b = scope.spawn(|| bob.matching_opportunities_for_user(catalog.bob, 0.0, 10));
        (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
    });

    assert_eq!(alice_matches.len(), 2);
    assert_eq!(bob_matches.len(), 2);
    assert!(
        alice_matches
            .iter()
            .all(|m| m.opportunity.kind == OpportunityType::Documentation)
    );
    assert!(
        bob_matches
            .iter()
            .all(|m| m.opportunity.kind == OpportunityType::BugFix)
    );
    for a in &alice_matches {
        assert!(bob_matches.iter().all(|b| b.opportunity.id != a.opportunity.id));
    }
}

#[test]
fn test_concurrent_matches_are_scoped_to_each_user_mock() {
    let catalog = Catalog::new();
    let db = MockDatabase::new(DIMS);
    db.seed(&catalog.dataset).unwrap();

    let mut alice = SearchEngine::new(Connection::new(Box::new(db.connect())));
    let mut bob = SearchEngine::new(Connection::new(Box::new(db.connect())));
    assert_disjoint_matches(&mut alice, &mut bob, &catalog);
}

#[test]
fn test_concurrent_matches_are_scoped_to_each_user_sqlite() {
    let catalog = Catalog::new();
    let mut engines = Vec::new();
    for _ in 0..2 {
        let backend = SqliteBackend::open(None, DIMS).unwrap();
        let mut engine = SearchEngine::new(Connection::new(Box::new(backend)));
        engine.load(&catalog.dataset).unwrap();
        engines.push(engine);
    }
    let (alice, bob) = engines.split_at_mut(1);
    assert_disjoint_matches(&mut alice[0], &mut bob[0], &catalog);
}
