//! Runs against a real postgres with pgvector when `CRANK_TEST_DATABASE_URL`
//! is set; otherwise every test returns early.

use contrib_rank::storage::{Connection, PostgresBackend, Strategy};
use contrib_rank::{RankError, SearchEngine, SearchParams};

use super::common::{self, Catalog, DIMS};

fn postgres_engine() -> Option<SearchEngine> {
    let url = std::env::var("CRANK_TEST_DATABASE_URL").ok()?;
    let backend = PostgresBackend::open(&url, DIMS).expect("open postgres backend");
    Some(SearchEngine::new(Connection::new(Box::new(backend))))
}

#[test]
fn test_postgres_matches_in_process_strategies() {
    let Some(mut engine) = postgres_engine() else {
        return;
    };
    assert_eq!(engine.strategy(), Strategy::Postgres);
    let catalog = Catalog::new();
    engine.load(&catalog.dataset).unwrap();

    let vector = [1.0, 0.0, 0.0, 0.0];
    let params = SearchParams::new("search")
        .vector(Some(&vector))
        .weights(0.4, 0.6)
        .threshold(0.0)
        .limit(10);
    let remote = engine.hybrid_search_opportunities(&params).unwrap();
    let local = common::mock_engine(&catalog.dataset)
        .hybrid_search_opportunities(&params)
        .unwrap();

    // The database may hold unrelated rows; compare the ones this test wrote.
    let ours: Vec<_> = remote
        .iter()
        .filter(|r| local.iter().any(|l| l.opportunity.id == r.opportunity.id))
        .collect();
    assert_eq!(ours.len(), local.len());
    for (a, b) in ours.iter().zip(&local) {
        assert_eq!(a.opportunity.id, b.opportunity.id);
        assert!((a.relevance_score - b.relevance_score).abs() < 1e-5);
    }

    let report = engine.repository_health_metrics(catalog.search_repo).unwrap();
    assert!((report.avg_completion_hours - 6.0).abs() < 1e-6);
}

#[test]
fn test_postgres_rollback_and_failed_writes() {
    let Some(mut engine) = postgres_engine() else {
        return;
    };
    let catalog = Catalog::new();

    let orphan = common::opportunity(
        uuid::Uuid::new_v4(),
        "Orphaned task",
        contrib_rank::model::OpportunityType::Test,
    );
    assert!(matches!(
        engine.connection().insert_opportunity(&orphan),
        Err(RankError::RepositoryNotFound(_))
    ));

    engine.load(&catalog.dataset).unwrap();
    assert!(engine.repository_health_metrics(catalog.search_repo).is_ok());
    engine.cleanup();
    engine.cleanup();
    drop(engine);

    let mut fresh = postgres_engine().unwrap();
    assert!(matches!(
        fresh.repository_health_metrics(catalog.search_repo),
        Err(RankError::RepositoryNotFound(_))
    ));
}

#[test]
fn test_postgres_writes_after_cleanup_are_rolled_back() {
    let Some(mut engine) = postgres_engine() else {
        return;
    };
    let catalog = Catalog::new();

    engine.cleanup();
    engine.load(&catalog.dataset).unwrap();
    assert!(engine.repository_health_metrics(catalog.search_repo).is_ok());
    drop(engine);

    let mut fresh = postgres_engine().unwrap();
    assert!(matches!(
        fresh.repository_health_metrics(catalog.search_repo),
        Err(RankError::RepositoryNotFound(_))
    ));
}
