//! Common test utilities shared across integration, property and CLI tests.
//!
//! Builders return minimal valid records; tests adjust the fields they care
//! about. Engines come from the public API only.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use uuid::Uuid;

use contrib_rank::SearchEngine;
use contrib_rank::model::{
    ContributionOutcome, Difficulty, Embedding, Opportunity, OpportunityStatus, OpportunityType,
    OutcomeStatus, Repository, SkillLevel, User, UserPreferences,
};
use contrib_rank::storage::{Connection, Dataset, MockDatabase, SqliteBackend};

/// Embedding width used by every test dataset.
pub const DIMS: usize = 4;

// =============================================================================
// Record builders
// =============================================================================

pub fn repository(name: &str, description: &str) -> Repository {
    Repository {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: Some(description.to_string()),
        language: Some("TypeScript".to_string()),
        topics: vec!["search".to_string()],
        stars: 120,
        forks: 14,
        first_time_friendly: true,
        created_at: Utc::now() - Duration::days(400),
        embedding: None,
    }
}

pub fn opportunity(repository_id: Uuid, title: &str, kind: OpportunityType) -> Opportunity {
    let created_at = Utc::now() - Duration::hours(2);
    Opportunity {
        id: Uuid::new_v4(),
        repository_id,
        title: title.to_string(),
        description: None,
        kind,
        difficulty: Difficulty::Beginner,
        priority: 1,
        required_skills: Vec::new(),
        technologies: Vec::new(),
        estimated_hours: Some(4),
        view_count: 0,
        application_count: 0,
        status: OpportunityStatus::Open,
        title_embedding: None,
        description_embedding: None,
        created_at,
        updated_at: created_at,
    }
}

pub fn user(handle: &str, preferred_types: Vec<OpportunityType>) -> User {
    User {
        id: Uuid::new_v4(),
        handle: handle.to_string(),
        email: Some(format!("{handle}@example.test")),
        skill_level: SkillLevel::Beginner,
        profile_embedding: None,
        preferences: UserPreferences {
            preferred_types,
            ..UserPreferences::default()
        },
    }
}

pub fn completed_outcome(user_id: Uuid, opportunity_id: Uuid, hours: i64) -> ContributionOutcome {
    let started_at = Utc::now() - Duration::days(3);
    ContributionOutcome {
        id: Uuid::new_v4(),
        user_id,
        opportunity_id,
        started_at,
        completed_at: Some(started_at + Duration::hours(hours)),
        status: OutcomeStatus::Completed,
    }
}

pub fn embedding(values: [f32; DIMS]) -> Embedding {
    values.to_vec()
}

// =============================================================================
// Catalog
// =============================================================================

/// A small but complete dataset with handles to the interesting records.
pub struct Catalog {
    pub dataset: Dataset,
    pub search_repo: Uuid,
    pub docs_repo: Uuid,
    pub typescript_fix: Uuid,
    pub alice: Uuid,
    pub bob: Uuid,
}

impl Catalog {
    pub fn new() -> Self {
        let mut search_repo = repository("search-kit", "Full text search toolkit");
        search_repo.embedding = Some(embedding([1.0, 0.0, 0.0, 0.0]));
        let mut docs_repo = repository("handbook", "Contributor handbook and guides");
        docs_repo.language = Some("Markdown".to_string());
        docs_repo.stars = 15;

        let mut typescript_fix = opportunity(
            search_repo.id,
            "Fix TypeScript type errors in search module",
            OpportunityType::BugFix,
        );
        typescript_fix.title_embedding = Some(embedding([1.0, 0.0, 0.0, 0.0]));
        typescript_fix.view_count = 40;
        typescript_fix.application_count = 6;

        let mut flaky_test = opportunity(
            search_repo.id,
            "Stabilize flaky indexer test",
            OpportunityType::BugFix,
        );
        flaky_test.description = Some("The indexer test times out on slow runners".to_string());
        flaky_test.title_embedding = Some(embedding([0.6, 0.8, 0.0, 0.0]));
        flaky_test.view_count = 8;
        flaky_test.created_at = Utc::now() - Duration::hours(30);

        let mut guide = opportunity(
            docs_repo.id,
            "Write a getting started guide",
            OpportunityType::Documentation,
        );
        guide.description = Some("Walk new contributors through the first build".to_string());
        guide.view_count = 12;
        guide.application_count = 2;
        guide.created_at = Utc::now() - Duration::hours(5);

        let mut glossary = opportunity(
            docs_repo.id,
            "Add glossary page",
            OpportunityType::Documentation,
        );
        glossary.created_at = Utc::now() - Duration::hours(50);

        let mut alice = user("alice", vec![OpportunityType::Documentation]);
        alice.profile_embedding = Some(embedding([0.0, 1.0, 0.0, 0.0]));
        let bob = user("bob", vec![OpportunityType::BugFix]);

        let outcomes = vec![
            completed_outcome(bob.id, typescript_fix.id, 4),
            completed_outcome(bob.id, flaky_test.id, 8),
        ];

        Self {
            search_repo: search_repo.id,
            docs_repo: docs_repo.id,
            typescript_fix: typescript_fix.id,
            alice: alice.id,
            bob: bob.id,
            dataset: Dataset {
                repositories: vec![search_repo, docs_repo],
                opportunities: vec![typescript_fix, flaky_test, guide, glossary],
                users: vec![alice, bob],
                outcomes,
            },
        }
    }
}

// =============================================================================
// Engines
// =============================================================================

/// Engine over a mock database seeded with `dataset`.
pub fn mock_engine(dataset: &Dataset) -> SearchEngine {
    let db = MockDatabase::new(DIMS);
    db.seed(dataset).expect("seed mock database");
    SearchEngine::new(Connection::new(Box::new(db.connect())))
}

/// Engine over a private in-memory sqlite database holding `dataset`.
pub fn sqlite_engine(dataset: &Dataset) -> SearchEngine {
    let backend = SqliteBackend::open(None, DIMS).expect("open sqlite backend");
    let mut engine = SearchEngine::new(Connection::new(Box::new(backend)));
    engine.load(dataset).expect("load dataset into sqlite");
    engine
}

/// One engine per in-process strategy, each holding `dataset`.
pub fn engines(dataset: &Dataset) -> Vec<SearchEngine> {
    vec![mock_engine(dataset), sqlite_engine(dataset)]
}

/// Serialize `dataset` to `dir/dataset.json` for the CLI.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> PathBuf {
    let path = dir.join("dataset.json");
    let json = serde_json::to_string_pretty(dataset).expect("serialize dataset");
    std::fs::write(&path, json).expect("write dataset");
    path
}
