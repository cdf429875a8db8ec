//! Data-access layer
//!
//! One contract, three interchangeable strategies:
//!
//! - **postgres**: persistent engine with native vector operators (pgvector)
//! - **sqlite**: in-process engine; vector similarity is a registered scalar function
//! - **mock**: in-memory tables, similarity computed in a plain loop
//!
//! Every connection runs inside an isolation scope that is undone on cleanup,
//! so writes made while a connection is held never outlive it. Cleanup is
//! idempotent and never fails.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::{RankError, Result};
use crate::model::{
    ContributionOutcome, Opportunity, OpportunityCandidate, Repository, RepositoryCandidate, User,
    UserCandidate,
};
use crate::scoring::vector::check_dimensions;

pub mod mock;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use mock::{MockBackend, MockDatabase};
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// Concrete backend implementation behind a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Postgres,
    Sqlite,
    Mock,
}

impl Strategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Mock => "mock",
        }
    }

    /// Strategies to try, in order, starting from `self`.
    const fn fallback_chain(self) -> &'static [Self] {
        match self {
            Self::Postgres => &[Self::Postgres, Self::Sqlite, Self::Mock],
            Self::Sqlite => &[Self::Sqlite, Self::Mock],
            Self::Mock => &[Self::Mock],
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested strategy: a concrete one or "pick the most capable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPreference {
    Auto,
    Fixed(Strategy),
}

impl FromStr for StrategyPreference {
    type Err = RankError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "postgres" | "postgresql" | "pg" => Ok(Self::Fixed(Strategy::Postgres)),
            "sqlite" | "embedded" => Ok(Self::Fixed(Strategy::Sqlite)),
            "mock" | "memory" => Ok(Self::Fixed(Strategy::Mock)),
            other => Err(RankError::Config(format!(
                "invalid backend strategy {other} (expected auto|postgres|sqlite|mock)"
            ))),
        }
    }
}

/// The contract every strategy implements.
///
/// Candidate-set methods return records plus the vector similarity the
/// strategy computed against the query vector; textual scoring, filtering and
/// ordering happen above this layer so they are identical for all strategies.
pub trait Backend: Send {
    fn strategy(&self) -> Strategy;

    /// Embedding width stored vectors must have.
    fn dimensions(&self) -> usize;

    fn insert_repository(&mut self, repository: &Repository) -> Result<()>;

    /// Fails with `RepositoryNotFound` when the owning repository is missing.
    fn insert_opportunity(&mut self, opportunity: &Opportunity) -> Result<()>;

    fn insert_user(&mut self, user: &User) -> Result<()>;

    /// Fails with `UserNotFound` for an unknown user.
    fn insert_outcome(&mut self, outcome: &ContributionOutcome) -> Result<()>;

    /// Every opportunity whose repository exists.
    fn opportunity_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<OpportunityCandidate>>;

    /// Every repository with its open opportunities attached.
    fn repository_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<RepositoryCandidate>>;

    /// Users with a profile embedding.
    fn user_candidates(&mut self, query_vector: &[f32]) -> Result<Vec<UserCandidate>>;

    /// Opportunities created at or after `since` with at least `min_engagement`
    /// views + applications.
    fn trending_candidates(
        &mut self,
        since: DateTime<Utc>,
        min_engagement: i64,
    ) -> Result<Vec<Opportunity>>;

    /// Open opportunities compatible with the user's preferences, scored
    /// against the user's profile embedding.
    fn preference_candidates(&mut self, user: &User) -> Result<Vec<OpportunityCandidate>>;

    fn repository(&mut self, id: Uuid) -> Result<Option<Repository>>;

    fn repository_opportunities(&mut self, id: Uuid) -> Result<Vec<Opportunity>>;

    /// Outcomes attached to any opportunity of the repository.
    fn repository_outcomes(&mut self, id: Uuid) -> Result<Vec<ContributionOutcome>>;

    fn user(&mut self, id: Uuid) -> Result<Option<User>>;

    /// Undo every write made since the backend was opened.
    ///
    /// Must be idempotent and must not fail, including on a backend that never
    /// finished initializing.
    fn cleanup(&mut self);
}

/// An acquired backend. Cleanup runs on drop if it has not run already.
pub struct Connection {
    backend: Box<dyn Backend>,
}

impl Connection {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn strategy(&self) -> Strategy {
        self.backend.strategy()
    }

    /// Write every record of a dataset through this connection.
    pub fn load(&mut self, dataset: &Dataset) -> Result<()> {
        dataset.write_to(self.backend.as_mut())
    }

    pub fn cleanup(&mut self) {
        self.backend.cleanup();
    }
}

impl Deref for Connection {
    type Target = dyn Backend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend.as_mut()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.backend.cleanup();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("strategy", &self.strategy())
            .finish_non_exhaustive()
    }
}

/// Acquire a connection according to configuration.
///
/// `auto` starts from postgres when a database URL is configured and from
/// sqlite otherwise. With `fallback` enabled a strategy that fails to
/// initialize hands over to the next, less capable one.
pub fn connect(config: &BackendConfig, dimensions: usize) -> Result<Connection> {
    let preference: StrategyPreference = config.strategy.parse()?;
    let first = match preference {
        StrategyPreference::Fixed(strategy) => strategy,
        StrategyPreference::Auto if config.database_url.is_some() => Strategy::Postgres,
        StrategyPreference::Auto => Strategy::Sqlite,
    };
    let chain: &[Strategy] = if config.fallback {
        first.fallback_chain()
    } else {
        &first.fallback_chain()[..1]
    };

    let mut last_err = None;
    for strategy in chain {
        match open_strategy(*strategy, config, dimensions) {
            Ok(conn) => {
                debug!(strategy = %strategy, "backend connection acquired");
                return Ok(conn);
            }
            Err(err) => {
                warn!(strategy = %strategy, error = %err, "backend initialization failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| RankError::Config("no backend strategy available".to_string())))
}

fn open_strategy(
    strategy: Strategy,
    config: &BackendConfig,
    dimensions: usize,
) -> Result<Connection> {
    let backend: Box<dyn Backend> = match strategy {
        Strategy::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                RankError::Config("postgres strategy requires backend.database_url".to_string())
            })?;
            Box::new(PostgresBackend::open(url, dimensions)?)
        }
        Strategy::Sqlite => {
            let path: Option<PathBuf> = config.sqlite_path.as_ref().map(PathBuf::from);
            Box::new(SqliteBackend::open(path.as_deref(), dimensions)?)
        }
        Strategy::Mock => Box::new(MockDatabase::new(dimensions).connect()),
    };
    Ok(Connection::new(backend))
}

/// Lifecycle no-ops are only worth mentioning while developing.
pub(crate) fn lifecycle_noop(strategy: Strategy, what: &str) {
    if cfg!(debug_assertions) {
        debug!(strategy = %strategy, "{what}");
    }
}

// =============================================================================
// Shared helpers for strategy implementations
// =============================================================================

/// Reject stored vectors whose width differs from the configured one.
pub(crate) fn check_optional_dimensions(vector: Option<&[f32]>, dimensions: usize) -> Result<()> {
    match vector {
        Some(vector) => check_dimensions(vector, dimensions),
        None => Ok(()),
    }
}

/// Larger of two optional similarities; `None` only when both are absent.
pub(crate) fn max_similarity(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

/// Engine-computed similarities can be NaN (zero vectors) or drift past the bounds.
pub(crate) fn sanitize_similarity(value: Option<f64>) -> Option<f64> {
    value.map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
}

// =============================================================================
// Dataset
// =============================================================================

/// A bundle of records written through a connection in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub outcomes: Vec<ContributionOutcome>,
}

impl Dataset {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| RankError::Serialization(format!("dataset parse: {err}")))
    }

    pub fn write_to(&self, backend: &mut dyn Backend) -> Result<()> {
        for repository in &self.repositories {
            backend.insert_repository(repository)?;
        }
        for opportunity in &self.opportunities {
            backend.insert_opportunity(opportunity)?;
        }
        for user in &self.users {
            backend.insert_user(user)?;
        }
        for outcome in &self.outcomes {
            backend.insert_outcome(outcome)?;
        }
        debug!(
            strategy = %backend.strategy(),
            repositories = self.repositories.len(),
            opportunities = self.opportunities.len(),
            users = self.users.len(),
            outcomes = self.outcomes.len(),
            "dataset loaded"
        );
        Ok(())
    }
}
