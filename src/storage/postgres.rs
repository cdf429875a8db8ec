//! Full-engine (postgres + pgvector) strategy
//!
//! Similarity is computed by the engine: `1 - (column <=> $1::text::vector)`
//! is the cosine similarity, and it comes back NULL whenever either side is
//! NULL. Vectors cross the wire in their text form so no extra codec crate is
//! needed.
//!
//! sqlx is async; a private current-thread runtime drives it so the rest of
//! the crate stays synchronous.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use tokio::runtime::Runtime;
use tracing::debug;
use uuid::Uuid;

use super::{
    Backend, Strategy, check_optional_dimensions, lifecycle_noop, max_similarity,
    sanitize_similarity, schema,
};
use crate::error::{RankError, Result};
use crate::model::{
    ContributionOutcome, Opportunity, OpportunityCandidate, Repository, RepositoryCandidate, User,
    UserCandidate, UserPreferences,
};
use crate::scoring::vector::{check_dimensions, from_pg_text, to_pg_text};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const REPOSITORY_COLUMNS: &str = "r.id, r.name, r.description, r.language, r.topics, r.stars, \
     r.forks, r.first_time_friendly, r.created_at, r.embedding::text AS embedding";

const OPPORTUNITY_COLUMNS: &str = "o.id, o.repository_id, o.title, o.description, o.type, \
     o.difficulty, o.priority, o.required_skills, o.technologies, o.estimated_hours, \
     o.view_count, o.application_count, o.status, \
     o.title_embedding::text AS title_embedding, \
     o.description_embedding::text AS description_embedding, o.created_at, o.updated_at";

const USER_COLUMNS: &str = "u.id, u.handle, u.email, u.skill_level, \
     u.profile_embedding::text AS profile_embedding, u.preferred_types, \
     u.max_estimated_hours, u.notification_cadence";

const OUTCOME_COLUMNS: &str =
    "c.id, c.user_id, c.opportunity_id, c.started_at, c.completed_at, c.status";

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RepositoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    language: Option<String>,
    topics: Vec<String>,
    stars: i64,
    forks: i64,
    first_time_friendly: bool,
    created_at: DateTime<Utc>,
    embedding: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredRepositoryRow {
    #[sqlx(flatten)]
    record: RepositoryRow,
    similarity: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct OpportunityRow {
    id: Uuid,
    repository_id: Uuid,
    title: String,
    description: Option<String>,
    #[sqlx(rename = "type")]
    kind: String,
    difficulty: String,
    priority: i32,
    required_skills: Vec<String>,
    technologies: Vec<String>,
    estimated_hours: Option<i32>,
    view_count: i64,
    application_count: i64,
    status: String,
    title_embedding: Option<String>,
    description_embedding: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredOpportunityRow {
    #[sqlx(flatten)]
    record: OpportunityRow,
    title_similarity: Option<f64>,
    description_similarity: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    handle: String,
    email: Option<String>,
    skill_level: String,
    profile_embedding: Option<String>,
    preferred_types: Vec<String>,
    max_estimated_hours: Option<i32>,
    notification_cadence: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredUserRow {
    #[sqlx(flatten)]
    record: UserRow,
    similarity: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct OutcomeRow {
    id: Uuid,
    user_id: Uuid,
    opportunity_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
}

fn embedding(text: Option<String>) -> Result<Option<Vec<f32>>> {
    text.as_deref().map(from_pg_text).transpose()
}

fn vector_text(vector: Option<&[f32]>) -> Option<String> {
    vector.map(to_pg_text)
}

impl TryFrom<RepositoryRow> for Repository {
    type Error = RankError;

    fn try_from(row: RepositoryRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            language: row.language,
            topics: row.topics,
            stars: row.stars,
            forks: row.forks,
            first_time_friendly: row.first_time_friendly,
            created_at: row.created_at,
            embedding: embedding(row.embedding)?,
        })
    }
}

impl TryFrom<OpportunityRow> for Opportunity {
    type Error = RankError;

    fn try_from(row: OpportunityRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            repository_id: row.repository_id,
            title: row.title,
            description: row.description,
            kind: row.kind.parse()?,
            difficulty: row.difficulty.parse()?,
            priority: row.priority,
            required_skills: row.required_skills,
            technologies: row.technologies,
            estimated_hours: row.estimated_hours,
            view_count: row.view_count,
            application_count: row.application_count,
            status: row.status.parse()?,
            title_embedding: embedding(row.title_embedding)?,
            description_embedding: embedding(row.description_embedding)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = RankError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            handle: row.handle,
            email: row.email,
            skill_level: row.skill_level.parse()?,
            profile_embedding: embedding(row.profile_embedding)?,
            preferences: UserPreferences {
                preferred_types: row
                    .preferred_types
                    .iter()
                    .map(|t| t.parse())
                    .collect::<Result<_>>()?,
                max_estimated_hours: row.max_estimated_hours,
                notification_cadence: row.notification_cadence.parse()?,
            },
        })
    }
}

impl TryFrom<OutcomeRow> for ContributionOutcome {
    type Error = RankError;

    fn try_from(row: OutcomeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            opportunity_id: row.opportunity_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            status: row.status.parse()?,
        })
    }
}

impl TryFrom<ScoredOpportunityRow> for OpportunityCandidate {
    type Error = RankError;

    fn try_from(row: ScoredOpportunityRow) -> Result<Self> {
        Ok(Self {
            opportunity: row.record.try_into()?,
            vector_similarity: sanitize_similarity(max_similarity(
                row.title_similarity,
                row.description_similarity,
            )),
        })
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Postgres-backed strategy. Writes run inside a transaction that cleanup
/// rolls back and replaces; the pool closes on drop.
pub struct PostgresBackend {
    tx: Option<Transaction<'static, Postgres>>,
    pool: PgPool,
    dimensions: usize,
    runtime: Runtime,
}

impl PostgresBackend {
    /// Connect, make sure the schema exists, then open the isolation transaction.
    pub fn open(url: &str, dimensions: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (pool, tx) = runtime.block_on(async {
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(url)
                .await?;
            for statement in schema::postgres_schema(dimensions) {
                sqlx::query(&statement).execute(&pool).await?;
            }
            let tx = pool.begin().await?;
            Ok::<_, RankError>((pool, tx))
        })?;

        debug!(dimensions, "postgres backend opened");
        Ok(Self {
            tx: Some(tx),
            pool,
            dimensions,
            runtime,
        })
    }

    fn session(&mut self) -> Result<(&Runtime, &mut Transaction<'static, Postgres>)> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| RankError::backend("postgres", "no open transaction"))?;
        Ok((&self.runtime, tx))
    }

    fn rollback(&mut self) {
        match self.tx.take() {
            Some(tx) => {
                if let Err(err) = self.runtime.block_on(tx.rollback()) {
                    lifecycle_noop(Strategy::Postgres, &format!("rollback failed: {err}"));
                }
            }
            None => lifecycle_noop(Strategy::Postgres, "rollback skipped: no open transaction"),
        }
    }

    /// Run one write under a savepoint so a rejected row leaves the
    /// surrounding transaction usable.
    fn write(&mut self, statement: Query<'_, Postgres, PgArguments>) -> Result<()> {
        let (runtime, tx) = self.session()?;
        runtime.block_on(async move {
            sqlx::query("SAVEPOINT crank_write")
                .execute(&mut **tx)
                .await?;
            match statement.execute(&mut **tx).await {
                Ok(_) => {
                    sqlx::query("RELEASE SAVEPOINT crank_write")
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                }
                Err(err) => {
                    sqlx::query("ROLLBACK TO SAVEPOINT crank_write")
                        .execute(&mut **tx)
                        .await?;
                    Err(err.into())
                }
            }
        })
    }

    fn exists(&mut self, table: &str, id: Uuid) -> Result<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
        let (runtime, tx) = self.session()?;
        let found = runtime.block_on(
            sqlx::query_scalar::<_, bool>(&sql)
                .bind(id)
                .fetch_one(&mut **tx),
        )?;
        Ok(found)
    }

    fn fetch_opportunities(
        &mut self,
        sql: &str,
        bind: impl FnOnce(
            sqlx::query::QueryAs<'_, Postgres, OpportunityRow, PgArguments>,
        ) -> sqlx::query::QueryAs<'_, Postgres, OpportunityRow, PgArguments>,
    ) -> Result<Vec<Opportunity>> {
        let (runtime, tx) = self.session()?;
        let rows = runtime.block_on(bind(sqlx::query_as(sql)).fetch_all(&mut **tx))?;
        rows.into_iter().map(Opportunity::try_from).collect()
    }

    fn fetch_scored_opportunities(
        &mut self,
        sql: &str,
        query_vector: Option<String>,
        max_hours: Option<i32>,
        preferred_types: Option<Vec<String>>,
    ) -> Result<Vec<OpportunityCandidate>> {
        let (runtime, tx) = self.session()?;
        let mut query = sqlx::query_as::<_, ScoredOpportunityRow>(sql).bind(query_vector);
        if let Some(types) = preferred_types {
            query = query.bind(max_hours).bind(types);
        }
        let rows = runtime.block_on(query.fetch_all(&mut **tx))?;
        rows.into_iter().map(OpportunityCandidate::try_from).collect()
    }
}

impl Backend for PostgresBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Postgres
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert_repository(&mut self, repository: &Repository) -> Result<()> {
        check_optional_dimensions(repository.embedding.as_deref(), self.dimensions)?;
        let statement = sqlx::query(
            "INSERT INTO repositories (id, name, description, language, topics, stars, forks,
                 first_time_friendly, created_at, embedding)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::text::vector)",
        )
        .bind(repository.id)
        .bind(repository.name.as_str())
        .bind(repository.description.as_deref())
        .bind(repository.language.as_deref())
        .bind(repository.topics.as_slice())
        .bind(repository.stars)
        .bind(repository.forks)
        .bind(repository.first_time_friendly)
        .bind(repository.created_at)
        .bind(vector_text(repository.embedding.as_deref()));
        self.write(statement)
    }

    fn insert_opportunity(&mut self, opportunity: &Opportunity) -> Result<()> {
        check_optional_dimensions(opportunity.title_embedding.as_deref(), self.dimensions)?;
        check_optional_dimensions(opportunity.description_embedding.as_deref(), self.dimensions)?;
        if !self.exists("repositories", opportunity.repository_id)? {
            return Err(RankError::RepositoryNotFound(opportunity.repository_id));
        }
        let statement = sqlx::query(
            "INSERT INTO opportunities (id, repository_id, title, description, type, difficulty,
                 priority, required_skills, technologies, estimated_hours, view_count,
                 application_count, status, title_embedding, description_embedding,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                 $14::text::vector, $15::text::vector, $16, $17)",
        )
        .bind(opportunity.id)
        .bind(opportunity.repository_id)
        .bind(opportunity.title.as_str())
        .bind(opportunity.description.as_deref())
        .bind(opportunity.kind.as_str())
        .bind(opportunity.difficulty.as_str())
        .bind(opportunity.priority)
        .bind(opportunity.required_skills.as_slice())
        .bind(opportunity.technologies.as_slice())
        .bind(opportunity.estimated_hours)
        .bind(opportunity.view_count)
        .bind(opportunity.application_count)
        .bind(opportunity.status.as_str())
        .bind(vector_text(opportunity.title_embedding.as_deref()))
        .bind(vector_text(opportunity.description_embedding.as_deref()))
        .bind(opportunity.created_at)
        .bind(opportunity.updated_at);
        self.write(statement)
    }

    fn insert_user(&mut self, user: &User) -> Result<()> {
        check_optional_dimensions(user.profile_embedding.as_deref(), self.dimensions)?;
        let preferred: Vec<String> = user
            .preferences
            .preferred_types
            .iter()
            .map(ToString::to_string)
            .collect();
        let statement = sqlx::query(
            "INSERT INTO users (id, handle, email, skill_level, profile_embedding,
                 preferred_types, max_estimated_hours, notification_cadence)
             VALUES ($1, $2, $3, $4, $5::text::vector, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(user.handle.as_str())
        .bind(user.email.as_deref())
        .bind(user.skill_level.as_str())
        .bind(vector_text(user.profile_embedding.as_deref()))
        .bind(preferred)
        .bind(user.preferences.max_estimated_hours)
        .bind(user.preferences.notification_cadence.as_str());
        self.write(statement)
    }

    fn insert_outcome(&mut self, outcome: &ContributionOutcome) -> Result<()> {
        if !self.exists("users", outcome.user_id)? {
            return Err(RankError::UserNotFound(outcome.user_id));
        }
        let statement = sqlx::query(
            "INSERT INTO contribution_outcomes (id, user_id, opportunity_id, started_at,
                 completed_at, status)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(outcome.id)
        .bind(outcome.user_id)
        .bind(outcome.opportunity_id)
        .bind(outcome.started_at)
        .bind(outcome.completed_at)
        .bind(outcome.status.as_str());
        self.write(statement)
    }

    fn opportunity_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<OpportunityCandidate>> {
        if let Some(query) = query_vector {
            check_dimensions(query, self.dimensions)?;
        }
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS},
                    1 - (o.title_embedding <=> $1::text::vector) AS title_similarity,
                    1 - (o.description_embedding <=> $1::text::vector) AS description_similarity
             FROM opportunities o
             JOIN repositories r ON r.id = o.repository_id"
        );
        self.fetch_scored_opportunities(&sql, vector_text(query_vector), None, None)
    }

    fn repository_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<RepositoryCandidate>> {
        if let Some(query) = query_vector {
            check_dimensions(query, self.dimensions)?;
        }

        let open_sql =
            format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities o WHERE o.status = 'open'");
        let open = self.fetch_opportunities(&open_sql, |q| q)?;

        let sql = format!(
            "SELECT {REPOSITORY_COLUMNS},
                    1 - (r.embedding <=> $1::text::vector) AS similarity
             FROM repositories r"
        );
        let (runtime, tx) = self.session()?;
        let rows = runtime.block_on(
            sqlx::query_as::<_, ScoredRepositoryRow>(&sql)
                .bind(vector_text(query_vector))
                .fetch_all(&mut **tx),
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let repository = Repository::try_from(row.record)?;
            let opportunities = open
                .iter()
                .filter(|o| o.repository_id == repository.id)
                .cloned()
                .collect();
            out.push(RepositoryCandidate {
                repository,
                vector_similarity: sanitize_similarity(row.similarity),
                opportunities,
            });
        }
        Ok(out)
    }

    fn user_candidates(&mut self, query_vector: &[f32]) -> Result<Vec<UserCandidate>> {
        check_dimensions(query_vector, self.dimensions)?;
        let sql = format!(
            "SELECT {USER_COLUMNS},
                    1 - (u.profile_embedding <=> $1::text::vector) AS similarity
             FROM users u
             WHERE u.profile_embedding IS NOT NULL"
        );
        let (runtime, tx) = self.session()?;
        let rows = runtime.block_on(
            sqlx::query_as::<_, ScoredUserRow>(&sql)
                .bind(to_pg_text(query_vector))
                .fetch_all(&mut **tx),
        )?;
        rows.into_iter()
            .map(|row| {
                Ok(UserCandidate {
                    user: row.record.try_into()?,
                    vector_similarity: sanitize_similarity(row.similarity),
                })
            })
            .collect()
    }

    fn trending_candidates(
        &mut self,
        since: DateTime<Utc>,
        min_engagement: i64,
    ) -> Result<Vec<Opportunity>> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS}
             FROM opportunities o
             JOIN repositories r ON r.id = o.repository_id
             WHERE o.created_at >= $1
               AND (o.view_count + o.application_count) >= $2"
        );
        self.fetch_opportunities(&sql, |q| q.bind(since).bind(min_engagement))
    }

    fn preference_candidates(&mut self, user: &User) -> Result<Vec<OpportunityCandidate>> {
        let preferred: Vec<String> = user
            .preferences
            .preferred_types
            .iter()
            .map(ToString::to_string)
            .collect();
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS},
                    1 - (o.title_embedding <=> $1::text::vector) AS title_similarity,
                    1 - (o.description_embedding <=> $1::text::vector) AS description_similarity
             FROM opportunities o
             JOIN repositories r ON r.id = o.repository_id
             WHERE o.status = 'open'
               AND ($2::int IS NULL OR o.estimated_hours IS NULL OR o.estimated_hours <= $2)
               AND (cardinality($3::text[]) = 0 OR o.type = ANY($3::text[]))"
        );
        self.fetch_scored_opportunities(
            &sql,
            vector_text(user.profile_embedding.as_deref()),
            user.preferences.max_estimated_hours,
            Some(preferred),
        )
    }

    fn repository(&mut self, id: Uuid) -> Result<Option<Repository>> {
        let sql = format!("SELECT {REPOSITORY_COLUMNS} FROM repositories r WHERE r.id = $1");
        let (runtime, tx) = self.session()?;
        let row = runtime.block_on(
            sqlx::query_as::<_, RepositoryRow>(&sql)
                .bind(id)
                .fetch_optional(&mut **tx),
        )?;
        row.map(Repository::try_from).transpose()
    }

    fn repository_opportunities(&mut self, id: Uuid) -> Result<Vec<Opportunity>> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities o WHERE o.repository_id = $1 ORDER BY o.id"
        );
        self.fetch_opportunities(&sql, |q| q.bind(id))
    }

    fn repository_outcomes(&mut self, id: Uuid) -> Result<Vec<ContributionOutcome>> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS}
             FROM contribution_outcomes c
             JOIN opportunities o ON o.id = c.opportunity_id
             WHERE o.repository_id = $1
             ORDER BY c.id"
        );
        let (runtime, tx) = self.session()?;
        let rows = runtime.block_on(
            sqlx::query_as::<_, OutcomeRow>(&sql)
                .bind(id)
                .fetch_all(&mut **tx),
        )?;
        rows.into_iter().map(ContributionOutcome::try_from).collect()
    }

    fn user(&mut self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let (runtime, tx) = self.session()?;
        let row = runtime.block_on(
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&mut **tx),
        )?;
        row.map(User::try_from).transpose()
    }

    /// Roll back, then open a fresh transaction from the pool so later
    /// writes stay isolated until the following cleanup or drop.
    fn cleanup(&mut self) {
        self.rollback();
        match self.runtime.block_on(self.pool.begin()) {
            Ok(tx) => self.tx = Some(tx),
            Err(err) => lifecycle_noop(Strategy::Postgres, &format!("begin failed: {err}")),
        }
    }
}

impl Drop for PostgresBackend {
    fn drop(&mut self) {
        self.rollback();
        if !self.pool.is_closed() {
            self.runtime.block_on(self.pool.close());
        }
    }
}
