//! Embedded (sqlite) strategy
//!
//! SQLite has no vector type, so embeddings are stored as f32 blobs and
//! similarity comes from a registered `cosine_similarity(blob, blob)` scalar
//! function. Queries then read the same way the postgres ones do.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params};
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
use crate::scoring::vector::{self, check_dimensions, cosine_similarity};

const REPOSITORY_COLUMNS: &str = "r.id, r.name, r.description, r.language, r.topics, r.stars, \
     r.forks, r.first_time_friendly, r.created_at, r.embedding";

const OPPORTUNITY_COLUMNS: &str = "o.id, o.repository_id, o.title, o.description, o.type, \
     o.difficulty, o.priority, o.required_skills, o.technologies, o.estimated_hours, \
     o.view_count, o.application_count, o.status, o.title_embedding, o.description_embedding, \
     o.created_at, o.updated_at";
const OPPORTUNITY_COLUMN_COUNT: usize = 17;

const USER_COLUMNS: &str = "u.id, u.handle, u.email, u.skill_level, u.profile_embedding, \
     u.preferred_types, u.max_estimated_hours, u.notification_cadence";
const USER_COLUMN_COUNT: usize = 8;

const OUTCOME_COLUMNS: &str =
    "c.id, c.user_id, c.opportunity_id, c.started_at, c.completed_at, c.status";

/// SQLite-backed strategy. Writes run inside a transaction that cleanup
/// rolls back and reopens.
pub struct SqliteBackend {
    conn: Connection,
    dimensions: usize,
}

impl SqliteBackend {
    /// Open a database file, or a private in-memory database when `path` is `None`.
    pub fn open(path: Option<&Path>, dimensions: usize) -> Result<Self> {
        let conn = match path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        conn.busy_timeout(Duration::from_secs(5))?;
        Self::configure_pragmas(&conn)?;
        register_functions(&conn)?;
        conn.execute_batch(schema::SQLITE_SCHEMA)?;
        conn.execute_batch("BEGIN")?;

        debug!(path = ?path, dimensions, "sqlite backend opened");
        Ok(Self { conn, dimensions })
    }

    /// Get a reference to the connection
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    fn exists(&self, table: &str, id: Uuid) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
        let found = self
            .conn
            .query_row(&sql, [id.to_string()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn opportunities_where(&self, clause: &str, id: Uuid) -> Result<Vec<Opportunity>> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities o WHERE {clause} ORDER BY o.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(opportunity_from_row(row)?);
        }
        Ok(out)
    }
}

/// Register `cosine_similarity(a, b)`: NULL when either side is NULL.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "cosine_similarity",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a: Option<Vec<u8>> = ctx.get(0)?;
            let b: Option<Vec<u8>> = ctx.get(1)?;
            let (Some(a), Some(b)) = (a, b) else {
                return Ok(None);
            };
            let to_sql_err = |err: RankError| rusqlite::Error::UserFunctionError(Box::new(err));
            let a = vector::from_blob(&a).map_err(to_sql_err)?;
            let b = vector::from_blob(&b).map_err(to_sql_err)?;
            cosine_similarity(&a, &b).map(Some).map_err(to_sql_err)
        },
    )?;
    Ok(())
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| RankError::Serialization(format!("timestamp {value:?}: {err}")))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|err| RankError::Serialization(format!("uuid {value:?}: {err}")))
}

fn json_list<T: serde::de::DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    Ok(serde_json::from_str(raw)?)
}

fn blob(vector: Option<&Vec<f32>>) -> Option<Vec<u8>> {
    vector.map(|v| vector::to_blob(v))
}

fn embedding(raw: Option<Vec<u8>>) -> Result<Option<Vec<f32>>> {
    raw.map(|bytes| vector::from_blob(&bytes)).transpose()
}

fn repository_from_row(row: &Row<'_>) -> Result<Repository> {
    Ok(Repository {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        description: row.get(2)?,
        language: row.get(3)?,
        topics: json_list(&row.get::<_, String>(4)?)?,
        stars: row.get(5)?,
        forks: row.get(6)?,
        first_time_friendly: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?)?,
        embedding: embedding(row.get(9)?)?,
    })
}

fn opportunity_from_row(row: &Row<'_>) -> Result<Opportunity> {
    Ok(Opportunity {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        repository_id: parse_uuid(&row.get::<_, String>(1)?)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: row.get::<_, String>(4)?.parse()?,
        difficulty: row.get::<_, String>(5)?.parse()?,
        priority: row.get(6)?,
        required_skills: json_list(&row.get::<_, String>(7)?)?,
        technologies: json_list(&row.get::<_, String>(8)?)?,
        estimated_hours: row.get(9)?,
        view_count: row.get(10)?,
        application_count: row.get(11)?,
        status: row.get::<_, String>(12)?.parse()?,
        title_embedding: embedding(row.get(13)?)?,
        description_embedding: embedding(row.get(14)?)?,
        created_at: parse_timestamp(&row.get::<_, String>(15)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(16)?)?,
    })
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        handle: row.get(1)?,
        email: row.get(2)?,
        skill_level: row.get::<_, String>(3)?.parse()?,
        profile_embedding: embedding(row.get(4)?)?,
        preferences: UserPreferences {
            preferred_types: json_list(&row.get::<_, String>(5)?)?,
            max_estimated_hours: row.get(6)?,
            notification_cadence: row.get::<_, String>(7)?.parse()?,
        },
    })
}

fn outcome_from_row(row: &Row<'_>) -> Result<ContributionOutcome> {
    let completed_at: Option<String> = row.get(4)?;
    Ok(ContributionOutcome {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        opportunity_id: parse_uuid(&row.get::<_, String>(2)?)?,
        started_at: parse_timestamp(&row.get::<_, String>(3)?)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        status: row.get::<_, String>(5)?.parse()?,
    })
}

/// Opportunity columns followed by the title and description similarities.
fn opportunity_candidate_from_row(row: &Row<'_>) -> Result<OpportunityCandidate> {
    let opportunity = opportunity_from_row(row)?;
    let title: Option<f64> = row.get(OPPORTUNITY_COLUMN_COUNT)?;
    let description: Option<f64> = row.get(OPPORTUNITY_COLUMN_COUNT + 1)?;
    Ok(OpportunityCandidate {
        opportunity,
        vector_similarity: sanitize_similarity(max_similarity(title, description)),
    })
}

impl Backend for SqliteBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Sqlite
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert_repository(&mut self, repository: &Repository) -> Result<()> {
        check_optional_dimensions(repository.embedding.as_deref(), self.dimensions)?;
        self.conn.execute(
            "INSERT INTO repositories (id, name, description, language, topics, stars, forks,
                 first_time_friendly, created_at, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                repository.id.to_string(),
                repository.name,
                repository.description,
                repository.language,
                serde_json::to_string(&repository.topics)?,
                repository.stars,
                repository.forks,
                repository.first_time_friendly,
                timestamp(repository.created_at),
                blob(repository.embedding.as_ref()),
            ],
        )?;
        Ok(())
    }

    fn insert_opportunity(&mut self, opportunity: &Opportunity) -> Result<()> {
        check_optional_dimensions(opportunity.title_embedding.as_deref(), self.dimensions)?;
        check_optional_dimensions(opportunity.description_embedding.as_deref(), self.dimensions)?;
        if !self.exists("repositories", opportunity.repository_id)? {
            return Err(RankError::RepositoryNotFound(opportunity.repository_id));
        }
        self.conn.execute(
            "INSERT INTO opportunities (id, repository_id, title, description, type, difficulty,
                 priority, required_skills, technologies, estimated_hours, view_count,
                 application_count, status, title_embedding, description_embedding,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                opportunity.id.to_string(),
                opportunity.repository_id.to_string(),
                opportunity.title,
                opportunity.description,
                opportunity.kind.as_str(),
                opportunity.difficulty.as_str(),
                opportunity.priority,
                serde_json::to_string(&opportunity.required_skills)?,
                serde_json::to_string(&opportunity.technologies)?,
                opportunity.estimated_hours,
                opportunity.view_count,
                opportunity.application_count,
                opportunity.status.as_str(),
                blob(opportunity.title_embedding.as_ref()),
                blob(opportunity.description_embedding.as_ref()),
                timestamp(opportunity.created_at),
                timestamp(opportunity.updated_at),
            ],
        )?;
        Ok(())
    }

    fn insert_user(&mut self, user: &User) -> Result<()> {
        check_optional_dimensions(user.profile_embedding.as_deref(), self.dimensions)?;
        let preferred: Vec<&str> = user
            .preferences
            .preferred_types
            .iter()
            .map(|t| t.as_str())
            .collect();
        self.conn.execute(
            "INSERT INTO users (id, handle, email, skill_level, profile_embedding,
                 preferred_types, max_estimated_hours, notification_cadence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.handle,
                user.email,
                user.skill_level.as_str(),
                blob(user.profile_embedding.as_ref()),
                serde_json::to_string(&preferred)?,
                user.preferences.max_estimated_hours,
                user.preferences.notification_cadence.as_str(),
            ],
        )?;
        Ok(())
    }

    fn insert_outcome(&mut self, outcome: &ContributionOutcome) -> Result<()> {
        if !self.exists("users", outcome.user_id)? {
            return Err(RankError::UserNotFound(outcome.user_id));
        }
        self.conn.execute(
            "INSERT INTO contribution_outcomes (id, user_id, opportunity_id, started_at,
                 completed_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.id.to_string(),
                outcome.user_id.to_string(),
                outcome.opportunity_id.to_string(),
                timestamp(outcome.started_at),
                outcome.completed_at.map(timestamp),
                outcome.status.as_str(),
            ],
        )?;
        Ok(())
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
                    cosine_similarity(o.title_embedding, ?1),
                    cosine_similarity(o.description_embedding, ?1)
             FROM opportunities o
             JOIN repositories r ON r.id = o.repository_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([query_vector.map(vector::to_blob)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(opportunity_candidate_from_row(row)?);
        }
        Ok(out)
    }

    fn repository_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<RepositoryCandidate>> {
        if let Some(query) = query_vector {
            check_dimensions(query, self.dimensions)?;
        }

        let mut open_by_repo: HashMap<Uuid, Vec<Opportunity>> = HashMap::new();
        {
            let sql = format!(
                "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities o WHERE o.status = 'open'"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let opportunity = opportunity_from_row(row)?;
                open_by_repo
                    .entry(opportunity.repository_id)
                    .or_default()
                    .push(opportunity);
            }
        }

        let sql = format!(
            "SELECT {REPOSITORY_COLUMNS}, cosine_similarity(r.embedding, ?1) FROM repositories r"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([query_vector.map(vector::to_blob)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let repository = repository_from_row(row)?;
            let similarity: Option<f64> = row.get(10)?;
            let opportunities = open_by_repo.remove(&repository.id).unwrap_or_default();
            out.push(RepositoryCandidate {
                repository,
                vector_similarity: sanitize_similarity(similarity),
                opportunities,
            });
        }
        Ok(out)
    }

    fn user_candidates(&mut self, query_vector: &[f32]) -> Result<Vec<UserCandidate>> {
        check_dimensions(query_vector, self.dimensions)?;
        let sql = format!(
            "SELECT {USER_COLUMNS}, cosine_similarity(u.profile_embedding, ?1)
             FROM users u
             WHERE u.profile_embedding IS NOT NULL"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([vector::to_blob(query_vector)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let user = user_from_row(row)?;
            let similarity: Option<f64> = row.get(USER_COLUMN_COUNT)?;
            out.push(UserCandidate {
                user,
                vector_similarity: sanitize_similarity(similarity),
            });
        }
        Ok(out)
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
             WHERE o.created_at >= ?1
               AND (o.view_count + o.application_count) >= ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![timestamp(since), min_engagement])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(opportunity_from_row(row)?);
        }
        Ok(out)
    }

    fn preference_candidates(&mut self, user: &User) -> Result<Vec<OpportunityCandidate>> {
        let preferred: Vec<&str> = user
            .preferences
            .preferred_types
            .iter()
            .map(|t| t.as_str())
            .collect();
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS},
                    cosine_similarity(o.title_embedding, ?1),
                    cosine_similarity(o.description_embedding, ?1)
             FROM opportunities o
             JOIN repositories r ON r.id = o.repository_id
             WHERE o.status = 'open'
               AND (?2 IS NULL OR o.estimated_hours IS NULL OR o.estimated_hours <= ?2)
               AND (?3 = '[]' OR o.type IN (SELECT value FROM json_each(?3)))"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            blob(user.profile_embedding.as_ref()),
            user.preferences.max_estimated_hours,
            serde_json::to_string(&preferred)?,
        ])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(opportunity_candidate_from_row(row)?);
        }
        Ok(out)
    }

    fn repository(&mut self, id: Uuid) -> Result<Option<Repository>> {
        let sql = format!("SELECT {REPOSITORY_COLUMNS} FROM repositories r WHERE r.id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => repository_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    fn repository_opportunities(&mut self, id: Uuid) -> Result<Vec<Opportunity>> {
        self.opportunities_where("o.repository_id = ?1", id)
    }

    fn repository_outcomes(&mut self, id: Uuid) -> Result<Vec<ContributionOutcome>> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS}
             FROM contribution_outcomes c
             JOIN opportunities o ON o.id = c.opportunity_id
             WHERE o.repository_id = ?1
             ORDER BY c.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(outcome_from_row(row)?);
        }
        Ok(out)
    }

    fn user(&mut self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => user_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    /// Roll back, then open the next transaction so later writes stay
    /// isolated until the following cleanup or drop.
    fn cleanup(&mut self) {
        if self.conn.is_autocommit() {
            lifecycle_noop(Strategy::Sqlite, "rollback skipped: no open transaction");
        } else if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            lifecycle_noop(Strategy::Sqlite, &format!("rollback failed: {err}"));
        }
        let reopened = if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")
        } else {
            Ok(())
        };
        if let Err(err) = reopened {
            lifecycle_noop(Strategy::Sqlite, &format!("begin failed: {err}"));
        }
    }
}
