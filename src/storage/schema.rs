//! Table definitions for the two relational strategies.
//!
//! Both engines see the same tables and columns. Lists are `TEXT[]` on
//! postgres and JSON text on sqlite; embeddings are `vector(N)` on postgres
//! and little-endian f32 blobs on sqlite.

pub const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    language TEXT,
    topics TEXT NOT NULL DEFAULT '[]',
    stars INTEGER NOT NULL DEFAULT 0,
    forks INTEGER NOT NULL DEFAULT 0,
    first_time_friendly INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    embedding BLOB
);

CREATE TABLE IF NOT EXISTS opportunities (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    type TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    required_skills TEXT NOT NULL DEFAULT '[]',
    technologies TEXT NOT NULL DEFAULT '[]',
    estimated_hours INTEGER,
    view_count INTEGER NOT NULL DEFAULT 0,
    application_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    title_embedding BLOB,
    description_embedding BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_opportunities_repository ON opportunities(repository_id);
CREATE INDEX IF NOT EXISTS idx_opportunities_status_created ON opportunities(status, created_at);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    handle TEXT NOT NULL UNIQUE,
    email TEXT,
    skill_level TEXT NOT NULL,
    profile_embedding BLOB,
    preferred_types TEXT NOT NULL DEFAULT '[]',
    max_estimated_hours INTEGER,
    notification_cadence TEXT NOT NULL DEFAULT 'weekly'
);

CREATE TABLE IF NOT EXISTS contribution_outcomes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    opportunity_id TEXT NOT NULL REFERENCES opportunities(id) ON DELETE CASCADE,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcomes_opportunity ON contribution_outcomes(opportunity_id);
";

/// Postgres DDL for an embedding width of `dimensions`.
pub fn postgres_schema(dimensions: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS repositories (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                language TEXT,
                topics TEXT[] NOT NULL DEFAULT '{{}}',
                stars BIGINT NOT NULL DEFAULT 0,
                forks BIGINT NOT NULL DEFAULT 0,
                first_time_friendly BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL,
                embedding vector({dimensions})
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS opportunities (
                id UUID PRIMARY KEY,
                repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                type TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                required_skills TEXT[] NOT NULL DEFAULT '{{}}',
                technologies TEXT[] NOT NULL DEFAULT '{{}}',
                estimated_hours INTEGER,
                view_count BIGINT NOT NULL DEFAULT 0,
                application_count BIGINT NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                title_embedding vector({dimensions}),
                description_embedding vector({dimensions}),
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )"
        ),
        "CREATE INDEX IF NOT EXISTS idx_opportunities_repository ON opportunities(repository_id)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_opportunities_status_created ON opportunities(status, created_at)"
            .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                email TEXT,
                skill_level TEXT NOT NULL,
                profile_embedding vector({dimensions}),
                preferred_types TEXT[] NOT NULL DEFAULT '{{}}',
                max_estimated_hours INTEGER,
                notification_cadence TEXT NOT NULL DEFAULT 'weekly'
            )"
        ),
        "CREATE TABLE IF NOT EXISTS contribution_outcomes (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            opportunity_id UUID NOT NULL REFERENCES opportunities(id) ON DELETE CASCADE,
            started_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ,
            status TEXT NOT NULL
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_outcomes_opportunity ON contribution_outcomes(opportunity_id)"
            .to_string(),
    ]
}
