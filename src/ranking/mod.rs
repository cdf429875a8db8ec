//! Ranking functions
//!
//! [`SearchEngine`] owns one [`Connection`] and exposes one method per entry
//! point. Each follows the same discipline:
//!
//! 1. validate every precondition before the backend is touched
//! 2. fetch the candidate set through the [`Backend`](crate::storage::Backend) trait
//! 3. score, keep scores at or above the threshold
//! 4. sort descending with a deterministic tie-break, then cut to the limit
//!
//! Nothing here knows which strategy sits behind the connection.

mod params;

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::debug;
use uuid::Uuid;

pub use params::{SearchParams, ValidatedSearch};

use crate::config::Config;
use crate::error::{RankError, Result};
use crate::model::{
    HealthReport, MatchedOpportunity, Opportunity, RankedOpportunity, RankedRepository,
    Repository, SimilarUser, TrendingOpportunity,
};
use crate::scoring::health::health_only;
use crate::scoring::lexical::LexicalQuery;
use crate::scoring::vector::check_dimensions;
use crate::scoring::{
    HealthInputs, HealthScore, Limit, SearchableText, hybrid_score, normalize_threshold,
    trending_score,
};
use crate::storage::{self, Connection, Dataset, Strategy};

/// Score given to preference candidates that cannot be compared by vector.
const UNSCORED_MATCH: f64 = 1.0;

/// 0001-01-01T00:00:00Z as unix seconds.
const EARLIEST_WINDOW_START: i64 = -62_135_596_800;

pub struct SearchEngine {
    conn: Connection,
    dimensions: usize,
}

impl SearchEngine {
    pub fn new(conn: Connection) -> Self {
        let dimensions = conn.dimensions();
        Self { conn, dimensions }
    }

    /// Acquire a connection as configured and wrap it.
    pub fn connect(config: &Config) -> Result<Self> {
        let conn = storage::connect(&config.backend, config.search.embedding_dims)?;
        Ok(Self::new(conn))
    }

    pub fn strategy(&self) -> Strategy {
        self.conn.strategy()
    }

    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn load(&mut self, dataset: &Dataset) -> Result<()> {
        self.conn.load(dataset)
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Undo everything written through this engine's connection.
    pub fn cleanup(&mut self) {
        self.conn.cleanup();
    }

    // =========================================================================
    // Hybrid search
    // =========================================================================

    pub fn hybrid_search_opportunities(
        &mut self,
        params: &SearchParams<'_>,
    ) -> Result<Vec<RankedOpportunity>> {
        let search = params.validate(self.dimensions)?;
        let candidates = self.conn.opportunity_candidates(search.vector)?;
        let considered = candidates.len();
        let query = LexicalQuery::new(search.text);

        let mut ranked: Vec<RankedOpportunity> = candidates
            .into_par_iter()
            .map(|candidate| {
                let lexical = query.score(&opportunity_text(&candidate.opportunity));
                let relevance_score =
                    hybrid_score(search.weights, lexical, candidate.vector_similarity);
                RankedOpportunity {
                    opportunity: candidate.opportunity,
                    relevance_score,
                }
            })
            .filter(|r| r.relevance_score >= search.threshold)
            .collect();

        ranked.sort_by(|a, b| {
            by_score_desc(a.relevance_score, b.relevance_score)
                .then_with(|| a.opportunity.id.cmp(&b.opportunity.id))
        });
        ranked.truncate(search.limit.get());

        debug!(
            strategy = %self.conn.strategy(),
            considered,
            returned = ranked.len(),
            "opportunity search"
        );
        Ok(ranked)
    }

    pub fn hybrid_search_repositories(
        &mut self,
        params: &SearchParams<'_>,
    ) -> Result<Vec<RankedRepository>> {
        let search = params.validate(self.dimensions)?;
        let candidates = self.conn.repository_candidates(search.vector)?;
        let considered = candidates.len();
        let query = LexicalQuery::new(search.text);

        let mut ranked: Vec<RankedRepository> = candidates
            .into_par_iter()
            .map(|candidate| {
                let lexical = query.score(&repository_text(&candidate.repository));
                RankedRepository {
                    relevance_score: hybrid_score(
                        search.weights,
                        lexical,
                        candidate.vector_similarity,
                    ),
                    health_score: health_only(&candidate.repository, &candidate.opportunities),
                    repository: candidate.repository,
                }
            })
            .filter(|r| r.relevance_score >= search.threshold)
            .collect();

        ranked.sort_by(|a, b| {
            by_score_desc(a.relevance_score, b.relevance_score)
                .then_with(|| by_score_desc(a.health_score, b.health_score))
                .then_with(|| a.repository.id.cmp(&b.repository.id))
        });
        ranked.truncate(search.limit.get());

        debug!(
            strategy = %self.conn.strategy(),
            considered,
            returned = ranked.len(),
            "repository search"
        );
        Ok(ranked)
    }

    /// Vector-only peer search. There is no lexical fallback.
    pub fn search_similar_users(
        &mut self,
        vector: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SimilarUser>> {
        let limit = Limit::new(limit)?;
        check_dimensions(vector, self.dimensions)?;
        let threshold = normalize_threshold(threshold);

        let mut ranked: Vec<SimilarUser> = self
            .conn
            .user_candidates(vector)?
            .into_iter()
            .filter_map(|candidate| {
                let similarity_score = candidate.vector_similarity?;
                (similarity_score >= threshold).then_some(SimilarUser {
                    user: candidate.user,
                    similarity_score,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            by_score_desc(a.similarity_score, b.similarity_score)
                .then_with(|| a.user.id.cmp(&b.user.id))
        });
        ranked.truncate(limit.get());
        Ok(ranked)
    }

    // =========================================================================
    // Auxiliary scorers
    // =========================================================================

    pub fn trending_opportunities(
        &mut self,
        window_hours: u32,
        min_engagement: i64,
        limit: i64,
    ) -> Result<Vec<TrendingOpportunity>> {
        self.trending_opportunities_at(window_hours, min_engagement, limit, Utc::now())
    }

    /// Trending relative to a fixed `now`.
    pub fn trending_opportunities_at(
        &mut self,
        window_hours: u32,
        min_engagement: i64,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingOpportunity>> {
        let limit = Limit::new(limit)?;
        let since = window_start(now, window_hours);

        let mut ranked: Vec<TrendingOpportunity> = self
            .conn
            .trending_candidates(since, min_engagement)?
            .into_iter()
            .map(|opportunity| TrendingOpportunity {
                trending_score: trending_score(
                    opportunity.view_count,
                    opportunity.application_count,
                ),
                opportunity,
            })
            .collect();

        ranked.sort_by(|a, b| {
            by_score_desc(a.trending_score, b.trending_score)
                .then_with(|| a.opportunity.id.cmp(&b.opportunity.id))
        });
        ranked.truncate(limit.get());
        Ok(ranked)
    }

    pub fn repository_health_metrics(&mut self, repository_id: Uuid) -> Result<HealthReport> {
        self.repository_health_metrics_at(repository_id, Utc::now())
    }

    pub fn repository_health_metrics_at(
        &mut self,
        repository_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<HealthReport> {
        let repository = self
            .conn
            .repository(repository_id)?
            .ok_or(RankError::RepositoryNotFound(repository_id))?;
        let opportunities = self.conn.repository_opportunities(repository_id)?;
        let outcomes = self.conn.repository_outcomes(repository_id)?;

        let score = HealthScore::compute(&HealthInputs {
            repository: &repository,
            opportunities: &opportunities,
            outcomes: &outcomes,
            now,
        });
        debug!(
            repository = %repository_id,
            health = score.health,
            opportunities = opportunities.len(),
            outcomes = outcomes.len(),
            "repository health computed"
        );

        Ok(HealthReport {
            repository_id,
            health_score: score.health,
            activity_score: score.activity,
            recommendations: score.recommendations,
            avg_completion_hours: score.avg_completion_hours,
        })
    }

    /// Open opportunities inside the user's preferences, newest first.
    ///
    /// `threshold` applies to the profile-vs-opportunity similarity; candidates
    /// that cannot be compared by vector always pass.
    pub fn matching_opportunities_for_user(
        &mut self,
        user_id: Uuid,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<MatchedOpportunity>> {
        let limit = Limit::new(limit)?;
        let threshold = normalize_threshold(threshold);
        let user = self
            .conn
            .user(user_id)?
            .ok_or(RankError::UserNotFound(user_id))?;

        let mut matched: Vec<MatchedOpportunity> = self
            .conn
            .preference_candidates(&user)?
            .into_iter()
            .map(|candidate| MatchedOpportunity {
                match_score: candidate.vector_similarity.unwrap_or(UNSCORED_MATCH),
                opportunity: candidate.opportunity,
            })
            .filter(|m| m.match_score >= threshold)
            .collect();

        matched.sort_by(|a, b| {
            b.opportunity
                .created_at
                .cmp(&a.opportunity.created_at)
                .then_with(|| a.opportunity.id.cmp(&b.opportunity.id))
        });
        matched.truncate(limit.get());
        Ok(matched)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("strategy", &self.conn.strategy())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn opportunity_text(opportunity: &Opportunity) -> SearchableText<'_> {
    SearchableText::new()
        .title(&opportunity.title)
        .body_opt(opportunity.description.as_deref())
        .body_all(opportunity.required_skills.iter().map(String::as_str))
        .body_all(opportunity.technologies.iter().map(String::as_str))
}

fn repository_text(repository: &Repository) -> SearchableText<'_> {
    SearchableText::new()
        .title(&repository.name)
        .body_opt(repository.description.as_deref())
        .body_opt(repository.language.as_deref())
        .body_all(repository.topics.iter().map(String::as_str))
}

/// Start of a trending window. Windows reaching past 0001-01-01 start there,
/// which both stores order before any real timestamp.
fn window_start(now: DateTime<Utc>, window_hours: u32) -> DateTime<Utc> {
    let earliest = DateTime::<Utc>::from_timestamp(EARLIEST_WINDOW_START, 0)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    now.checked_sub_signed(Duration::hours(i64::from(window_hours)))
        .map_or(earliest, |since| since.max(earliest))
}
