//! In-memory strategy
//!
//! Tables are plain ordered maps. A [`MockDatabase`] holds the committed
//! state; each [`MockBackend`] works on a private copy taken at connect time,
//! so concurrent connections never see each other's writes and cleanup simply
//! restores the copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    Backend, Dataset, Strategy, check_optional_dimensions, lifecycle_noop, max_similarity,
};
use crate::error::{RankError, Result};
use crate::model::{
    ContributionOutcome, Opportunity, OpportunityCandidate, OpportunityStatus, Repository,
    RepositoryCandidate, User, UserCandidate,
};
use crate::scoring::trending::is_trending_candidate;
use crate::scoring::vector::{check_dimensions, optional_similarity};

#[derive(Debug, Clone, Default)]
struct MockTables {
    repositories: BTreeMap<Uuid, Repository>,
    opportunities: BTreeMap<Uuid, Opportunity>,
    users: BTreeMap<Uuid, User>,
    outcomes: BTreeMap<Uuid, ContributionOutcome>,
}

/// Shared committed state for mock connections.
#[derive(Debug, Clone)]
pub struct MockDatabase {
    tables: Arc<RwLock<MockTables>>,
    dimensions: usize,
}

impl MockDatabase {
    pub fn new(dimensions: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(MockTables::default())),
            dimensions,
        }
    }

    /// Write a dataset and commit it, so every later connection starts from it.
    pub fn seed(&self, dataset: &Dataset) -> Result<()> {
        let mut backend = self.connect();
        dataset.write_to(&mut backend)?;
        *self.tables.write() = backend.working.clone();
        Ok(())
    }

    pub fn connect(&self) -> MockBackend {
        let snapshot = self.tables.read().clone();
        MockBackend {
            working: snapshot.clone(),
            baseline: snapshot,
            dimensions: self.dimensions,
        }
    }
}

/// One mock connection.
#[derive(Debug)]
pub struct MockBackend {
    working: MockTables,
    baseline: MockTables,
    dimensions: usize,
}

impl MockBackend {
    fn duplicate(table: &str, id: Uuid) -> RankError {
        RankError::backend("mock", format!("duplicate key in {table}: {id}"))
    }

    fn opportunity_similarity(
        &self,
        query: Option<&[f32]>,
        opportunity: &Opportunity,
    ) -> Result<Option<f64>> {
        let title = optional_similarity(query, opportunity.title_embedding.as_deref())?;
        let description = optional_similarity(query, opportunity.description_embedding.as_deref())?;
        Ok(max_similarity(title, description))
    }

    fn live_opportunities(&self) -> impl Iterator<Item = &Opportunity> {
        self.working
            .opportunities
            .values()
            .filter(|o| self.working.repositories.contains_key(&o.repository_id))
    }
}

impl Backend for MockBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Mock
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert_repository(&mut self, repository: &Repository) -> Result<()> {
        check_optional_dimensions(repository.embedding.as_deref(), self.dimensions)?;
        if self.working.repositories.contains_key(&repository.id) {
            return Err(Self::duplicate("repositories", repository.id));
        }
        self.working
            .repositories
            .insert(repository.id, repository.clone());
        Ok(())
    }

    fn insert_opportunity(&mut self, opportunity: &Opportunity) -> Result<()> {
        check_optional_dimensions(opportunity.title_embedding.as_deref(), self.dimensions)?;
        check_optional_dimensions(opportunity.description_embedding.as_deref(), self.dimensions)?;
        if !self
            .working
            .repositories
            .contains_key(&opportunity.repository_id)
        {
            return Err(RankError::RepositoryNotFound(opportunity.repository_id));
        }
        if self.working.opportunities.contains_key(&opportunity.id) {
            return Err(Self::duplicate("opportunities", opportunity.id));
        }
        self.working
            .opportunities
            .insert(opportunity.id, opportunity.clone());
        Ok(())
    }

    fn insert_user(&mut self, user: &User) -> Result<()> {
        check_optional_dimensions(user.profile_embedding.as_deref(), self.dimensions)?;
        if self.working.users.contains_key(&user.id)
            || self.working.users.values().any(|u| u.handle == user.handle)
        {
            return Err(Self::duplicate("users", user.id));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    fn insert_outcome(&mut self, outcome: &ContributionOutcome) -> Result<()> {
        if !self.working.users.contains_key(&outcome.user_id) {
            return Err(RankError::UserNotFound(outcome.user_id));
        }
        if !self
            .working
            .opportunities
            .contains_key(&outcome.opportunity_id)
        {
            return Err(RankError::backend(
                "mock",
                format!("outcome references unknown opportunity {}", outcome.opportunity_id),
            ));
        }
        if self.working.outcomes.contains_key(&outcome.id) {
            return Err(Self::duplicate("contribution_outcomes", outcome.id));
        }
        self.working.outcomes.insert(outcome.id, outcome.clone());
        Ok(())
    }

    fn opportunity_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<OpportunityCandidate>> {
        if let Some(query) = query_vector {
            check_dimensions(query, self.dimensions)?;
        }
        self.live_opportunities()
            .map(|opportunity| {
                Ok(OpportunityCandidate {
                    vector_similarity: self.opportunity_similarity(query_vector, opportunity)?,
                    opportunity: opportunity.clone(),
                })
            })
            .collect()
    }

    fn repository_candidates(
        &mut self,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<RepositoryCandidate>> {
        if let Some(query) = query_vector {
            check_dimensions(query, self.dimensions)?;
        }
        self.working
            .repositories
            .values()
            .map(|repository| {
                let opportunities = self
                    .working
                    .opportunities
                    .values()
                    .filter(|o| o.repository_id == repository.id)
                    .filter(|o| o.status == OpportunityStatus::Open)
                    .cloned()
                    .collect();
                Ok(RepositoryCandidate {
                    vector_similarity: optional_similarity(
                        query_vector,
                        repository.embedding.as_deref(),
                    )?,
                    repository: repository.clone(),
                    opportunities,
                })
            })
            .collect()
    }

    fn user_candidates(&mut self, query_vector: &[f32]) -> Result<Vec<UserCandidate>> {
        check_dimensions(query_vector, self.dimensions)?;
        self.working
            .users
            .values()
            .filter(|u| u.profile_embedding.is_some())
            .map(|user| {
                Ok(UserCandidate {
                    vector_similarity: optional_similarity(
                        Some(query_vector),
                        user.profile_embedding.as_deref(),
                    )?,
                    user: user.clone(),
                })
            })
            .collect()
    }

    fn trending_candidates(
        &mut self,
        since: DateTime<Utc>,
        min_engagement: i64,
    ) -> Result<Vec<Opportunity>> {
        Ok(self
            .live_opportunities()
            .filter(|o| is_trending_candidate(o, since, min_engagement))
            .cloned()
            .collect())
    }

    fn preference_candidates(&mut self, user: &User) -> Result<Vec<OpportunityCandidate>> {
        let profile = user.profile_embedding.as_deref();
        self.live_opportunities()
            .filter(|o| o.status == OpportunityStatus::Open)
            .filter(|o| user.preferences.accepts(o))
            .map(|opportunity| {
                Ok(OpportunityCandidate {
                    vector_similarity: self.opportunity_similarity(profile, opportunity)?,
                    opportunity: opportunity.clone(),
                })
            })
            .collect()
    }

    fn repository(&mut self, id: Uuid) -> Result<Option<Repository>> {
        Ok(self.working.repositories.get(&id).cloned())
    }

    fn repository_opportunities(&mut self, id: Uuid) -> Result<Vec<Opportunity>> {
        Ok(self
            .working
            .opportunities
            .values()
            .filter(|o| o.repository_id == id)
            .cloned()
            .collect())
    }

    fn repository_outcomes(&mut self, id: Uuid) -> Result<Vec<ContributionOutcome>> {
        let tables = &self.working;
        Ok(tables
            .outcomes
            .values()
            .filter(|c| {
                tables
                    .opportunities
                    .get(&c.opportunity_id)
                    .is_some_and(|o| o.repository_id == id)
            })
            .cloned()
            .collect())
    }

    fn user(&mut self, id: Uuid) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    fn cleanup(&mut self) {
        if self.working.repositories.len() == self.baseline.repositories.len()
            && self.working.opportunities.len() == self.baseline.opportunities.len()
            && self.working.users.len() == self.baseline.users.len()
            && self.working.outcomes.len() == self.baseline.outcomes.len()
        {
            lifecycle_noop(Strategy::Mock, "rollback: nothing written");
        }
        self.working = self.baseline.clone();
    }
}
