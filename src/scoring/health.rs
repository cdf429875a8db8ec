//! Repository health scoring
//!
//! Health blends three signals, each in [0, 1]:
//!
//! - popularity: log-scaled stars and forks
//! - friendliness: first-timer flag plus the beginner share of open work
//! - learning potential: documentation/test share plus technology breadth
//!
//! The score is recomputed per call from the records handed in and is never
//! written back anywhere.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    ContributionOutcome, Difficulty, Opportunity, OpportunityStatus, OpportunityType, Repository,
};

const STAR_SATURATION: f64 = 10_000.0;
const FORK_SATURATION: f64 = 1_000.0;
const TECHNOLOGY_SATURATION: f64 = 8.0;
const ACTIVITY_WINDOW_DAYS: i64 = 30;

const POPULARITY_WEIGHT: f64 = 0.40;
const FRIENDLINESS_WEIGHT: f64 = 0.35;
const LEARNING_WEIGHT: f64 = 0.25;

/// Records a health computation reads.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs<'a> {
    pub repository: &'a Repository,
    pub opportunities: &'a [Opportunity],
    pub outcomes: &'a [ContributionOutcome],
    pub now: DateTime<Utc>,
}

/// Breakdown of one health computation.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthScore {
    pub health: f64,
    pub popularity: f64,
    pub friendliness: f64,
    pub learning: f64,
    pub activity: f64,
    pub avg_completion_hours: f64,
    pub recommendations: Vec<String>,
}

impl HealthScore {
    pub fn compute(inputs: &HealthInputs<'_>) -> Self {
        let open: Vec<&Opportunity> = inputs
            .opportunities
            .iter()
            .filter(|o| o.status == OpportunityStatus::Open)
            .collect();

        let popularity = popularity(inputs.repository);
        let friendliness = friendliness(inputs.repository, &open);
        let learning = learning_potential(&open);
        let activity = activity(inputs.opportunities, inputs.now);
        let health = (POPULARITY_WEIGHT * popularity
            + FRIENDLINESS_WEIGHT * friendliness
            + LEARNING_WEIGHT * learning)
            .clamp(0.0, 1.0);

        let mut score = Self {
            health,
            popularity,
            friendliness,
            learning,
            activity,
            avg_completion_hours: average_completion_hours(inputs.outcomes),
            recommendations: Vec::new(),
        };
        score.recommendations = recommendations(&score, open.len());
        score
    }
}

/// Health alone, for tie-breaking where outcomes do not matter.
pub fn health_only(repository: &Repository, opportunities: &[Opportunity]) -> f64 {
    let open: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| o.status == OpportunityStatus::Open)
        .collect();
    (POPULARITY_WEIGHT * popularity(repository)
        + FRIENDLINESS_WEIGHT * friendliness(repository, &open)
        + LEARNING_WEIGHT * learning_potential(&open))
    .clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn log_scaled(count: i64, saturation: f64) -> f64 {
    let count = count.max(0) as f64;
    ((1.0 + count).ln() / (1.0 + saturation).ln()).min(1.0)
}

fn popularity(repository: &Repository) -> f64 {
    0.7 * log_scaled(repository.stars, STAR_SATURATION)
        + 0.3 * log_scaled(repository.forks, FORK_SATURATION)
}

#[allow(clippy::cast_precision_loss)]
fn share<F>(open: &[&Opportunity], predicate: F) -> f64
where
    F: Fn(&Opportunity) -> bool,
{
    if open.is_empty() {
        return 0.0;
    }
    open.iter().filter(|o| predicate(o)).count() as f64 / open.len() as f64
}

fn friendliness(repository: &Repository, open: &[&Opportunity]) -> f64 {
    let flag = if repository.first_time_friendly { 0.5 } else { 0.0 };
    flag + 0.5 * share(open, |o| o.difficulty == Difficulty::Beginner)
}

#[allow(clippy::cast_precision_loss)]
fn learning_potential(open: &[&Opportunity]) -> f64 {
    let guided = share(open, |o| {
        matches!(o.kind, OpportunityType::Documentation | OpportunityType::Test)
    });
    let technologies: HashSet<String> = open
        .iter()
        .flat_map(|o| o.technologies.iter().map(|t| t.to_lowercase()))
        .collect();
    let breadth = (technologies.len() as f64 / TECHNOLOGY_SATURATION).min(1.0);
    0.6 * guided + 0.4 * breadth
}

#[allow(clippy::cast_precision_loss)]
fn activity(opportunities: &[Opportunity], now: DateTime<Utc>) -> f64 {
    if opportunities.is_empty() {
        return 0.0;
    }
    let since = now - Duration::days(ACTIVITY_WINDOW_DAYS);
    let recent = opportunities.iter().filter(|o| o.created_at >= since).count();
    recent as f64 / opportunities.len() as f64
}

/// Mean hours to completion over resolved outcomes; 0 when there are none.
#[allow(clippy::cast_precision_loss)]
pub fn average_completion_hours(outcomes: &[ContributionOutcome]) -> f64 {
    let hours: Vec<f64> = outcomes
        .iter()
        .filter_map(ContributionOutcome::completion_hours)
        .collect();
    if hours.is_empty() {
        0.0
    } else {
        hours.iter().sum::<f64>() / hours.len() as f64
    }
}

fn recommendations(score: &HealthScore, open_count: usize) -> Vec<String> {
    let mut out = Vec::new();
    if open_count == 0 {
        out.push("Publish open contribution opportunities so newcomers have a place to start.".to_string());
    }
    if score.popularity < 0.3 {
        out.push("Increase visibility: add topics, a clear README and share the project with relevant communities.".to_string());
    }
    if score.friendliness < 0.5 {
        out.push("Label more beginner-level issues and mark the repository as welcoming first-time contributors.".to_string());
    }
    if score.learning < 0.4 {
        out.push("Add documentation and test opportunities; they are the easiest way to learn a codebase.".to_string());
    }
    if score.activity < 0.2 && open_count > 0 {
        out.push("Refresh the backlog: few opportunities were created in the last 30 days.".to_string());
    }
    if score.avg_completion_hours > 72.0 {
        out.push("Break large tasks into smaller pieces; contributions take more than three days on average.".to_string());
    }
    if out.is_empty() {
        out.push("Repository is in good shape for contributors; keep the backlog groomed.".to_string());
    }
    out
}
