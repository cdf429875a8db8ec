//! Trending score: a fixed blend of engagement counters.

use chrono::{DateTime, Utc};

use crate::model::Opportunity;

const VIEW_WEIGHT: f64 = 0.7;
const APPLICATION_WEIGHT: f64 = 1.5;

/// `views * 0.7 + applications * 1.5`. Unbounded; negative counters count as 0.
#[allow(clippy::cast_precision_loss)]
pub fn trending_score(views: i64, applications: i64) -> f64 {
    views.max(0) as f64 * VIEW_WEIGHT + applications.max(0) as f64 * APPLICATION_WEIGHT
}

/// Total engagement compared against the caller's floor.
pub const fn engagement(opportunity: &Opportunity) -> i64 {
    opportunity
        .view_count
        .saturating_add(opportunity.application_count)
}

/// Whether an opportunity belongs in a trending candidate set.
pub fn is_trending_candidate(
    opportunity: &Opportunity,
    since: DateTime<Utc>,
    min_engagement: i64,
) -> bool {
    opportunity.created_at >= since && engagement(opportunity) >= min_engagement
}
