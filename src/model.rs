//! Records read by the ranking core and the scored views it hands back.
//!
//! The core never mutates these; ingestion and product flows own their
//! lifecycle. Enumerations round-trip through a stable snake_case text form
//! that every storage strategy stores verbatim.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RankError, Result};

/// Embedding vectors are supplied already computed.
pub type Embedding = Vec<f32>;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RankError;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(RankError::Serialization(format!(
                        "invalid {} value {other:?}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Kind of contribution an opportunity asks for
    OpportunityType {
        BugFix => "bug_fix",
        Feature => "feature",
        Documentation => "documentation",
        Test => "test",
        Refactor => "refactor",
        Security => "security",
    }
);

text_enum!(
    Difficulty {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
);

text_enum!(
    OpportunityStatus {
        Open => "open",
        Assigned => "assigned",
        InProgress => "in_progress",
        Completed => "completed",
        Closed => "closed",
    }
);

text_enum!(
    SkillLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
);

text_enum!(
    NotificationCadence {
        Immediate => "immediate",
        Daily => "daily",
        Weekly => "weekly",
        Never => "never",
    }
);

text_enum!(
    /// Final state of a contribution attempt
    OutcomeStatus {
        InProgress => "in_progress",
        Completed => "completed",
        Abandoned => "abandoned",
        Rejected => "rejected",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stars: i64,
    #[serde(default)]
    pub forks: i64,
    #[serde(default)]
    pub first_time_friendly: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub estimated_hours: Option<i32>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub application_count: i64,
    pub status: OpportunityStatus,
    #[serde(default)]
    pub title_embedding: Option<Embedding>,
    #[serde(default)]
    pub description_embedding: Option<Embedding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub preferred_types: Vec<OpportunityType>,
    #[serde(default)]
    pub max_estimated_hours: Option<i32>,
    pub notification_cadence: NotificationCadence,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferred_types: Vec::new(),
            max_estimated_hours: None,
            notification_cadence: NotificationCadence::Weekly,
        }
    }
}

impl UserPreferences {
    /// Whether an opportunity falls inside this preference record.
    ///
    /// An empty type list accepts every type; unknown estimates pass the hours cap.
    pub fn accepts(&self, opportunity: &Opportunity) -> bool {
        let type_ok =
            self.preferred_types.is_empty() || self.preferred_types.contains(&opportunity.kind);
        let hours_ok = match (self.max_estimated_hours, opportunity.estimated_hours) {
            (Some(max), Some(estimate)) => estimate <= max,
            _ => true,
        };
        type_ok && hours_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    #[serde(default)]
    pub email: Option<String>,
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub profile_embedding: Option<Embedding>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionOutcome {
    pub id: Uuid,
    pub user_id: Uuid,
    pub opportunity_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: OutcomeStatus,
}

impl ContributionOutcome {
    /// Hours from start to completion, for resolved outcomes only.
    pub fn completion_hours(&self) -> Option<f64> {
        if self.status != OutcomeStatus::Completed {
            return None;
        }
        let completed = self.completed_at?;
        let seconds = (completed - self.started_at).num_seconds();
        if seconds < 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(seconds as f64 / 3600.0)
    }
}

// =============================================================================
// Candidate rows
// =============================================================================

/// An opportunity as fetched for ranking, with the vector similarity the
/// backend computed against the query vector (if any).
#[derive(Debug, Clone)]
pub struct OpportunityCandidate {
    pub opportunity: Opportunity,
    pub vector_similarity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RepositoryCandidate {
    pub repository: Repository,
    pub vector_similarity: Option<f64>,
    /// Open opportunities belonging to the repository, used for the health tie-break.
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone)]
pub struct UserCandidate {
    pub user: User,
    pub vector_similarity: Option<f64>,
}

// =============================================================================
// Scored results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedOpportunity {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRepository {
    #[serde(flatten)]
    pub repository: Repository,
    pub relevance_score: f64,
    pub health_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarUser {
    #[serde(flatten)]
    pub user: User,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingOpportunity {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub trending_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedOpportunity {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub match_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub repository_id: Uuid,
    pub health_score: f64,
    pub activity_score: f64,
    pub recommendations: Vec<String>,
    pub avg_completion_hours: f64,
}
