//! Shared domain types for the Pulseboard server.
//!
//! These are the records held in the in-memory store and the payload shapes
//! pushed to live-update subscribers. Records are immutable once created
//! except for [`Team::members`], which grows as participants join.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hackathon team.
///
/// Owned by the CRUD layer; the leaderboard core only reads `id` and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Creates a new team with a generated id and an empty member list.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            members: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A micro-task posted on the gig board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gig {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_points: i64,
    pub created_at: DateTime<Utc>,
}

/// A mentor available for booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentor {
    pub id: String,
    pub name: String,
    pub skills: Vec<String>,
    pub slots: Vec<String>,
}

/// A check-in record appended when a team scans in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: String,
    pub team_id: String,
    pub code: String,
    pub ts: DateTime<Utc>,
}

/// A single judge score. Immutable once appended; the score log is the only
/// source of truth for judging summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub team_id: String,
    pub judge: String,
    pub category: String,
    pub score: i64,
    pub ts: DateTime<Utc>,
}

/// An organizer announcement on the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}

/// One row of the computed leaderboard. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub team_id: String,
    pub team_name: String,
    pub points: i64,
}

/// The message pushed to every live-update subscriber.
///
/// Serializes as `{"type": "leaderboard", "data": [...]}`. Each snapshot is the
/// full ranked leaderboard at one instant; there is no incremental form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Snapshot {
    Leaderboard { data: Vec<LeaderboardRow> },
}

impl Snapshot {
    /// Wraps computed leaderboard rows as a broadcastable snapshot.
    #[must_use]
    pub fn leaderboard(rows: Vec<LeaderboardRow>) -> Self {
        Self::Leaderboard { data: rows }
    }
}

/// Per-category slice of a team's judging summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub avg: f64,
    pub count: u64,
}

/// A team's judging summary: overall average plus per-category breakdown.
///
/// Teams with no score records are absent from the summary map rather than
/// present with a zero average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub avg: f64,
    pub count: u64,
    pub by_category: std::collections::HashMap<String, CategorySummary>,
}
