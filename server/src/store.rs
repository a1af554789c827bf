//! In-memory event store.
//!
//! [`EventStore`] owns every piece of mutable server state: the team roster,
//! the points ledger, the append-only judge score log, and the simple CRUD
//! collections (users, gigs, mentors, check-ins, announcements). It is
//! constructed once at startup and shared behind a `tokio::sync::RwLock`;
//! there is no hidden global.
//!
//! The leaderboard is never stored. [`EventStore::compute_leaderboard`]
//! recomputes it from the roster and the ledger on every request or broadcast,
//! so callers holding the write guard can produce a snapshot that is exactly
//! consistent with the mutation they just committed.

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::types::{
    Announcement, CategorySummary, CheckinRecord, Gig, LeaderboardRow, Mentor, ScoreRecord, Team,
    TeamSummary,
};

/// Points automatically awarded on each check-in.
pub const CHECKIN_POINTS: i64 = 5;

/// Check-in code used when the client does not supply one.
pub const DEFAULT_CHECKIN_CODE: &str = "PULSE2026";

/// Inclusive judge score range.
pub const SCORE_MIN: i64 = 0;
/// Inclusive judge score range.
pub const SCORE_MAX: i64 = 10;

/// All mutable server state.
#[derive(Debug)]
pub struct EventStore {
    /// email -> user id (mock login).
    users: HashMap<String, String>,

    /// Team roster in creation order. Order matters: leaderboard ties keep
    /// roster order, so this stays a Vec rather than a map.
    teams: Vec<Team>,

    /// Points ledger: team id -> cumulative points. Entries are created
    /// lazily on first mutation and never deleted. A ledger entry may exist
    /// for a team id that is not in the roster; such points are invisible on
    /// the leaderboard (the roster is authoritative).
    points: HashMap<String, i64>,

    /// Append-only judge score log.
    scores: Vec<ScoreRecord>,

    /// Check-in log.
    checkins: Vec<CheckinRecord>,

    gigs: Vec<Gig>,
    mentors: Vec<Mentor>,
    announcements: Vec<Announcement>,
}

impl EventStore {
    /// Creates an empty store with the default mentor directory seeded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            teams: Vec::new(),
            points: HashMap::new(),
            scores: Vec::new(),
            checkins: Vec::new(),
            gigs: Vec::new(),
            mentors: default_mentors(),
            announcements: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Mock login: returns the existing user id for the email, creating one
    /// on first sight. Emails are normalized to lowercase.
    pub fn login(&mut self, email: &str) -> Result<(String, String)> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ApiError::validation("email required"));
        }
        let user_id = self
            .users
            .entry(email.clone())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        Ok((user_id, email))
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Appends a new team to the roster and returns it.
    pub fn create_team(&mut self, name: impl Into<String>) -> Team {
        let team = Team::new(name);
        debug!(team_id = %team.id, team_name = %team.name, "Team created");
        self.teams.push(team.clone());
        team
    }

    /// Looks up a team by id.
    #[must_use]
    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    /// Adds a generated member label to an existing team.
    pub fn join_team(&mut self, team_id: &str) -> Result<Team> {
        let team = self
            .teams
            .iter_mut()
            .find(|t| t.id == team_id)
            .ok_or_else(|| ApiError::not_found("team not found"))?;
        let label = format!("member-{}", team.members.len() + 1);
        team.members.push(label);
        Ok(team.clone())
    }

    /// All teams in creation order.
    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    // ------------------------------------------------------------------
    // Points ledger
    // ------------------------------------------------------------------

    /// Adds `delta` to a team's points total and returns the new total.
    ///
    /// The entry is created at 0 if absent. No bounds are enforced: negative
    /// deltas are accepted, and the team id is not checked against the
    /// roster. Points recorded against an id that never joins the roster are
    /// simply never shown.
    pub fn add_points(&mut self, team_id: &str, delta: i64) -> i64 {
        let total = self.points.entry(team_id.to_string()).or_insert(0);
        *total += delta;
        debug!(team_id, delta, total = *total, "Points updated");
        *total
    }

    /// Current points total for a team (0 when no ledger entry exists).
    #[must_use]
    pub fn points(&self, team_id: &str) -> i64 {
        self.points.get(team_id).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Check-ins
    // ------------------------------------------------------------------

    /// Records a check-in and awards the flat check-in bonus.
    pub fn record_checkin(&mut self, team_id: &str, code: Option<String>) -> CheckinRecord {
        let record = CheckinRecord {
            id: Uuid::new_v4().to_string(),
            team_id: team_id.to_string(),
            code: code.unwrap_or_else(|| DEFAULT_CHECKIN_CODE.to_string()),
            ts: Utc::now(),
        };
        self.checkins.push(record.clone());
        self.add_points(team_id, CHECKIN_POINTS);
        record
    }

    // ------------------------------------------------------------------
    // Judging
    // ------------------------------------------------------------------

    /// Appends a judge score and credits it to the team's points 1:1.
    ///
    /// The 1:1 crediting is a deliberate demo rule, not an oversight.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Validation`] when `score` is outside `[0, 10]`
    /// - [`ApiError::NotFound`] when `team_id` is not in the roster
    ///
    /// On error nothing is mutated: neither the score log nor the ledger.
    pub fn record_score(
        &mut self,
        team_id: &str,
        judge: impl Into<String>,
        category: impl Into<String>,
        score: i64,
    ) -> Result<ScoreRecord> {
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            return Err(ApiError::validation(format!(
                "score must be between {SCORE_MIN} and {SCORE_MAX}"
            )));
        }
        if self.team(team_id).is_none() {
            return Err(ApiError::not_found("team not found"));
        }

        let record = ScoreRecord {
            team_id: team_id.to_string(),
            judge: judge.into(),
            category: category.into(),
            score,
            ts: Utc::now(),
        };
        self.scores.push(record.clone());
        self.add_points(team_id, score);
        Ok(record)
    }

    /// Computes per-team, per-category judging summaries in a single pass
    /// over the score log.
    ///
    /// Teams without score records are absent from the returned map.
    #[must_use]
    pub fn summarize(&self) -> HashMap<String, TeamSummary> {
        #[derive(Default)]
        struct Accumulator {
            total: ScoreTally,
            by_category: HashMap<String, ScoreTally>,
        }

        let mut acc: HashMap<&str, Accumulator> = HashMap::new();
        for record in &self.scores {
            let entry = acc.entry(&record.team_id).or_default();
            entry.total.observe(record.score);
            entry
                .by_category
                .entry(record.category.clone())
                .or_default()
                .observe(record.score);
        }

        acc.into_iter()
            .map(|(team_id, entry)| {
                let (avg, count) = entry.total.finalize();
                let by_category = entry
                    .by_category
                    .into_iter()
                    .map(|(category, tally)| {
                        let (avg, count) = tally.finalize();
                        (category, CategorySummary { avg, count })
                    })
                    .collect();
                (
                    team_id.to_string(),
                    TeamSummary {
                        avg,
                        count,
                        by_category,
                    },
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Leaderboard
    // ------------------------------------------------------------------

    /// Builds the ranked leaderboard from the roster and the points ledger.
    ///
    /// One row per roster team (points default to 0), sorted descending by
    /// points with a stable sort so ties keep roster order. Ledger entries
    /// for ids outside the roster do not produce rows.
    #[must_use]
    pub fn compute_leaderboard(&self) -> Vec<LeaderboardRow> {
        let mut rows: Vec<LeaderboardRow> = self
            .teams
            .iter()
            .map(|team| LeaderboardRow {
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                points: self.points(&team.id),
            })
            .collect();
        // Vec::sort_by is stable, which is what keeps roster order on ties.
        rows.sort_by(|a, b| b.points.cmp(&a.points));
        rows
    }

    // ------------------------------------------------------------------
    // Gigs, mentors, announcements
    // ------------------------------------------------------------------

    /// Posts a new gig.
    pub fn add_gig(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        reward_points: i64,
    ) -> Gig {
        let gig = Gig {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            reward_points,
            created_at: Utc::now(),
        };
        self.gigs.push(gig.clone());
        gig
    }

    /// All posted gigs in creation order.
    #[must_use]
    pub fn gigs(&self) -> &[Gig] {
        &self.gigs
    }

    /// The mentor directory.
    #[must_use]
    pub fn mentors(&self) -> &[Mentor] {
        &self.mentors
    }

    /// Appends a message to the announcement feed.
    pub fn add_announcement(&mut self, message: impl Into<String>) -> Announcement {
        let announcement = Announcement {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            ts: Utc::now(),
        };
        self.announcements.push(announcement.clone());
        announcement
    }

    /// The announcement feed in posting order.
    #[must_use]
    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Running sum and count for one slice of the score log.
#[derive(Debug, Default)]
struct ScoreTally {
    sum: i64,
    count: u64,
}

impl ScoreTally {
    fn observe(&mut self, score: i64) {
        self.sum += score;
        self.count += 1;
    }

    /// Finalizes into (average, count). Only called for tallies that saw at
    /// least one score, so the division is well defined.
    fn finalize(&self) -> (f64, u64) {
        (self.sum as f64 / self.count as f64, self.count)
    }
}

/// The mentor directory seeded at startup.
fn default_mentors() -> Vec<Mentor> {
    vec![
        Mentor {
            id: "m1".to_string(),
            name: "Prof. Alvarez".to_string(),
            skills: vec!["Design Thinking".to_string(), "Product".to_string()],
            slots: vec!["10:00".to_string(), "11:00".to_string(), "13:00".to_string()],
        },
        Mentor {
            id: "m2".to_string(),
            name: "Prof. Okafor".to_string(),
            skills: vec!["Finance".to_string(), "Valuation".to_string()],
            slots: vec!["10:30".to_string(), "12:30".to_string(), "14:00".to_string()],
        },
        Mentor {
            id: "m3".to_string(),
            name: "Alumni Mentor".to_string(),
            skills: vec!["AI/ML".to_string(), "Deploy".to_string()],
            slots: vec!["11:30".to_string(), "13:30".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_points_accumulates_running_sum() {
        let mut store = EventStore::new();
        assert_eq!(store.add_points("t1", 5), 5);
        assert_eq!(store.add_points("t1", 3), 8);
        assert_eq!(store.add_points("t1", -2), 6);
        assert_eq!(store.points("t1"), 6);
    }

    #[test]
    fn points_default_to_zero_without_entry() {
        let store = EventStore::new();
        assert_eq!(store.points("missing"), 0);
    }

    #[test]
    fn leaderboard_sort_is_stable_on_ties() {
        let mut store = EventStore::new();
        let a = store.create_team("A");
        let b = store.create_team("B");
        let c = store.create_team("C");
        store.add_points(&a.id, 10);
        store.add_points(&b.id, 20);
        store.add_points(&c.id, 10);

        let rows = store.compute_leaderboard();
        let names: Vec<&str> = rows.iter().map(|r| r.team_name.as_str()).collect();
        // A before C despite equal points: A was created first.
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn leaderboard_defaults_points_to_zero() {
        let mut store = EventStore::new();
        let team = store.create_team("Fresh");

        let rows = store.compute_leaderboard();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team_id, team.id);
        assert_eq!(rows[0].points, 0);
    }

    #[test]
    fn leaderboard_drops_points_for_unknown_team_ids() {
        let mut store = EventStore::new();
        store.create_team("Known");
        // Award against an id that was never created. The ledger keeps it,
        // but the roster is authoritative for leaderboard rows.
        store.add_points("ghost-team", 50);

        let rows = store.compute_leaderboard();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team_name, "Known");
        assert_eq!(store.points("ghost-team"), 50);
    }

    #[test]
    fn record_checkin_awards_flat_bonus() {
        let mut store = EventStore::new();
        let team = store.create_team("Rocket");

        let record = store.record_checkin(&team.id, None);
        assert_eq!(record.code, DEFAULT_CHECKIN_CODE);
        assert_eq!(store.points(&team.id), CHECKIN_POINTS);

        store.record_checkin(&team.id, Some("CUSTOM".to_string()));
        assert_eq!(store.points(&team.id), 2 * CHECKIN_POINTS);
    }

    #[test]
    fn record_score_credits_points_one_to_one() {
        let mut store = EventStore::new();
        let team = store.create_team("Rocket");

        let record = store.record_score(&team.id, "judge", "demo", 8).unwrap();
        assert_eq!(record.score, 8);
        assert_eq!(store.points(&team.id), 8);
    }

    #[test]
    fn record_score_rejects_out_of_range_without_mutation() {
        let mut store = EventStore::new();
        let team = store.create_team("Rocket");

        let err = store.record_score(&team.id, "judge", "demo", 11).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(store.points(&team.id), 0);
        assert!(store.summarize().is_empty());

        let err = store.record_score(&team.id, "judge", "demo", -1).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn record_score_rejects_unknown_team() {
        let mut store = EventStore::new();
        let err = store.record_score("nope", "judge", "demo", 5).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.points("nope"), 0);
    }

    #[test]
    fn summarize_omits_teams_without_scores() {
        let mut store = EventStore::new();
        let scored = store.create_team("Scored");
        let silent = store.create_team("Silent");

        store.record_score(&scored.id, "j1", "pitch", 7).unwrap();
        store.record_score(&scored.id, "j2", "pitch", 9).unwrap();

        let summary = store.summarize();
        assert!(summary.contains_key(&scored.id));
        assert!(!summary.contains_key(&silent.id));

        let team_summary = &summary[&scored.id];
        assert_eq!(team_summary.avg, 8.0);
        assert_eq!(team_summary.count, 2);
        let pitch = &team_summary.by_category["pitch"];
        assert_eq!(pitch.avg, 8.0);
        assert_eq!(pitch.count, 2);
    }

    #[test]
    fn summarize_splits_categories() {
        let mut store = EventStore::new();
        let team = store.create_team("Rocket");
        store.record_score(&team.id, "j1", "pitch", 6).unwrap();
        store.record_score(&team.id, "j1", "demo", 10).unwrap();

        let summary = store.summarize();
        let team_summary = &summary[&team.id];
        assert_eq!(team_summary.avg, 8.0);
        assert_eq!(team_summary.count, 2);
        assert_eq!(team_summary.by_category["pitch"].avg, 6.0);
        assert_eq!(team_summary.by_category["demo"].avg, 10.0);
        assert_eq!(team_summary.by_category["demo"].count, 1);
    }

    #[test]
    fn login_is_idempotent_per_email() {
        let mut store = EventStore::new();
        let (id1, email1) = store.login("Judge@Example.COM ").unwrap();
        let (id2, email2) = store.login("judge@example.com").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(email1, "judge@example.com");
        assert_eq!(email2, "judge@example.com");
    }

    #[test]
    fn login_rejects_empty_email() {
        let mut store = EventStore::new();
        assert!(matches!(
            store.login("   ").unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn join_team_appends_member_labels() {
        let mut store = EventStore::new();
        let team = store.create_team("Rocket");

        let joined = store.join_team(&team.id).unwrap();
        assert_eq!(joined.members, vec!["member-1"]);
        let joined = store.join_team(&team.id).unwrap();
        assert_eq!(joined.members, vec!["member-1", "member-2"]);
    }

    #[test]
    fn join_team_rejects_unknown_id() {
        let mut store = EventStore::new();
        assert!(matches!(
            store.join_team("nope").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn mentors_are_seeded() {
        let store = EventStore::new();
        assert_eq!(store.mentors().len(), 3);
        assert!(store.gigs().is_empty());
        assert!(store.announcements().is_empty());
    }

    #[test]
    fn announcements_keep_posting_order() {
        let mut store = EventStore::new();
        store.add_announcement("judging starts in 10 minutes");
        store.add_announcement("pizza has arrived");

        let messages: Vec<&str> = store
            .announcements()
            .iter()
            .map(|a| a.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["judging starts in 10 minutes", "pizza has arrived"]
        );
    }
}
