use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::api::election::ElectionDescription;
use crate::tally::{HourlyVotes, PartyVotes, PositionResult, PositionVotes, Turnout};

/// Full results for the active election, as shown on the public results page
/// and the live dashboard.
#[derive(Serialize)]
pub struct ElectionResults {
    pub election: ElectionDescription,
    pub turnout: Turnout,
    pub total_votes: u64,
    pub positions: Vec<PositionResult>,
}

/// Headline numbers for the admin dashboard.
#[derive(Serialize)]
pub struct ElectionSummary {
    pub election: ElectionDescription,
    pub turnout: Turnout,
    pub total_votes: u64,
    pub total_positions: u64,
    pub total_candidates: u64,
    pub positions: Vec<PositionResult>,
}

/// Voting-activity breakdowns for the analytics page.
#[derive(Serialize)]
pub struct AnalyticsReport {
    pub election: ElectionDescription,
    pub turnout: Turnout,
    pub total_votes: u64,
    pub votes_by_position: Vec<PositionVotes>,
    pub votes_by_party: Vec<PartyVotes>,
    pub votes_by_hour: Vec<HourlyVotes>,
}

/// Printable end-of-election report.
#[derive(Serialize)]
pub struct ElectionReport {
    pub election: ElectionDescription,
    pub generated_at: DateTime<Utc>,
    pub turnout: Turnout,
    pub total_votes: u64,
    pub positions: Vec<PositionResult>,
}
