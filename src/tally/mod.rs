//! Vote tallying: pure aggregation over recorded vote rows.
//!
//! Deleting a candidate does not delete their votes, so counting distinguishes
//! between *vote rows* (everything recorded for a position) and *declared
//! candidates* (what is currently on the ballot). Totals, percentages and the
//! winning count are taken over all rows; the ranked list and party breakdown
//! only cover declared candidates.

use std::collections::HashMap;

use chrono::Timelike;
use serde::Serialize;

use crate::model::{
    api::id::ApiId,
    db::{candidate::Candidate, position::Position, vote::Vote},
};

/// One candidate's tally within a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTally {
    pub id: ApiId,
    pub name: String,
    pub gender: Option<String>,
    pub party: Option<String>,
    pub votes: u64,
    /// Share of all votes recorded for the position, rounded to the nearest
    /// whole number.
    pub percentage: u32,
    /// Set for every candidate holding the position's highest vote count, so
    /// a tie marks all tied candidates rather than silently picking one.
    pub is_winner: bool,
}

/// The tallied outcome of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionResult {
    pub id: ApiId,
    pub title: String,
    pub category: String,
    /// Every vote recorded for this position, including votes whose candidate
    /// has since been deleted.
    pub total_votes: u64,
    /// Declared candidates, sorted by vote count descending. The sort is
    /// stable: tied candidates keep their input order.
    pub candidates: Vec<CandidateTally>,
}

/// Vote activity for one position, for the analytics breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionVotes {
    pub id: ApiId,
    pub title: String,
    pub candidates: u64,
    pub votes: u64,
}

/// Votes accumulated by one party across the declared candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyVotes {
    pub party: String,
    pub votes: u64,
}

/// Votes recorded within one hour of the day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyVotes {
    pub hour: u32,
    pub votes: u64,
}

/// Voter turnout figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turnout {
    pub total_voters: u64,
    pub voted_count: u64,
    /// Turnout as a percentage, rounded to the nearest whole number.
    pub percent: u32,
    /// Turnout as an exact percentage.
    pub rate: f64,
}

fn count_by<K: std::hash::Hash + Eq, I: Iterator<Item = K>>(keys: I) -> HashMap<K, u64> {
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Share of `part` in `total` as a whole-number percentage; 0 when empty.
fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u32
    }
}

/// Tally one position from its declared candidates and every vote recorded
/// for it.
pub fn position_result(
    position: &Position,
    candidates: &[Candidate],
    votes: &[Vote],
) -> PositionResult {
    let counts = count_by(votes.iter().map(|vote| vote.candidate_id));
    let total_votes = votes.len() as u64;
    let max_votes = counts.values().copied().max().unwrap_or(0);

    let mut tallies: Vec<CandidateTally> = candidates
        .iter()
        .map(|candidate| {
            let votes_for = counts.get(&candidate.id).copied().unwrap_or(0);
            CandidateTally {
                id: candidate.id.into(),
                name: candidate.name.clone(),
                gender: candidate.gender.clone(),
                party: candidate.party.clone(),
                votes: votes_for,
                percentage: percentage(votes_for, total_votes),
                is_winner: max_votes > 0 && votes_for == max_votes,
            }
        })
        .collect();
    // `sort_by` is stable, so ties keep their input order.
    tallies.sort_by(|a, b| b.votes.cmp(&a.votes));

    PositionResult {
        id: position.id.into(),
        title: position.title.clone(),
        category: position.category_label().to_string(),
        total_votes,
        candidates: tallies,
    }
}

/// Count every vote row and declared candidate per position, in the given
/// position order.
pub fn votes_by_position(
    positions: &[Position],
    candidates: &[Candidate],
    votes: &[Vote],
) -> Vec<PositionVotes> {
    let vote_counts = count_by(votes.iter().map(|vote| vote.position_id));
    let candidate_counts = count_by(candidates.iter().map(|candidate| candidate.position_id));
    positions
        .iter()
        .map(|position| PositionVotes {
            id: position.id.into(),
            title: position.title.clone(),
            candidates: candidate_counts.get(&position.id).copied().unwrap_or(0),
            votes: vote_counts.get(&position.id).copied().unwrap_or(0),
        })
        .collect()
}

/// Accumulate votes per party over the declared candidates. Candidates
/// without a party count as "Independent"; parties with no votes still
/// appear. Votes for deleted candidates are not attributable to a party and
/// are left out.
pub fn votes_by_party(candidates: &[Candidate], votes: &[Vote]) -> Vec<PartyVotes> {
    let counts = count_by(votes.iter().map(|vote| vote.candidate_id));
    let mut by_party: HashMap<&str, u64> = HashMap::new();
    for candidate in candidates {
        *by_party.entry(candidate.party_label()).or_insert(0) +=
            counts.get(&candidate.id).copied().unwrap_or(0);
    }

    let mut parties: Vec<PartyVotes> = by_party
        .into_iter()
        .map(|(party, votes)| PartyVotes {
            party: party.to_string(),
            votes,
        })
        .collect();
    parties.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.party.cmp(&b.party)));
    parties
}

/// Bucket votes by the hour of day they were cast (UTC). Only hours with
/// votes appear, in ascending hour order.
pub fn votes_by_hour(votes: &[Vote]) -> Vec<HourlyVotes> {
    let counts = count_by(votes.iter().map(|vote| vote.created_at.hour()));
    let mut hours: Vec<HourlyVotes> = counts
        .into_iter()
        .map(|(hour, votes)| HourlyVotes { hour, votes })
        .collect();
    hours.sort_by_key(|bucket| bucket.hour);
    hours
}

/// Compute turnout; an empty roll has zero turnout rather than a division
/// error.
pub fn turnout(total_voters: u64, voted_count: u64) -> Turnout {
    let rate = if total_voters == 0 {
        0.0
    } else {
        voted_count as f64 / total_voters as f64 * 100.0
    };
    Turnout {
        total_voters,
        voted_count,
        percent: rate.round() as u32,
        rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mongodb::Id;

    fn votes_for(candidate: &Candidate, n: usize) -> Vec<Vote> {
        (0..n)
            .map(|_| Vote::example(candidate.id, candidate.position_id))
            .collect()
    }

    #[test]
    fn counts_percentages_and_shared_winner_flags() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![
            Candidate::example(position.id, "Amara Okafor", Some("Unity")),
            Candidate::example(position.id, "Ben Whitfield", None),
            Candidate::example(position.id, "Chloe Ng", Some("Forward")),
        ];
        let mut votes = votes_for(&candidates[0], 5);
        votes.extend(votes_for(&candidates[1], 5));
        votes.extend(votes_for(&candidates[2], 2));

        let result = position_result(&position, &candidates, &votes);

        assert_eq!(12, result.total_votes);
        let by_name: HashMap<&str, &CandidateTally> = result
            .candidates
            .iter()
            .map(|tally| (tally.name.as_str(), tally))
            .collect();

        // 5/12 and 2/12 round to 42% and 17%.
        assert_eq!(42, by_name["Amara Okafor"].percentage);
        assert_eq!(42, by_name["Ben Whitfield"].percentage);
        assert_eq!(17, by_name["Chloe Ng"].percentage);

        // Both leaders are flagged on a tie.
        assert!(by_name["Amara Okafor"].is_winner);
        assert!(by_name["Ben Whitfield"].is_winner);
        assert!(!by_name["Chloe Ng"].is_winner);
    }

    #[test]
    fn candidates_are_sorted_by_votes_descending() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![
            Candidate::example(position.id, "Amara Okafor", None),
            Candidate::example(position.id, "Ben Whitfield", None),
        ];
        let mut votes = votes_for(&candidates[0], 1);
        votes.extend(votes_for(&candidates[1], 2));

        let result = position_result(&position, &candidates, &votes);

        assert_eq!("Ben Whitfield", result.candidates[0].name);
        assert_eq!(67, result.candidates[0].percentage);
        assert!(result.candidates[0].is_winner);
        assert_eq!("Amara Okafor", result.candidates[1].name);
        assert_eq!(33, result.candidates[1].percentage);
        assert!(!result.candidates[1].is_winner);
    }

    #[test]
    fn ties_keep_input_order() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![
            Candidate::example(position.id, "Amara Okafor", None),
            Candidate::example(position.id, "Ben Whitfield", None),
            Candidate::example(position.id, "Chloe Ng", None),
        ];
        let mut votes = votes_for(&candidates[0], 3);
        votes.extend(votes_for(&candidates[1], 3));
        votes.extend(votes_for(&candidates[2], 3));

        let result = position_result(&position, &candidates, &votes);

        let names: Vec<&str> = result
            .candidates
            .iter()
            .map(|tally| tally.name.as_str())
            .collect();
        assert_eq!(vec!["Amara Okafor", "Ben Whitfield", "Chloe Ng"], names);
        assert!(result.candidates.iter().all(|tally| tally.is_winner));
    }

    #[test]
    fn a_position_with_no_votes_has_no_winner() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![
            Candidate::example(position.id, "Amara Okafor", None),
            Candidate::example(position.id, "Ben Whitfield", None),
        ];

        let result = position_result(&position, &candidates, &[]);

        assert_eq!(0, result.total_votes);
        for tally in &result.candidates {
            assert_eq!(0, tally.votes);
            assert_eq!(0, tally.percentage);
            assert!(!tally.is_winner);
        }
    }

    #[test]
    fn votes_for_deleted_candidates_still_count_towards_the_total() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let declared = Candidate::example(position.id, "Amara Okafor", None);
        let deleted = Candidate::example(position.id, "Withdrawn", None);

        let mut votes = votes_for(&declared, 2);
        votes.extend(votes_for(&deleted, 3));

        // Only the declared candidate remains on the ballot.
        let result = position_result(&position, &[declared], &votes);

        assert_eq!(5, result.total_votes);
        assert_eq!(1, result.candidates.len());
        let tally = &result.candidates[0];
        assert_eq!(2, tally.votes);
        assert_eq!(40, tally.percentage);
        // The deleted candidate still holds the highest count.
        assert!(!tally.is_winner);
    }

    #[test]
    fn percentages_round_half_up() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![
            Candidate::example(position.id, "Amara Okafor", None),
            Candidate::example(position.id, "Ben Whitfield", None),
        ];
        let mut votes = votes_for(&candidates[0], 1);
        votes.extend(votes_for(&candidates[1], 7));

        let result = position_result(&position, &candidates, &votes);

        // 1/8 = 12.5% rounds to 13.
        assert_eq!(13, result.candidates[1].percentage);
        assert_eq!(88, result.candidates[0].percentage);
    }

    #[test]
    fn position_activity_counts_every_row_in_ballot_order() {
        let election_id = Id::new();
        let first = Position::example(election_id, "Head Prefect", 0);
        let second = Position::example(election_id, "Sports Captain", 1);
        let candidate = Candidate::example(first.id, "Amara Okafor", None);

        let mut votes = votes_for(&candidate, 2);
        // A vote on the second position for a deleted candidate.
        votes.push(Vote::example(Id::new(), second.id));

        let activity = votes_by_position(
            &[first.clone(), second.clone()],
            std::slice::from_ref(&candidate),
            &votes,
        );

        assert_eq!(
            vec![
                PositionVotes {
                    id: first.id.into(),
                    title: "Head Prefect".to_string(),
                    candidates: 1,
                    votes: 2,
                },
                PositionVotes {
                    id: second.id.into(),
                    title: "Sports Captain".to_string(),
                    candidates: 0,
                    votes: 1,
                },
            ],
            activity
        );
    }

    #[test]
    fn party_breakdown_defaults_to_independent_and_keeps_empty_parties() {
        let position_id = Id::new();
        let candidates = vec![
            Candidate::example(position_id, "Amara Okafor", Some("Unity")),
            Candidate::example(position_id, "Ben Whitfield", None),
            Candidate::example(position_id, "Chloe Ng", Some("Unity")),
            Candidate::example(position_id, "Dan Osei", Some("Forward")),
        ];
        let mut votes = votes_for(&candidates[0], 2);
        votes.extend(votes_for(&candidates[1], 1));
        votes.extend(votes_for(&candidates[2], 1));
        // A vote for a deleted candidate is attributable to no party.
        votes.push(Vote::example(Id::new(), position_id));

        let parties = votes_by_party(&candidates, &votes);

        assert_eq!(
            vec![
                PartyVotes {
                    party: "Unity".to_string(),
                    votes: 3,
                },
                PartyVotes {
                    party: "Independent".to_string(),
                    votes: 1,
                },
                PartyVotes {
                    party: "Forward".to_string(),
                    votes: 0,
                },
            ],
            parties
        );
    }

    #[test]
    fn hourly_buckets_are_sorted_and_sparse() {
        let candidate_id = Id::new();
        let position_id = Id::new();
        let votes = vec![
            Vote::example_at_hour(candidate_id, position_id, 14),
            Vote::example_at_hour(candidate_id, position_id, 9),
            Vote::example_at_hour(candidate_id, position_id, 14),
        ];

        let hours = votes_by_hour(&votes);

        assert_eq!(
            vec![
                HourlyVotes { hour: 9, votes: 1 },
                HourlyVotes { hour: 14, votes: 2 },
            ],
            hours
        );
    }

    #[test]
    fn turnout_handles_an_empty_roll() {
        let empty = turnout(0, 0);
        assert_eq!(0, empty.percent);
        assert_eq!(0.0, empty.rate);

        let partial = turnout(3, 2);
        assert_eq!(67, partial.percent);
        assert!((partial.rate - 66.666).abs() < 0.01);
    }

    #[test]
    fn tallying_is_idempotent() {
        let position = Position::example(Id::new(), "Head Prefect", 0);
        let candidates = vec![Candidate::example(position.id, "Amara Okafor", None)];
        let votes = votes_for(&candidates[0], 4);

        let first = position_result(&position, &candidates, &votes);
        let second = position_result(&position, &candidates, &votes);
        assert_eq!(first, second);
    }
}
