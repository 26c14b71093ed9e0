use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::Id;

/// How long a voter has to fill in their ballot, in seconds.
pub const BALLOT_TIME_LIMIT_SECS: u32 = 120;

/// Remaining time at which the voter is warned, in seconds.
pub const TIME_WARNING_SECS: u32 = 30;

/// The lifecycle state of a ballot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The voter is stepping through positions and making selections.
    InProgress,
    /// A submission has been handed to the storage layer; no edits allowed.
    Submitting,
    /// The ballot was recorded. Terminal.
    Submitted,
    /// The timer ran out before submission; selections were discarded. Terminal.
    TimedOut,
    /// The active election has no positions, so there is nothing to vote on. Terminal.
    Empty,
}

/// A rejected session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("The ballot has no positions to vote on.")]
    EmptyBallot,
    #[error("This ballot session has already ended.")]
    SessionOver,
    #[error("A submission is already in progress for this session.")]
    SubmissionInProgress,
    #[error("That position is not the one currently on screen.")]
    PositionNotCurrent,
    #[error("That candidate does not stand for the current position.")]
    CandidateNotInPosition,
    #[error("Select a candidate before moving to the next position.")]
    NoSelection,
    #[error("The ballot can only be submitted from the final position.")]
    NotAtFinalStep,
    #[error("Every position needs a selection before the ballot can be submitted.")]
    IncompleteBallot,
}

/// Something noteworthy that happened on a timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAlert {
    /// The remaining time just crossed the warning threshold.
    Warning,
    /// The timer ran out; the session is now timed out.
    Expired,
}

/// A candidate on the ballot.
#[derive(Debug, Clone)]
pub struct BallotCandidate {
    pub id: Id,
    pub name: String,
    pub gender: Option<String>,
    pub party: Option<String>,
}

/// A position on the ballot, with the candidates standing for it.
#[derive(Debug, Clone)]
pub struct BallotPosition {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub candidates: Vec<BallotCandidate>,
}

impl BallotPosition {
    pub fn has_candidate(&self, candidate_id: Id) -> bool {
        self.candidates.iter().any(|c| c.id == candidate_id)
    }
}

/// One voter's in-memory ballot session.
///
/// The machine is the sole guardian of ballot progress: selections only change
/// through [`select`](Self::select), and a vote batch can only be produced by
/// driving the machine into `Submitting`. Nothing here touches the database.
#[derive(Debug)]
pub struct BallotSession {
    voter_id: Id,
    voter_name: String,
    election_id: Id,
    positions: Vec<BallotPosition>,
    /// Maps position IDs to the selected candidate ID. Re-selecting a
    /// position overwrites its previous entry.
    selections: HashMap<Id, Id>,
    step: usize,
    remaining_seconds: u32,
    state: SessionState,
}

impl BallotSession {
    /// Open a session over the given positions, in ballot order.
    ///
    /// A ballot with no positions starts (and stays) in [`SessionState::Empty`].
    pub fn new(
        voter_id: Id,
        voter_name: String,
        election_id: Id,
        positions: Vec<BallotPosition>,
    ) -> Self {
        let (state, remaining_seconds) = if positions.is_empty() {
            (SessionState::Empty, 0)
        } else {
            (SessionState::InProgress, BALLOT_TIME_LIMIT_SECS)
        };
        Self {
            voter_id,
            voter_name,
            election_id,
            positions,
            selections: HashMap::new(),
            step: 0,
            remaining_seconds,
            state,
        }
    }

    pub fn voter_id(&self) -> Id {
        self.voter_id
    }

    pub fn voter_name(&self) -> &str {
        &self.voter_name
    }

    pub fn election_id(&self) -> Id {
        self.election_id
    }

    pub fn positions(&self) -> &[BallotPosition] {
        &self.positions
    }

    pub fn selections(&self) -> &HashMap<Id, Id> {
        &self.selections
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The position currently on screen.
    pub fn current_position(&self) -> Option<&BallotPosition> {
        self.positions.get(self.step)
    }

    /// Is this session in a state it can never leave?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SessionState::Submitted | SessionState::TimedOut | SessionState::Empty
        )
    }

    /// Is the timer live and inside the warning threshold?
    pub fn in_warning_window(&self) -> bool {
        matches!(
            self.state,
            SessionState::InProgress | SessionState::Submitting
        ) && self.remaining_seconds <= TIME_WARNING_SECS
    }

    fn require_in_progress(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::InProgress => Ok(()),
            SessionState::Submitting => Err(SessionError::SubmissionInProgress),
            SessionState::Empty => Err(SessionError::EmptyBallot),
            SessionState::Submitted | SessionState::TimedOut => Err(SessionError::SessionOver),
        }
    }

    /// Record a selection for the position currently on screen.
    ///
    /// Selecting again for the same position replaces the earlier choice.
    pub fn select(&mut self, position_id: Id, candidate_id: Id) -> Result<(), SessionError> {
        self.require_in_progress()?;

        // Unwrap safe: `InProgress` implies at least one position.
        let current = self.current_position().unwrap();
        if current.id != position_id {
            return Err(SessionError::PositionNotCurrent);
        }
        if !current.has_candidate(candidate_id) {
            return Err(SessionError::CandidateNotInPosition);
        }

        self.selections.insert(position_id, candidate_id);
        Ok(())
    }

    /// Move to the next position. Requires a selection on the current one;
    /// the step clamps at the final position.
    pub fn next(&mut self) -> Result<(), SessionError> {
        self.require_in_progress()?;

        // Unwrap safe: `InProgress` implies at least one position.
        let current = self.current_position().unwrap();
        if !self.selections.contains_key(&current.id) {
            return Err(SessionError::NoSelection);
        }

        self.step = (self.step + 1).min(self.positions.len() - 1);
        Ok(())
    }

    /// Move back to the previous position. The step saturates at the first
    /// position; earlier selections are kept for review.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.require_in_progress()?;
        self.step = self.step.saturating_sub(1);
        Ok(())
    }

    /// Advance the timer by one second.
    ///
    /// The timer keeps running during submission; if it expires there, the
    /// session still times out and the submission outcome is ignored.
    pub fn tick(&mut self) -> Option<TickAlert> {
        match self.state {
            SessionState::InProgress | SessionState::Submitting => {
                self.remaining_seconds -= 1;
                if self.remaining_seconds == 0 {
                    self.selections.clear();
                    self.state = SessionState::TimedOut;
                    Some(TickAlert::Expired)
                } else if self.remaining_seconds == TIME_WARNING_SECS {
                    Some(TickAlert::Warning)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Is every position selected?
    pub fn is_complete(&self) -> bool {
        self.selections.len() == self.positions.len()
    }

    /// Lock the session for submission. Only allowed from the final position
    /// with a complete ballot.
    pub fn begin_submission(&mut self) -> Result<(), SessionError> {
        self.require_in_progress()?;
        if self.step != self.positions.len() - 1 {
            return Err(SessionError::NotAtFinalStep);
        }
        if !self.is_complete() {
            return Err(SessionError::IncompleteBallot);
        }
        self.state = SessionState::Submitting;
        Ok(())
    }

    /// Mark the in-flight submission as recorded.
    ///
    /// A session that timed out while the storage layer was working stays
    /// timed out.
    pub fn complete_submission(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::Submitted;
        }
    }

    /// Return the session to the voter after a failed submission, keeping
    /// their selections so they can retry.
    pub fn fail_submission(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::InProgress;
        }
    }

    /// The (position, candidate) pairs to record, in ballot order.
    pub fn vote_batch(&self) -> Vec<(Id, Id)> {
        self.positions
            .iter()
            .filter_map(|position| {
                self.selections
                    .get(&position.id)
                    .map(|candidate| (position.id, *candidate))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(title: &str, candidates: usize) -> BallotPosition {
        BallotPosition {
            id: Id::new(),
            title: title.to_string(),
            description: None,
            category: "Leadership".to_string(),
            candidates: (0..candidates)
                .map(|i| BallotCandidate {
                    id: Id::new(),
                    name: format!("Candidate {i}"),
                    gender: None,
                    party: None,
                })
                .collect(),
        }
    }

    fn session(positions: Vec<BallotPosition>) -> BallotSession {
        BallotSession::new(Id::new(), "Jamie Smith".to_string(), Id::new(), positions)
    }

    /// Select the first candidate of the current position.
    fn select_current(s: &mut BallotSession) {
        let position = s.current_position().unwrap();
        let (pid, cid) = (position.id, position.candidates[0].id);
        s.select(pid, cid).unwrap();
    }

    #[test]
    fn new_session_starts_at_the_first_position_with_a_full_timer() {
        let s = session(vec![position("Head Prefect", 3), position("Sports Captain", 2)]);
        assert_eq!(SessionState::InProgress, s.state());
        assert_eq!(0, s.step());
        assert_eq!(BALLOT_TIME_LIMIT_SECS, s.remaining_seconds());
        assert!(s.selections().is_empty());
        assert!(!s.is_terminal());
    }

    #[test]
    fn empty_ballot_is_terminal_from_the_start() {
        let mut s = session(vec![]);
        assert_eq!(SessionState::Empty, s.state());
        assert!(s.is_terminal());
        assert_eq!(0, s.remaining_seconds());

        assert_eq!(Err(SessionError::EmptyBallot), s.next());
        assert_eq!(Err(SessionError::EmptyBallot), s.previous());
        assert_eq!(Err(SessionError::EmptyBallot), s.begin_submission());
        assert_eq!(None, s.tick());
        assert_eq!(SessionState::Empty, s.state());
    }

    #[test]
    fn selecting_twice_overwrites_the_earlier_choice() {
        let p = position("Head Prefect", 3);
        let (pid, first, second) = (p.id, p.candidates[0].id, p.candidates[1].id);
        let mut s = session(vec![p]);

        s.select(pid, first).unwrap();
        s.select(pid, second).unwrap();

        assert_eq!(1, s.selections().len());
        assert_eq!(Some(&second), s.selections().get(&pid));
    }

    #[test]
    fn selections_are_validated_against_the_current_position() {
        let first = position("Head Prefect", 2);
        let second = position("Sports Captain", 2);
        let (first_id, first_candidate) = (first.id, first.candidates[0].id);
        let (second_id, second_candidate) = (second.id, second.candidates[0].id);
        let mut s = session(vec![first, second]);

        // Not on screen yet.
        assert_eq!(
            Err(SessionError::PositionNotCurrent),
            s.select(second_id, second_candidate)
        );
        // Right position, wrong candidate.
        assert_eq!(
            Err(SessionError::CandidateNotInPosition),
            s.select(first_id, second_candidate)
        );

        s.select(first_id, first_candidate).unwrap();
    }

    #[test]
    fn next_requires_a_selection_and_clamps_at_the_final_position() {
        let mut s = session(vec![position("Head Prefect", 2), position("Sports Captain", 2)]);

        assert_eq!(Err(SessionError::NoSelection), s.next());

        select_current(&mut s);
        s.next().unwrap();
        assert_eq!(1, s.step());

        select_current(&mut s);
        s.next().unwrap();
        assert_eq!(1, s.step());
    }

    #[test]
    fn previous_saturates_and_preserves_selections() {
        let mut s = session(vec![position("Head Prefect", 2), position("Sports Captain", 2)]);

        s.previous().unwrap();
        assert_eq!(0, s.step());

        select_current(&mut s);
        s.next().unwrap();
        s.previous().unwrap();
        assert_eq!(0, s.step());
        assert_eq!(1, s.selections().len());
    }

    #[test]
    fn timer_warns_at_the_threshold_and_expires_at_zero() {
        let mut s = session(vec![position("Head Prefect", 2)]);
        select_current(&mut s);

        let mut alerts = Vec::new();
        for _ in 0..BALLOT_TIME_LIMIT_SECS {
            if let Some(alert) = s.tick() {
                alerts.push((s.remaining_seconds(), alert));
            }
        }

        assert_eq!(
            vec![
                (TIME_WARNING_SECS, TickAlert::Warning),
                (0, TickAlert::Expired)
            ],
            alerts
        );
        assert_eq!(SessionState::TimedOut, s.state());
        assert!(s.is_terminal());
        // Selections are discarded on expiry.
        assert!(s.selections().is_empty());
        assert!(s.vote_batch().is_empty());

        assert_eq!(Err(SessionError::SessionOver), s.next());
    }

    #[test]
    fn timer_ticks_regardless_of_activity() {
        let mut s = session(vec![position("Head Prefect", 2)]);

        for _ in 0..10 {
            s.tick();
            select_current(&mut s);
        }

        assert_eq!(BALLOT_TIME_LIMIT_SECS - 10, s.remaining_seconds());
    }

    #[test]
    fn warning_window_opens_at_the_threshold() {
        let mut s = session(vec![position("Head Prefect", 2)]);

        while s.remaining_seconds() > TIME_WARNING_SECS + 1 {
            s.tick();
        }
        assert!(!s.in_warning_window());
        s.tick();
        assert!(s.in_warning_window());
    }

    #[test]
    fn submission_is_only_allowed_from_a_complete_final_step() {
        let mut s = session(vec![position("Head Prefect", 2), position("Sports Captain", 2)]);

        select_current(&mut s);
        assert_eq!(Err(SessionError::NotAtFinalStep), s.begin_submission());

        s.next().unwrap();
        assert_eq!(Err(SessionError::IncompleteBallot), s.begin_submission());

        select_current(&mut s);
        s.begin_submission().unwrap();
        assert_eq!(SessionState::Submitting, s.state());
    }

    #[test]
    fn submitting_blocks_all_edits() {
        let p = position("Head Prefect", 2);
        let (pid, cid) = (p.id, p.candidates[0].id);
        let mut s = session(vec![p]);

        s.select(pid, cid).unwrap();
        s.begin_submission().unwrap();

        assert_eq!(Err(SessionError::SubmissionInProgress), s.select(pid, cid));
        assert_eq!(Err(SessionError::SubmissionInProgress), s.next());
        assert_eq!(Err(SessionError::SubmissionInProgress), s.previous());
        assert_eq!(
            Err(SessionError::SubmissionInProgress),
            s.begin_submission()
        );
    }

    #[test]
    fn completed_submission_is_terminal() {
        let mut s = session(vec![position("Head Prefect", 2)]);
        select_current(&mut s);
        s.begin_submission().unwrap();
        s.complete_submission();

        assert_eq!(SessionState::Submitted, s.state());
        assert!(s.is_terminal());
        assert_eq!(Err(SessionError::SessionOver), s.previous());
        // Selections remain visible on the confirmation screen.
        assert_eq!(1, s.selections().len());
    }

    #[test]
    fn failed_submission_returns_the_ballot_for_a_retry() {
        let mut s = session(vec![position("Head Prefect", 2)]);
        select_current(&mut s);
        s.begin_submission().unwrap();
        s.fail_submission();

        assert_eq!(SessionState::InProgress, s.state());
        assert_eq!(1, s.selections().len());
        s.begin_submission().unwrap();
    }

    #[test]
    fn timeout_during_submission_wins_over_completion() {
        let mut s = session(vec![position("Head Prefect", 2)]);
        select_current(&mut s);
        s.begin_submission().unwrap();

        for _ in 0..BALLOT_TIME_LIMIT_SECS {
            s.tick();
        }
        assert_eq!(SessionState::TimedOut, s.state());

        s.complete_submission();
        assert_eq!(SessionState::TimedOut, s.state());
        s.fail_submission();
        assert_eq!(SessionState::TimedOut, s.state());
    }

    #[test]
    fn vote_batch_follows_ballot_order_and_final_choices() {
        let first = position("Head Prefect", 3);
        let second = position("Sports Captain", 3);
        let (first_id, second_id) = (first.id, second.id);
        let first_final = first.candidates[2].id;
        let second_choice = second.candidates[1].id;
        let first_initial = first.candidates[0].id;
        let mut s = session(vec![first, second]);

        s.select(first_id, first_initial).unwrap();
        s.next().unwrap();
        s.select(second_id, second_choice).unwrap();

        // Go back and change the first choice.
        s.previous().unwrap();
        s.select(first_id, first_final).unwrap();
        s.next().unwrap();
        s.begin_submission().unwrap();

        assert_eq!(
            vec![(first_id, first_final), (second_id, second_choice)],
            s.vote_batch()
        );
    }
}
