//! Local view of the subscribed session.
//!
//! The client never mutates session state on its own authority. It renders
//! whatever the latest server snapshot says, plus two purely cosmetic
//! adjustments: an optimistic "answered" flag while the submit is in flight,
//! and a local countdown that flips the displayed phase once the question
//! time limit has elapsed. Both are overwritten by the next snapshot.

use log::debug;
use shared::{GamePhase, Player, Session, QUESTION_TIME_LIMIT_MS};

#[derive(Debug)]
pub struct SessionView {
    /// The code this client is subscribed to. Snapshots for any other code
    /// are discarded.
    pub code: String,
    pub session: Option<Session>,
    /// Set locally when this client submits an answer, cleared by the next
    /// snapshot.
    optimistic_answered: bool,
}

impl SessionView {
    pub fn new(code: String) -> Self {
        Self {
            code,
            session: None,
            optimistic_answered: false,
        }
    }

    /// Replaces the local view with an authoritative snapshot. Snapshots for
    /// other codes are ignored so a stale broadcast cannot clobber the view
    /// after switching sessions.
    pub fn apply_snapshot(&mut self, code: &str, session: Option<Session>) {
        if code != self.code {
            debug!("Ignoring snapshot for {}", code);
            return;
        }
        self.session = session;
        self.optimistic_answered = false;
    }

    /// Marks the local player as having answered before the server confirms
    /// it. Keeps the UI responsive over a slow link.
    pub fn mark_answered(&mut self) {
        self.optimistic_answered = true;
    }

    pub fn has_answered(&self, player_id: &str) -> bool {
        if self.optimistic_answered {
            return true;
        }
        self.player(player_id).map(|p| p.has_answered).unwrap_or(false)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.session
            .as_ref()
            .and_then(|s| s.players.iter().find(|p| p.id == player_id))
    }

    /// Milliseconds left on the current question at `now_ms`, or zero when
    /// no question is active or time is up.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        let Some(session) = &self.session else {
            return 0;
        };
        if session.phase != GamePhase::QuestionActive {
            return 0;
        }
        let Some(started) = session.question_started_at_ms else {
            return 0;
        };
        let deadline = started + QUESTION_TIME_LIMIT_MS;
        deadline.saturating_sub(now_ms)
    }

    /// The phase to render at `now_ms`. The server does not run question
    /// timers, so the client shows an active question as resolved once the
    /// local countdown reaches zero.
    pub fn display_phase(&self, now_ms: u64) -> Option<GamePhase> {
        let session = self.session.as_ref()?;
        if session.phase == GamePhase::QuestionActive && self.remaining_ms(now_ms) == 0 {
            return Some(GamePhase::QuestionResolved);
        }
        Some(session.phase)
    }

    /// Players sorted by score, highest first. Ties keep join order.
    pub fn leaderboard(&self) -> Vec<&Player> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let mut players: Vec<&Player> = session.players.iter().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}
