//! Authoritative session model: the game-state struct, its lifecycle state
//! machine, and the time-based scoring function.
//!
//! Every transition takes the current wall-clock time in milliseconds as an
//! argument instead of reading a clock, so the whole machine is deterministic
//! and testable without sleeping. The server owns the single authoritative
//! copy of each `Session`; clients only ever hold snapshots of it.

use crate::question::{sample_questions, validate_question_set, Question, OPTIONS_PER_QUESTION};
use crate::{random_suffix, BASE_POINTS, LATENCY_DIVISOR_MS, PLAYER_AVATARS};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One participant in a session. Created on join, removed only with the
/// session itself. The per-question fields (`has_answered`, `last_answer`,
/// `answer_latency_ms`) are cleared exactly when a new question goes active.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub has_answered: bool,
    pub last_answer: Option<usize>,
    pub answer_latency_ms: Option<u64>,
    pub avatar: Option<String>,
}

impl Player {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            has_answered: false,
            last_answer: None,
            answer_latency_ms: None,
            avatar: None,
        }
    }

    fn reset_for_next_question(&mut self) {
        self.has_answered = false;
        self.last_answer = None;
        self.answer_latency_ms = None;
    }
}

/// A collected prayer request (PrayerRequest mode only). The submitter's
/// name travels with the request so anonymous display is a render-time
/// choice, not a data loss.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrayerRequest {
    pub id: String,
    pub player_id: String,
    pub player_name: String,
    pub text: String,
    pub anonymous: bool,
    pub submitted_at_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Standard,
    IceBreaker,
    PrayerRequest,
}

/// Session lifecycle: Lobby -> QuestionActive -> QuestionResolved ->
/// (QuestionActive | Ended), with Ended terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Lobby,
    QuestionActive,
    QuestionResolved,
    Ended,
}

/// Why `start` was refused. `NoQuestions` is the one precondition failure
/// the protocol reports back to the caller; the rest are silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    NotInLobby,
    NoPlayers,
    NoQuestions,
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::NotInLobby => write!(f, "game already started"),
            StartError::NoPlayers => write!(f, "cannot start with no players"),
            StartError::NoQuestions => write!(f, "cannot start with no questions"),
        }
    }
}

/// Pure scoring function: zero for a wrong answer, otherwise a base of
/// 300 points minus one point per 100ms of answer latency, floored at zero.
pub fn score_answer(correct: bool, latency_ms: u64) -> u32 {
    if !correct {
        return 0;
    }
    let penalty = (latency_ms / LATENCY_DIVISOR_MS).min(u64::from(u32::MAX)) as u32;
    BASE_POINTS.saturating_sub(penalty)
}

/// One live game session. All mutation goes through the transition methods
/// below; each returns whether the intent was accepted so the hub can decide
/// whether to broadcast.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub code: String,
    pub moderator_id: String,
    pub players: Vec<Player>,
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub phase: GamePhase,
    pub question_started_at_ms: Option<u64>,
    pub mode: GameMode,
    pub prayer_requests: Vec<PrayerRequest>,
}

impl Session {
    /// Creates a session in the lobby. Standard mode gets the built-in
    /// question set up front; other modes wait for an explicit assignment.
    pub fn new(code: String, moderator_id: String, mode: GameMode) -> Self {
        let questions = match mode {
            GameMode::Standard => sample_questions(),
            GameMode::IceBreaker | GameMode::PrayerRequest => Vec::new(),
        };

        Self {
            code,
            moderator_id,
            players: Vec::new(),
            questions,
            current_question: 0,
            phase: GamePhase::Lobby,
            question_started_at_ms: None,
            mode,
            prayer_requests: Vec::new(),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// The question currently in play, if any.
    pub fn active_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }

    /// Adds a player while the session is still in the lobby. Idempotent on
    /// player id: joining twice leaves the roster unchanged but still counts
    /// as accepted.
    pub fn join(&mut self, player: Player) -> bool {
        if self.phase != GamePhase::Lobby {
            return false;
        }
        if self.player(&player.id).is_none() {
            self.players.push(player);
        }
        true
    }

    /// Pre-start cosmetic choice from the fixed palette. Duplicate avatars
    /// across players are allowed.
    pub fn set_avatar(&mut self, player_id: &str, avatar: &str) -> bool {
        if self.phase != GamePhase::Lobby {
            return false;
        }
        if !PLAYER_AVATARS.contains(&avatar) {
            return false;
        }
        match self.player_mut(player_id) {
            Some(player) => {
                player.avatar = Some(avatar.to_string());
                true
            }
            None => false,
        }
    }

    /// Replaces the question list. Only legal in the lobby; the list is
    /// frozen once the game starts.
    pub fn set_questions(&mut self, questions: Vec<Question>) -> bool {
        if self.phase != GamePhase::Lobby {
            return false;
        }
        if !validate_question_set(&questions) {
            return false;
        }
        self.questions = questions;
        true
    }

    /// Begins question 0. Players without an avatar get a random one from
    /// the palette.
    pub fn start(&mut self, now_ms: u64) -> Result<(), StartError> {
        if self.phase != GamePhase::Lobby {
            return Err(StartError::NotInLobby);
        }
        if self.players.is_empty() {
            return Err(StartError::NoPlayers);
        }
        if self.questions.is_empty() {
            return Err(StartError::NoQuestions);
        }

        let mut rng = rand::thread_rng();
        for player in self.players.iter_mut().filter(|p| p.avatar.is_none()) {
            if let Some(avatar) = PLAYER_AVATARS.choose(&mut rng) {
                player.avatar = Some((*avatar).to_string());
            }
        }

        self.phase = GamePhase::QuestionActive;
        self.current_question = 0;
        self.question_started_at_ms = Some(now_ms);
        Ok(())
    }

    /// Records and scores one answer. At most one scored answer per player
    /// per question: a second submission is rejected without touching state.
    /// When the last unanswered player submits, the session moves to
    /// QuestionResolved; the wall-clock deadline never forces a transition
    /// here, it is a client display concern.
    pub fn submit_answer(&mut self, player_id: &str, answer_index: usize, now_ms: u64) -> bool {
        if self.phase != GamePhase::QuestionActive {
            return false;
        }
        if answer_index >= OPTIONS_PER_QUESTION {
            return false;
        }
        let correct_index = match self.active_question() {
            Some(question) => question.correct_index,
            None => return false,
        };
        let started_at = self.question_started_at_ms.unwrap_or(now_ms);

        let Some(player) = self.player_mut(player_id) else {
            return false;
        };
        if player.has_answered {
            return false;
        }

        let latency_ms = now_ms.saturating_sub(started_at);
        player.has_answered = true;
        player.last_answer = Some(answer_index);
        player.answer_latency_ms = Some(latency_ms);
        player.score += score_answer(answer_index == correct_index, latency_ms);

        if self.players.iter().all(|p| p.has_answered) {
            self.phase = GamePhase::QuestionResolved;
        }
        true
    }

    /// Moves to the next question, or ends the game when the list is
    /// exhausted. Clears every player's per-question state.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        if self.phase != GamePhase::QuestionActive && self.phase != GamePhase::QuestionResolved {
            return false;
        }

        for player in &mut self.players {
            player.reset_for_next_question();
        }

        self.current_question += 1;
        if self.current_question >= self.questions.len() {
            self.phase = GamePhase::Ended;
            self.question_started_at_ms = None;
        } else {
            self.phase = GamePhase::QuestionActive;
            self.question_started_at_ms = Some(now_ms);
        }
        true
    }

    /// Moderator-triggered early termination. Legal from any non-terminal
    /// phase.
    pub fn end(&mut self) -> bool {
        if self.phase == GamePhase::Ended {
            return false;
        }
        self.phase = GamePhase::Ended;
        self.question_started_at_ms = None;
        true
    }

    /// Collects a prayer request (PrayerRequest mode only). `has_answered`
    /// gates one submission per player per round, mirroring answer handling.
    pub fn submit_prayer_request(
        &mut self,
        player_id: &str,
        text: &str,
        anonymous: bool,
        now_ms: u64,
    ) -> bool {
        if self.mode != GameMode::PrayerRequest {
            return false;
        }
        if text.trim().is_empty() {
            return false;
        }
        let Some(player) = self.player_mut(player_id) else {
            return false;
        };
        if player.has_answered {
            return false;
        }

        player.has_answered = true;
        let player_name = player.name.clone();
        let request = PrayerRequest {
            id: format!("prayer-{}-{}", now_ms, random_suffix()),
            player_id: player_id.to_string(),
            player_name,
            text: text.trim().to_string(),
            anonymous,
            submitted_at_ms: now_ms,
        };
        self.prayer_requests.push(request);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QUESTION_TIME_LIMIT_MS;

    fn two_player_session() -> Session {
        let mut session = Session::new("ABCD".into(), "mod-1".into(), GameMode::Standard);
        assert!(session.join(Player::new("alice".into(), "Alice".into())));
        assert!(session.join(Player::new("bob".into(), "Bob".into())));
        session
    }

    #[test]
    fn test_score_incorrect_is_zero_for_any_latency() {
        for latency in [0, 1, 100, 15_000, 30_000, u64::MAX] {
            assert_eq!(score_answer(false, latency), 0);
        }
    }

    #[test]
    fn test_score_correct_instant_is_base() {
        assert_eq!(score_answer(true, 0), 300);
    }

    #[test]
    fn test_score_correct_decays_per_100ms() {
        assert_eq!(score_answer(true, 200), 298);
        assert_eq!(score_answer(true, 15_000), 150);
        assert_eq!(score_answer(true, 299), 298);
    }

    #[test]
    fn test_score_floors_at_zero() {
        assert_eq!(score_answer(true, 30_000), 0);
        assert_eq!(score_answer(true, 1_000_000), 0);
    }

    #[test]
    fn test_new_standard_session_has_default_questions() {
        let session = Session::new("ABCD".into(), "mod-1".into(), GameMode::Standard);
        assert_eq!(session.phase, GamePhase::Lobby);
        assert_eq!(session.questions.len(), 10);
        assert_eq!(session.current_question, 0);
    }

    #[test]
    fn test_new_prayer_session_has_no_questions() {
        let session = Session::new("ABCD".into(), "mod-1".into(), GameMode::PrayerRequest);
        assert!(session.questions.is_empty());
        assert!(session.prayer_requests.is_empty());
    }

    #[test]
    fn test_join_is_idempotent_on_player_id() {
        let mut session = Session::new("ABCD".into(), "mod-1".into(), GameMode::Standard);
        assert!(session.join(Player::new("alice".into(), "Alice".into())));
        assert!(session.join(Player::new("alice".into(), "Alice again".into())));
        assert_eq!(session.players.len(), 1);
        assert_eq!(session.players[0].name, "Alice");
    }

    #[test]
    fn test_join_preserves_insertion_order() {
        let session = two_player_session();
        assert_eq!(session.players[0].id, "alice");
        assert_eq!(session.players[1].id, "bob");
    }

    #[test]
    fn test_join_after_start_fails_and_leaves_roster_unchanged() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(!session.join(Player::new("carol".into(), "Carol".into())));
        assert_eq!(session.players.len(), 2);
    }

    #[test]
    fn test_start_requires_players() {
        let mut session = Session::new("ABCD".into(), "mod-1".into(), GameMode::Standard);
        assert_eq!(session.start(1_000), Err(StartError::NoPlayers));
        assert_eq!(session.phase, GamePhase::Lobby);
    }

    #[test]
    fn test_start_requires_questions() {
        let mut session = Session::new("ABCD".into(), "mod-1".into(), GameMode::IceBreaker);
        session.join(Player::new("alice".into(), "Alice".into()));
        assert_eq!(session.start(1_000), Err(StartError::NoQuestions));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert_eq!(session.start(2_000), Err(StartError::NotInLobby));
    }

    #[test]
    fn test_start_assigns_avatars_from_palette() {
        let mut session = two_player_session();
        session.set_avatar("alice", PLAYER_AVATARS[0]);
        session.start(1_000).unwrap();

        assert_eq!(session.phase, GamePhase::QuestionActive);
        assert_eq!(session.question_started_at_ms, Some(1_000));
        for player in &session.players {
            let avatar = player.avatar.as_deref().unwrap();
            assert!(PLAYER_AVATARS.contains(&avatar));
        }
        // A chosen avatar survives the random fill-in.
        assert_eq!(session.players[0].avatar.as_deref(), Some(PLAYER_AVATARS[0]));
    }

    #[test]
    fn test_set_avatar_rejects_unknown_symbol() {
        let mut session = two_player_session();
        assert!(!session.set_avatar("alice", "not-an-avatar"));
        assert!(session.players[0].avatar.is_none());
    }

    #[test]
    fn test_set_avatar_after_start_fails() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(!session.set_avatar("alice", PLAYER_AVATARS[1]));
    }

    #[test]
    fn test_avatar_collisions_are_permitted() {
        let mut session = two_player_session();
        assert!(session.set_avatar("alice", PLAYER_AVATARS[3]));
        assert!(session.set_avatar("bob", PLAYER_AVATARS[3]));
    }

    #[test]
    fn test_questions_frozen_after_start() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(!session.set_questions(sample_questions()));
    }

    #[test]
    fn test_set_questions_rejects_invalid_set() {
        let mut session = Session::new("ABCD".into(), "mod-1".into(), GameMode::Standard);
        let mut bad = sample_questions();
        bad[0].correct_index = 7;
        assert!(!session.set_questions(bad));
        assert!(!session.set_questions(Vec::new()));
    }

    #[test]
    fn test_correct_answer_scores_by_latency() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();

        let correct = session.questions[0].correct_index;
        assert!(session.submit_answer("alice", correct, 1_200));

        let alice = session.player("alice").unwrap();
        assert_eq!(alice.score, 298);
        assert_eq!(alice.answer_latency_ms, Some(200));
        assert_eq!(alice.last_answer, Some(correct));
        assert!(alice.has_answered);
    }

    #[test]
    fn test_incorrect_answer_scores_zero() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();

        let wrong = (session.questions[0].correct_index + 1) % 4;
        assert!(session.submit_answer("bob", wrong, 1_500));
        assert_eq!(session.player("bob").unwrap().score, 0);
        assert!(session.player("bob").unwrap().has_answered);
    }

    #[test]
    fn test_second_answer_is_rejected() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();

        let correct = session.questions[0].correct_index;
        assert!(session.submit_answer("alice", correct, 1_100));
        let score_after_first = session.player("alice").unwrap().score;

        assert!(!session.submit_answer("alice", correct, 1_200));
        assert_eq!(session.player("alice").unwrap().score, score_after_first);
    }

    #[test]
    fn test_answer_out_of_range_is_rejected() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(!session.submit_answer("alice", 4, 1_100));
        assert!(!session.player("alice").unwrap().has_answered);
    }

    #[test]
    fn test_answer_before_start_is_rejected() {
        let mut session = two_player_session();
        assert!(!session.submit_answer("alice", 0, 1_000));
    }

    #[test]
    fn test_answer_from_unknown_player_is_rejected() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(!session.submit_answer("mallory", 0, 1_100));
    }

    #[test]
    fn test_all_answered_resolves_question() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();

        session.submit_answer("alice", 0, 1_100);
        assert_eq!(session.phase, GamePhase::QuestionActive);

        session.submit_answer("bob", 1, 1_200);
        assert_eq!(session.phase, GamePhase::QuestionResolved);
    }

    #[test]
    fn test_no_answers_after_resolved() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        session.submit_answer("alice", 0, 1_100);
        session.submit_answer("bob", 0, 1_200);
        assert_eq!(session.phase, GamePhase::QuestionResolved);

        // Resolved is not an answering phase even for a hypothetical
        // late joiner; nothing mutates.
        assert!(!session.submit_answer("alice", 1, 1_300));
    }

    #[test]
    fn test_advance_resets_per_question_state() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();
        session.submit_answer("alice", session.questions[0].correct_index, 1_100);

        assert!(session.advance(20_000));
        assert_eq!(session.current_question, 1);
        assert_eq!(session.phase, GamePhase::QuestionActive);
        assert_eq!(session.question_started_at_ms, Some(20_000));
        for player in &session.players {
            assert!(!player.has_answered);
            assert!(player.last_answer.is_none());
            assert!(player.answer_latency_ms.is_none());
        }
        // Scores carry over.
        assert!(session.player("alice").unwrap().score > 0);
    }

    #[test]
    fn test_advance_past_last_question_ends_game() {
        let mut session = two_player_session();
        let questions = sample_questions().into_iter().take(2).collect::<Vec<_>>();
        assert!(session.set_questions(questions));
        session.start(1_000).unwrap();

        assert!(session.advance(2_000));
        assert_eq!(session.phase, GamePhase::QuestionActive);
        assert!(session.advance(3_000));
        assert_eq!(session.phase, GamePhase::Ended);
        assert_eq!(session.current_question, 2);
        assert!(session.question_started_at_ms.is_none());
    }

    #[test]
    fn test_advance_illegal_from_lobby_and_ended() {
        let mut session = two_player_session();
        assert!(!session.advance(1_000));

        session.start(1_000).unwrap();
        session.end();
        assert!(!session.advance(2_000));
        assert_eq!(session.phase, GamePhase::Ended);
    }

    #[test]
    fn test_question_index_monotone_through_full_game() {
        let mut session = two_player_session();
        session.start(1_000).unwrap();

        let mut last_index = session.current_question;
        let mut now = 1_000;
        while session.phase != GamePhase::Ended {
            now += QUESTION_TIME_LIMIT_MS;
            assert!(session.advance(now));
            assert!(session.current_question >= last_index);
            last_index = session.current_question;
        }
        assert_eq!(session.current_question, session.questions.len());
    }

    #[test]
    fn test_end_from_lobby_and_mid_game() {
        let mut session = two_player_session();
        assert!(session.end());
        assert_eq!(session.phase, GamePhase::Ended);
        assert!(!session.end());

        let mut session = two_player_session();
        session.start(1_000).unwrap();
        assert!(session.end());
        assert_eq!(session.phase, GamePhase::Ended);
    }

    #[test]
    fn test_prayer_request_mode_gating() {
        let mut session = two_player_session();
        // Standard mode refuses prayer requests entirely.
        assert!(!session.submit_prayer_request("alice", "please", false, 1_000));

        let mut session = Session::new("PRAY".into(), "mod-1".into(), GameMode::PrayerRequest);
        session.join(Player::new("alice".into(), "Alice".into()));

        assert!(session.submit_prayer_request("alice", "  for my family  ", true, 2_000));
        assert!(!session.submit_prayer_request("alice", "again", false, 3_000));

        assert_eq!(session.prayer_requests.len(), 1);
        let request = &session.prayer_requests[0];
        assert_eq!(request.text, "for my family");
        assert!(request.anonymous);
        assert_eq!(request.player_name, "Alice");
        assert_eq!(request.submitted_at_ms, 2_000);
    }

    #[test]
    fn test_prayer_request_rejects_empty_text_and_unknown_player() {
        let mut session = Session::new("PRAY".into(), "mod-1".into(), GameMode::PrayerRequest);
        session.join(Player::new("alice".into(), "Alice".into()));
        assert!(!session.submit_prayer_request("alice", "   ", false, 1_000));
        assert!(!session.submit_prayer_request("nobody", "hello", false, 1_000));
        assert!(session.prayer_requests.is_empty());
    }
}
