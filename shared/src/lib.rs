//! Types and game rules shared by the quizlink server and client.
//!
//! Both sides depend on this crate so they agree on the wire protocol, the
//! session data model, and the scoring rules. The server applies the state
//! machine authoritatively; the client only uses the shared constants and
//! types to render snapshots and compute its local countdown.

use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod protocol;
pub mod question;
pub mod session;

pub use protocol::Packet;
pub use question::{sample_questions, validate_question_set, Question, OPTIONS_PER_QUESTION};
pub use session::{
    score_answer, GameMode, GamePhase, Player, PrayerRequest, Session, StartError,
};

/// Maximum points for an instantaneous correct answer.
pub const BASE_POINTS: u32 = 300;
/// One point of score decays per this many milliseconds of answer latency.
pub const LATENCY_DIVISOR_MS: u64 = 100;
/// Per-question deadline enforced by each observer's display, never by the
/// server.
pub const QUESTION_TIME_LIMIT_MS: u64 = 15_000;
/// Length of the short human-enterable session code.
pub const SESSION_CODE_LEN: usize = 4;
/// Fixed avatar palette players may pick from pre-start.
pub const PLAYER_AVATARS: [&str; 8] = ["🦊", "🐼", "🐸", "🐯", "🦄", "🐵", "🐶", "🐱"];

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Generates a short random uppercase session code. Uniqueness is checked by
/// the registry, not guaranteed here.
pub fn generate_code() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    (0..SESSION_CODE_LEN)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// Generates a player id unique enough within one session: wall-clock
/// millisecond plus a random suffix.
pub fn generate_player_id() -> String {
    format!("player-{}-{}", now_ms(), random_suffix())
}

/// Nine random lowercase alphanumerics, used to suffix generated ids.
pub fn random_suffix() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
