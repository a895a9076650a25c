use crate::question::Question;
use crate::session::{GameMode, Player, Session};
use serde::{Deserialize, Serialize};

/// Every message on the wire, client-to-server intents first, then
/// server-to-client events. One bincode-serialized `Packet` per datagram.
///
/// Intents mirror the session state machine one-to-one; events are either
/// full-state snapshots (never diffs) or generation progress notices.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    /// Registers the sender for all future snapshots of `code`. Always
    /// answered with one immediate `Snapshot`, even for unknown codes.
    Subscribe { code: String },
    /// Polling-fallback re-fetch: answered with a snapshot, no registration.
    Get { code: String },
    Create { code: String, mode: GameMode },
    Join { code: String, player: Player },
    SetAvatar { code: String, player_id: String, avatar: String },
    SetQuestions { code: String, questions: Vec<Question> },
    Start { code: String },
    SubmitAnswer { code: String, player_id: String, answer_index: usize },
    Advance { code: String },
    End { code: String },
    SubmitPrayerRequest { code: String, player_id: String, text: String, anonymous: bool },
    GenerateQuestions { code: String, prompt: String, count: usize },

    /// Full authoritative state of one session; `None` means the code does
    /// not exist.
    Snapshot { code: String, session: Option<Session> },
    /// Question generation has started for this session.
    Generating { code: String },
    /// Question generation finished; `success` is false when the fallback
    /// set was substituted.
    QuestionsGenerated { code: String, success: bool, count: usize },
    /// Non-fatal error notice (generation failure, start without questions).
    Error { code: String, message: String },
}

impl Packet {
    /// The session code this packet is scoped to. Every packet in the
    /// protocol targets exactly one session.
    pub fn code(&self) -> &str {
        match self {
            Packet::Subscribe { code }
            | Packet::Get { code }
            | Packet::Create { code, .. }
            | Packet::Join { code, .. }
            | Packet::SetAvatar { code, .. }
            | Packet::SetQuestions { code, .. }
            | Packet::Start { code }
            | Packet::SubmitAnswer { code, .. }
            | Packet::Advance { code }
            | Packet::End { code }
            | Packet::SubmitPrayerRequest { code, .. }
            | Packet::GenerateQuestions { code, .. }
            | Packet::Snapshot { code, .. }
            | Packet::Generating { code }
            | Packet::QuestionsGenerated { code, .. }
            | Packet::Error { code, .. } => code,
        }
    }
}
