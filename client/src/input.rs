//! Command-line input parsing.
//!
//! Each line typed into the client becomes at most one intent packet. The
//! grammar is deliberately small: one word per action, arguments separated
//! by whitespace, free text (prayer requests) consuming the rest of the
//! line.

use shared::{GameMode, Packet, Player};

/// Builds intent packets from typed commands for one player in one session.
pub struct CommandParser {
    pub code: String,
    pub player_id: String,
    pub player_name: String,
}

impl CommandParser {
    pub fn new(code: String, player_id: String, player_name: String) -> Self {
        Self {
            code,
            player_id,
            player_name,
        }
    }

    /// Parses one input line. Returns `None` for blank lines and unknown
    /// commands so the caller can print usage without sending anything.
    pub fn parse(&self, line: &str) -> Option<Packet> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let command = parts.next()?;

        match command {
            "create" => {
                let mode = match parts.next() {
                    Some("icebreaker") => GameMode::IceBreaker,
                    Some("prayer") => GameMode::PrayerRequest,
                    _ => GameMode::Standard,
                };
                Some(Packet::Create {
                    code: self.code.clone(),
                    mode,
                })
            }
            "join" => Some(Packet::Join {
                code: self.code.clone(),
                player: Player::new(self.player_id.clone(), self.player_name.clone()),
            }),
            "avatar" => {
                let avatar = parts.next()?;
                Some(Packet::SetAvatar {
                    code: self.code.clone(),
                    player_id: self.player_id.clone(),
                    avatar: avatar.to_string(),
                })
            }
            "start" => Some(Packet::Start {
                code: self.code.clone(),
            }),
            "answer" | "a" => {
                let index: usize = parts.next()?.parse().ok()?;
                Some(Packet::SubmitAnswer {
                    code: self.code.clone(),
                    player_id: self.player_id.clone(),
                    answer_index: index,
                })
            }
            "next" => Some(Packet::Advance {
                code: self.code.clone(),
            }),
            "end" => Some(Packet::End {
                code: self.code.clone(),
            }),
            "pray" => {
                let rest = line.strip_prefix("pray")?.trim();
                if rest.is_empty() {
                    return None;
                }
                Some(Packet::SubmitPrayerRequest {
                    code: self.code.clone(),
                    player_id: self.player_id.clone(),
                    text: rest.to_string(),
                    anonymous: false,
                })
            }
            "generate" => {
                let count: usize = parts.next()?.parse().ok()?;
                let prompt: Vec<&str> = parts.collect();
                Some(Packet::GenerateQuestions {
                    code: self.code.clone(),
                    prompt: prompt.join(" "),
                    count,
                })
            }
            _ => None,
        }
    }
}

/// Prints the command reference.
pub fn print_usage() {
    println!("Commands:");
    println!("  create [icebreaker|prayer]  create the session");
    println!("  join                        join as a player");
    println!("  avatar <emoji>              pick an avatar in the lobby");
    println!("  generate <count> <prompt>   request generated questions");
    println!("  start                       start the game");
    println!("  answer <0-3>                answer the current question");
    println!("  next                        advance to the next question");
    println!("  end                         end the session");
    println!("  pray <text>                 submit a prayer request");
}
