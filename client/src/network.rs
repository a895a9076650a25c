use crate::game::SessionView;
use crate::input::{print_usage, CommandParser};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{now_ms, GamePhase, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// How often the client re-requests the session state. Doubles as the
/// subscriber heartbeat, and papers over any broadcast lost on the wire.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    view: SessionView,
    parser: CommandParser,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        code: String,
        player_name: String,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        let player_id = shared::generate_player_id();

        Ok(Client {
            socket,
            server_addr,
            view: SessionView::new(code.clone()),
            parser: CommandParser::new(code, player_id, player_name),
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Snapshot { code, session } => {
                self.view.apply_snapshot(&code, session);
                self.render();
            }

            Packet::Generating { code } => {
                if code == self.parser.code {
                    println!("Generating questions...");
                }
            }

            Packet::QuestionsGenerated {
                code,
                success,
                count,
            } => {
                if code == self.parser.code {
                    if success {
                        println!("{} questions ready", count);
                    } else {
                        println!("{} fallback questions loaded", count);
                    }
                }
            }

            Packet::Error { code, message } => {
                if code == self.parser.code {
                    println!("Server: {}", message);
                }
            }

            _ => {
                warn!("Unexpected packet type from server");
            }
        }
    }

    /// Prints the current view of the session.
    fn render(&self) {
        let Some(session) = &self.view.session else {
            println!("[{}] no session yet", self.view.code);
            return;
        };

        let now = now_ms();
        match self.view.display_phase(now) {
            Some(GamePhase::Lobby) => {
                println!(
                    "[{}] lobby, {} players, {} questions loaded",
                    session.code,
                    session.players.len(),
                    session.questions.len()
                );
                for player in &session.players {
                    println!(
                        "  {} {}",
                        player.avatar.as_deref().unwrap_or("?"),
                        player.name
                    );
                }
            }

            Some(GamePhase::QuestionActive) => {
                if let Some(question) = session.active_question() {
                    println!(
                        "[{}] question {}/{} ({}s left)",
                        session.code,
                        session.current_question + 1,
                        session.questions.len(),
                        self.view.remaining_ms(now) / 1_000
                    );
                    println!("  {}", question.text);
                    for (i, option) in question.options.iter().enumerate() {
                        println!("  {}: {}", i, option);
                    }
                }
                let answered = session.players.iter().filter(|p| p.has_answered).count();
                println!("  {}/{} answered", answered, session.players.len());
            }

            Some(GamePhase::QuestionResolved) => {
                if let Some(question) = session.active_question() {
                    println!(
                        "[{}] answer: {}",
                        session.code,
                        question.options[question.correct_index]
                    );
                }
                self.render_leaderboard();
            }

            Some(GamePhase::Ended) => {
                println!("[{}] game over", session.code);
                self.render_leaderboard();
                if !session.prayer_requests.is_empty() {
                    println!("Prayer requests:");
                    for request in &session.prayer_requests {
                        println!("  {}: {}", request.player_name, request.text);
                    }
                }
            }

            None => {}
        }
    }

    fn render_leaderboard(&self) {
        for (rank, player) in self.view.leaderboard().iter().enumerate() {
            println!(
                "  {}. {} {} - {}",
                rank + 1,
                player.avatar.as_deref().unwrap_or("?"),
                player.name,
                player.score
            );
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Subscribing to session {}", self.parser.code);
        self.send_packet(&Packet::Subscribe {
            code: self.parser.code.clone(),
        })
        .await?;

        print_usage();

        let mut poll_interval = interval(POLL_INTERVAL);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut buffer = [0u8; 65_536];
        let mut stdin_open = true;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet);
                            } else {
                                warn!("Failed to deserialize packet from server");
                            }
                        }
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line(), if stdin_open => {
                    match line? {
                        Some(line) => {
                            if line.trim() == "quit" {
                                break;
                            }
                            match self.parser.parse(&line) {
                                Some(packet) => {
                                    if matches!(packet, Packet::SubmitAnswer { .. }) {
                                        self.view.mark_answered();
                                    }
                                    self.send_packet(&packet).await?;
                                }
                                None => print_usage(),
                            }
                        }
                        // Stdin closed, keep rendering snapshots.
                        None => {
                            debug!("Stdin closed");
                            stdin_open = false;
                        }
                    }
                },

                _ = poll_interval.tick() => {
                    self.send_packet(&Packet::Get {
                        code: self.parser.code.clone(),
                    }).await?;
                },
            }
        }

        Ok(())
    }
}
