//! Event broadcast hub: bridges client intents to session transitions and
//! fans the resulting snapshot out to every subscriber of that code.
//!
//! All intents for all sessions are applied on one task, each handled to
//! completion (validate, mutate, broadcast) before the next, which gives
//! linearizable semantics per session without per-entry locks. The only
//! long-running work, question generation, runs on spawned tasks and
//! re-enters the loop through the message channel, so the hub stays
//! responsive while a generation call is outstanding.

use crate::generator::{
    generate_with_fallback, GenerationOutcome, QuestionSource, SampleSource, GENERATION_TIMEOUT,
};
use crate::registry::{CreateOutcome, SessionRegistry, Subscriptions, SUBSCRIBER_TIMEOUT};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{generate_player_id, now_ms, Packet, StartError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks (and generation tasks) to the main loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    GenerationFinished {
        code: String,
        outcome: GenerationOutcome,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages from the main loop to the network sender task.
#[derive(Debug)]
pub enum OutboundMessage {
    Send {
        packet: Packet,
        addr: SocketAddr,
    },
    Broadcast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating the socket, the session registry, and snapshot
/// fan-out.
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: SessionRegistry,
    subscriptions: Arc<RwLock<Subscriptions>>,
    generator: Arc<dyn QuestionSource>,
    generation_deadline: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_sessions: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            registry: SessionRegistry::new(max_sessions),
            subscriptions: Arc::new(RwLock::new(Subscriptions::new())),
            generator: Arc::new(SampleSource),
            generation_deadline: GENERATION_TIMEOUT,
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    /// Wires up an external question generator in place of the built-in
    /// sample source.
    pub fn set_question_source(&mut self, source: Arc<dyn QuestionSource>) {
        self.generator = source;
    }

    /// Overrides the generation deadline, mainly so tests need not wait the
    /// full production timeout.
    pub fn set_generation_deadline(&mut self, deadline: Duration) {
        self.generation_deadline = deadline;
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming datagrams.
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 65_536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue.
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    OutboundMessage::Send { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::Broadcast { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to subscriber {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that periodically drops subscribers who have gone quiet.
    async fn spawn_prune_checker(&self) {
        let subscriptions = Arc::clone(&self.subscriptions);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                interval.tick().await;
                let removed = {
                    let mut subs = subscriptions.write().await;
                    subs.prune(SUBSCRIBER_TIMEOUT)
                };
                if !removed.is_empty() {
                    debug!("Pruned {} stale subscribers", removed.len());
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::Send { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues `packet` for every subscriber of `code`.
    async fn broadcast_packet(&self, code: &str, packet: Packet) {
        let addrs = {
            let subs = self.subscriptions.read().await;
            subs.addrs_for(code)
        };
        if addrs.is_empty() {
            return;
        }
        if let Err(e) = self.out_tx.send(OutboundMessage::Broadcast { packet, addrs }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn snapshot(&self, code: &str) -> Packet {
        Packet::Snapshot {
            code: code.to_string(),
            session: self.registry.get(code).cloned(),
        }
    }

    /// Broadcasts the full authoritative snapshot after a successful
    /// mutation. Always the whole session, never a diff.
    async fn broadcast_snapshot(&self, code: &str) {
        self.broadcast_packet(code, self.snapshot(code)).await;
    }

    /// Applies one client intent to completion. Precondition violations are
    /// rejected silently: no state change, no broadcast. The one exception
    /// is starting without questions, which earns the caller an explicit
    /// error event.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        {
            let mut subs = self.subscriptions.write().await;
            subs.touch(addr);
        }

        match packet {
            Packet::Subscribe { code } => {
                {
                    let mut subs = self.subscriptions.write().await;
                    subs.subscribe(addr, &code);
                }
                // Every subscribe is answered with a snapshot immediately,
                // Some or None.
                self.send_packet(self.snapshot(&code), addr);
            }

            Packet::Get { code } => {
                self.send_packet(self.snapshot(&code), addr);
            }

            Packet::Create { code, mode } => {
                let code = if code.is_empty() {
                    match self.registry.generate_unused_code() {
                        Some(code) => code,
                        None => {
                            warn!("Could not mint an unused session code");
                            return;
                        }
                    }
                } else {
                    code
                };

                match self.registry.create(&code, generate_player_id(), mode) {
                    CreateOutcome::Created | CreateOutcome::AlreadyExists => {
                        // The creator may not be subscribed yet; reply
                        // directly so it learns the code either way.
                        self.send_packet(self.snapshot(&code), addr);
                        self.broadcast_snapshot(&code).await;
                    }
                    CreateOutcome::AtCapacity => {
                        warn!("Rejecting create for {}: at session capacity", code);
                    }
                }
            }

            Packet::Join { code, player } => {
                let mut player = player;
                // Never trust client-supplied game state on join.
                player.score = 0;
                player.has_answered = false;
                player.last_answer = None;
                player.answer_latency_ms = None;

                let joined = match self.registry.get_mut(&code) {
                    Some(session) => session.join(player),
                    None => false,
                };
                if joined {
                    self.broadcast_snapshot(&code).await;
                } else {
                    debug!("Ignoring join for {} from {}", code, addr);
                }
            }

            Packet::SetAvatar {
                code,
                player_id,
                avatar,
            } => {
                let changed = match self.registry.get_mut(&code) {
                    Some(session) => session.set_avatar(&player_id, &avatar),
                    None => false,
                };
                if changed {
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::SetQuestions { code, questions } => {
                let changed = match self.registry.get_mut(&code) {
                    Some(session) => session.set_questions(questions),
                    None => false,
                };
                if changed {
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::Start { code } => {
                let result = match self.registry.get_mut(&code) {
                    Some(session) => session.start(now_ms()),
                    None => return,
                };
                match result {
                    Ok(()) => {
                        info!("Session {} started", code);
                        self.broadcast_snapshot(&code).await;
                    }
                    Err(e @ StartError::NoQuestions) => {
                        self.send_packet(
                            Packet::Error {
                                code,
                                message: e.to_string(),
                            },
                            addr,
                        );
                    }
                    Err(e) => {
                        debug!("Ignoring start for {}: {}", code, e);
                    }
                }
            }

            Packet::SubmitAnswer {
                code,
                player_id,
                answer_index,
            } => {
                let accepted = match self.registry.get_mut(&code) {
                    Some(session) => session.submit_answer(&player_id, answer_index, now_ms()),
                    None => false,
                };
                if accepted {
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::Advance { code } => {
                let advanced = match self.registry.get_mut(&code) {
                    Some(session) => session.advance(now_ms()),
                    None => false,
                };
                if advanced {
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::End { code } => {
                let ended = match self.registry.get_mut(&code) {
                    Some(session) => session.end(),
                    None => false,
                };
                if ended {
                    info!("Session {} ended", code);
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::SubmitPrayerRequest {
                code,
                player_id,
                text,
                anonymous,
            } => {
                let accepted = match self.registry.get_mut(&code) {
                    Some(session) => {
                        session.submit_prayer_request(&player_id, &text, anonymous, now_ms())
                    }
                    None => false,
                };
                if accepted {
                    self.broadcast_snapshot(&code).await;
                }
            }

            Packet::GenerateQuestions {
                code,
                prompt,
                count,
            } => {
                let in_lobby = self
                    .registry
                    .get(&code)
                    .map(|s| s.phase == shared::GamePhase::Lobby)
                    .unwrap_or(false);
                if !in_lobby {
                    debug!("Ignoring generation request for {}", code);
                    return;
                }

                self.broadcast_packet(&code, Packet::Generating { code: code.clone() })
                    .await;

                let source = Arc::clone(&self.generator);
                let deadline = self.generation_deadline;
                let server_tx = self.server_tx.clone();
                tokio::spawn(async move {
                    let outcome =
                        generate_with_fallback(source.as_ref(), &prompt, count, deadline).await;
                    let _ = server_tx.send(ServerMessage::GenerationFinished { code, outcome });
                });
            }

            Packet::Snapshot { .. }
            | Packet::Generating { .. }
            | Packet::QuestionsGenerated { .. }
            | Packet::Error { .. } => {
                warn!("Unexpected server-side packet type from client at {}", addr);
            }
        }
    }

    /// Applies a finished generation back onto its session. Results for
    /// sessions that have started (or vanished) in the meantime are dropped:
    /// the question list froze at start.
    async fn finish_generation(&mut self, code: String, outcome: GenerationOutcome) {
        let applied = match self.registry.get_mut(&code) {
            Some(session) => session.set_questions(outcome.questions.clone()),
            None => false,
        };
        if !applied {
            debug!("Dropping generation result for {}", code);
            return;
        }

        let count = outcome.questions.len();
        info!(
            "Applied {} generated questions to session {} (fallback: {})",
            count,
            code,
            !outcome.succeeded()
        );

        self.broadcast_packet(
            &code,
            Packet::QuestionsGenerated {
                code: code.clone(),
                success: outcome.succeeded(),
                count,
            },
        )
        .await;

        if let Some(warning) = outcome.warning {
            self.broadcast_packet(
                &code,
                Packet::Error {
                    code: code.clone(),
                    message: warning,
                },
            )
            .await;
        }

        self.broadcast_snapshot(&code).await;
    }

    /// Main server loop: applies every message to completion, in arrival
    /// order.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_prune_checker().await;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::GenerationFinished { code, outcome } => {
                    self.finish_generation(code, outcome).await;
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
