//! Process-wide session store and per-code subscriber tracking.
//!
//! Both structures are explicit service objects owned by the server rather
//! than ambient globals. The registry holds the single authoritative copy of
//! every live session; the subscription table knows which client address
//! receives snapshots for which code, and prunes addresses that have gone
//! quiet. Entries in the registry are independent of each other, so the
//! registry itself needs no per-entry locking: the hub mutates it from one
//! task only.

use log::info;
use shared::{generate_code, GameMode, Session};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Subscribers are dropped after this long without any inbound packet. The
/// client's 1s polling fallback doubles as its heartbeat.
pub const SUBSCRIBER_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a create attempt. An existing session is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    AtCapacity,
}

/// All live sessions keyed by their short code. Lifetime equals process
/// lifetime; nothing is persisted.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Creates a session under `code` if the code is free. A colliding code
    /// leaves the existing session (and its players) untouched.
    pub fn create(&mut self, code: &str, moderator_id: String, mode: GameMode) -> CreateOutcome {
        if self.sessions.contains_key(code) {
            return CreateOutcome::AlreadyExists;
        }
        if self.sessions.len() >= self.max_sessions {
            return CreateOutcome::AtCapacity;
        }

        let session = Session::new(code.to_string(), moderator_id, mode);
        info!("Created session {} ({:?})", code, mode);
        self.sessions.insert(code.to_string(), session);
        CreateOutcome::Created
    }

    pub fn get(&self, code: &str) -> Option<&Session> {
        self.sessions.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    pub fn remove(&mut self, code: &str) -> bool {
        if self.sessions.remove(code).is_some() {
            info!("Removed session {}", code);
            true
        } else {
            false
        }
    }

    /// Mints a code not currently in use. Collisions are only probable once
    /// the registry is nearly the size of the code space, so a handful of
    /// retries is plenty.
    pub fn generate_unused_code(&self) -> Option<String> {
        for _ in 0..32 {
            let code = generate_code();
            if !self.sessions.contains_key(&code) {
                return Some(code);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

struct Subscriber {
    code: String,
    last_seen: Instant,
}

/// Which client address is watching which session code. One subscription per
/// address; re-subscribing is idempotent and switching codes replaces the
/// old subscription.
#[derive(Default)]
pub struct Subscriptions {
    subscribers: HashMap<SocketAddr, Subscriber>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, addr: SocketAddr, code: &str) {
        let subscriber = Subscriber {
            code: code.to_string(),
            last_seen: Instant::now(),
        };
        if self.subscribers.insert(addr, subscriber).is_none() {
            info!("Subscriber {} watching session {}", addr, code);
        }
    }

    /// Refreshes the liveness timestamp for an address on any inbound
    /// packet.
    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(subscriber) = self.subscribers.get_mut(&addr) {
            subscriber.last_seen = Instant::now();
        }
    }

    /// All addresses subscribed to `code`, for snapshot fan-out.
    pub fn addrs_for(&self, code: &str) -> Vec<SocketAddr> {
        self.subscribers
            .iter()
            .filter(|(_, s)| s.code == code)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Drops subscribers that have gone quiet. Returns the removed
    /// addresses.
    pub fn prune(&mut self, timeout: Duration) -> Vec<SocketAddr> {
        let stale: Vec<SocketAddr> = self
            .subscribers
            .iter()
            .filter(|(_, s)| s.last_seen.elapsed() > timeout)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &stale {
            self.subscribers.remove(addr);
            info!("Subscriber {} timed out", addr);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
