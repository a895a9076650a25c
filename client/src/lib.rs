//! Terminal client for the quiz session server.
//!
//! The client holds no authority at all. It subscribes to one session code,
//! turns typed commands into intent packets, and renders whichever snapshot
//! arrived last. A once-per-second poll re-requests the session state, which
//! keeps the subscription alive on the server and recovers from any dropped
//! broadcast.
//!
//! ## Architecture
//!
//! - [`game`]: the local [`game::SessionView`], a thin reducer over server
//!   snapshots with a client-side countdown for the active question
//! - [`input`]: the line-based command grammar
//! - [`network`]: the UDP loop joining socket traffic, stdin, and the poll
//!   timer

pub mod game;
pub mod input;
pub mod network;
