//! Authoritative session server for realtime quiz games.
//!
//! The server owns every session outright: clients send intents over UDP,
//! the server validates them against the session state machine, and every
//! accepted mutation is answered with a full snapshot broadcast to all
//! subscribers of that session code. Clients never apply local mutations,
//! they only render the latest snapshot.

pub mod generator;
pub mod network;
pub mod registry;
