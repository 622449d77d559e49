//! Application layer for the client.
//!
//! - **`connection`** – Runs one [`atem_core::Session`] inside a tokio task.
//!   The task is the only owner of the session, so datagram arrival, outgoing
//!   commands and timer ticks are serialized by a single `select!` loop.

pub mod connection;
