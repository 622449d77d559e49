//! atem-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does atem-client do? (for beginners)
//!
//! `atem-core` knows how a session with a switcher behaves but never touches
//! a socket or a clock.  This crate supplies both:
//!
//! 1. A [`Transport`](infrastructure::network::Transport) moves datagrams.
//!    [`UdpTransport`](infrastructure::network::udp::UdpTransport) talks to a
//!    real device; [`MemoryTransport`](infrastructure::network::memory::MemoryTransport)
//!    connects two endpoints inside one process for tests.
//! 2. [`connect`](application::connection::connect) spawns one task that owns
//!    the transport and the session, feeding it datagrams and timer ticks.
//! 3. The caller keeps a [`ConnectionHandle`](application::connection::ConnectionHandle)
//!    for sending commands and an event receiver for everything the device
//!    reports.

/// Application layer: the session task and its handle.
pub mod application;

/// Infrastructure layer: configuration and datagram transports.
pub mod infrastructure;
