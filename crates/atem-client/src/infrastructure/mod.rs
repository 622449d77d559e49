//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `application` and `atem_core`,
//! but MUST NOT be imported by the domain types in `atem_core`.
//!
//! # Sub-modules
//!
//! - **`config`** – TOML configuration with defaults for every field.
//! - **`network`** – The [`Transport`](network::Transport) seam plus UDP and
//!   in-memory implementations.

pub mod config;
pub mod network;
