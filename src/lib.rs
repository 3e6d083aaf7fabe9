//! Strand - poll-driven HTTP/1.x server
//!
//! Core library: request parsing state machine, write-operation queue,
//! socket pools and the acceptor.

pub mod config;
pub mod http;
pub mod router;
pub mod server;
