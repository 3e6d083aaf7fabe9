//! Connection plumbing: the acceptor, socket pools and their event loops.
//!
//! One thread accepts clients and hands each to the next pool round-robin;
//! every pool runs its own poll(2) loop over the connections it owns.

pub mod acceptor;
pub mod listener;
pub mod membership;
pub mod pool;
pub mod sys;

pub use listener::{Server, ShutdownHandle};
pub use membership::{MemberKey, Membership};
pub use pool::SocketPool;
