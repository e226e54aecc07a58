//! Single-decree Paxos among a fixed set of peers.
//!
//! Peers are described by a static membership table. Each acceptor serves
//! one or more consensus groups, each proposer drives rounds for exactly one
//! group, and every peer learns the values chosen in every group.

#[macro_use] extern crate log;

mod audit;
mod ballot;
mod config;
mod error;
mod membership;
mod node;
mod round;
mod shared;
mod thread;

pub mod message;
pub mod socket;

pub use crate::ballot::Ballot;
pub use crate::config::{Config, DEFAULT_PORT};
pub use crate::error::Error;
pub use crate::membership::{Membership, Peer, Role};
pub use crate::message::{Envelope, Group, Kind, Proposal};
pub use crate::node::{Handle, Node};
pub use crate::round::Phase;
pub use crate::thread::learner::Decision;
