//! # Summary
//!
//! This module contains the per-role engines of a peer. `acceptor` and
//! `learner` are answered synchronously from inbound connections,
//! `proposer` drives its own rounds, and `peer` accepts connections and
//! routes each envelope to the right engine.

/// Ballot state per consensus group.
pub(crate) mod acceptor;

/// Decided values per consensus group.
pub(crate) mod learner;

/// Inbound connection handling.
pub(crate) mod peer;

/// Round driver.
pub(crate) mod proposer;
