//! # Summary
//!
//! This module defines `Ballot`, the acceptor's state for a single
//! consensus group, along with its two transitions. The struct itself is
//! not synchronized; `thread::acceptor` owns one per group behind a lock.

use crate::message::Proposal;

/// Acceptors keep track of the highest proposal they have promised,
/// and the most recently accepted proposal and value.
///
/// `accepted <= promised` holds after every transition, and `promised`
/// never decreases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ballot {
    pub promised: Proposal,
    pub accepted: Proposal,
    pub value: String,
}

impl Ballot {
    /// Promises to ignore anything below `proposal`, returning the
    /// previously accepted proposal and value. Returns `None` unless
    /// `proposal` is strictly higher than every earlier promise.
    pub fn prepare(&mut self, proposal: Proposal) -> Option<(Proposal, String)> {
        if proposal <= self.promised {
            return None
        }
        self.promised = proposal;
        Some((self.accepted, self.value.clone()))
    }

    /// Accepts `value` under `proposal` unless a higher proposal was promised.
    pub fn accept(&mut self, proposal: Proposal, value: &str) -> bool {
        if proposal < self.promised {
            return false
        }
        self.promised = proposal;
        self.accepted = proposal;
        self.value = value.to_string();
        true
    }
}
