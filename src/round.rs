//! # Summary
//!
//! This module defines `Round`, the proposer's view of the consensus round
//! it is currently driving: proposal number, candidate value, phase, and the
//! acknowledgments collected so far. Like `ballot`, it performs no I/O;
//! `thread::proposer` wraps it in a lock and acts on its transitions.

use std::collections::HashSet as Set;

use crate::message::Proposal;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Preparing,
    Accepting,
    Chosen,
}

#[derive(Clone, Debug)]
pub struct Round {
    /// Ordinal of the owning proposer
    ordinal: u8,

    /// Acknowledgments required to finish a phase
    majority: usize,

    /// Rounds begun so far
    count: u64,

    proposal: Proposal,

    /// Value supplied when the round began
    candidate: String,

    /// Value sent with accept requests
    value: String,

    phase: Phase,

    /// Acceptors that acknowledged the current phase
    acks: Set<usize>,

    /// Highest previously accepted (proposal, value) reported in a promise
    adopted: Option<(Proposal, String)>,
}

impl Round {
    pub fn new(ordinal: u8, majority: usize) -> Self {
        Round {
            ordinal,
            majority,
            count: 0,
            proposal: Proposal::ZERO,
            candidate: String::new(),
            value: String::new(),
            phase: Phase::Idle,
            acks: Set::default(),
            adopted: None,
        }
    }

    /// Starts the next round with `candidate`, discarding any earlier one.
    pub fn begin(&mut self, candidate: String) -> Proposal {
        self.count += 1;
        self.proposal = Proposal::new(self.count, self.ordinal);
        self.value = candidate.clone();
        self.candidate = candidate;
        self.phase = Phase::Preparing;
        self.acks.clear();
        self.adopted = None;
        self.proposal
    }

    /// Records a promise from acceptor `from` in answer to the prepare for
    /// `answering`. The acceptor previously accepted `value` under `accepted`
    /// (`Proposal::ZERO` if nothing). Promises for any other proposal are
    /// dropped.
    ///
    /// Returns the proposal and value to send accept requests for once a
    /// majority has promised. The value is the one attached to the highest
    /// prior acceptance, or the candidate if no promise carried one.
    pub fn promise(&mut self, from: usize, answering: Proposal, accepted: Proposal, value: String) -> Option<(Proposal, String)> {
        if self.phase != Phase::Preparing || answering != self.proposal || !self.acks.insert(from) {
            return None
        }

        let higher = match &self.adopted {
        | Some((best, _)) => accepted > *best,
        | None => accepted > Proposal::ZERO,
        };

        if higher {
            self.adopted = Some((accepted, value));
        }

        if self.acks.len() < self.majority {
            return None
        }

        self.value = match &self.adopted {
        | Some((_, value)) => value.clone(),
        | None => self.candidate.clone(),
        };
        self.phase = Phase::Accepting;
        self.acks.clear();
        Some((self.proposal, self.value.clone()))
    }

    /// Records that acceptor `from` accepted `proposal`. Returns the
    /// chosen proposal and value once a majority has accepted.
    pub fn accepted(&mut self, from: usize, proposal: Proposal) -> Option<(Proposal, String)> {
        if self.phase != Phase::Accepting || proposal != self.proposal || !self.acks.insert(from) {
            return None
        }
        if self.acks.len() < self.majority {
            return None
        }
        self.phase = Phase::Chosen;
        self.acks.clear();
        Some((self.proposal, self.value.clone()))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn proposal(&self) -> Proposal {
        self.proposal
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
