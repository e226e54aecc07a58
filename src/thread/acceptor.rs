//! # Summary
//!
//! This module defines the `Acceptor` struct, which acts as Paxos's
//! distributed memory. A single peer may accept for several consensus
//! groups at once, so each group gets its own `Ballot` behind its own lock:
//! traffic for one group never waits on, or touches, another group's state.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use parking_lot::{Mutex, RwLock};

use crate::ballot::Ballot;
use crate::message::{Envelope, Group, Proposal};

pub struct Acceptor {
    /// Unique ID of acceptor
    id: usize,

    /// Ballot per group, created on first use
    groups: RwLock<Map<Group, Arc<Mutex<Ballot>>>>,
}

impl Acceptor {
    pub fn new(id: usize) -> Self {
        Acceptor {
            id,
            groups: RwLock::new(Map::default()),
        }
    }

    fn ballot(&self, group: &Group) -> Arc<Mutex<Ballot>> {
        if let Some(ballot) = self.groups.read().get(group) {
            return ballot.clone()
        }
        self.groups
            .write()
            .entry(group.clone())
            .or_default()
            .clone()
    }

    /// Responds with a promise if `proposal` beats everything promised so far.
    pub fn on_prepare(&self, group: &Group, proposal: Proposal) -> Option<Envelope> {
        let ballot = self.ballot(group);
        let mut ballot = ballot.lock();
        match ballot.prepare(proposal) {
        | Some((accepted, value)) => {
            trace!("group {}: promised {}", group, proposal);
            Some(Envelope::promise(self.id, accepted, value, group.clone()))
        }
        | None => {
            debug!("group {}: ignoring prepare {} below {}", group, proposal, ballot.promised);
            None
        }
        }
    }

    /// Responds with an acceptance unless a higher proposal was promised.
    pub fn on_accept(&self, group: &Group, proposal: Proposal, value: &str) -> Option<Envelope> {
        let ballot = self.ballot(group);
        let mut ballot = ballot.lock();
        if ballot.accept(proposal, value) {
            trace!("group {}: accepted {} with {:?}", group, proposal, value);
            Some(Envelope::accepted(self.id, proposal, value.to_string(), group.clone()))
        } else {
            debug!("group {}: ignoring accept {} below {}", group, proposal, ballot.promised);
            None
        }
    }

    /// Copy of the current state for `group`, if any message for it arrived.
    pub fn snapshot(&self, group: &Group) -> Option<Ballot> {
        self.groups
            .read()
            .get(group)
            .map(|ballot| ballot.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Kind;

    fn p(raw: u64) -> Proposal {
        Proposal::from_raw(raw)
    }

    #[test]
    fn responds_only_to_winning_proposals() {
        let acceptor = Acceptor::new(4);
        let group = Group::new("1");

        let promise = acceptor.on_prepare(&group, p(11)).unwrap();
        assert_eq!(promise.kind, Kind::Promise);
        assert_eq!(promise.sender, 4);
        assert_eq!(promise.proposal, Proposal::ZERO);
        assert_eq!(promise.group, Some(group.clone()));

        assert_eq!(acceptor.on_prepare(&group, p(11)), None);
        assert_eq!(acceptor.on_accept(&group, p(2), "old"), None);

        let accepted = acceptor.on_accept(&group, p(11), "x").unwrap();
        assert_eq!(accepted.kind, Kind::Accepted);
        assert_eq!(accepted.proposal, p(11));
        assert_eq!(accepted.value, "x");

        let promise = acceptor.on_prepare(&group, p(22)).unwrap();
        assert_eq!((promise.proposal, promise.value.as_str()), (p(11), "x"));
    }

    #[test]
    fn groups_are_independent() {
        let acceptor = Acceptor::new(1);
        let one = Group::new("1");
        let two = Group::new("2");

        acceptor.on_prepare(&two, p(12));
        let before = acceptor.snapshot(&two);

        acceptor.on_prepare(&one, p(41));
        acceptor.on_accept(&one, p(41), "g1");
        assert_eq!(acceptor.snapshot(&two), before);

        // A lower proposal still wins in a group that never saw the higher one
        assert!(acceptor.on_accept(&two, p(12), "g2").is_some());
        assert_eq!(acceptor.snapshot(&one).unwrap().value, "g1");
        assert_eq!(acceptor.snapshot(&two).unwrap().value, "g2");
        assert_eq!(acceptor.snapshot(&Group::new("3")), None);
    }

    #[test]
    fn concurrent_prepares_keep_promises_monotonic() {
        let acceptor = Arc::new(Acceptor::new(1));
        let group = Group::new("1");
        let threads: Vec<_> = (1..=8u64)
            .map(|proposer| {
                let acceptor = acceptor.clone();
                let group = group.clone();
                std::thread::spawn(move || {
                    let mut high = Proposal::ZERO;
                    for round in 1..=50 {
                        let proposal = Proposal::new(round, proposer as u8);
                        acceptor.on_prepare(&group, proposal);
                        let seen = acceptor.snapshot(&group).unwrap().promised;
                        assert!(seen >= proposal && seen >= high);
                        high = seen;
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(acceptor.snapshot(&group).unwrap().promised, Proposal::new(50, 8));
    }
}
