//! # Summary
//!
//! This module defines the `Learner`, which records the value decided for
//! each consensus group as chosen broadcasts arrive.

use hashbrown::HashMap as Map;
use parking_lot::Mutex;

use crate::message::{Group, Proposal};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub proposal: Proposal,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct Learner {
    decisions: Mutex<Map<Group, Decision>>,
}

impl Learner {
    pub fn new() -> Self {
        Learner::default()
    }

    /// Records `value` as chosen for `group`. Returns whether anything changed.
    ///
    /// Redelivered or older announcements are ignored. A newer proposal for an
    /// already decided group only refreshes the proposal number, since Paxos
    /// never chooses two different values for one group.
    pub fn on_chosen(&self, group: &Group, proposal: Proposal, value: &str) -> bool {
        let mut decisions = self.decisions.lock();
        match decisions.get_mut(group) {
        | None => {
            info!("group {}: learned {:?} under {}", group, value, proposal);
            decisions.insert(group.clone(), Decision { proposal, value: value.to_string() });
            true
        }
        | Some(decision) if proposal <= decision.proposal => false,
        | Some(decision) if decision.value != value => {
            warn!(
                "group {}: ignoring conflicting value {:?} under {}, already decided {:?} under {}",
                group, value, proposal, decision.value, decision.proposal,
            );
            false
        }
        | Some(decision) => {
            decision.proposal = proposal;
            true
        }
        }
    }

    pub fn decided(&self, group: &Group) -> Option<Decision> {
        self.decisions.lock().get(group).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: u64) -> Proposal {
        Proposal::from_raw(raw)
    }

    #[test]
    fn records_first_decision() {
        let learner = Learner::new();
        let group = Group::new("1");
        assert_eq!(learner.decided(&group), None);
        assert!(learner.on_chosen(&group, p(11), "x"));
        assert_eq!(learner.decided(&group), Some(Decision { proposal: p(11), value: "x".into() }));
    }

    #[test]
    fn redelivery_is_idempotent() {
        let learner = Learner::new();
        let group = Group::new("1");
        learner.on_chosen(&group, p(21), "x");
        assert!(!learner.on_chosen(&group, p(21), "x"));
        assert!(!learner.on_chosen(&group, p(11), "older"));
        assert_eq!(learner.decided(&group).unwrap().value, "x");
    }

    #[test]
    fn later_proposal_keeps_value() {
        let learner = Learner::new();
        let group = Group::new("1");
        learner.on_chosen(&group, p(11), "x");
        assert!(learner.on_chosen(&group, p(22), "x"));
        assert!(!learner.on_chosen(&group, p(31), "y"));
        assert_eq!(learner.decided(&group), Some(Decision { proposal: p(22), value: "x".into() }));
    }

    #[test]
    fn groups_decide_separately() {
        let learner = Learner::new();
        learner.on_chosen(&Group::new("1"), p(11), "a");
        learner.on_chosen(&Group::new("2"), p(12), "b");
        assert_eq!(learner.decided(&Group::new("1")).unwrap().value, "a");
        assert_eq!(learner.decided(&Group::new("2")).unwrap().value, "b");
    }
}
