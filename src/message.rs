//! # Summary
//!
//! This module defines the envelope exchanged between peers, along with
//! the proposal numbers and group tags it carries. Envelopes serialize to
//! self-describing JSON records with the field names below, so any peer
//! speaking the same record layout can participate.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// Spacing between successive rounds of the same proposer. Proposer
/// ordinals must stay below this value for proposal numbers to be unique.
pub const STRIDE: u64 = 10;

/// Totally ordered ballot identifier: `round * STRIDE + ordinal`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Proposal(u64);

impl Proposal {
    /// Sentinel for "nothing accepted yet".
    pub const ZERO: Proposal = Proposal(0);

    pub fn new(round: u64, ordinal: u8) -> Self {
        Proposal(round * STRIDE + ordinal as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Proposal(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn round(self) -> u64 {
        self.0 / STRIDE
    }

    /// Ordinal of the proposer that issued this number.
    pub fn ordinal(self) -> u8 {
        (self.0 % STRIDE) as u8
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag naming a consensus group, e.g. `"1"` for peers listed as `acceptor1`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Group(String);

impl Group {
    pub fn new<S: Into<String>>(tag: S) -> Self {
        Group(tag.into())
    }

    /// Group that proposer `ordinal` is bound to.
    pub fn bound_to(ordinal: u8) -> Self {
        Group(ordinal.to_string())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Sent,
    Received,
    Chose,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Prepare,
    Promise,
    Accept,
    Accepted,
    Chosen,
}

/// One message on the wire.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Peer ID of the sender
    #[serde(rename = "peer_id")]
    pub sender: usize,

    pub action: Action,

    #[serde(rename = "message_type")]
    pub kind: Kind,

    #[serde(rename = "message_value", default)]
    pub value: String,

    /// For promises, the acceptor's previously accepted proposal.
    /// Otherwise the proposal the message refers to.
    #[serde(rename = "proposal_num")]
    pub proposal: Proposal,

    /// Always present on requests, optional elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
}

impl Envelope {
    fn sent(sender: usize, kind: Kind, proposal: Proposal, value: String, group: Group) -> Self {
        Envelope {
            sender,
            action: Action::Sent,
            kind,
            value,
            proposal,
            group: Some(group),
        }
    }

    pub fn prepare(sender: usize, proposal: Proposal, value: String, group: Group) -> Self {
        Self::sent(sender, Kind::Prepare, proposal, value, group)
    }

    pub fn accept(sender: usize, proposal: Proposal, value: String, group: Group) -> Self {
        Self::sent(sender, Kind::Accept, proposal, value, group)
    }

    /// `accepted` and `value` describe the acceptor's prior state, not the prepare.
    pub fn promise(sender: usize, accepted: Proposal, value: String, group: Group) -> Self {
        Self::sent(sender, Kind::Promise, accepted, value, group)
    }

    pub fn accepted(sender: usize, proposal: Proposal, value: String, group: Group) -> Self {
        Self::sent(sender, Kind::Accepted, proposal, value, group)
    }

    pub fn chosen(sender: usize, proposal: Proposal, value: String, group: Group) -> Self {
        Envelope {
            sender,
            action: Action::Chose,
            kind: Kind::Chosen,
            value,
            proposal,
            group: Some(group),
        }
    }

    /// Group this envelope refers to. Chosen broadcasts from peers that
    /// omit the tag fall back to the group bound to the issuing proposer.
    pub fn group_or_bound(&self) -> Group {
        self.group
            .clone()
            .unwrap_or_else(|| Group::bound_to(self.proposal.ordinal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_numbers_interleave_proposers() {
        let p1 = Proposal::new(1, 1);
        let p2 = Proposal::new(1, 2);
        assert_eq!(p1.get(), 11);
        assert_eq!(p2.get(), 12);
        assert!(Proposal::new(2, 1) > p2);
        assert_eq!(Proposal::from_raw(23).round(), 2);
        assert_eq!(Proposal::from_raw(23).ordinal(), 3);
    }

    #[test]
    fn envelope_uses_wire_field_names() {
        let envelope = Envelope::prepare(3, Proposal::new(1, 1), "x".to_string(), Group::new("1"));
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["peer_id"], 3);
        assert_eq!(json["action"], "sent");
        assert_eq!(json["message_type"], "prepare");
        assert_eq!(json["message_value"], "x");
        assert_eq!(json["proposal_num"], 11);
        assert_eq!(json["group"], "1");
    }

    #[test]
    fn missing_group_is_optional() {
        let raw = r#"{"peer_id":2,"action":"chose","message_type":"chosen","message_value":"y","proposal_num":12}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.group, None);
        assert_eq!(envelope.group_or_bound(), Group::new("2"));

        let encoded = serde_json::to_string(&envelope).unwrap();
        assert!(!encoded.contains("group"));
    }
}
