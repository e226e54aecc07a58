//! # Summary
//!
//! This module parses the static membership descriptor into a table of
//! peers, their roles, and the consensus groups they accept for.
//!
//! Each descriptor line has the form `hostname:role1,role2,...`. Recognized
//! role tokens are `proposerN` (proposer with ordinal N, bound to group N),
//! `acceptorN` (acceptor in group N) and `learnerN`. Anything else is ignored,
//! as are lines without a colon. The table is immutable once built.

use std::collections::BTreeSet as Set;
use std::path::Path;

use crate::error::Error;
use crate::message::{self, Group};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Proposer,
    Acceptor,
    Learner,
}

/// A single line of the membership table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Peer {
    /// 1-based line number in the descriptor
    pub id: usize,

    pub host: String,

    pub roles: Set<Role>,

    /// Distinguishes proposers when numbering ballots
    pub ordinal: Option<u8>,

    /// Groups this peer accepts for, in descriptor order
    pub groups: Vec<Group>,
}

impl Peer {
    /// A peer that appears nowhere in the table. It holds no roles but
    /// still listens for chosen values.
    pub fn unlisted<S: Into<String>>(host: S) -> Self {
        Peer {
            host: host.into(),
            ..Peer::default()
        }
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn accepts(&self, group: &Group) -> bool {
        self.has(Role::Acceptor) && self.groups.contains(group)
    }

    /// Group this peer drives rounds for, if it is a proposer.
    pub fn bound_group(&self) -> Option<Group> {
        self.ordinal.map(Group::bound_to)
    }

    fn assign(&mut self, token: &str) {
        if let Some(n) = suffix(token, "proposer") {
            match n.parse::<u8>() {
            | Ok(ordinal) if ordinal > 0 && (ordinal as u64) < message::STRIDE => {
                self.roles.insert(Role::Proposer);
                self.ordinal = Some(ordinal);
            }
            | _ => debug!("ignoring proposer token {:?} for {}", token, self.host),
            }
        } else if let Some(n) = suffix(token, "acceptor") {
            let group = Group::new(n);
            self.roles.insert(Role::Acceptor);
            if !self.groups.contains(&group) {
                self.groups.push(group);
            }
        } else if suffix(token, "learner").is_some() {
            self.roles.insert(Role::Learner);
        } else {
            debug!("ignoring unknown role {:?} for {}", token, self.host);
        }
    }
}

/// Returns the numeric tail of `token` after `prefix`, if there is one.
fn suffix<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    token.strip_prefix(prefix)
        .filter(|tail| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()))
}

/// Static peer list with role and group lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    peers: Vec<Peer>,
}

impl Membership {
    /// Reads and parses the descriptor at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map(|text| Self::parse(&text))
            .map_err(|source| Error::Membership {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Parses descriptor text. Lines without a colon are skipped.
    /// A host listed twice keeps its first position but takes the later
    /// line's roles and ID. A proposer ordinal belongs to the first host
    /// that claims it.
    pub fn parse(text: &str) -> Self {
        let mut peers: Vec<Peer> = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let mut fields = line.trim().split(':');
            let (host, roles) = match (fields.next(), fields.next()) {
            | (Some(host), Some(roles)) if !host.is_empty() => (host, roles),
            | _ => {
                if !line.trim().is_empty() {
                    debug!("skipping malformed membership line {}: {:?}", index + 1, line);
                }
                continue
            }
            };
            let mut peer = Peer {
                id: index + 1,
                host: host.to_string(),
                ..Peer::default()
            };
            for token in roles.split(',').map(str::trim).filter(|token| !token.is_empty()) {
                peer.assign(token);
            }
            if let Some(ordinal) = peer.ordinal {
                if peers.iter().any(|other| other.host != peer.host && other.ordinal == Some(ordinal)) {
                    debug!("ignoring proposer{} for {}, already held by another host", ordinal, peer.host);
                    peer.ordinal = None;
                    peer.roles.remove(&Role::Proposer);
                }
            }
            match peers.iter_mut().find(|existing| existing.host == peer.host) {
            | Some(existing) => *existing = peer,
            | None => peers.push(peer),
            }
        }
        Membership { peers }
    }

    /// All peers in descriptor order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn get(&self, host: &str) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.host == host)
    }

    pub fn roles_of(&self, host: &str) -> Set<Role> {
        self.get(host)
            .map(|peer| peer.roles.clone())
            .unwrap_or_default()
    }

    pub fn groups_accepted_by(&self, host: &str) -> &[Group] {
        self.get(host)
            .filter(|peer| peer.has(Role::Acceptor))
            .map(|peer| peer.groups.as_slice())
            .unwrap_or(&[])
    }

    /// Acceptors of `group` in descriptor order.
    pub fn acceptors_in(&self, group: &Group) -> Vec<&Peer> {
        self.peers
            .iter()
            .filter(|peer| peer.accepts(group))
            .collect()
    }

    pub fn majority_of(&self, group: &Group) -> usize {
        self.acceptors_in(group).len() / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &str = "\
p1:proposer1,acceptor1
a1:acceptor1
garbage line
a2:acceptor1,acceptor2
p2:proposer2
a3:acceptor2,learner1
";

    #[test]
    fn parses_roles_and_ids() {
        let membership = Membership::parse(HOSTS);
        assert_eq!(membership.peers().len(), 5);

        let p1 = membership.get("p1").unwrap();
        assert_eq!(p1.id, 1);
        assert_eq!(p1.ordinal, Some(1));
        assert_eq!(p1.bound_group(), Some(Group::new("1")));
        assert!(p1.has(Role::Proposer) && p1.has(Role::Acceptor));

        // Skipped lines still count towards IDs
        assert_eq!(membership.get("a2").unwrap().id, 4);

        let a3 = membership.get("a3").unwrap();
        assert_eq!(membership.roles_of("a3"), [Role::Acceptor, Role::Learner].iter().copied().collect::<Set<Role>>());
        assert!(!a3.has(Role::Proposer));
        assert_eq!(a3.ordinal, None);
    }

    #[test]
    fn groups_and_majorities() {
        let membership = Membership::parse(HOSTS);
        let one = Group::new("1");
        let two = Group::new("2");

        let hosts: Vec<&str> = membership.acceptors_in(&one)
            .into_iter()
            .map(|peer| peer.host.as_str())
            .collect();
        assert_eq!(hosts, vec!["p1", "a1", "a2"]);
        assert_eq!(membership.majority_of(&one), 2);
        assert_eq!(membership.majority_of(&two), 2);
        assert_eq!(membership.majority_of(&Group::new("9")), 1);

        assert_eq!(membership.groups_accepted_by("a2"), &[one.clone(), two.clone()][..]);
        assert!(membership.groups_accepted_by("p2").is_empty());
        assert!(membership.groups_accepted_by("nobody").is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let membership = Membership::parse("\n:acceptor1\nhost-only\nx:proposer0,proposer42,acceptor,acceptorX,learner1\r\n");
        assert_eq!(membership.peers().len(), 1);
        let x = membership.get("x").unwrap();
        assert_eq!(x.ordinal, None);
        assert!(x.groups.is_empty());
        assert_eq!(x.roles, [Role::Learner].iter().copied().collect::<Set<Role>>());
    }

    #[test]
    fn repeated_host_takes_later_line() {
        let membership = Membership::parse("a:acceptor1\nb:acceptor1\na:acceptor2\n");
        let hosts: Vec<&str> = membership.peers().iter().map(|peer| peer.host.as_str()).collect();
        assert_eq!(hosts, vec!["a", "b"]);
        let a = membership.get("a").unwrap();
        assert_eq!(a.id, 3);
        assert_eq!(a.groups, vec![Group::new("2")]);
    }

    #[test]
    fn proposer_ordinals_are_unique() {
        let membership = Membership::parse("p1:proposer1\np2:proposer1,acceptor1\np1:proposer1,acceptor1\n");
        let p1 = membership.get("p1").unwrap();
        assert_eq!(p1.ordinal, Some(1));
        assert!(p1.has(Role::Proposer));

        let p2 = membership.get("p2").unwrap();
        assert_eq!(p2.ordinal, None);
        assert_eq!(p2.bound_group(), None);
        assert!(!p2.has(Role::Proposer));
        assert!(p2.accepts(&Group::new("1")));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.txt");
        assert!(matches!(Membership::load(&path), Err(Error::Membership { .. })));

        std::fs::write(&path, HOSTS).unwrap();
        assert_eq!(Membership::load(&path).unwrap(), Membership::parse(HOSTS));
    }
}
