//! # Summary
//!
//! This module implements a central hub shared by every task on a peer:
//! the membership table, the local identity, the acceptor and learner, and
//! the means of reaching other peers. `Shared` is a cheap handle around an
//! `Arc`, so each connection task can hold its own clone.
//!
//! Messages addressed to the local peer never touch the network; they are
//! answered in-process, as if they had arrived over a connection, and leave
//! the same audit lines behind.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap as Map;

use crate::audit::Audit;
use crate::ballot::Ballot;
use crate::error::Error;
use crate::membership::{Membership, Peer};
use crate::message::{Envelope, Group, Kind};
use crate::socket;
use crate::thread::acceptor::Acceptor;
use crate::thread::learner::{Decision, Learner};

#[derive(Clone)]
pub struct Shared(Arc<State>);

pub struct State {
    membership: Membership,

    /// Entry for this process in `membership`
    local: Peer,

    /// Port every peer listens on
    port: u16,

    /// Bound on each dial and response read
    timeout: Duration,

    /// Explicit addresses for hosts that do not resolve to `host:port`
    addresses: Map<String, SocketAddr>,

    audit: Audit,
    acceptor: Acceptor,
    learner: Learner,
}

impl Shared {
    pub fn new(
        membership: Membership,
        local: Peer,
        port: u16,
        timeout: Duration,
        addresses: Map<String, SocketAddr>,
        audit: Audit,
    ) -> Self {
        Shared(Arc::new(State {
            audit,
            acceptor: Acceptor::new(local.id),
            learner: Learner::new(),
            membership,
            local,
            port,
            timeout,
            addresses,
        }))
    }

    pub fn membership(&self) -> &Membership {
        &self.0.membership
    }

    pub fn local(&self) -> &Peer {
        &self.0.local
    }

    pub fn id(&self) -> usize {
        self.0.local.id
    }

    pub fn audit(&self) -> &Audit {
        &self.0.audit
    }

    pub fn decided(&self, group: &Group) -> Option<Decision> {
        self.0.learner.decided(group)
    }

    pub fn ballot(&self, group: &Group) -> Option<Ballot> {
        self.0.acceptor.snapshot(group)
    }

    fn address(&self, peer: &Peer) -> String {
        match self.0.addresses.get(&peer.host) {
        | Some(addr) => addr.to_string(),
        | None => format!("{}:{}", peer.host, self.0.port),
        }
    }

    fn is_local(&self, peer: &Peer) -> bool {
        peer.host == self.0.local.host
    }

    /// Handles an inbound request or announcement, returning the response
    /// to write back, if any. Requests for groups this peer does not
    /// accept for are dropped.
    pub fn respond(&self, request: Envelope) -> Option<Envelope> {
        match request.kind {
        | Kind::Prepare | Kind::Accept => {
            let group = match &request.group {
            | Some(group) if self.0.local.accepts(group) => group,
            | _ => {
                trace!("not an acceptor for {:?}, dropping {:?}", request.group, request.kind);
                return None
            }
            };
            if request.kind == Kind::Prepare {
                self.0.acceptor.on_prepare(group, request.proposal)
            } else {
                self.0.acceptor.on_accept(group, request.proposal, &request.value)
            }
        }
        | Kind::Chosen => {
            let group = request.group_or_bound();
            self.0.audit.chose(&request);
            self.0.learner.on_chosen(&group, request.proposal, &request.value);
            None
        }
        | Kind::Promise | Kind::Accepted => None,
        }
    }

    /// Sends `request` to `peer` and waits for its response.
    ///
    /// `Ok(None)` means the peer deliberately stayed silent. Errors mean the
    /// peer could not be reached; callers skip it for this round.
    pub async fn exchange(&self, peer: &Peer, request: Envelope) -> Result<Option<Envelope>, Error> {
        self.0.audit.sent(&request);
        let response = if self.is_local(peer) {
            self.0.audit.received(&request);
            let response = self.respond(request);
            if let Some(response) = &response {
                self.0.audit.sent(response);
            }
            response
        } else {
            socket::request(self.address(peer), request, self.0.timeout).await?
        };
        if let Some(response) = &response {
            self.0.audit.received(response);
        }
        Ok(response)
    }

    /// Sends `message` to `peer` without waiting for a response.
    pub async fn notify(&self, peer: &Peer, message: Envelope) -> Result<(), Error> {
        self.0.audit.sent(&message);
        if self.is_local(peer) {
            self.0.audit.received(&message);
            self.respond(message);
            return Ok(())
        }
        socket::notify(self.address(peer), message, self.0.timeout).await
    }

    /// Best-effort delivery of `message` to every peer in the table.
    pub async fn broadcast(&self, message: Envelope) {
        for peer in self.0.membership.peers() {
            if let Err(error) = self.notify(peer, message.clone()).await {
                debug!("could not reach {}: {}", peer.host, error);
            }
        }
    }
}
