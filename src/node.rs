//! # Summary
//!
//! A `Node` is a fully assembled peer: its listener, its shared hub, and
//! its proposer if it has one. `Handle` is the cloneable view of a running
//! node used to start rounds and inspect state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::ballot::Ballot;
use crate::message::{Group, Proposal};
use crate::round::Phase;
use crate::shared::Shared;
use crate::thread::learner::Decision;
use crate::thread::peer::Inbound;
use crate::thread::proposer::Proposer;

pub struct Node {
    listener: TcpListener,
    shared: Shared,
    proposer: Option<Arc<Proposer>>,
    delay: Duration,
    value: String,
}

impl Node {
    pub(crate) fn new(
        listener: TcpListener,
        shared: Shared,
        proposer: Option<Arc<Proposer>>,
        delay: Duration,
        value: String,
    ) -> Self {
        Node { listener, shared, proposer, delay, value }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> Handle {
        Handle {
            shared: self.shared.clone(),
            proposer: self.proposer.clone(),
        }
    }

    /// Starts accepting connections in the background without proposing.
    pub fn spawn(self) -> Handle {
        match self.local_addr() {
        | Ok(addr) => info!("peer {} listening on {}", self.shared.id(), addr),
        | Err(error) => warn!("listener has no local address: {}", error),
        }
        let handle = self.handle();
        let inbound = Inbound::new(self.shared, self.proposer);
        tokio::spawn(inbound.listen(self.listener));
        handle
    }

    /// Accepts connections forever. A proposer additionally waits out its
    /// startup delay and then runs a single round with its initial value.
    pub async fn run(self) {
        let delay = self.delay;
        let value = self.value.clone();
        let handle = self.spawn();
        if handle.proposer.is_some() {
            if delay > Duration::from_secs(0) {
                info!("waiting {:?} before proposing", delay);
                tokio::time::sleep(delay).await;
            }
            match handle.propose(value).await {
            | Some(Phase::Chosen) => (),
            | phase => warn!("round stalled in {:?}", phase),
            }
        }
        futures::future::pending::<()>().await
    }
}

#[derive(Clone)]
pub struct Handle {
    shared: Shared,
    proposer: Option<Arc<Proposer>>,
}

impl Handle {
    /// Runs one round for `value`. Returns the phase the round ended in,
    /// or `None` if this peer is not a proposer.
    pub async fn propose<S: Into<String>>(&self, value: S) -> Option<Phase> {
        match &self.proposer {
        | Some(proposer) => Some(proposer.propose(value.into()).await),
        | None => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.proposer.as_ref().map(|proposer| proposer.phase())
    }

    /// Proposal number of the current or most recent round.
    pub fn proposal(&self) -> Option<Proposal> {
        self.proposer.as_ref().map(|proposer| proposer.proposal())
    }

    pub fn decided(&self, group: &Group) -> Option<Decision> {
        self.shared.decided(group)
    }

    pub fn ballot(&self, group: &Group) -> Option<Ballot> {
        self.shared.ballot(group)
    }
}
