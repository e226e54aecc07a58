//! # Summary
//!
//! This module defines the `Proposer`, which drives rounds for the one
//! consensus group it is bound to: prepare, then accept, then announce the
//! chosen value to every peer.
//!
//! Requests go out one acceptor at a time, each on its own connection. A
//! response is fed straight back into the round, and the response that
//! completes a phase starts the next one. Acceptances that arrive on inbound
//! connections take the same path. The round sits behind a lock so those
//! paths can run concurrently; the lock is never held while waiting on the
//! network. Whole rounds are serialized by a second, asynchronous lock, so a
//! new round never begins while an earlier one still has requests in flight.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as Turn;

use crate::membership::Peer;
use crate::message::{Envelope, Group, Kind, Proposal};
use crate::round::{Phase, Round};
use crate::shared::Shared;

pub struct Proposer {
    shared: Shared,

    /// Group whose acceptors this proposer addresses
    group: Group,

    round: Mutex<Round>,

    /// Held for the duration of each call to `propose`
    turn: Turn<()>,
}

impl Proposer {
    /// Creates a proposer for `shared`'s local peer, or `None` if it
    /// holds no proposer ordinal.
    pub fn new(shared: Shared) -> Option<Arc<Self>> {
        let ordinal = shared.local().ordinal?;
        let group = shared.local().bound_group()?;
        let majority = shared.membership().majority_of(&group);
        info!(
            "proposer {} bound to group {} ({} acceptors, majority {})",
            ordinal,
            group,
            shared.membership().acceptors_in(&group).len(),
            majority,
        );
        Some(Arc::new(Proposer {
            shared,
            group,
            round: Mutex::new(Round::new(ordinal, majority)),
            turn: Turn::new(()),
        }))
    }

    pub fn phase(&self) -> Phase {
        self.round.lock().phase()
    }

    pub fn proposal(&self) -> Proposal {
        self.round.lock().proposal()
    }

    /// Runs one round proposing `candidate` and returns the phase it ended
    /// in. A round that reaches `Phase::Chosen` has already broadcast its
    /// value; anything else stalled and is left for the caller to retry.
    /// Concurrent calls wait for each other.
    pub async fn propose(&self, candidate: String) -> Phase {
        let _turn = self.turn.lock().await;
        let proposal = self.begin_round(candidate.clone());
        info!("group {}: round {} proposing {:?} under {}", self.group, proposal.round(), candidate, proposal);
        self.send_prepare(proposal, candidate).await;
        self.finish()
    }

    fn finish(&self) -> Phase {
        let round = self.round.lock();
        debug!("group {}: round {} ended in {:?} with {:?}", self.group, round.proposal(), round.phase(), round.value());
        round.phase()
    }

    fn begin_round(&self, candidate: String) -> Proposal {
        self.round.lock().begin(candidate)
    }

    fn acceptors(&self) -> Vec<&Peer> {
        self.shared.membership().acceptors_in(&self.group)
    }

    /// Whether `proposal` is still current and in `phase`.
    fn in_phase(&self, proposal: Proposal, phase: Phase) -> bool {
        let round = self.round.lock();
        round.proposal() == proposal && round.phase() == phase
    }

    async fn send_prepare(&self, proposal: Proposal, value: String) {
        for peer in self.acceptors() {
            if !self.in_phase(proposal, Phase::Preparing) {
                break
            }
            let prepare = Envelope::prepare(self.shared.id(), proposal, value.clone(), self.group.clone());
            match self.shared.exchange(peer, prepare).await {
            | Ok(Some(response)) if response.kind == Kind::Promise => {
                self.on_promise(peer.id, proposal, response).await
            }
            | Ok(Some(response)) => debug!("unexpected {:?} from {} during prepare", response.kind, peer.host),
            | Ok(None) => debug!("{} declined prepare {}", peer.host, proposal),
            | Err(error) => debug!("skipping {} for prepare {}: {}", peer.host, proposal, error),
            }
        }
    }

    /// Counts a promise from acceptor `from` answering the prepare for
    /// `answering`, and starts the accept phase once a majority has promised.
    async fn on_promise(&self, from: usize, answering: Proposal, promise: Envelope) {
        if !self.addressed_to_us(&promise) {
            return
        }
        let next = self.round.lock().promise(from, answering, promise.proposal, promise.value);
        if let Some((proposal, value)) = next {
            info!("group {}: prepare {} reached a majority, proposing {:?}", self.group, proposal, value);
            self.send_accept(proposal, value).await;
        }
    }

    async fn send_accept(&self, proposal: Proposal, value: String) {
        for peer in self.acceptors() {
            if !self.in_phase(proposal, Phase::Accepting) {
                break
            }
            let accept = Envelope::accept(self.shared.id(), proposal, value.clone(), self.group.clone());
            match self.shared.exchange(peer, accept).await {
            | Ok(Some(response)) if response.kind == Kind::Accepted => {
                self.on_accepted(peer.id, response).await
            }
            | Ok(Some(response)) => debug!("unexpected {:?} from {} during accept", response.kind, peer.host),
            | Ok(None) => debug!("{} declined accept {}", peer.host, proposal),
            | Err(error) => debug!("skipping {} for accept {}: {}", peer.host, proposal, error),
            }
        }
    }

    /// Counts an acceptance from acceptor `from`, and broadcasts the chosen
    /// value once a majority has accepted.
    pub async fn on_accepted(&self, from: usize, accepted: Envelope) {
        if !self.addressed_to_us(&accepted) {
            return
        }
        let chosen = self.round.lock().accepted(from, accepted.proposal);
        if let Some((proposal, value)) = chosen {
            info!("group {}: {:?} chosen under {}", self.group, value, proposal);
            self.broadcast_chosen(proposal, value).await;
        }
    }

    async fn broadcast_chosen(&self, proposal: Proposal, value: String) {
        let chosen = Envelope::chosen(self.shared.id(), proposal, value, self.group.clone());
        self.shared.broadcast(chosen).await;
    }

    fn addressed_to_us(&self, response: &Envelope) -> bool {
        match &response.group {
        | Some(group) if *group != self.group => {
            trace!("ignoring {:?} for group {} while bound to {}", response.kind, group, self.group);
            false
        }
        | _ => true,
        }
    }
}
