//! # Summary
//!
//! This module accepts inbound connections. Each connection carries exactly
//! one envelope and gets its own task: requests are answered through
//! `Shared::respond`, while acceptances are handed to the local proposer.
//!
//! Promises only count on the connection their prepare went out on. A
//! promise arriving on its own connection does not say which prepare it
//! answers, so it is dropped.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::Error;
use crate::message::Kind;
use crate::shared::Shared;
use crate::socket;
use crate::thread::proposer::Proposer;

#[derive(Clone)]
pub struct Inbound {
    shared: Shared,
    proposer: Option<Arc<Proposer>>,
}

impl Inbound {
    pub fn new(shared: Shared, proposer: Option<Arc<Proposer>>) -> Self {
        Inbound { shared, proposer }
    }

    /// Accepts connections forever, spawning a task for each.
    pub async fn listen(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
            | Ok((stream, addr)) => {
                trace!("accepted connection from {}", addr);
                let inbound = self.clone();
                tokio::spawn(async move {
                    if let Err(error) = inbound.handle(stream).await {
                        debug!("dropping connection from {}: {}", addr, error);
                    }
                });
            }
            | Err(error) => warn!("failed to accept connection: {}", error),
            }
        }
    }

    async fn handle(self, stream: TcpStream) -> Result<(), Error> {
        let mut connection = socket::wrap(stream);
        let envelope = match connection.next().await {
        | Some(envelope) => envelope?,
        | None => return Ok(()),
        };
        self.shared.audit().received(&envelope);

        match (envelope.kind, &self.proposer) {
        | (Kind::Accepted, Some(proposer)) => proposer.on_accepted(envelope.sender, envelope).await,
        | (Kind::Accepted, None) => trace!("not a proposer, dropping accepted {}", envelope.proposal),
        | (Kind::Promise, _) => debug!("dropping unsolicited promise from peer {}", envelope.sender),
        | (Kind::Prepare, _) | (Kind::Accept, _) | (Kind::Chosen, _) => {
            if let Some(response) = self.shared.respond(envelope) {
                self.shared.audit().sent(&response);
                connection.send(response).await?;
            }
        }
        }
        Ok(())
    }
}
