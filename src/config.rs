use std::net::SocketAddr;
use std::time::Duration;

use hashbrown::HashMap as Map;
use tokio::net::TcpListener;

use crate::audit::Audit;
use crate::error::Error;
use crate::membership::{Membership, Peer};
use crate::node::Node;
use crate::shared::Shared;
use crate::thread::proposer::Proposer;

/// Port shared by every peer
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug)]
pub struct Config {
    /// Static peer table
    membership: Membership,

    /// Host name identifying this process in `membership`
    host: String,

    /// Port to listen on, and to reach other peers at
    port: u16,

    /// Bound on each dial and response read
    timeout: Duration,

    /// Wait before a proposer starts its first round
    delay: Duration,

    /// Value a proposer starts out proposing
    value: String,

    /// Write audit lines to standard output
    audit: bool,

    /// Per-host address overrides
    addresses: Map<String, SocketAddr>,
}

impl Config {
    pub fn new<S: Into<String>>(membership: Membership, host: S) -> Self {
        Config {
            membership,
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(1),
            delay: Duration::from_secs(0),
            value: String::new(),
            audit: true,
            addresses: Map::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_value<S: Into<String>>(mut self, value: S) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    /// Reach `host` at `addr` instead of `host:port`.
    pub fn with_address<S: Into<String>>(mut self, host: S, addr: SocketAddr) -> Self {
        self.addresses.insert(host.into(), addr);
        self
    }

    /// Binds the listening port and runs the peer until the process exits.
    pub async fn run(self) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        self.build(listener).run().await;
        Ok(())
    }

    /// Assembles a peer around an already bound `listener`.
    pub fn build(self, listener: TcpListener) -> Node {
        let local = match self.membership.get(&self.host) {
        | Some(peer) => peer.clone(),
        | None => {
            warn!("host {:?} is not in the membership table, running without roles", self.host);
            Peer::unlisted(self.host.clone())
        }
        };
        info!("running as peer {} ({}) with roles {:?}", local.id, local.host, local.roles);
        let audit = if self.audit { Audit::stdout(local.id) } else { Audit::disabled(local.id) };
        let shared = Shared::new(
            self.membership,
            local,
            self.port,
            self.timeout,
            self.addresses,
            audit,
        );
        let proposer = Proposer::new(shared.clone());
        Node::new(listener, shared, proposer, self.delay, self.value)
    }
}
