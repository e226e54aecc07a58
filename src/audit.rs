//! # Summary
//!
//! Audit trail of protocol events. Each sent, received, or chosen envelope
//! produces one JSON object on its own line, normally on standard output.
//! The trail is write-only: nothing in the protocol reads it back.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_derive::Serialize;

use crate::message::{Action, Envelope, Kind, Proposal};

#[derive(Serialize)]
struct Line<'a> {
    peer_id: usize,
    action: Action,
    message_type: Kind,
    message_value: &'a str,
    proposal_num: Proposal,
}

/// Destination for audit lines, shared by every task on a peer.
pub type Trail = Arc<Mutex<dyn Write + Send>>;

#[derive(Clone)]
pub struct Audit {
    /// Local peer ID, stamped on every line
    id: usize,

    /// `None` when auditing is switched off
    trail: Option<Trail>,
}

impl Audit {
    pub fn new(id: usize, trail: Option<Trail>) -> Self {
        Audit { id, trail }
    }

    pub fn stdout(id: usize) -> Self {
        let trail: Trail = Arc::new(Mutex::new(std::io::stdout()));
        Audit::new(id, Some(trail))
    }

    pub fn disabled(id: usize) -> Self {
        Audit::new(id, None)
    }

    pub fn sent(&self, envelope: &Envelope) {
        self.record(Action::Sent, envelope)
    }

    pub fn received(&self, envelope: &Envelope) {
        self.record(Action::Received, envelope)
    }

    pub fn chose(&self, envelope: &Envelope) {
        self.record(Action::Chose, envelope)
    }

    fn record(&self, action: Action, envelope: &Envelope) {
        let trail = match &self.trail {
        | Some(trail) => trail,
        | None => return,
        };
        let line = Line {
            peer_id: self.id,
            action,
            message_type: envelope.kind,
            message_value: &envelope.value,
            proposal_num: envelope.proposal,
        };
        let mut trail = trail.lock();
        let written = serde_json::to_vec(&line)
            .map_err(std::io::Error::from)
            .and_then(|mut encoded| {
                encoded.push(b'\n');
                trail.write_all(&encoded)
            })
            .and_then(|_| trail.flush());
        if let Err(error) = written {
            warn!("failed to write audit line: {}", error);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message::Group;

    /// In-memory trail for inspecting what a peer audited.
    #[derive(Clone, Default)]
    pub(crate) struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        pub(crate) fn trail(&self) -> Trail {
            Arc::new(Mutex::new(self.clone()))
        }

        /// `(action, message_type)` of every line written so far.
        pub(crate) fn events(&self) -> Vec<(String, String)> {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| {
                    let json: serde_json::Value = serde_json::from_str(line).unwrap();
                    (json["action"].as_str().unwrap().to_string(), json["message_type"].as_str().unwrap().to_string())
                })
                .collect()
        }
    }

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_line_per_event() {
        let buffer = Buffer::default();
        let audit = Audit::new(3, Some(buffer.trail()));
        let envelope = Envelope::accept(1, Proposal::new(2, 1), "x".to_string(), Group::new("1"));

        audit.received(&envelope);
        audit.sent(&envelope);

        let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["peer_id"], 3);
        assert_eq!(first["message_value"], "x");
        assert_eq!(first["proposal_num"], 21);
        assert!(first.get("group").is_none());
        assert_eq!(buffer.events(), vec![
            ("received".to_string(), "accept".to_string()),
            ("sent".to_string(), "accept".to_string()),
        ]);
    }

    #[test]
    fn disabled_audit_writes_nothing() {
        let audit = Audit::disabled(1);
        audit.chose(&Envelope::chosen(1, Proposal::new(1, 1), "x".to_string(), Group::new("1")));
    }
}
