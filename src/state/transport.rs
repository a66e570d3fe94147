//! Transport seam and outbound request tracking.
//!
//! The engine never talks to a socket. It hands [`OutboundRequest`]s to a
//! [`Transport`] under a [`RequestId`] and waits for the host application to
//! feed the matching reply back.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::{EngineError, Result};
use super::protocol::OutboundRequest;

/// Correlation id of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Outbound half of the server connection.
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Send a request. The reply is delivered later, out of band.
    fn send(&mut self, id: RequestId, request: &OutboundRequest) -> Result<()>;
}

impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, id: RequestId, request: &OutboundRequest) -> Result<()> {
        (**self).send(id, request)
    }
}

/// Connection status as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected { since: DateTime<Utc> },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// A sent request awaiting its reply.
#[derive(Debug, Clone)]
pub struct InFlight<P> {
    pub id: RequestId,
    pub purpose: P,
    pub sent_at: DateTime<Utc>,
}

/// Requests sent but not yet answered, keyed by id.
#[derive(Debug)]
pub struct RequestTracker<P> {
    next_id: u64,
    in_flight: HashMap<RequestId, InFlight<P>>,
}

impl<P> Default for RequestTracker<P> {
    fn default() -> Self {
        Self {
            next_id: 0,
            in_flight: HashMap::new(),
        }
    }
}

impl<P> RequestTracker<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id without tracking anything yet.
    pub fn next_id(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId(self.next_id)
    }

    pub fn track(&mut self, id: RequestId, purpose: P, now: DateTime<Utc>) {
        self.in_flight.insert(
            id,
            InFlight {
                id,
                purpose,
                sent_at: now,
            },
        );
    }

    /// Take the request answered by `id`. A second reply finds nothing.
    pub fn resolve(&mut self, id: RequestId) -> Option<InFlight<P>> {
        self.in_flight.remove(&id)
    }

    pub fn get(&self, id: RequestId) -> Option<&InFlight<P>> {
        self.in_flight.get(&id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &InFlight<P>> {
        self.in_flight.values()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Drop every in-flight request whose purpose matches.
    pub fn forget_where(&mut self, mut matches: impl FnMut(&P) -> bool) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, f| !matches(&f.purpose));
        before - self.in_flight.len()
    }
}

/// Transport that records requests in memory.
///
/// Useful for tests and for driving the engine from a script.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    status: ConnectionStatus,
    sent: Vec<(RequestId, OutboundRequest)>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            sent: Vec::new(),
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnect(&mut self) {
        self.status = ConnectionStatus::Disconnected { since: Utc::now() };
    }

    pub fn reconnect(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn sent(&self) -> &[(RequestId, OutboundRequest)] {
        &self.sent
    }

    pub fn last_sent(&self) -> Option<&(RequestId, OutboundRequest)> {
        self.sent.last()
    }

    pub fn take_sent(&mut self) -> Vec<(RequestId, OutboundRequest)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    fn send(&mut self, id: RequestId, request: &OutboundRequest) -> Result<()> {
        if !self.is_connected() {
            return Err(EngineError::Disconnected);
        }
        debug!(%id, event = request.event_name(), "send");
        self.sent.push((id, request.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leave() -> OutboundRequest {
        OutboundRequest::LeaveRoom {
            room_id: "1".into(),
            user_id: "me".into(),
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut tracker: RequestTracker<&str> = RequestTracker::new();
        assert_eq!(tracker.next_id(), RequestId(1));
        assert_eq!(tracker.next_id(), RequestId(2));
    }

    #[test]
    fn test_resolve_once() {
        let mut tracker = RequestTracker::new();
        let id = tracker.next_id();
        tracker.track(id, "cancel", Utc::now());

        assert_eq!(tracker.resolve(id).map(|f| f.purpose), Some("cancel"));
        assert!(tracker.resolve(id).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_forget_where() {
        let mut tracker = RequestTracker::new();
        for purpose in ["a", "b", "a"] {
            let id = tracker.next_id();
            tracker.track(id, purpose, Utc::now());
        }
        assert_eq!(tracker.forget_where(|p| *p == "a"), 2);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_memory_transport_disconnected() {
        let mut transport = MemoryTransport::new();
        transport.send(RequestId(1), &leave()).unwrap();
        assert_eq!(transport.sent().len(), 1);

        transport.disconnect();
        assert_eq!(
            transport.send(RequestId(2), &leave()),
            Err(EngineError::Disconnected)
        );
        assert_eq!(transport.sent().len(), 1);

        transport.reconnect();
        assert!(transport.is_connected());
    }

    #[test]
    fn test_boxed_transport() {
        let mut boxed: Box<dyn Transport> = Box::new(MemoryTransport::new());
        assert!(boxed.is_connected());
        assert!(boxed.send(RequestId(1), &leave()).is_ok());
    }
}
