//! Session registry
//!
//! Maps each live connection to the room and slot it is bound to. These are
//! back-references only: the room itself stays the authority on who is
//! seated. A room index is kept alongside so broadcasts do not scan every
//! session.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::types::{ConnectionId, RoomCode, Symbol};

/// Binding of one connection to a room slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub room_code: RoomCode,
    pub symbol: Symbol,
    pub display_name: String,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<ConnectionId, Session>,
    by_room: HashMap<RoomCode, HashSet<ConnectionId>>,
}

impl Inner {
    fn unlink(&mut self, session: &Session) {
        if let Some(members) = self.by_room.get_mut(&session.room_code) {
            members.remove(&session.connection_id);
            if members.is_empty() {
                self.by_room.remove(&session.room_code);
            }
        }
    }
}

/// Connection to room bindings
///
/// The lock is only held inside these methods and never across an await.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection, replacing any previous binding it had
    pub fn bind(&self, session: Session) -> Option<Session> {
        let mut inner = self.inner.lock();
        let previous = inner.sessions.remove(&session.connection_id);
        if let Some(previous) = &previous {
            inner.unlink(previous);
        }
        inner
            .by_room
            .entry(session.room_code.clone())
            .or_default()
            .insert(session.connection_id);
        inner.sessions.insert(session.connection_id, session);
        previous
    }

    /// Destroy a connection's binding
    pub fn unbind(&self, connection_id: ConnectionId) -> Option<Session> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.remove(&connection_id)?;
        inner.unlink(&session);
        Some(session)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Session> {
        self.inner.lock().sessions.get(&connection_id).cloned()
    }

    /// The session of `connection_id`, if it is bound to `room_code`
    pub fn get_in_room(
        &self,
        connection_id: ConnectionId,
        room_code: &RoomCode,
    ) -> Option<Session> {
        self.get(connection_id)
            .filter(|session| &session.room_code == room_code)
    }

    /// Connections currently bound to a room
    pub fn connections_in(&self, room_code: &RoomCode) -> Vec<ConnectionId> {
        self.inner
            .lock()
            .by_room
            .get(room_code)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any connection is bound to this room slot
    pub fn slot_is_bound(&self, room_code: &RoomCode, symbol: Symbol) -> bool {
        let inner = self.inner.lock();
        inner.by_room.get(room_code).is_some_and(|members| {
            members.iter().any(|id| {
                inner
                    .sessions
                    .get(id)
                    .is_some_and(|session| session.symbol == symbol)
            })
        })
    }

    /// Drop every binding that points at a room; returns the affected connections
    pub fn scrub_room(&self, room_code: &RoomCode) -> Vec<ConnectionId> {
        let mut inner = self.inner.lock();
        let members: Vec<ConnectionId> = inner
            .by_room
            .remove(room_code)
            .map(|members| members.into_iter().collect())
            .unwrap_or_default();
        for id in &members {
            inner.sessions.remove(id);
        }
        members
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(connection_id: ConnectionId, code: &str, symbol: Symbol) -> Session {
        Session {
            connection_id,
            room_code: RoomCode::from_string(code.to_string()),
            symbol,
            display_name: "P".to_string(),
        }
    }

    #[test]
    fn test_bind_and_lookup() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let code = RoomCode::from_string("111111".to_string());

        assert!(registry.bind(session(conn, "111111", Symbol::X)).is_none());

        assert_eq!(registry.get(conn).unwrap().symbol, Symbol::X);
        assert!(registry.get_in_room(conn, &code).is_some());
        assert!(registry
            .get_in_room(conn, &RoomCode::from_string("222222".to_string()))
            .is_none());
        assert_eq!(registry.connections_in(&code), vec![conn]);
    }

    #[test]
    fn test_one_binding_per_connection() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();

        registry.bind(session(conn, "111111", Symbol::X));
        let previous = registry.bind(session(conn, "222222", Symbol::O)).unwrap();

        assert_eq!(previous.room_code.as_str(), "111111");
        assert_eq!(registry.len(), 1);
        assert!(registry
            .connections_in(&RoomCode::from_string("111111".to_string()))
            .is_empty());
    }

    #[test]
    fn test_unbind() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        registry.bind(session(conn, "111111", Symbol::X));

        let removed = registry.unbind(conn).unwrap();
        assert_eq!(removed.connection_id, conn);
        assert!(registry.get(conn).is_none());
        assert!(registry.unbind(conn).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_slot_is_bound() {
        let registry = SessionRegistry::new();
        let code = RoomCode::from_string("111111".to_string());
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        registry.bind(session(first, "111111", Symbol::X));
        registry.bind(session(second, "111111", Symbol::X));

        registry.unbind(first);
        assert!(registry.slot_is_bound(&code, Symbol::X));
        assert!(!registry.slot_is_bound(&code, Symbol::O));

        registry.unbind(second);
        assert!(!registry.slot_is_bound(&code, Symbol::X));
    }

    #[test]
    fn test_scrub_room() {
        let registry = SessionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();
        registry.bind(session(a, "ai-abc123", Symbol::X));
        registry.bind(session(b, "ai-abc123", Symbol::X));
        registry.bind(session(c, "333333", Symbol::O));

        let mut scrubbed = registry.scrub_room(&RoomCode::from_string("ai-abc123".to_string()));
        scrubbed.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);

        assert_eq!(scrubbed, expected);
        assert!(registry.get(a).is_none());
        assert!(registry.get(c).is_some());
        assert_eq!(registry.len(), 1);
    }
}
