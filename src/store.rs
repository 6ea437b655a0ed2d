//! Room store
//!
//! Owns every `Room`, keyed by code. Store-level operations go through a
//! concurrent map; mutation of a single room goes through that room's own
//! async mutex, so different rooms never contend.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::room::{Player, Room};
use crate::types::RoomCode;

/// Attempts at finding a free code before giving up
const MAX_CODE_ATTEMPTS: usize = 64;

/// Shared handle to one stored room
///
/// The token is cancelled when the room is torn down, which aborts any
/// pending AI turn without waiting for the room lock.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub room: Arc<Mutex<Room>>,
    pub cancel: CancellationToken,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            room: Arc::new(Mutex::new(room)),
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: DashMap<RoomCode, RoomHandle>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Waiting room with `creator` seated as X
    pub fn create(&self, creator: Player) -> Result<(RoomCode, RoomHandle), AppError> {
        self.insert_with(RoomCode::generate, |code| Room::new(code, creator))
    }

    /// Create a Playing room against the AI, in the `ai-` code namespace
    pub fn create_ai_room(&self, human: Player) -> Result<(RoomCode, RoomHandle), AppError> {
        self.insert_with(RoomCode::generate_ai, |code| Room::new_ai(code, human))
    }

    fn insert_with(
        &self,
        generate: impl Fn() -> RoomCode,
        build: impl FnOnce(RoomCode) -> Room,
    ) -> Result<(RoomCode, RoomHandle), AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate();
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!("Room code {} collided, regenerating", code);
                }
                Entry::Vacant(vacant) => {
                    let handle = RoomHandle::new(build(code.clone()));
                    vacant.insert(handle.clone());
                    return Ok((code, handle));
                }
            }
        }

        warn!("No free room code after {} attempts", MAX_CODE_ATTEMPTS);
        Err(AppError::CodeSpaceExhausted)
    }

    pub fn get(&self, code: &RoomCode) -> Result<RoomHandle, AppError> {
        self.rooms
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::RoomNotFound(code.to_string()))
    }

    /// Remove a room and cancel its pending work
    ///
    /// Callers that can take the room lock should also `close()` the room
    /// so handlers still holding the handle see it as gone.
    pub fn remove(&self, code: &RoomCode) -> Option<RoomHandle> {
        let removed = self.rooms.remove(code).map(|(_, handle)| handle);
        if let Some(handle) = &removed {
            handle.cancel.cancel();
        }
        removed
    }

    /// Snapshot of current codes
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
