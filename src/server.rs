//! GameServer implementation
//!
//! Routes commands from connection handlers to the addressed room. There is
//! no global lock: the client and session maps are concurrent, and each room
//! is mutated only while its own mutex is held. Handlers for one connection
//! run in order, handlers for different connections run concurrently.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ai::{AiEngine, AI_SYMBOL};
use crate::auth::{Authenticator, UserIdentity};
use crate::cache::ScoreCache;
use crate::client::Client;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::game::{parse_cell_index, Outcome};
use crate::message::ServerMessage;
use crate::room::{MoveResult, Player, Room, RoomStatus};
use crate::session::{Session, SessionRegistry};
use crate::store::{RoomHandle, RoomStore};
use crate::types::{ConnectionId, RoomCode, Symbol};

/// Commands sent from handlers to the GameServer
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client disconnected
    Disconnect { connection_id: ConnectionId },
    Register {
        connection_id: ConnectionId,
        username: String,
        password: String,
    },
    Login {
        connection_id: ConnectionId,
        username: String,
        password: String,
    },
    Logout { connection_id: ConnectionId },
    /// Create a new room
    CreateRoom {
        connection_id: ConnectionId,
        display_name: Option<String>,
    },
    /// Join an existing room
    JoinRoom {
        connection_id: ConnectionId,
        room_code: String,
        display_name: Option<String>,
    },
    MakeMove {
        connection_id: ConnectionId,
        room_code: String,
        cell_index: i64,
    },
    PlayVsAi {
        connection_id: ConnectionId,
        display_name: Option<String>,
    },
    MakeMoveVsAi {
        connection_id: ConnectionId,
        room_code: String,
        cell_index: i64,
    },
    ResetGame {
        connection_id: ConnectionId,
        room_code: String,
    },
    /// Leave a room without disconnecting
    LeaveRoom {
        connection_id: ConnectionId,
        room_code: String,
    },
    LeaveAiGame {
        connection_id: ConnectionId,
        room_code: String,
    },
}

impl ServerCommand {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            ServerCommand::Connect { connection_id, .. }
            | ServerCommand::Disconnect { connection_id }
            | ServerCommand::Register { connection_id, .. }
            | ServerCommand::Login { connection_id, .. }
            | ServerCommand::Logout { connection_id }
            | ServerCommand::CreateRoom { connection_id, .. }
            | ServerCommand::JoinRoom { connection_id, .. }
            | ServerCommand::MakeMove { connection_id, .. }
            | ServerCommand::PlayVsAi { connection_id, .. }
            | ServerCommand::MakeMoveVsAi { connection_id, .. }
            | ServerCommand::ResetGame { connection_id, .. }
            | ServerCommand::LeaveRoom { connection_id, .. }
            | ServerCommand::LeaveAiGame { connection_id, .. } => *connection_id,
        }
    }
}

/// The game server
///
/// Shared behind an `Arc` by every connection handler and the reaper.
pub struct GameServer {
    /// All connected clients: ConnectionId -> Client
    clients: DashMap<ConnectionId, Client>,
    rooms: RoomStore,
    sessions: SessionRegistry,
    ai: AiEngine,
    auth: Arc<dyn Authenticator>,
    ai_move_delay: Duration,
}

impl GameServer {
    pub fn new(config: &ServerConfig, auth: Arc<dyn Authenticator>) -> Self {
        let cache = Arc::new(ScoreCache::new(config.score_cache_capacity));
        let ai = AiEngine::new(cache, config.ai_random_move_probability);
        Self::with_parts(ai, auth, config.ai_move_delay)
    }

    pub fn with_parts(
        ai: AiEngine,
        auth: Arc<dyn Authenticator>,
        ai_move_delay: Duration,
    ) -> Self {
        Self {
            clients: DashMap::new(),
            rooms: RoomStore::new(),
            sessions: SessionRegistry::new(),
            ai,
            auth,
            ai_move_delay,
        }
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn ai(&self) -> &AiEngine {
        &self.ai
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Process a single command
    ///
    /// Rejections are reported to the originating connection only.
    pub async fn handle_command(&self, cmd: ServerCommand) {
        let connection_id = cmd.connection_id();
        let result = match cmd {
            ServerCommand::Connect {
                connection_id,
                sender,
            } => {
                self.handle_connect(connection_id, sender);
                Ok(())
            }
            ServerCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id).await;
                Ok(())
            }
            ServerCommand::Register {
                connection_id,
                username,
                password,
            } => self.handle_register(connection_id, username, password).await,
            ServerCommand::Login {
                connection_id,
                username,
                password,
            } => self.handle_login(connection_id, username, password).await,
            ServerCommand::Logout { connection_id } => self.handle_logout(connection_id).await,
            ServerCommand::CreateRoom {
                connection_id,
                display_name,
            } => self.handle_create_room(connection_id, display_name).await,
            ServerCommand::JoinRoom {
                connection_id,
                room_code,
                display_name,
            } => {
                self.handle_join_room(connection_id, room_code, display_name)
                    .await
            }
            ServerCommand::MakeMove {
                connection_id,
                room_code,
                cell_index,
            } => {
                self.handle_make_move(connection_id, room_code, cell_index)
                    .await
            }
            ServerCommand::PlayVsAi {
                connection_id,
                display_name,
            } => self.handle_play_vs_ai(connection_id, display_name).await,
            ServerCommand::MakeMoveVsAi {
                connection_id,
                room_code,
                cell_index,
            } => {
                self.handle_make_move_vs_ai(connection_id, room_code, cell_index)
                    .await
            }
            ServerCommand::ResetGame {
                connection_id,
                room_code,
            } => self.handle_reset_game(connection_id, room_code).await,
            ServerCommand::LeaveRoom {
                connection_id,
                room_code,
            } => self.handle_leave_room(connection_id, room_code).await,
            ServerCommand::LeaveAiGame {
                connection_id,
                room_code,
            } => self.handle_leave_ai_game(connection_id, room_code).await,
        };

        if let Err(err) = result {
            warn!("Rejected command from {}: {}", connection_id, err);
            self.send_to(connection_id, err.into()).await;
        }
    }

    /// Handle new client connection
    fn handle_connect(&self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", connection_id);
        self.clients
            .insert(connection_id, Client::new(connection_id, sender));
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Handle client disconnection
    async fn handle_disconnect(&self, connection_id: ConnectionId) {
        info!("Client {} disconnected", connection_id);
        self.clients.remove(&connection_id);

        if let Some(session) = self.sessions.unbind(connection_id) {
            self.release_slot(session, false).await;
        }
    }

    async fn handle_register(
        &self,
        connection_id: ConnectionId,
        username: String,
        password: String,
    ) -> Result<(), AppError> {
        self.ensure_unbound(connection_id)?;
        let auth = Arc::clone(&self.auth);
        let user = tokio::task::spawn_blocking(move || auth.register(&username, &password))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        let username = user.username.clone();
        self.adopt_identity(connection_id, user)?;
        self.send_to(connection_id, ServerMessage::Registered { username })
            .await;
        Ok(())
    }

    async fn handle_login(
        &self,
        connection_id: ConnectionId,
        username: String,
        password: String,
    ) -> Result<(), AppError> {
        self.ensure_unbound(connection_id)?;
        let auth = Arc::clone(&self.auth);
        let user = tokio::task::spawn_blocking(move || auth.login(&username, &password))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        let username = user.username.clone();
        self.adopt_identity(connection_id, user)?;
        self.send_to(connection_id, ServerMessage::LoggedIn { username })
            .await;
        Ok(())
    }

    /// Swap the connection's identity; it must not hold a seat
    fn adopt_identity(
        &self,
        connection_id: ConnectionId,
        user: UserIdentity,
    ) -> Result<(), AppError> {
        let mut client = self
            .clients
            .get_mut(&connection_id)
            .ok_or_else(|| unknown_connection(connection_id))?;
        if client.is_logged_in() {
            debug!("Client {} switching accounts", connection_id);
        }
        info!("Client {} logged in as {}", connection_id, user.username);
        client.log_in(user.identity, user.username);
        Ok(())
    }

    async fn handle_logout(&self, connection_id: ConnectionId) -> Result<(), AppError> {
        self.ensure_unbound(connection_id)?;
        {
            let mut client = self
                .clients
                .get_mut(&connection_id)
                .ok_or_else(|| unknown_connection(connection_id))?;
            if client.is_logged_in() {
                self.auth.logout(&client.identity);
            }
            client.log_out();
        }
        info!("Client {} logged out", connection_id);
        self.send_to(connection_id, ServerMessage::LoggedOut).await;
        Ok(())
    }

    /// Create a room with the caller seated as X
    async fn handle_create_room(
        &self,
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> Result<(), AppError> {
        let client = self.client(connection_id)?;
        self.ensure_unbound(connection_id)?;

        let display_name = client.display_name(display_name.as_deref());
        let (room_code, handle) = self
            .rooms
            .create(Player::new(client.identity.clone(), display_name.clone()))?;

        let game_state = {
            let room = handle.room.lock().await;
            self.sessions.bind(Session {
                connection_id,
                room_code: room_code.clone(),
                symbol: Symbol::X,
                display_name: display_name.clone(),
            });
            room.state()
        };

        info!("Room {} created by {} ({})", room_code, connection_id, display_name);

        self.send_to(
            connection_id,
            ServerMessage::RoomCreated {
                room_code,
                player_symbol: Symbol::X,
                game_state,
            },
        )
        .await;
        Ok(())
    }

    /// Seat the caller, or rebind a returning identity to its old slot
    async fn handle_join_room(
        &self,
        connection_id: ConnectionId,
        room_code: String,
        display_name: Option<String>,
    ) -> Result<(), AppError> {
        let client = self.client(connection_id)?;
        let room_code = RoomCode::from_string(room_code);

        if let Some(existing) = self.sessions.get(connection_id) {
            if existing.room_code != room_code {
                return Err(AppError::AlreadyInRoom);
            }
        }

        let handle = self.rooms.get(&room_code)?;
        let mut room = handle.room.lock().await;
        ensure_open(&room)?;

        let requested_name = client.display_name(display_name.as_deref());
        let seat = room.seat(client.identity.clone(), requested_name.clone())?;
        let display_name = room
            .display_name(seat.symbol)
            .unwrap_or(&requested_name)
            .to_string();

        self.sessions.bind(Session {
            connection_id,
            room_code: room_code.clone(),
            symbol: seat.symbol,
            display_name: display_name.clone(),
        });

        if seat.reconnected {
            info!(
                "Client {} ({}) reconnected to room {} as {}",
                connection_id, display_name, room_code, seat.symbol
            );
        } else {
            info!(
                "Client {} ({}) joined room {} as {}",
                connection_id, display_name, room_code, seat.symbol
            );
        }

        let joined = ServerMessage::RoomJoined {
            room_code: room_code.clone(),
            player_symbol: seat.symbol,
            game_state: room.state(),
        };
        if let Err(e) = client.try_send(joined) {
            warn!("Failed to send room_joined to {}: {}", connection_id, e);
        }

        if !seat.reconnected {
            let status_message = match room.status {
                RoomStatus::Waiting => "Waiting for another player...".to_string(),
                _ => format!("{}'s turn!", room.current_turn),
            };
            self.broadcast(
                &room_code,
                ServerMessage::PlayerJoined {
                    player_symbol: seat.symbol,
                    display_name,
                    status_message,
                    game_state: room.state(),
                },
            );
        }

        if seat.started {
            info!("Game started in room {}", room_code);
            self.broadcast(
                &room_code,
                ServerMessage::GameStarted {
                    game_state: room.state(),
                },
            );
        }

        Ok(())
    }

    async fn handle_make_move(
        &self,
        connection_id: ConnectionId,
        room_code: String,
        cell_index: i64,
    ) -> Result<(), AppError> {
        let room_code = RoomCode::from_string(room_code);
        let handle = self.rooms.get(&room_code)?;
        let mut room = handle.room.lock().await;
        ensure_open(&room)?;

        let session = self
            .sessions
            .get_in_room(connection_id, &room_code)
            .ok_or(AppError::NotInRoom)?;
        if room.is_ai_game {
            return Err(AppError::AiGame);
        }

        let cell = parse_cell_index(cell_index)?;
        match room.apply_move(session.symbol, cell)? {
            MoveResult::Continue { next_turn } => {
                debug!("{} played {} in room {}", session.symbol, cell, room_code);
                self.broadcast(
                    &room_code,
                    ServerMessage::MoveMade {
                        cell_index: cell,
                        player_symbol: session.symbol,
                        next_turn,
                        game_state: room.state(),
                    },
                );
            }
            MoveResult::Finished(outcome) => {
                info!("Game over in room {}: {}", room_code, outcome.as_str());
                self.broadcast(&room_code, game_over(&room, outcome));
            }
        }

        Ok(())
    }

    /// Start a game against the AI; the caller is X and moves first
    async fn handle_play_vs_ai(
        &self,
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> Result<(), AppError> {
        let client = self.client(connection_id)?;
        self.ensure_unbound(connection_id)?;

        let display_name = client.display_name(display_name.as_deref());
        let human = AI_SYMBOL.opponent();
        let (room_code, handle) = self
            .rooms
            .create_ai_room(Player::new(client.identity.clone(), display_name.clone()))?;

        let game_state = {
            let room = handle.room.lock().await;
            self.sessions.bind(Session {
                connection_id,
                room_code: room_code.clone(),
                symbol: human,
                display_name: display_name.clone(),
            });
            room.state()
        };

        info!("AI room {} started by {} ({})", room_code, connection_id, display_name);

        self.send_to(
            connection_id,
            ServerMessage::AiGameStarted {
                room_code,
                player_symbol: human,
                message: "The AI is ready. Your move!".to_string(),
                game_state,
            },
        )
        .await;
        Ok(())
    }

    /// Apply the human move, then the AI's answer, under one room lock
    async fn handle_make_move_vs_ai(
        &self,
        connection_id: ConnectionId,
        room_code: String,
        cell_index: i64,
    ) -> Result<(), AppError> {
        let room_code = RoomCode::from_string(room_code);
        let handle = self.rooms.get(&room_code)?;
        let mut room = handle.room.lock().await;
        ensure_open(&room)?;

        if !room.is_ai_game {
            return Err(AppError::NotAiGame);
        }
        self.sessions
            .get_in_room(connection_id, &room_code)
            .ok_or(AppError::NotInRoom)?;

        let human = AI_SYMBOL.opponent();
        let cell = parse_cell_index(cell_index)?;
        match room.apply_move(human, cell)? {
            MoveResult::Finished(outcome) => {
                info!("Game over in AI room {}: {}", room_code, outcome.as_str());
                self.broadcast(&room_code, game_over(&room, outcome));
                return Ok(());
            }
            MoveResult::Continue { next_turn } => {
                self.broadcast(
                    &room_code,
                    ServerMessage::MoveMade {
                        cell_index: cell,
                        player_symbol: human,
                        next_turn,
                        game_state: room.state(),
                    },
                );
            }
        }

        self.play_ai_turn(&handle, &mut room).await
    }

    async fn play_ai_turn(&self, handle: &RoomHandle, room: &mut Room) -> Result<(), AppError> {
        if !self.ai_move_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.ai_move_delay) => {}
                _ = handle.cancel.cancelled() => {
                    debug!("AI turn in room {} cancelled", room.code);
                    return Ok(());
                }
            }
        }
        if room.is_closed() || handle.cancel.is_cancelled() {
            return Ok(());
        }

        let cell = self
            .ai
            .choose_move(&room.board)
            .ok_or_else(|| AppError::Internal(format!("AI found no move in room {}", room.code)))?;

        match room.apply_move(AI_SYMBOL, cell)? {
            MoveResult::Finished(outcome) => {
                info!("Game over in AI room {}: {}", room.code, outcome.as_str());
                self.broadcast(&room.code, game_over(room, outcome));
            }
            MoveResult::Continue { next_turn } => {
                debug!("AI played {} in room {}", cell, room.code);
                self.broadcast(
                    &room.code,
                    ServerMessage::AiMoveMade {
                        cell_index: cell,
                        next_turn,
                        game_state: room.state(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn handle_reset_game(
        &self,
        connection_id: ConnectionId,
        room_code: String,
    ) -> Result<(), AppError> {
        let room_code = RoomCode::from_string(room_code);
        let handle = self.rooms.get(&room_code)?;
        let mut room = handle.room.lock().await;
        ensure_open(&room)?;

        self.sessions
            .get_in_room(connection_id, &room_code)
            .ok_or(AppError::NotInRoom)?;

        room.reset()?;
        info!("Room {} reset by {}", room_code, connection_id);
        self.broadcast(
            &room_code,
            ServerMessage::GameReset {
                game_state: room.state(),
            },
        );
        Ok(())
    }

    /// Leave a room but stay connected
    async fn handle_leave_room(
        &self,
        connection_id: ConnectionId,
        room_code: String,
    ) -> Result<(), AppError> {
        let code = RoomCode::from_string(room_code);
        if self.sessions.get_in_room(connection_id, &code).is_none() {
            return Err(AppError::NotInRoom);
        }
        if code.is_ai() {
            return self.handle_leave_ai_game(connection_id, code.0).await;
        }

        if let Some(session) = self.sessions.unbind(connection_id) {
            self.release_slot(session, true).await;
        }
        Ok(())
    }

    /// Tear down an AI room. Silent when there is nothing to leave.
    async fn handle_leave_ai_game(
        &self,
        connection_id: ConnectionId,
        room_code: String,
    ) -> Result<(), AppError> {
        let room_code = RoomCode::from_string(room_code);
        if !room_code.is_ai() || self.sessions.get_in_room(connection_id, &room_code).is_none() {
            debug!("Ignoring leave_ai_game from {} for {}", connection_id, room_code);
            return Ok(());
        }

        // Cancels a pending AI turn, which releases the room lock
        let Some(handle) = self.rooms.remove(&room_code) else {
            return Ok(());
        };
        handle.room.lock().await.close();
        self.sessions.scrub_room(&room_code);

        info!("AI room {} closed by {}", room_code, connection_id);
        Ok(())
    }

    /// Vacate the slot a session held, unless another connection still holds it
    async fn release_slot(&self, session: Session, notify_leaver: bool) {
        let Ok(handle) = self.rooms.get(&session.room_code) else {
            return;
        };
        let mut room = handle.room.lock().await;
        if room.is_closed() || room.is_ai_game {
            return;
        }
        if self.sessions.slot_is_bound(&session.room_code, session.symbol) {
            debug!(
                "Slot {} in room {} still held by another connection",
                session.symbol, session.room_code
            );
            if notify_leaver {
                let msg = ServerMessage::PlayerLeft {
                    player_symbol: session.symbol,
                    message: format!("{} left on this connection only.", session.display_name),
                    display_name: session.display_name.clone(),
                    game_state: room.state(),
                };
                self.notify(session.connection_id, msg);
            }
            return;
        }

        let Some(player) = room.vacate(session.symbol) else {
            return;
        };
        info!(
            "{} ({}) left room {}",
            player.display_name, session.symbol, session.room_code
        );

        let msg = ServerMessage::PlayerLeft {
            player_symbol: session.symbol,
            message: format!(
                "{} exited from room. Waiting for another player to join to start.",
                player.display_name
            ),
            display_name: player.display_name,
            game_state: room.state(),
        };
        if notify_leaver {
            self.notify(session.connection_id, msg.clone());
        }
        self.broadcast(&session.room_code, msg);
    }

    /// Remove a room the caller has locked and tell its members why
    pub(crate) fn evict_locked(&self, room: &mut Room, reason: &str) {
        room.close();
        self.rooms.remove(&room.code);
        let members = self.sessions.scrub_room(&room.code);
        info!(
            "Room {} evicted ({}), {} connection(s) notified",
            room.code,
            reason,
            members.len()
        );

        for connection_id in members {
            let Some(client) = self.clients.get(&connection_id).map(|c| c.clone()) else {
                continue;
            };
            let msg = ServerMessage::RoomClosed {
                room_code: room.code.clone(),
                reason: reason.to_string(),
            };
            if let Err(e) = client.try_send(msg) {
                warn!("Failed to notify {} of eviction: {}", connection_id, e);
            }
        }
    }

    fn client(&self, connection_id: ConnectionId) -> Result<Client, AppError> {
        self.clients
            .get(&connection_id)
            .map(|c| c.clone())
            .ok_or_else(|| unknown_connection(connection_id))
    }

    fn ensure_unbound(&self, connection_id: ConnectionId) -> Result<(), AppError> {
        match self.sessions.get(connection_id) {
            Some(_) => Err(AppError::AlreadyInRoom),
            None => Ok(()),
        }
    }

    /// Direct reply to one connection
    async fn send_to(&self, connection_id: ConnectionId, msg: ServerMessage) {
        let Some(client) = self.clients.get(&connection_id).map(|c| c.clone()) else {
            debug!("Dropping message for departed client {}", connection_id);
            return;
        };
        if let Err(e) = client.send(msg).await {
            debug!("Failed to reply to {}: {}", connection_id, e);
        }
    }

    /// Non-blocking reply, for use under a room lock
    fn notify(&self, connection_id: ConnectionId, msg: ServerMessage) {
        let Some(client) = self.clients.get(&connection_id).map(|c| c.clone()) else {
            return;
        };
        if let Err(e) = client.try_send(msg) {
            warn!("Failed to notify {}: {}", connection_id, e);
        }
    }

    /// Broadcast to every connection bound to a room
    fn broadcast(&self, room_code: &RoomCode, msg: ServerMessage) {
        for connection_id in self.sessions.connections_in(room_code) {
            let Some(client) = self.clients.get(&connection_id).map(|c| c.clone()) else {
                continue;
            };
            if let Err(e) = client.try_send(msg.clone()) {
                warn!(
                    "Dropped broadcast to {} in room {}: {}",
                    connection_id, room_code, e
                );
            }
        }
    }
}

fn ensure_open(room: &Room) -> Result<(), AppError> {
    if room.is_closed() {
        return Err(AppError::RoomNotFound(room.code.to_string()));
    }
    Ok(())
}

fn unknown_connection(connection_id: ConnectionId) -> AppError {
    AppError::Internal(format!("unknown connection {}", connection_id))
}

fn game_over(room: &Room, outcome: Outcome) -> ServerMessage {
    let winner = outcome
        .winner()
        .and_then(|symbol| room.display_name(symbol))
        .map(str::to_string);
    let message = match &winner {
        Some(name) => format!("{} wins!", name),
        None => "It's a tie!".to_string(),
    };
    ServerMessage::GameOver {
        result: outcome,
        winner,
        message,
        game_state: room.state(),
    }
}
