//! Event handlers: one function per broker operation.
//!
//! Handlers return `Result<(), BrokerError>`; the connection loop in
//! `server.rs` turns an `Err` into the addressed `fail` reply. Everything
//! that mutates a room happens while holding that room's timed lock, and
//! outbound sends are collected until the guard is gone.

use std::collections::BTreeMap;
use std::sync::Arc;

use ludus_protocol::{
    Board, BotId, ErrorKind, Event, Finish, GameName, GameRole, MovePayload,
    PlayerId, PlayerInfo, RoomId, RoomStatus, RoomSummary, StateEntry,
    StateId, Visibility,
};
use ludus_store::{GameState, Player};
use ludus_transport::ConnectionId;

use crate::auth::{CredentialVerifier, Principal};
use crate::error::BrokerError;
use crate::server::BrokerState;

/// Routes one validated event to its handler.
pub(crate) async fn handle_event<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    event: &Event,
) -> Result<(), BrokerError> {
    // Structural validation first: a malformed event never touches the
    // entity store.
    event.validate().map_err(BrokerError::validation)?;

    match event {
        Event::CreateRoom {
            name,
            game,
            maxplayers,
        } => on_create_room(state, conn, principal, name, game, *maxplayers),
        Event::Join { room, name } => {
            on_join(state, conn, principal, room, name).await
        }
        Event::JoinSuccess { room, player, role } => {
            on_join_success(state, conn, principal, room, player, role).await
        }
        Event::JoinFail {
            room,
            player,
            reason,
        } => on_join_fail(state, conn, principal, room, player, reason).await,
        Event::GameUpdate {
            room,
            visibility,
            epoch,
            board,
            state: state_id,
            player,
            turn,
            finish,
        } => {
            on_game_update(
                state, conn, principal, room, *visibility, *epoch, board,
                state_id, player, turn, finish,
            )
            .await
        }
        Event::Move { room, player, mv } => {
            on_move(state, conn, room, player, mv).await
        }
        Event::List => on_list(state, conn).await,
        Event::Spectate { room } => on_spectate(state, conn, room).await,
        other => Err(BrokerError::validation(format!(
            "the broker does not accept {} events",
            other.name()
        ))),
    }
}

/// Engine-only operations must come from an engine principal.
fn require_engine(principal: &Principal) -> Result<(), BrokerError> {
    match principal {
        Principal::Engine => Ok(()),
        Principal::Agent { .. } => {
            Err(ErrorKind::UnauthorizedGameServer.into())
        }
    }
}

/// Agent-only operations must come from an agent principal.
fn require_agent(principal: &Principal) -> Result<&BotId, BrokerError> {
    match principal {
        Principal::Agent { bot } => Ok(bot),
        Principal::Engine => Err(ErrorKind::UnauthorizedPlayer.into()),
    }
}

/// Best-effort send back to a connection; a vanished peer is not an error.
fn reply<V: CredentialVerifier>(
    state: &BrokerState<V>,
    to: ConnectionId,
    event: Event,
) {
    if let Err(e) = state.hub.unicast(to, event) {
        tracing::debug!(%to, error = %e, "dropping reply to vanished connection");
    }
}

// ---------------------------------------------------------------------------
// create-room
// ---------------------------------------------------------------------------

fn on_create_room<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    name: &str,
    game: &GameName,
    maxplayers: usize,
) -> Result<(), BrokerError> {
    require_engine(principal)?;
    let room = state.store.create_room(
        name.to_string(),
        game.clone(),
        maxplayers,
        conn,
    );
    tracing::info!(room = %room.id, %conn, "game server registered a room");
    reply(state, conn, Event::RoomCreated { room: room.id });
    Ok(())
}

// ---------------------------------------------------------------------------
// join
// ---------------------------------------------------------------------------

async fn on_join<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    room_id: &RoomId,
    name: &str,
) -> Result<(), BrokerError> {
    let bot = Some(require_agent(principal)?.clone());
    let cell = state.store.room(room_id)?;

    let (engine_conn, player_id) = {
        let mut room = cell.lock().await?;
        if room.status != RoomStatus::Lobby {
            return Err(ErrorKind::GameAlreadyStarted.into());
        }
        let player = Player::new(name.to_string(), conn, bot);
        let player_id = player.id.clone();
        room.players.push(player);
        state.store.index_player(&player_id, room_id);
        (room.engine_conn, player_id)
    };

    tracing::info!(room = %room_id, player = %player_id, "player requested to join");
    reply(
        state,
        engine_conn,
        Event::Register {
            room: room_id.clone(),
            player: player_id,
        },
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// join-success / join-fail / join-acknowledgement
// ---------------------------------------------------------------------------

/// Checks that a claimed player exists and belongs to the claimed room.
fn check_player_room<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    room_id: &RoomId,
    player_id: &PlayerId,
) -> Result<(), BrokerError> {
    let indexed = state
        .store
        .player_room(player_id)
        .map_err(|_| ErrorKind::NoSuchPlayer)?;
    if &indexed != room_id {
        return Err(ErrorKind::PlayerNotInRoom.into());
    }
    Ok(())
}

async fn on_join_success<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    room_id: &RoomId,
    player_id: &PlayerId,
    role: &Option<GameRole>,
) -> Result<(), BrokerError> {
    require_engine(principal)?;
    let cell = state.store.room(room_id)?;

    let (player_conn, player_name, group) = {
        let mut room = cell.lock().await?;
        if room.engine_conn != conn {
            return Err(ErrorKind::UnauthorizedGameServer.into());
        }
        check_player_room(state, room_id, player_id)?;
        let group = room.broadcast_group();
        let player = room
            .player_mut(player_id)
            .ok_or(ErrorKind::PlayerNotInRoom)?;
        player.joined = true;
        player.role = role.clone();
        (player.conn, player.name.clone(), group)
    };

    state.hub.join_group(&group, player_conn);
    tracing::info!(room = %room_id, player = %player_id, role = ?role, "player admitted");

    // Private notification, acknowledged: once the player's receipt comes
    // back, the engine gets join-acknowledgement — the third step of the
    // handshake, so it can count the seat as actually in the room.
    let private = Event::Joined {
        room: room_id.clone(),
        player: player_id.clone(),
        name: player_name.clone(),
        role: role.clone(),
        broadcast: false,
    };
    match state.hub.unicast_acked(player_conn, private) {
        Ok(ack) => {
            let hub = state.hub.clone();
            let engine = conn;
            let room = room_id.clone();
            let player = player_id.clone();
            tokio::spawn(async move {
                match ack.wait().await {
                    Ok(()) => {
                        let _ = hub.unicast(
                            engine,
                            Event::JoinAcknowledgement { room, player },
                        );
                    }
                    Err(_) => tracing::warn!(
                        %player,
                        "joined notification never acknowledged"
                    ),
                }
            });
        }
        Err(e) => {
            tracing::warn!(player = %player_id, error = %e, "could not notify player");
        }
    }

    state.hub.broadcast(
        &group,
        Event::Joined {
            room: room_id.clone(),
            player: player_id.clone(),
            name: player_name,
            role: role.clone(),
            broadcast: true,
        },
    );
    Ok(())
}

async fn on_join_fail<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    room_id: &RoomId,
    player_id: &PlayerId,
    reason: &Option<String>,
) -> Result<(), BrokerError> {
    require_engine(principal)?;
    let cell = state.store.room(room_id)?;

    let player_conn = {
        let room = cell.lock().await?;
        if room.engine_conn != conn {
            return Err(ErrorKind::UnauthorizedGameServer.into());
        }
        check_player_room(state, room_id, player_id)?;
        room.player(player_id)
            .ok_or(ErrorKind::PlayerNotInRoom)?
            .conn
    };

    // Relay the engine's reason to the player only. When the reason is a
    // taxonomy name, attach its stock details.
    let error = reason
        .clone()
        .unwrap_or_else(|| "registrationFailed".to_string());
    let details = ErrorKind::from_wire(&error)
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| error.clone());
    tracing::info!(room = %room_id, player = %player_id, %error, "join rejected by engine");
    reply(
        state,
        player_conn,
        Event::Fail {
            error,
            details,
            responding_to: "join".to_string(),
        },
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// game-update
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn on_game_update<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    principal: &Principal,
    room_id: &RoomId,
    visibility: Visibility,
    epoch: Option<u64>,
    board: &Board,
    state_id: &Option<StateId>,
    player: &Option<PlayerId>,
    turn: &Option<PlayerId>,
    finish: &Option<Finish>,
) -> Result<(), BrokerError> {
    require_engine(principal)?;
    let cell = state.store.room(room_id)?;
    let mut room = cell.lock().await?;
    if room.engine_conn != conn {
        return Err(ErrorKind::UnauthorizedGameServer.into());
    }

    // The engine is the epoch authority; arrivals must never regress.
    // An equal epoch is the idempotent-retry path.
    if let Some(epoch) = epoch {
        if epoch < room.last_epoch {
            return Err(ErrorKind::EpochRegression.into());
        }
        room.last_epoch = epoch;
    }

    let group = room.broadcast_group();

    if let Some(finish) = finish {
        // Terminal update: record it, broadcast the terminal state to the
        // room group first, then flip the room to finished.
        if let Some(epoch) = epoch {
            let sid = state_id.clone().unwrap_or_else(StateId::fresh);
            room.upsert_state(sid, epoch, board.clone(), None);
        }
        state.hub.broadcast(
            &group,
            Event::Gamestate {
                room: room_id.clone(),
                board: board.clone(),
                epoch: room.last_epoch,
                player: None,
                turn: None,
                finish: Some(finish.clone()),
            },
        );
        room.board = Some(board.clone());
        room.turn = None;
        room.status = RoomStatus::Finished;
        room.normal_finish = Some(finish.normal);
        tracing::info!(
            room = %room_id,
            normal = finish.normal,
            "game finished"
        );
        return Ok(());
    }

    if room.status == RoomStatus::Finished {
        // A final board snapshot may trail the finish; keep it without
        // reviving the room.
        room.board = Some(board.clone());
        room.turn = None;
        return Ok(());
    }

    room.status = RoomStatus::Playing;
    room.board = Some(board.clone());
    room.turn = turn.clone();

    match visibility {
        Visibility::Private => {
            let target = player.as_ref().ok_or_else(|| {
                BrokerError::validation(
                    "private update requires a target player",
                )
            })?;
            let indexed = state
                .store
                .player_room(target)
                .map_err(|_| ErrorKind::NoSuchPlayer)?;
            if &indexed != room_id {
                return Err(ErrorKind::PlayerNotInRoom.into());
            }
            let target_conn = room
                .player(target)
                .ok_or(ErrorKind::PlayerNotInRoom)?
                .conn;
            let event = Event::Gamestate {
                room: room_id.clone(),
                board: board.clone(),
                epoch: room.last_epoch,
                player: Some(target.clone()),
                turn: turn.clone(),
                finish: None,
            };
            reply(state, target_conn, event);
        }
        Visibility::Broadcast => {
            let epoch = epoch.ok_or_else(|| {
                BrokerError::validation("broadcast update requires an epoch")
            })?;
            let sid = state_id.clone().unwrap_or_else(StateId::fresh);
            room.upsert_state(sid, epoch, board.clone(), turn.clone());
            state.hub.broadcast(
                &group,
                Event::Gamestate {
                    room: room_id.clone(),
                    board: board.clone(),
                    epoch,
                    player: None,
                    turn: turn.clone(),
                    finish: None,
                },
            );
        }
        Visibility::Spectator => {
            // State update only; spectators read it through `spectate`.
            let epoch = epoch.ok_or_else(|| {
                BrokerError::validation("spectator update requires an epoch")
            })?;
            let sid = state_id.clone().unwrap_or_else(StateId::fresh);
            room.upsert_state(sid, epoch, board.clone(), turn.clone());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// move
// ---------------------------------------------------------------------------

async fn on_move<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    room_id: &RoomId,
    player_id: &PlayerId,
    mv: &MovePayload,
) -> Result<(), BrokerError> {
    let cell = state.store.room(room_id)?;

    let (engine_conn, state_id) = {
        let mut room = cell.lock().await?;
        let indexed = state
            .store
            .player_room(player_id)
            .map_err(|_| ErrorKind::NoSuchPlayer)?;
        if &indexed != room_id {
            return Err(ErrorKind::PlayerNotInRoom.into());
        }
        let player = room
            .player(player_id)
            .ok_or(ErrorKind::PlayerNotInRoom)?;
        if player.conn != conn {
            return Err(ErrorKind::UnauthorizedPlayer.into());
        }
        if room.status != RoomStatus::Playing {
            return Err(ErrorKind::GameNotRunning.into());
        }
        if room.turn.as_ref() != Some(player_id) {
            return Err(ErrorKind::NotPlayersTurn.into());
        }
        let entry = GameState::for_move(player_id.clone(), mv.clone());
        let state_id = entry.id.clone();
        room.push_state(entry);
        (room.engine_conn, state_id)
    };

    tracing::debug!(room = %room_id, player = %player_id, "relaying move to engine");
    reply(
        state,
        engine_conn,
        Event::PlayerMove {
            room: room_id.clone(),
            player: player_id.clone(),
            mv: mv.clone(),
            state: state_id,
        },
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// list / spectate
// ---------------------------------------------------------------------------

async fn on_list<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
) -> Result<(), BrokerError> {
    let mut rooms = BTreeMap::new();
    for cell in state.store.rooms() {
        match cell.lock().await {
            Ok(room) => {
                if room.status == RoomStatus::Lobby {
                    rooms.insert(
                        room.id.clone(),
                        RoomSummary {
                            name: room.name.clone(),
                            game: room.game.clone(),
                            maxplayers: room.maxplayers,
                            players: room.players.len(),
                            status: room.status,
                        },
                    );
                }
            }
            Err(_) => {
                tracing::debug!("skipping contended room in listing");
            }
        }
    }
    reply(state, conn, Event::Rooms { rooms });
    Ok(())
}

async fn on_spectate<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    room_id: &RoomId,
) -> Result<(), BrokerError> {
    let cell = state.store.room(room_id)?;
    let room = cell.lock().await?;

    state.hub.join_group(&room.broadcast_group(), conn);
    state.hub.join_group(&room.spectator_group(), conn);

    let players = room
        .players
        .iter()
        .map(|p| PlayerInfo {
            player: p.id.clone(),
            name: p.name.clone(),
            role: p.role.clone(),
            joined: p.joined,
        })
        .collect();
    let moves = room
        .states
        .iter()
        .map(|s| StateEntry {
            state: s.id.clone(),
            player: s.player.clone(),
            epoch: s.epoch,
            mv: s.mv.clone(),
            board: s.board.clone(),
            turn: s.turn.clone(),
        })
        .collect();

    reply(
        state,
        conn,
        Event::Spectated {
            room: room.id.clone(),
            board: room.board.clone(),
            status: room.status,
            players,
            turn: room.turn.clone(),
            moves,
        },
    );
    Ok(())
}
