//! The game-engine host: owns the authoritative rules for one room at a
//! time and drives the protocol from the engine side.

use std::collections::BTreeMap;

use ludus_games::{create_table, MoveOutcome, RulesError, Table};
use ludus_protocol::{
    Event, Finish, MovePayload, PlayerId, RoomId, Scores, Visibility,
};
use ludus_transport::{ClientConn, ConnectInfo, Hub};

use crate::{connect_with_retry, ClientError, HostConfig};

/// Where the host currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Room announced, waiting for the broker to confirm it.
    Connecting,
    /// Room open, seats filling.
    Lobby,
    /// All seats admitted, waiting for every join-acknowledgement.
    Starting,
    Playing,
    Finished,
}

/// Hosts one game after another: announce a room, admit players, start
/// once every seat's join is confirmed delivered, apply moves, report the
/// outcome, recycle.
pub struct EngineHost {
    config: HostConfig,
    conn: ClientConn<Event>,
    table: Table,
    room: Option<RoomId>,
    /// Seats whose `joined` notification is confirmed delivered. The game
    /// starts when this reaches the seat count — counting admissions
    /// instead would race the last player into a game it cannot see yet.
    acked: usize,
    phase: Phase,
}

impl EngineHost {
    /// Connects (with bounded retry) and prepares the first table.
    pub async fn connect(
        hub: &Hub<Event>,
        config: HostConfig,
    ) -> Result<Self, ClientError> {
        let table = create_table(&config.game)
            .ok_or_else(|| ClientError::UnknownGame(config.game.clone()))?;
        let conn = connect_with_retry(
            hub,
            ConnectInfo::engine(config.credential.clone()),
            config.retries,
            config.retry_backoff,
        )
        .await?;
        Ok(Self {
            config,
            conn,
            table,
            room: None,
            acked: 0,
            phase: Phase::Connecting,
        })
    }

    /// Runs until the connection closes, or after one game in
    /// single-shot mode.
    pub async fn run(mut self) -> Result<(), ClientError> {
        self.announce()?;
        while let Some(mut delivery) = self.conn.recv().await {
            delivery.ack_ok();
            if self.handle(delivery.msg)? {
                break;
            }
        }
        Ok(())
    }

    /// Announces a fresh room for the current table.
    fn announce(&mut self) -> Result<(), ClientError> {
        self.acked = 0;
        self.room = None;
        self.phase = Phase::Connecting;
        self.conn.send(Event::CreateRoom {
            name: self.config.lobby_name.clone(),
            game: self.config.game.clone(),
            maxplayers: self.table.max_players(),
        })?;
        Ok(())
    }

    /// Handles one broker event. Returns `true` when the host is done.
    fn handle(&mut self, event: Event) -> Result<bool, ClientError> {
        match event {
            Event::RoomCreated { room } => {
                tracing::info!(%room, "room confirmed");
                self.room = Some(room);
                self.phase = Phase::Lobby;
            }

            Event::Register { room, player } => {
                match self.table.add_player(player.clone()) {
                    Ok(role) => {
                        if self.table.is_full() {
                            self.phase = Phase::Starting;
                        }
                        self.conn.send(Event::JoinSuccess {
                            room,
                            player,
                            role,
                        })?;
                    }
                    Err(e @ (RulesError::GameFull
                    | RulesError::ExistingPlayer)) => {
                        tracing::warn!(%player, error = %e, "join refused");
                        self.conn.send(Event::JoinFail {
                            room,
                            player,
                            reason: Some(e.kind().wire_name().to_string()),
                        })?;
                    }
                    Err(e) => {
                        tracing::warn!(%player, error = %e, "unexpected seat error");
                    }
                }
            }

            Event::JoinAcknowledgement { .. } => {
                let Some(room) = self.room.clone() else {
                    return Ok(false);
                };
                self.acked += 1;
                if self.acked == self.table.max_players() {
                    self.table.start();
                    self.phase = Phase::Playing;
                    self.conn.send(Event::GameUpdate {
                        room,
                        visibility: Visibility::Broadcast,
                        epoch: Some(self.table.epoch()),
                        board: self.table.board(),
                        state: None,
                        player: None,
                        turn: self.table.turn().cloned(),
                        finish: None,
                    })?;
                }
            }

            Event::PlayerMove {
                room,
                player,
                mv,
                state,
            } => {
                return self.apply_move(room, player, mv, state);
            }

            Event::Fail { error, details, .. } => {
                tracing::error!(%error, %details, "broker reported failure");
            }

            other => {
                tracing::debug!(event = other.name(), "ignoring event");
            }
        }
        Ok(false)
    }

    /// Applies one relayed move and emits the resulting update. Returns
    /// `true` when a finished game ends a single-shot host.
    fn apply_move(
        &mut self,
        room: RoomId,
        player: PlayerId,
        mv: MovePayload,
        state: ludus_protocol::StateId,
    ) -> Result<bool, ClientError> {
        if self.phase != Phase::Playing {
            tracing::warn!(%player, "move relayed outside the playing phase");
            return Ok(false);
        }
        match self.table.make_move(&player, &mv) {
            Ok(MoveOutcome::Playing) => {
                self.conn.send(Event::GameUpdate {
                    room,
                    visibility: Visibility::Broadcast,
                    epoch: Some(self.table.epoch()),
                    board: self.table.board(),
                    state: Some(state),
                    player: None,
                    turn: self.table.turn().cloned(),
                    finish: None,
                })?;
                Ok(false)
            }
            Ok(MoveOutcome::Completed) => {
                let finish = Finish {
                    normal: true,
                    reason: None,
                    fault: None,
                    scores: Some(self.table.score()),
                };
                self.conn.send(Event::GameUpdate {
                    room,
                    visibility: Visibility::Broadcast,
                    epoch: Some(self.table.epoch()),
                    board: self.table.board(),
                    state: Some(state),
                    player: None,
                    turn: None,
                    finish: Some(finish),
                })?;
                tracing::info!("game completed normally");
                self.finish_game()
            }
            Err(RulesError::IllegalMove(reason)) => {
                // The mover forfeits: everyone else wins.
                let scores: Scores = self
                    .table
                    .players()
                    .iter()
                    .map(|p| (p.clone(), if *p == player { -1 } else { 1 }))
                    .collect::<BTreeMap<_, _>>();
                let finish = Finish {
                    normal: false,
                    reason: Some(reason.clone()),
                    fault: Some(player.clone()),
                    scores: Some(scores),
                };
                self.conn.send(Event::GameUpdate {
                    room,
                    visibility: Visibility::Broadcast,
                    epoch: Some(self.table.epoch()),
                    board: self.table.board(),
                    state: Some(state),
                    player: None,
                    turn: None,
                    finish: Some(finish),
                })?;
                tracing::warn!(%player, %reason, "game ended on an illegal move");
                self.finish_game()
            }
            Err(e) => {
                // The broker gates turn order and lifecycle, so these are
                // relay glitches; the room stays up.
                tracing::warn!(%player, error = %e, "move could not be applied");
                Ok(false)
            }
        }
    }

    /// After any finish: quit in single-shot mode, otherwise recycle into
    /// a fresh lobby for the same game.
    fn finish_game(&mut self) -> Result<bool, ClientError> {
        self.phase = Phase::Finished;
        if self.config.run_once {
            tracing::info!("single-shot host done");
            return Ok(true);
        }
        self.table = create_table(&self.config.game)
            .ok_or_else(|| ClientError::UnknownGame(self.config.game.clone()))?;
        self.announce()?;
        Ok(false)
    }
}
