//! The agent: finds a lobby, joins it, and plays to the end.

use ludus_protocol::{
    Event, Finish, GameName, GameRole, PlayerId, RoomId, RoomStatus,
};
use ludus_transport::{ClientConn, ConnectInfo, Hub};

use crate::{
    connect_with_retry, policy_for, AgentConfig, ClientError, MovePolicy,
};

/// One seat at one game, assembled as the join flow completes.
struct Seat {
    room: RoomId,
    player: PlayerId,
    role: Option<GameRole>,
    policy: Box<dyn MovePolicy>,
}

/// Plays games end to end: list lobbies, join the first open one, move
/// whenever addressed the turn, then either stop or look for the next
/// game.
pub struct AgentRunner {
    config: AgentConfig,
    conn: ClientConn<Event>,
    /// The room we asked to join and its game, while the join is pending.
    joining: Option<(RoomId, GameName)>,
    seat: Option<Seat>,
}

impl AgentRunner {
    /// Connects with bounded retry.
    pub async fn connect(
        hub: &Hub<Event>,
        config: AgentConfig,
    ) -> Result<Self, ClientError> {
        let mut info = ConnectInfo::agent(config.api_key.clone());
        if let Some(key) = &config.tournament_key {
            info = info.with_tournament(key.clone());
        }
        let conn = connect_with_retry(
            hub,
            info,
            config.retries,
            config.retry_backoff,
        )
        .await?;
        Ok(Self {
            config,
            conn,
            joining: None,
            seat: None,
        })
    }

    /// Runs until a single-shot game completes, our own fault stops us,
    /// or the connection closes.
    pub async fn run(mut self) -> Result<(), ClientError> {
        self.conn.send(Event::List)?;
        while let Some(mut delivery) = self.conn.recv().await {
            // Receipt first: the broker's `joined` acknowledgement hangs
            // on this, and through it the engine's start signal.
            delivery.ack_ok();
            if self.handle(delivery.msg).await? {
                break;
            }
        }
        Ok(())
    }

    async fn handle(&mut self, event: Event) -> Result<bool, ClientError> {
        match event {
            Event::Rooms { rooms } => {
                if self.seat.is_some() || self.joining.is_some() {
                    return Ok(false);
                }
                let open = rooms
                    .into_iter()
                    .find(|(_, summary)| summary.status == RoomStatus::Lobby);
                match open {
                    Some((room, summary)) => {
                        tracing::info!(%room, game = %summary.game, "joining lobby");
                        self.joining = Some((room.clone(), summary.game));
                        self.conn.send(Event::Join {
                            room,
                            name: self.config.player_name.clone(),
                        })?;
                    }
                    None => {
                        tracing::warn!(
                            "no open lobby, asking again after a pause"
                        );
                        tokio::time::sleep(self.config.relist_delay).await;
                        self.conn.send(Event::List)?;
                    }
                }
            }

            Event::Joined {
                broadcast: false,
                room,
                player,
                role,
                ..
            } => {
                let Some((_, game)) = self.joining.take() else {
                    return Ok(false);
                };
                let policy = policy_for(&game)
                    .ok_or_else(|| ClientError::UnknownGame(game.clone()))?;
                tracing::info!(%room, %player, role = ?role, "seated");
                self.seat = Some(Seat {
                    room,
                    player,
                    role,
                    policy,
                });
            }

            // Other players entering the room.
            Event::Joined { broadcast: true, .. } => {}

            Event::Gamestate {
                turn,
                board,
                finish,
                ..
            } => {
                if let Some(finish) = finish {
                    return self.handle_finish(finish);
                }
                let Some(seat) = &mut self.seat else {
                    return Ok(false);
                };
                if turn.as_ref() == Some(&seat.player) {
                    tracing::debug!("our move to play");
                    let mv = seat.policy.choose(&board, seat.role.as_ref());
                    self.conn.send(Event::Move {
                        room: seat.room.clone(),
                        player: seat.player.clone(),
                        mv,
                    })?;
                }
            }

            Event::Fail {
                error,
                details,
                responding_to,
            } => {
                tracing::error!(%error, %details, %responding_to, "broker reported failure");
                if responding_to == "join" {
                    // Beaten to the room (started or full); look again.
                    self.joining = None;
                    self.conn.send(Event::List)?;
                }
            }

            other => {
                tracing::debug!(event = other.name(), "ignoring event");
            }
        }
        Ok(false)
    }

    /// A terminal `gamestate` arrived. Returns `true` when the runner
    /// should stop.
    fn handle_finish(&mut self, finish: Finish) -> Result<bool, ClientError> {
        let seat = self.seat.take();
        if finish.normal {
            if let (Some(seat), Some(scores)) = (&seat, &finish.scores) {
                match scores.get(&seat.player).copied().unwrap_or(0) {
                    score if score > 0 => tracing::info!("we won"),
                    0 => tracing::info!("we tied"),
                    _ => tracing::info!("we lost"),
                }
            }
        } else {
            let reason = finish
                .reason
                .clone()
                .unwrap_or_else(|| "unspecified".to_string());
            tracing::error!(%reason, "game finished abnormally");
            let our_fault = match (&finish.fault, &seat) {
                (Some(fault), Some(seat)) => fault == &seat.player,
                _ => false,
            };
            if our_fault && !self.config.persist_after_fault {
                return Err(ClientError::OwnFault(reason));
            }
        }

        if self.config.run_once {
            return Ok(true);
        }
        self.conn.send(Event::List)?;
        Ok(false)
    }
}
