//! The store: registries of room and tournament cells, plus the indexes
//! that back unique-field lookups.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ludus_protocol::{
    token, BotId, GameName, PlayerId, RoomId, TournamentId,
};
use ludus_transport::ConnectionId;

use crate::{
    Bot, LockConfig, Room, StoreError, TimedMutex, Tournament,
};

/// Length of issued api keys.
const KEY_LEN: usize = 43;

/// Registry of every persisted entity group.
///
/// Rooms and tournaments live behind [`TimedMutex`] cells; bots and the
/// player→room index are plain read-mostly registries.
pub struct Store {
    lock_config: LockConfig,
    rooms: RwLock<HashMap<RoomId, Arc<TimedMutex<Room>>>>,
    /// Which room each player row belongs to. Backs the distinction
    /// between "no such player" and "player in a different room".
    player_rooms: RwLock<HashMap<PlayerId, RoomId>>,
    bots: RwLock<Vec<Bot>>,
    tournaments: RwLock<HashMap<TournamentId, Arc<TimedMutex<Tournament>>>>,
    tournament_names: RwLock<HashMap<String, TournamentId>>,
    tournament_keys: RwLock<HashMap<String, TournamentId>>,
}

impl Store {
    pub fn new(lock_config: LockConfig) -> Self {
        Self {
            lock_config,
            rooms: RwLock::new(HashMap::new()),
            player_rooms: RwLock::new(HashMap::new()),
            bots: RwLock::new(Vec::new()),
            tournaments: RwLock::new(HashMap::new()),
            tournament_names: RwLock::new(HashMap::new()),
            tournament_keys: RwLock::new(HashMap::new()),
        }
    }

    // -- rooms --------------------------------------------------------------

    /// Creates a room owned by the given engine connection and returns a
    /// snapshot of it.
    pub fn create_room(
        &self,
        name: String,
        game: GameName,
        maxplayers: usize,
        engine_conn: ConnectionId,
    ) -> Room {
        let room = Room::new(name, game, maxplayers, engine_conn);
        let snapshot = room.clone();
        let cell =
            Arc::new(TimedMutex::new("room", self.lock_config, room));
        self.rooms
            .write()
            .expect("room registry poisoned")
            .insert(snapshot.id.clone(), cell);
        tracing::info!(room = %snapshot.id, game = %snapshot.game, "room created");
        snapshot
    }

    /// The lock cell for one room.
    pub fn room(
        &self,
        id: &RoomId,
    ) -> Result<Arc<TimedMutex<Room>>, StoreError> {
        self.rooms
            .read()
            .expect("room registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("room", id))
    }

    /// Lock cells for every room, for listing paths.
    pub fn rooms(&self) -> Vec<Arc<TimedMutex<Room>>> {
        self.rooms
            .read()
            .expect("room registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    // -- players ------------------------------------------------------------

    /// Records which room a freshly created player row belongs to.
    pub fn index_player(&self, player: &PlayerId, room: &RoomId) {
        self.player_rooms
            .write()
            .expect("player index poisoned")
            .insert(player.clone(), room.clone());
    }

    /// The room a player row belongs to.
    pub fn player_room(
        &self,
        player: &PlayerId,
    ) -> Result<RoomId, StoreError> {
        self.player_rooms
            .read()
            .expect("player index poisoned")
            .get(player)
            .cloned()
            .ok_or_else(|| StoreError::not_found("player", player))
    }

    // -- bots ---------------------------------------------------------------

    /// Registers a bot under a unique name and issues it an api key.
    pub fn create_bot(&self, name: &str) -> Result<Bot, StoreError> {
        let mut bots = self.bots.write().expect("bot registry poisoned");
        if bots.iter().any(|b| b.name == name) {
            return Err(StoreError::UniqueViolation {
                entity: "bot",
                field: "name",
                value: name.to_string(),
            });
        }
        let bot = Bot {
            id: BotId::fresh(),
            name: name.to_string(),
            api_key: token(KEY_LEN),
        };
        bots.push(bot.clone());
        tracing::info!(bot = %bot.id, name, "bot registered");
        Ok(bot)
    }

    pub fn bot(&self, id: &BotId) -> Result<Bot, StoreError> {
        self.bots
            .read()
            .expect("bot registry poisoned")
            .iter()
            .find(|b| &b.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("bot", id))
    }

    /// Resolves an api key to the bot it was issued to.
    pub fn bot_by_key(&self, api_key: &str) -> Option<Bot> {
        self.bots
            .read()
            .expect("bot registry poisoned")
            .iter()
            .find(|b| b.api_key == api_key)
            .cloned()
    }

    // -- tournaments --------------------------------------------------------

    /// Creates a tournament under a unique name and returns a snapshot.
    pub fn create_tournament(
        &self,
        name: &str,
        game: GameName,
    ) -> Result<Tournament, StoreError> {
        let mut names = self
            .tournament_names
            .write()
            .expect("tournament name index poisoned");
        if names.contains_key(name) {
            return Err(StoreError::UniqueViolation {
                entity: "tournament",
                field: "name",
                value: name.to_string(),
            });
        }
        let tournament = Tournament {
            id: TournamentId::fresh(),
            name: name.to_string(),
            game,
            api_key: token(KEY_LEN),
            participants: Vec::new(),
            matches: Vec::new(),
            queue: Vec::new(),
        };
        let snapshot = tournament.clone();
        names.insert(name.to_string(), tournament.id.clone());
        self.tournament_keys
            .write()
            .expect("tournament key index poisoned")
            .insert(tournament.api_key.clone(), tournament.id.clone());
        self.tournaments
            .write()
            .expect("tournament registry poisoned")
            .insert(
                tournament.id.clone(),
                Arc::new(TimedMutex::new(
                    "tournament",
                    self.lock_config,
                    tournament,
                )),
            );
        tracing::info!(tournament = %snapshot.id, name, "tournament created");
        Ok(snapshot)
    }

    /// The lock cell for one tournament.
    pub fn tournament(
        &self,
        id: &TournamentId,
    ) -> Result<Arc<TimedMutex<Tournament>>, StoreError> {
        self.tournaments
            .read()
            .expect("tournament registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("tournament", id))
    }

    /// Resolves a tournament api key to its lock cell.
    pub fn tournament_by_key(
        &self,
        api_key: &str,
    ) -> Option<Arc<TimedMutex<Tournament>>> {
        let id = self
            .tournament_keys
            .read()
            .expect("tournament key index poisoned")
            .get(api_key)
            .cloned()?;
        self.tournament(&id).ok()
    }

    /// Drops every queue entry held by a connection, across all
    /// tournaments. Called when the connection goes away.
    pub async fn remove_queue_entries(&self, conn: ConnectionId) {
        let cells: Vec<_> = self
            .tournaments
            .read()
            .expect("tournament registry poisoned")
            .values()
            .cloned()
            .collect();
        for cell in cells {
            match cell.lock().await {
                Ok(mut tournament) => {
                    tournament.queue.retain(|entry| entry.conn != conn);
                }
                Err(_) => {
                    tracing::warn!(
                        %conn,
                        "could not clear queue entries, tournament lock contended"
                    );
                }
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}
