//! Integration tests: a live broker driven through the hub exactly the way
//! engine and agent processes drive it.

use std::sync::Arc;
use std::time::Duration;

use ludus_broker::{Broker, KeyVerifier, OPERATOR_MARKER};
use ludus_protocol::{
    ErrorKind, Event, Finish, GameName, GameRole, PlayerId, RoomId,
    RoomStatus, Scores, StateId, Visibility,
};
use ludus_store::Store;
use ludus_transport::{
    AckError, ClientConn, ConnectInfo, Hub, TransportError,
};
use serde_json::json;

struct World {
    hub: Hub<Event>,
    store: Arc<Store>,
}

async fn start() -> World {
    let (hub, listener) = Hub::channel();
    let store = Arc::new(Store::default());
    let verifier = KeyVerifier::new(Arc::clone(&store), OPERATOR_MARKER);
    let broker =
        Broker::new(hub.clone(), listener, Arc::clone(&store), verifier);
    tokio::spawn(broker.run());
    World { hub, store }
}

async fn engine(world: &World) -> ClientConn<Event> {
    world
        .hub
        .connect(ConnectInfo::engine(OPERATOR_MARKER))
        .await
        .expect("engine connect")
}

async fn agent(world: &World, bot_name: &str) -> ClientConn<Event> {
    let bot = world.store.create_bot(bot_name).unwrap();
    world
        .hub
        .connect(ConnectInfo::agent(bot.api_key))
        .await
        .expect("agent connect")
}

/// Receives the next event, acknowledging it if the broker asked.
async fn recv(conn: &mut ClientConn<Event>) -> Event {
    let mut delivery =
        tokio::time::timeout(Duration::from_secs(5), conn.recv())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed");
    delivery.ack_ok();
    delivery.msg
}

async fn create_room(
    engine: &mut ClientConn<Event>,
    game: &str,
    maxplayers: usize,
) -> RoomId {
    engine
        .send(Event::CreateRoom {
            name: "Some lobby".into(),
            game: GameName::from(game),
            maxplayers,
        })
        .unwrap();
    match recv(engine).await {
        Event::RoomCreated { room } => room,
        other => panic!("expected room-created, got {other:?}"),
    }
}

/// Runs the full three-step join handshake for one agent and returns its
/// player id. Drains the private and broadcast `joined` on the agent and
/// the `join-acknowledgement` on the engine.
async fn join(
    engine: &mut ClientConn<Event>,
    agent: &mut ClientConn<Event>,
    room: &RoomId,
    name: &str,
    role: &str,
) -> PlayerId {
    agent
        .send(Event::Join {
            room: room.clone(),
            name: name.into(),
        })
        .unwrap();
    let player = match recv(engine).await {
        Event::Register { player, .. } => player,
        other => panic!("expected register, got {other:?}"),
    };
    engine
        .send(Event::JoinSuccess {
            room: room.clone(),
            player: player.clone(),
            role: Some(GameRole::from(role)),
        })
        .unwrap();

    match recv(agent).await {
        Event::Joined {
            broadcast: false,
            player: p,
            ..
        } => assert_eq!(p, player),
        other => panic!("expected private joined, got {other:?}"),
    }
    match recv(agent).await {
        Event::Joined { broadcast: true, .. } => {}
        other => panic!("expected broadcast joined, got {other:?}"),
    }
    match recv(engine).await {
        Event::JoinAcknowledgement { player: p, .. } => assert_eq!(p, player),
        other => panic!("expected join-acknowledgement, got {other:?}"),
    }
    player
}

fn assert_fail(event: Event, kind: ErrorKind, responding_to: &str) {
    match event {
        Event::Fail {
            error,
            responding_to: rt,
            ..
        } => {
            assert_eq!(error, kind.wire_name());
            assert_eq!(rt, responding_to);
        }
        other => panic!("expected fail, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Connect-time identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_anonymous_connection_rejected() {
    let world = start().await;
    let info = ConnectInfo {
        kind: ludus_transport::PeerKind::Agent,
        credential: None,
        tournament_key: None,
    };
    assert!(matches!(
        world.hub.connect(info).await,
        Err(TransportError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_unknown_api_key_rejected() {
    let world = start().await;
    assert!(matches!(
        world.hub.connect(ConnectInfo::agent("not-a-key")).await,
        Err(TransportError::Rejected(_))
    ));
}

// ---------------------------------------------------------------------------
// Room creation and the join handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_room_replies_with_room_id() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;
    assert!(world.store.room(&room).is_ok());
}

#[tokio::test]
async fn test_agent_cannot_create_room() {
    let world = start().await;
    let mut bot = agent(&world, "impostor").await;
    bot.send(Event::CreateRoom {
        name: "nope".into(),
        game: GameName::from("Kalaha"),
        maxplayers: 2,
    })
    .unwrap();
    assert_fail(
        recv(&mut bot).await,
        ErrorKind::UnauthorizedGameServer,
        "create-room",
    );
}

#[tokio::test]
async fn test_join_handshake_relays_role_both_ways() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;

    let mut a1 = agent(&world, "bot-one").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;

    // The second join's broadcast also reaches the first agent.
    let mut a2 = agent(&world, "bot-two").await;
    let p2 = join(&mut eng, &mut a2, &room, "Two", "o").await;
    match recv(&mut a1).await {
        Event::Joined {
            broadcast: true,
            player,
            role,
            ..
        } => {
            assert_eq!(player, p2);
            assert_eq!(role, Some(GameRole::from("o")));
        }
        other => panic!("expected broadcast joined, got {other:?}"),
    }
    assert_ne!(p1, p2);
}

#[tokio::test]
async fn test_join_unknown_room_fails() {
    let world = start().await;
    let mut bot = agent(&world, "lost").await;
    bot.send(Event::Join {
        room: RoomId::from("no-such"),
        name: "Lost".into(),
    })
    .unwrap();
    assert_fail(recv(&mut bot).await, ErrorKind::NoSuchRoom, "join");
}

#[tokio::test]
async fn test_join_fail_relayed_to_player_only() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;

    let mut bot = agent(&world, "rejected").await;
    bot.send(Event::Join {
        room: room.clone(),
        name: "Rejected".into(),
    })
    .unwrap();
    let player = match recv(&mut eng).await {
        Event::Register { player, .. } => player,
        other => panic!("expected register, got {other:?}"),
    };
    eng.send(Event::JoinFail {
        room: room.clone(),
        player,
        reason: Some("GameFull".into()),
    })
    .unwrap();

    match recv(&mut bot).await {
        Event::Fail { error, details, .. } => {
            assert_eq!(error, "GameFull");
            // Stock details looked up from the taxonomy table.
            assert!(details.contains("full"));
        }
        other => panic!("expected relayed fail, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_after_game_started_rejected() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;

    // An acked update guarantees the broker has flipped the room to
    // playing before the late join arrives.
    let ack = eng
        .send_acked(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(0),
            board: json!({}),
            state: None,
            player: None,
            turn: None,
            finish: None,
        })
        .unwrap();
    ack.wait().await.unwrap();

    let mut late = agent(&world, "late").await;
    late.send(Event::Join {
        room: room.clone(),
        name: "Late".into(),
    })
    .unwrap();
    assert_fail(
        recv(&mut late).await,
        ErrorKind::GameAlreadyStarted,
        "join",
    );
}

// ---------------------------------------------------------------------------
// game-update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_update_validation_failure_resolves_ack() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;

    // Private updates must not carry an epoch: the ack future itself
    // resolves to the fail event.
    let ack = eng
        .send_acked(Event::GameUpdate {
            room,
            visibility: Visibility::Private,
            epoch: Some(1),
            board: json!({}),
            state: None,
            player: Some(PlayerId::from("p")),
            turn: None,
            finish: None,
        })
        .unwrap();
    match ack.wait().await {
        Err(AckError::Failed(fail)) => {
            assert_fail(fail, ErrorKind::InputValidationError, "game-update");
        }
        other => panic!("expected failed ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_engine_cannot_update_room() {
    let world = start().await;
    let mut owner = engine(&world).await;
    let room = create_room(&mut owner, "Kalaha", 2).await;

    let mut intruder = engine(&world).await;
    intruder
        .send(Event::GameUpdate {
            room,
            visibility: Visibility::Broadcast,
            epoch: Some(0),
            board: json!({}),
            state: None,
            player: None,
            turn: None,
            finish: None,
        })
        .unwrap();
    assert_fail(
        recv(&mut intruder).await,
        ErrorKind::UnauthorizedGameServer,
        "game-update",
    );
}

#[tokio::test]
async fn test_broadcast_update_reaches_room_group() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;
    join(&mut eng, &mut a2, &room, "Two", "o").await;
    let _ = recv(&mut a1).await; // a2's broadcast joined

    eng.send(Event::GameUpdate {
        room: room.clone(),
        visibility: Visibility::Broadcast,
        epoch: Some(0),
        board: json!({"grid": []}),
        state: None,
        player: None,
        turn: Some(p1.clone()),
        finish: None,
    })
    .unwrap();

    for conn in [&mut a1, &mut a2] {
        match recv(conn).await {
            Event::Gamestate {
                epoch,
                turn,
                finish,
                ..
            } => {
                assert_eq!(epoch, 0);
                assert_eq!(turn, Some(p1.clone()));
                assert!(finish.is_none());
            }
            other => panic!("expected gamestate, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_resent_state_id_updates_instead_of_duplicating() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;
    let state_id = StateId::fresh();

    for epoch in [1u64, 1] {
        let ack = eng
            .send_acked(Event::GameUpdate {
                room: room.clone(),
                visibility: Visibility::Broadcast,
                epoch: Some(epoch),
                board: json!({"bank_a": epoch}),
                state: Some(state_id.clone()),
                player: None,
                turn: None,
                finish: None,
            })
            .unwrap();
        ack.wait().await.unwrap();
    }

    let cell = world.store.room(&room).unwrap();
    let record = cell.lock().await.unwrap();
    assert_eq!(record.states.len(), 1, "same state id must not duplicate");
}

#[tokio::test]
async fn test_epoch_regression_rejected() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;

    for epoch in [5u64, 3] {
        eng.send(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(epoch),
            board: json!({}),
            state: None,
            player: None,
            turn: None,
            finish: None,
        })
        .unwrap();
    }
    assert_fail(
        recv(&mut eng).await,
        ErrorKind::EpochRegression,
        "game-update",
    );
}

#[tokio::test]
async fn test_private_update_reaches_only_target() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "ScissorsPaperRock", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "a").await;
    join(&mut eng, &mut a2, &room, "Two", "b").await;
    let _ = recv(&mut a1).await; // a2's broadcast joined

    eng.send(Event::GameUpdate {
        room: room.clone(),
        visibility: Visibility::Private,
        epoch: None,
        board: json!({"secret": true}),
        state: None,
        player: Some(p1.clone()),
        turn: None,
        finish: None,
    })
    .unwrap();
    match recv(&mut a1).await {
        Event::Gamestate { player, .. } => assert_eq!(player, Some(p1)),
        other => panic!("expected gamestate, got {other:?}"),
    }

    // The other player sees nothing of it: the next thing it receives is
    // a later broadcast.
    eng.send(Event::GameUpdate {
        room: room.clone(),
        visibility: Visibility::Broadcast,
        epoch: Some(1),
        board: json!({}),
        state: None,
        player: None,
        turn: None,
        finish: None,
    })
    .unwrap();
    match recv(&mut a2).await {
        Event::Gamestate { epoch, player, .. } => {
            assert_eq!(epoch, 1);
            assert_eq!(player, None);
        }
        other => panic!("expected broadcast gamestate, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// move
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_move_gated_on_running_game_and_turn() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;
    let p2 = join(&mut eng, &mut a2, &room, "Two", "o").await;
    let _ = recv(&mut a1).await; // a2's broadcast joined

    // Game not started yet.
    a1.send(Event::Move {
        room: room.clone(),
        player: p1.clone(),
        mv: json!({"row": 0, "col": 0}),
    })
    .unwrap();
    assert_fail(recv(&mut a1).await, ErrorKind::GameNotRunning, "move");

    // Start: turn is p1's.
    let ack = eng
        .send_acked(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(0),
            board: json!({"grid": []}),
            state: None,
            player: None,
            turn: Some(p1.clone()),
            finish: None,
        })
        .unwrap();
    ack.wait().await.unwrap();
    let _ = recv(&mut a1).await;
    let _ = recv(&mut a2).await;

    // Out of turn.
    a2.send(Event::Move {
        room: room.clone(),
        player: p2.clone(),
        mv: json!({"row": 0, "col": 0}),
    })
    .unwrap();
    assert_fail(recv(&mut a2).await, ErrorKind::NotPlayersTurn, "move");

    // In turn: the engine receives the relayed move with a state id.
    a1.send(Event::Move {
        room: room.clone(),
        player: p1.clone(),
        mv: json!({"row": 0, "col": 0}),
    })
    .unwrap();
    match recv(&mut eng).await {
        Event::PlayerMove {
            player, mv, state, ..
        } => {
            assert_eq!(player, p1);
            assert_eq!(mv, json!({"row": 0, "col": 0}));
            assert!(!state.as_str().is_empty());
        }
        other => panic!("expected player-move, got {other:?}"),
    }
}

#[tokio::test]
async fn test_move_for_someone_elses_player_unauthorized() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;
    join(&mut eng, &mut a2, &room, "Two", "o").await;
    let _ = recv(&mut a1).await;

    a2.send(Event::Move {
        room,
        player: p1,
        mv: json!({"row": 0, "col": 0}),
    })
    .unwrap();
    assert_fail(recv(&mut a2).await, ErrorKind::UnauthorizedPlayer, "move");
}

// ---------------------------------------------------------------------------
// list / spectate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_returns_lobby_rooms_with_occupancy() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let lobby = create_room(&mut eng, "Kalaha", 2).await;
    let started = create_room(&mut eng, "TicTacToe", 2).await;

    let mut a1 = agent(&world, "b1").await;
    join(&mut eng, &mut a1, &lobby, "One", "a").await;

    let ack = eng
        .send_acked(Event::GameUpdate {
            room: started.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(0),
            board: json!({}),
            state: None,
            player: None,
            turn: None,
            finish: None,
        })
        .unwrap();
    ack.wait().await.unwrap();

    let mut watcher = agent(&world, "watcher").await;
    watcher.send(Event::List).unwrap();
    match recv(&mut watcher).await {
        Event::Rooms { rooms } => {
            assert_eq!(rooms.len(), 1, "playing rooms are not listed");
            let summary = &rooms[&lobby];
            assert_eq!(summary.players, 1);
            assert_eq!(summary.maxplayers, 2);
            assert_eq!(summary.status, RoomStatus::Lobby);
            assert_eq!(summary.game, GameName::from("Kalaha"));
        }
        other => panic!("expected rooms, got {other:?}"),
    }
}

#[tokio::test]
async fn test_spectate_returns_snapshot_and_ordered_move_log() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;
    join(&mut eng, &mut a2, &room, "Two", "o").await;
    let _ = recv(&mut a1).await;

    // One broadcast update and one relayed move.
    let ack = eng
        .send_acked(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(0),
            board: json!({"grid": []}),
            state: None,
            player: None,
            turn: Some(p1.clone()),
            finish: None,
        })
        .unwrap();
    ack.wait().await.unwrap();
    let ack = a1
        .send_acked(Event::Move {
            room: room.clone(),
            player: p1.clone(),
            mv: json!({"row": 1, "col": 1}),
        })
        .unwrap();
    ack.wait().await.unwrap();

    let mut watcher = agent(&world, "watcher").await;
    watcher
        .send(Event::Spectate { room: room.clone() })
        .unwrap();
    match recv(&mut watcher).await {
        Event::Spectated {
            status,
            players,
            moves,
            board,
            turn,
            ..
        } => {
            assert_eq!(status, RoomStatus::Playing);
            assert_eq!(players.len(), 2);
            assert!(players.iter().all(|p| p.joined));
            assert_eq!(turn, Some(p1.clone()));
            assert!(board.is_some());
            // Arrival order: the engine's update, then the move row.
            assert_eq!(moves.len(), 2);
            assert_eq!(moves[0].epoch, Some(0));
            assert_eq!(moves[1].player, Some(p1.clone()));
            assert_eq!(moves[1].mv, Some(json!({"row": 1, "col": 1})));
        }
        other => panic!("expected spectated, got {other:?}"),
    }

    // Spectators are in the room group: they see later broadcasts.
    eng.send(Event::GameUpdate {
        room: room.clone(),
        visibility: Visibility::Broadcast,
        epoch: Some(1),
        board: json!({"grid": [["x"]]}),
        state: None,
        player: None,
        turn: None,
        finish: None,
    })
    .unwrap();
    match recv(&mut watcher).await {
        Event::Gamestate { epoch, .. } => assert_eq!(epoch, 1),
        other => panic!("expected gamestate, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// finish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_finish_broadcasts_terminal_state_then_closes_room() {
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "TicTacToe", 2).await;
    let mut a1 = agent(&world, "b1").await;
    let mut a2 = agent(&world, "b2").await;
    let p1 = join(&mut eng, &mut a1, &room, "One", "x").await;
    let p2 = join(&mut eng, &mut a2, &room, "Two", "o").await;
    let _ = recv(&mut a1).await;

    let scores: Scores =
        [(p1.clone(), 1), (p2.clone(), -1)].into_iter().collect();
    let ack = eng
        .send_acked(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(5),
            board: json!({"grid": [["x","x","x"]]}),
            state: None,
            player: None,
            turn: None,
            finish: Some(Finish {
                normal: true,
                reason: None,
                fault: None,
                scores: Some(scores.clone()),
            }),
        })
        .unwrap();
    ack.wait().await.unwrap();

    for conn in [&mut a1, &mut a2] {
        match recv(conn).await {
            Event::Gamestate { finish: Some(f), .. } => {
                assert!(f.normal);
                assert_eq!(f.scores.as_ref(), Some(&scores));
            }
            other => panic!("expected terminal gamestate, got {other:?}"),
        }
    }

    {
        let cell = world.store.room(&room).unwrap();
        let record = cell.lock().await.unwrap();
        assert_eq!(record.status, RoomStatus::Finished);
        assert_eq!(record.normal_finish, Some(true));
    }

    // finished is terminal: a late board snapshot is kept but neither
    // relayed nor able to revive the room.
    let ack = eng
        .send_acked(Event::GameUpdate {
            room: room.clone(),
            visibility: Visibility::Broadcast,
            epoch: Some(6),
            board: json!({"grid": "final"}),
            state: None,
            player: None,
            turn: Some(p1.clone()),
            finish: None,
        })
        .unwrap();
    ack.wait().await.unwrap();
    {
        let cell = world.store.room(&room).unwrap();
        let record = cell.lock().await.unwrap();
        assert_eq!(record.status, RoomStatus::Finished);
        assert_eq!(record.board, Some(json!({"grid": "final"})));
        assert_eq!(record.turn, None);
    }

    // And a join on the closed room fails.
    let mut late = agent(&world, "late").await;
    late.send(Event::Join {
        room,
        name: "Late".into(),
    })
    .unwrap();
    assert_fail(
        recv(&mut late).await,
        ErrorKind::GameAlreadyStarted,
        "join",
    );
}

// ---------------------------------------------------------------------------
// misc
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_broker_outbound_events_not_accepted_inbound() {
    let world = start().await;
    let mut bot = agent(&world, "cheeky").await;
    bot.send(Event::Gamestate {
        room: RoomId::from("r"),
        board: json!({}),
        epoch: 0,
        player: None,
        turn: None,
        finish: None,
    })
    .unwrap();
    assert_fail(
        recv(&mut bot).await,
        ErrorKind::InputValidationError,
        "gamestate",
    );
}

#[tokio::test]
async fn test_tournament_key_creates_queue_presence() {
    let world = start().await;
    let tournament = world
        .store
        .create_tournament("spring", GameName::from("Kalaha"))
        .unwrap();

    let b1 = world.store.create_bot("t-bot-1").unwrap();
    let b2 = world.store.create_bot("t-bot-2").unwrap();
    let c1 = world
        .hub
        .connect(
            ConnectInfo::agent(b1.api_key).with_tournament(&tournament.api_key),
        )
        .await
        .unwrap();
    let _c2 = world
        .hub
        .connect(
            ConnectInfo::agent(b2.api_key).with_tournament(&tournament.api_key),
        )
        .await
        .unwrap();

    // Both online and enrolled: the round-robin pair is eligible.
    let picked = ludus_tournament::pick_match(&world.store, &tournament.id)
        .await
        .unwrap();
    assert!(picked.is_some());

    {
        let cell = world.store.tournament(&tournament.id).unwrap();
        let record = cell.lock().await.unwrap();
        assert_eq!(record.participants.len(), 2);
        assert_eq!(record.queue.len(), 2);
    }

    // Disconnecting removes the queue entry.
    drop(c1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cell = world.store.tournament(&tournament.id).unwrap();
    let record = cell.lock().await.unwrap();
    assert_eq!(record.queue.len(), 1);
}

#[tokio::test]
async fn test_unknown_tournament_key_rejected_at_connect() {
    let world = start().await;
    let bot = world.store.create_bot("t-bot").unwrap();
    let result = world
        .hub
        .connect(ConnectInfo::agent(bot.api_key).with_tournament("bogus"))
        .await;
    assert!(matches!(result, Err(TransportError::Rejected(_))));
}

#[tokio::test]
async fn test_concurrent_room_updates_apply_whole() {
    // Two writers race on one room; the per-room lock must keep each
    // board/turn pair intact (no interleaved partial writes).
    let world = start().await;
    let mut eng = engine(&world).await;
    let room = create_room(&mut eng, "Kalaha", 2).await;
    let cell = world.store.room(&room).unwrap();

    let mut tasks = Vec::new();
    for i in 0..2u64 {
        let cell = world.store.room(&room).unwrap();
        tasks.push(tokio::spawn(async move {
            let mut record = cell.lock().await.unwrap();
            record.board = Some(json!({"writer": i}));
            tokio::time::sleep(Duration::from_millis(20)).await;
            record.turn = Some(PlayerId::from(format!("p{i}").as_str()));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let record = cell.lock().await.unwrap();
    let board_writer = record.board.as_ref().unwrap()["writer"].as_u64();
    let turn = record.turn.as_ref().unwrap().as_str().to_string();
    assert_eq!(turn, format!("p{}", board_writer.unwrap()));
}
