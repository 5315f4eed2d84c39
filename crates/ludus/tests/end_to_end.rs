//! End-to-end: a broker, an engine host, and two agents playing full games
//! through the in-process hub.

use std::sync::Arc;
use std::time::Duration;

use ludus::prelude::*;
use ludus_transport::TransportError;
use serde_json::Value;

struct World {
    hub: Hub<Event>,
    store: Arc<Store>,
}

fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env(),
            )
            .with_test_writer()
            .try_init();
    });
}

async fn start() -> World {
    init_tracing();
    let (hub, listener) = Hub::channel();
    let store = Arc::new(Store::default());
    let verifier = KeyVerifier::new(Arc::clone(&store), OPERATOR_MARKER);
    let broker =
        Broker::new(hub.clone(), listener, Arc::clone(&store), verifier);
    tokio::spawn(broker.run());
    World { hub, store }
}

fn agent_config(world: &World, bot_name: &str) -> AgentConfig {
    let bot = world.store.create_bot(bot_name).unwrap();
    let mut config = AgentConfig::new(bot.api_key);
    config.run_once = true;
    config.relist_delay = Duration::from_millis(50);
    config.retry_backoff = Duration::from_millis(50);
    config
}

/// A raw spectator connection: polls the lobby list until a room exists,
/// subscribes to it, and returns the connection plus the room id.
async fn watch_first_room(
    world: &World,
) -> (ClientConn<Event>, RoomId) {
    let bot = world.store.create_bot("watcher").unwrap();
    let mut conn = world
        .hub
        .connect(ConnectInfo::agent(bot.api_key))
        .await
        .unwrap();
    let room = loop {
        conn.send(Event::List).unwrap();
        let mut delivery = tokio::time::timeout(
            Duration::from_secs(5),
            conn.recv(),
        )
        .await
        .expect("timed out listing")
        .expect("watcher disconnected");
        delivery.ack_ok();
        if let Event::Rooms { rooms } = delivery.msg {
            if let Some(room) = rooms.keys().next() {
                break room.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    conn.send(Event::Spectate { room: room.clone() }).unwrap();
    (conn, room)
}

/// Drains watcher events until the terminal gamestate, returning its
/// finish record.
async fn await_finish(conn: &mut ClientConn<Event>) -> Finish {
    loop {
        let mut delivery = tokio::time::timeout(
            Duration::from_secs(10),
            conn.recv(),
        )
        .await
        .expect("timed out waiting for finish")
        .expect("watcher disconnected");
        delivery.ack_ok();
        if let Event::Gamestate {
            finish: Some(finish),
            ..
        } = delivery.msg
        {
            return finish;
        }
    }
}

#[tokio::test]
async fn test_full_tictactoe_game_ends_with_symmetric_scores() {
    let world = start().await;

    let mut host_config = HostConfig::new(GameName::from("TicTacToe"));
    host_config.run_once = true;
    let host = EngineHost::connect(&world.hub, host_config).await.unwrap();
    let host_task = tokio::spawn(host.run());

    let (mut watcher, room) = watch_first_room(&world).await;

    let a1 = AgentRunner::connect(&world.hub, agent_config(&world, "bot-one"))
        .await
        .unwrap();
    let a2 = AgentRunner::connect(&world.hub, agent_config(&world, "bot-two"))
        .await
        .unwrap();
    let t1 = tokio::spawn(a1.run());
    let t2 = tokio::spawn(a2.run());

    let finish = await_finish(&mut watcher).await;
    assert!(finish.normal, "random tictactoe must end normally");
    let scores = finish.scores.expect("normal finish carries scores");
    assert_eq!(scores.len(), 2);
    let values: Vec<i8> = scores.values().copied().collect();
    let total: i8 = values.iter().sum();
    // Either a draw (all zeros) or one winner and one loser.
    assert!(
        values.iter().all(|v| *v == 0)
            || (total == 0 && values.contains(&1) && values.contains(&-1)),
        "scores must be symmetric, got {values:?}"
    );

    // Both agents completed their single game cleanly.
    t1.await.unwrap().unwrap();
    t2.await.unwrap().unwrap();
    host_task.await.unwrap().unwrap();

    // The room is terminally finished in the store.
    let cell = world.store.room(&room).unwrap();
    let record = cell.lock().await.unwrap();
    assert_eq!(record.status, RoomStatus::Finished);
    assert_eq!(record.normal_finish, Some(true));
    assert!(record.turn.is_none());
}

#[tokio::test]
async fn test_agents_receive_opposite_roles() {
    let world = start().await;

    let mut host_config = HostConfig::new(GameName::from("TicTacToe"));
    host_config.run_once = true;
    let host = EngineHost::connect(&world.hub, host_config).await.unwrap();
    tokio::spawn(host.run());

    let (mut watcher, room) = watch_first_room(&world).await;

    for name in ["role-bot-1", "role-bot-2"] {
        let runner =
            AgentRunner::connect(&world.hub, agent_config(&world, name))
                .await
                .unwrap();
        tokio::spawn(runner.run());
    }

    // The watcher shares the room group: collect both joined broadcasts.
    let mut roles = Vec::new();
    while roles.len() < 2 {
        let mut delivery = tokio::time::timeout(
            Duration::from_secs(5),
            watcher.recv(),
        )
        .await
        .expect("timed out")
        .expect("watcher disconnected");
        delivery.ack_ok();
        if let Event::Joined {
            broadcast: true,
            role: Some(role),
            ..
        } = delivery.msg
        {
            roles.push(role.0);
        }
    }
    roles.sort();
    assert_eq!(roles, ["o", "x"]);

    let _ = room;
}

#[tokio::test]
async fn test_spr_duel_produces_one_winner() {
    let world = start().await;

    let mut host_config = HostConfig::new(GameName::from("ScissorsPaperRock"));
    host_config.run_once = true;
    let host = EngineHost::connect(&world.hub, host_config).await.unwrap();
    tokio::spawn(host.run());

    let (mut watcher, _room) = watch_first_room(&world).await;

    for name in ["spr-bot-1", "spr-bot-2"] {
        let runner =
            AgentRunner::connect(&world.hub, agent_config(&world, name))
                .await
                .unwrap();
        tokio::spawn(runner.run());
    }

    let finish = await_finish(&mut watcher).await;
    assert!(finish.normal);
    let values: Vec<i8> =
        finish.scores.unwrap().values().copied().collect();
    // The duel never draws: ties restart the round instead.
    assert!(values.contains(&1) && values.contains(&-1));
}

#[tokio::test]
async fn test_host_recycles_into_a_fresh_lobby() {
    let world = start().await;

    // Not single-shot: after the game the host must announce a new room.
    let host =
        EngineHost::connect(&world.hub, HostConfig::new(GameName::from("TicTacToe")))
            .await
            .unwrap();
    tokio::spawn(host.run());

    let (mut watcher, first_room) = watch_first_room(&world).await;

    for name in ["cycle-bot-1", "cycle-bot-2"] {
        let runner =
            AgentRunner::connect(&world.hub, agent_config(&world, name))
                .await
                .unwrap();
        tokio::spawn(runner.run());
    }
    let _ = await_finish(&mut watcher).await;

    // Eventually a fresh lobby (a different room id) shows up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        watcher.send(Event::List).unwrap();
        let mut delivery = tokio::time::timeout(
            Duration::from_secs(5),
            watcher.recv(),
        )
        .await
        .expect("timed out")
        .expect("watcher disconnected");
        delivery.ack_ok();
        if let Event::Rooms { rooms } = delivery.msg {
            if rooms.keys().any(|room| room != &first_room) {
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "host never announced a new lobby"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_room_status_never_reverses() {
    let world = start().await;

    let mut host_config = HostConfig::new(GameName::from("TicTacToe"));
    host_config.run_once = true;
    let host = EngineHost::connect(&world.hub, host_config).await.unwrap();
    tokio::spawn(host.run());

    let (mut watcher, room) = watch_first_room(&world).await;
    let cell = world.store.room(&room).unwrap();

    // Sample the status concurrently with the whole game; the sequence of
    // observations must be monotone lobby → playing → finished.
    let sampler = tokio::spawn({
        let cell = Arc::clone(&cell);
        async move {
            let mut seen = Vec::new();
            loop {
                let status = { cell.lock().await.unwrap().status };
                if seen.last() != Some(&status) {
                    seen.push(status);
                }
                if status == RoomStatus::Finished {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    });

    for name in ["mono-bot-1", "mono-bot-2"] {
        let runner =
            AgentRunner::connect(&world.hub, agent_config(&world, name))
                .await
                .unwrap();
        tokio::spawn(runner.run());
    }
    let _ = await_finish(&mut watcher).await;

    let seen = sampler.await.unwrap();
    let rank = |s: &RoomStatus| match s {
        RoomStatus::Lobby => 0,
        RoomStatus::Playing => 1,
        RoomStatus::Finished => 2,
    };
    assert!(
        seen.windows(2).all(|w| rank(&w[0]) < rank(&w[1])),
        "status sequence {seen:?} is not monotone"
    );
}

#[tokio::test]
async fn test_rejected_agent_gets_bounded_retries_then_error() {
    let world = start().await;
    let mut config = AgentConfig::new("not-a-real-key");
    config.retries = 2;
    config.retry_backoff = Duration::from_millis(10);
    let result = AgentRunner::connect(&world.hub, config).await;
    // The runner surfaces the transport rejection after its attempts.
    assert!(matches!(
        result,
        Err(ludus_client::ClientError::Transport(
            TransportError::Rejected(_)
        ))
    ));
}

#[tokio::test]
async fn test_board_snapshots_are_opaque_json() {
    // The broker stores whatever board the engine produced; spectators
    // get it back unchanged.
    let world = start().await;

    let mut host_config = HostConfig::new(GameName::from("TicTacToe"));
    host_config.run_once = true;
    let host = EngineHost::connect(&world.hub, host_config).await.unwrap();
    tokio::spawn(host.run());

    let (mut watcher, room) = watch_first_room(&world).await;
    for name in ["opaque-bot-1", "opaque-bot-2"] {
        let runner =
            AgentRunner::connect(&world.hub, agent_config(&world, name))
                .await
                .unwrap();
        tokio::spawn(runner.run());
    }
    let _ = await_finish(&mut watcher).await;

    let cell = world.store.room(&room).unwrap();
    let record = cell.lock().await.unwrap();
    let board: &Value = record.board.as_ref().unwrap();
    let grid = board["grid"].as_array().unwrap();
    assert_eq!(grid.len(), 3);
}
