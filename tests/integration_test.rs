use shtet_qytet::config::ServerConfig;
use shtet_qytet::persistence::InMemoryLeaderboard;
use shtet_qytet::protocol::{ClientMessage, RoomSnapshot, ServerMessage};
use shtet_qytet::state::{AppState, SharedRoom};
use shtet_qytet::types::{AnswerSheet, RoomSettings, RoomState};
use shtet_qytet::ws::handlers::handle_message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

fn new_state() -> (Arc<AppState>, Arc<InMemoryLeaderboard>) {
    let board = Arc::new(InMemoryLeaderboard::new());
    let state = Arc::new(AppState::with_gateway(ServerConfig::default(), board.clone()));
    (state, board)
}

fn settings(host: &str) -> RoomSettings {
    RoomSettings {
        categories: vec!["Shtet".to_string(), "Qytet".to_string()],
        host_username: Some(host.to_string()),
        ..RoomSettings::default()
    }
}

/// Room code, player id and snapshot carried by an ack
type AckFields = (Option<String>, Option<String>, Option<RoomSnapshot>);

/// Unwrap a successful ack into its fields
fn accepted(msg: Option<ServerMessage>) -> AckFields {
    match msg {
        Some(ServerMessage::Ack {
            success: true,
            room_code,
            player_id,
            room,
            ..
        }) => (room_code, player_id, room),
        other => panic!("Expected successful ack, got {:?}", other),
    }
}

fn assert_rejected(msg: Option<ServerMessage>, expected: &str) {
    match msg {
        Some(ServerMessage::Ack {
            success: false,
            code,
            ..
        }) => assert_eq!(code.as_deref(), Some(expected)),
        other => panic!("Expected {} rejection, got {:?}", expected, other),
    }
}

async fn create(
    state: &Arc<AppState>,
    conn: &str,
    settings: RoomSettings,
    account: Option<&str>,
) -> (String, String) {
    let (code, player_id, _) = accepted(
        handle_message(
            ClientMessage::CreateRoom {
                settings,
                account_id: account.map(str::to_string),
            },
            conn,
            state,
            &mut None,
        )
        .await,
    );
    (code.unwrap(), player_id.unwrap())
}

async fn join(
    state: &Arc<AppState>,
    conn: &str,
    code: &str,
    name: &str,
    account: Option<&str>,
) -> String {
    let (_, player_id, _) = accepted(
        handle_message(
            ClientMessage::JoinRoom {
                room_code: code.to_string(),
                display_name: Some(name.to_string()),
                account_id: account.map(str::to_string),
            },
            conn,
            state,
            &mut None,
        )
        .await,
    );
    player_id.unwrap()
}

async fn room(state: &Arc<AppState>, code: &str) -> SharedRoom {
    state.get_room(code).await.unwrap()
}

fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn sheet(entries: &[(&str, String)]) -> AnswerSheet {
    entries
        .iter()
        .map(|(c, v)| (c.to_string(), v.clone()))
        .collect()
}

/// Start a round and stop the wheel as whoever holds it; returns the letter
async fn start_and_spin(
    state: &Arc<AppState>,
    code: &str,
    host_conn: &str,
    conns: &[(&str, String)],
) -> String {
    accepted(
        handle_message(
            ClientMessage::StartGame {
                room_code: code.to_string(),
            },
            host_conn,
            state,
            &mut None,
        )
        .await,
    );
    let shared = room(state, code).await;
    let spinner = shared.lock().await.spinner.clone().unwrap();
    let spinner_conn = conns
        .iter()
        .find(|(_, id)| *id == spinner)
        .map(|(conn, _)| *conn)
        .unwrap();
    accepted(
        handle_message(
            ClientMessage::StopSpinner {
                room_code: code.to_string(),
            },
            spinner_conn,
            state,
            &mut None,
        )
        .await,
    );
    let letter = shared.lock().await.current_letter.clone().unwrap();
    letter
}

/// End-to-end integration test for a complete game flow
#[tokio::test]
async fn test_full_game_flow() {
    let (state, board) = new_state();

    // 1. Host creates a two-round room, two guests join
    let mut room_settings = settings("Ana");
    room_settings.rounds_max = 2;
    let (code, ana) = create(&state, "ana", room_settings, Some("acc-ana")).await;
    let ben = join(&state, "ben", &code, "Ben", Some("acc-ben")).await;
    let cel = join(&state, "cel", &code, "Cel", None).await;
    let conns = [("ana", ana.clone()), ("ben", ben.clone()), ("cel", cel.clone())];

    let shared = room(&state, &code).await;
    let mut rx = shared.lock().await.subscribe();

    // 2. Only the host may start
    assert_rejected(
        handle_message(
            ClientMessage::StartGame {
                room_code: code.clone(),
            },
            "ben",
            &state,
            &mut None,
        )
        .await,
        "UNAUTHORIZED",
    );

    // 3. Round one: the host holds the wheel, nobody else may stop it
    accepted(
        handle_message(
            ClientMessage::StartGame {
                room_code: code.clone(),
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    assert_eq!(shared.lock().await.spinner.as_deref(), Some(ana.as_str()));
    assert_rejected(
        handle_message(
            ClientMessage::StopSpinner {
                room_code: code.clone(),
            },
            "ben",
            &state,
            &mut None,
        )
        .await,
        "UNAUTHORIZED",
    );
    accepted(
        handle_message(
            ClientMessage::StopSpinner {
                room_code: code.clone(),
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    let letter = shared.lock().await.current_letter.clone().unwrap();

    // 4. Typing, then an incomplete manual finish is refused
    let partial = handle_message(
        ClientMessage::SyncPartialAnswers {
            room_code: code.clone(),
            answers: sheet(&[("Shtet", format!("{}ana", letter))]),
        },
        "ben",
        &state,
        &mut None,
    )
    .await;
    assert!(partial.is_none());
    assert_rejected(
        handle_message(
            ClientMessage::SubmitAnswers {
                room_code: code.clone(),
                answers: sheet(&[("Shtet", format!("{}ana", letter))]),
                is_time_up: false,
            },
            "ben",
            &state,
            &mut None,
        )
        .await,
        "VALIDATION_FAILED",
    );

    // 5. Ana finishes with both categories filled
    accepted(
        handle_message(
            ClientMessage::SubmitAnswers {
                room_code: code.clone(),
                answers: sheet(&[
                    ("Shtet", format!("{}ana", letter)),
                    ("Qytet", format!("{}ora", letter)),
                ]),
                is_time_up: false,
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    // A late time-up submission is swallowed
    accepted(
        handle_message(
            ClientMessage::SubmitAnswers {
                room_code: code.clone(),
                answers: AnswerSheet::new(),
                is_time_up: true,
            },
            "cel",
            &state,
            &mut None,
        )
        .await,
    );

    {
        let guard = shared.lock().await;
        assert_eq!(guard.state(), RoomState::Reviewing);
        let scores: Vec<i64> = guard.players.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![15, 5, 0]);
    }

    let events = drain(&mut rx);
    let finished: Vec<&String> = events
        .iter()
        .filter_map(|msg| match msg {
            ServerMessage::PlayerFinished { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![&ana]);
    assert_eq!(
        events
            .iter()
            .filter(|msg| matches!(msg, ServerMessage::RoundEnded { .. }))
            .count(),
        1
    );

    // 6. Round two: the wheel passes to Ben, the clock runs out
    start_and_spin(&state, &code, "ana", &conns).await;
    assert_eq!(shared.lock().await.round, 2);
    assert!(handle_message(
        ClientMessage::TimeUp {
            room_code: code.clone(),
        },
        "cel",
        &state,
        &mut None,
    )
    .await
    .is_none());
    assert_eq!(shared.lock().await.state(), RoomState::Reviewing);
    let used_letters = shared.lock().await.used_letters.clone();
    assert_ne!(used_letters[0], used_letters[1]);

    // 7. Asking for a third round finishes the game
    accepted(
        handle_message(
            ClientMessage::StartGame {
                room_code: code.clone(),
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    assert_eq!(shared.lock().await.state(), RoomState::Finished);
    assert!(drain(&mut rx)
        .iter()
        .any(|msg| matches!(msg, ServerMessage::GameFinished { .. })));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let ana_stats = board.stats("acc-ana").await.unwrap();
    assert_eq!(ana_stats.total_score, 15);
    assert_eq!(ana_stats.games_won, 1);
    let ben_stats = board.stats("acc-ben").await.unwrap();
    assert_eq!(ben_stats.total_score, 5);
    assert_eq!(ben_stats.games_won, 1);
}

#[tokio::test]
async fn test_host_disconnect_mid_game_persists_everyone() {
    let (state, board) = new_state();
    let (code, host) = create(&state, "host", settings("Ana"), Some("acc-0")).await;
    let mut conns = vec![("host", host.clone())];
    for (conn, account) in [("p1", "acc-1"), ("p2", "acc-2"), ("p3", "acc-3")] {
        let id = join(&state, conn, &code, conn, Some(account)).await;
        conns.push((conn, id));
    }
    start_and_spin(&state, &code, "host", &conns).await;

    let shared = room(&state, &code).await;
    let mut rx = {
        let mut guard = shared.lock().await;
        for (i, player) in guard.players.iter_mut().enumerate() {
            player.score = (i as i64 + 1) * 10;
        }
        guard.subscribe()
    };

    state.disconnect("host").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    for (i, account) in ["acc-0", "acc-1", "acc-2", "acc-3"].iter().enumerate() {
        let stats = board.stats(account).await.unwrap();
        assert_eq!(stats.total_score, (i as i64 + 1) * 10);
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.games_won, 0);
    }
    assert!(drain(&mut rx)
        .iter()
        .any(|msg| matches!(msg, ServerMessage::RoomDisbanded)));
    assert!(state.get_room(&code).await.is_none());

    // Late events for the vanished room are ignored
    let late = handle_message(
        ClientMessage::TimeUp {
            room_code: code.clone(),
        },
        "p1",
        &state,
        &mut None,
    )
    .await;
    assert!(late.is_none());
}

#[tokio::test]
async fn test_dispute_on_disputed_answer_is_rejected() {
    let (state, _) = new_state();
    let (code, ana) = create(&state, "ana", settings("Ana"), None).await;
    let ben = join(&state, "ben", &code, "Ben", None).await;
    let conns = [("ana", ana.clone()), ("ben", ben.clone())];
    let letter = start_and_spin(&state, &code, "ana", &conns).await;

    handle_message(
        ClientMessage::SyncPartialAnswers {
            room_code: code.clone(),
            answers: sheet(&[("Shtet", format!("{}ana", letter))]),
        },
        "ana",
        &state,
        &mut None,
    )
    .await;
    handle_message(
        ClientMessage::TimeUp {
            room_code: code.clone(),
        },
        "ben",
        &state,
        &mut None,
    )
    .await;

    let dispute = || ClientMessage::DisputeWord {
        room_code: code.clone(),
        target_player_id: ana.clone(),
        category: "Shtet".to_string(),
    };
    accepted(handle_message(dispute(), "ben", &state, &mut None).await);

    // Ana's "no" completes the ballots: 1 yes of 2 players fails
    accepted(
        handle_message(
            ClientMessage::CastVote {
                room_code: code.clone(),
                agree: false,
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    let shared = room(&state, &code).await;
    assert!(shared.lock().await.active_vote().is_none());
    assert_eq!(shared.lock().await.player(&ana).unwrap().score, 10);

    assert_rejected(handle_message(dispute(), "ben", &state, &mut None).await, "INVALID_STATE");
    assert!(shared.lock().await.active_vote().is_none());

    // Nothing left to vote on
    assert_rejected(
        handle_message(
            ClientMessage::CastVote {
                room_code: code.clone(),
                agree: true,
            },
            "ben",
            &state,
            &mut None,
        )
        .await,
        "INVALID_STATE",
    );
}

#[tokio::test]
async fn test_four_player_tie_fails_and_majority_passes() {
    let (state, _) = new_state();
    let (code, host) = create(&state, "c0", settings("Ana"), None).await;
    let mut conns = vec![("c0", host)];
    for conn in ["c1", "c2", "c3"] {
        let id = join(&state, conn, &code, conn, None).await;
        conns.push((conn, id));
    }
    let letter = start_and_spin(&state, &code, "c0", &conns).await;
    for (i, (conn, _)) in conns.iter().enumerate() {
        handle_message(
            ClientMessage::SyncPartialAnswers {
                room_code: code.clone(),
                answers: sheet(&[
                    ("Shtet", format!("{}{}", letter, "i".repeat(i + 1))),
                    ("Qytet", format!("{}{}", letter, "o".repeat(i + 1))),
                ]),
            },
            conn,
            &state,
            &mut None,
        )
        .await;
    }
    handle_message(
        ClientMessage::TimeUp {
            room_code: code.clone(),
        },
        "c0",
        &state,
        &mut None,
    )
    .await;

    let target = conns[3].1.clone();
    let vote = |category: &str, ballots: [(&'static str, bool); 3]| {
        let state = state.clone();
        let code = code.clone();
        let target = target.clone();
        let category = category.to_string();
        async move {
            accepted(
                handle_message(
                    ClientMessage::DisputeWord {
                        room_code: code.clone(),
                        target_player_id: target,
                        category,
                    },
                    "c0",
                    &state,
                    &mut None,
                )
                .await,
            );
            for (conn, agree) in ballots {
                accepted(
                    handle_message(
                        ClientMessage::CastVote {
                            room_code: code.clone(),
                            agree,
                        },
                        conn,
                        &state,
                        &mut None,
                    )
                    .await,
                );
            }
        }
    };

    let shared = room(&state, &code).await;

    // 2 yes vs 2 no
    vote("Shtet", [("c1", true), ("c2", false), ("c3", false)]).await;
    assert!(shared.lock().await.active_vote().is_none());
    assert_eq!(shared.lock().await.player(&target).unwrap().score, 20);

    // 3 yes vs 1 no
    vote("Qytet", [("c1", true), ("c2", true), ("c3", false)]).await;
    assert_eq!(shared.lock().await.player(&target).unwrap().score, 10);
}

#[tokio::test]
async fn test_membership_and_capacity_errors() {
    let (state, _) = new_state();

    assert_rejected(
        handle_message(
            ClientMessage::JoinRoom {
                room_code: "NOPE22".to_string(),
                display_name: None,
                account_id: None,
            },
            "x",
            &state,
            &mut None,
        )
        .await,
        "NOT_FOUND",
    );
    assert_rejected(
        handle_message(
            ClientMessage::GetRoom {
                room_code: "NOPE22".to_string(),
            },
            "x",
            &state,
            &mut None,
        )
        .await,
        "NOT_FOUND",
    );

    let mut small = settings("Ana");
    small.players_max = 2;
    let (code, _) = create(&state, "a", small, None).await;
    join(&state, "b", &code, "Ben", None).await;
    assert_rejected(
        handle_message(
            ClientMessage::JoinRoom {
                room_code: code.clone(),
                display_name: Some("Cel".to_string()),
                account_id: None,
            },
            "c",
            &state,
            &mut None,
        )
        .await,
        "ROOM_FULL",
    );

    // A member of another room may not act here
    let (other, _) = create(&state, "d", settings("Dea"), None).await;
    assert_rejected(
        handle_message(
            ClientMessage::StartGame {
                room_code: other.clone(),
            },
            "a",
            &state,
            &mut None,
        )
        .await,
        "UNAUTHORIZED",
    );

    // Untracked connections are ignored
    assert!(handle_message(
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
        "ghost",
        &state,
        &mut None,
    )
    .await
    .is_none());

    // Anyone may look a room up
    let (_, _, snapshot) = accepted(
        handle_message(
            ClientMessage::GetRoom {
                room_code: code.to_lowercase(),
            },
            "ghost",
            &state,
            &mut None,
        )
        .await,
    );
    assert_eq!(snapshot.unwrap().players.len(), 2);
}

#[tokio::test]
async fn test_public_room_listing() {
    let (state, _) = new_state();
    let (open, _) = create(&state, "a", settings("Ana"), None).await;
    let mut hidden = settings("Ben");
    hidden.is_private = true;
    create(&state, "b", hidden, None).await;

    match handle_message(ClientMessage::GetPublicRooms, "viewer", &state, &mut None).await {
        Some(ServerMessage::PublicRoomsUpdated { rooms }) => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].id, open);
            assert_eq!(rooms[0].players, 1);
        }
        other => panic!("Expected PublicRoomsUpdated, got {:?}", other),
    }

    // Lobby subscribers hear about the room leaving the lobby
    let mut lobby = state.subscribe_all();
    handle_message(ClientMessage::StartGame { room_code: open }, "a", &state, &mut None).await;
    let updates: Vec<_> = drain(&mut lobby)
        .into_iter()
        .filter_map(|msg| match msg {
            ServerMessage::PublicRoomsUpdated { rooms } => Some(rooms),
            _ => None,
        })
        .collect();
    assert_eq!(updates.last().map(|rooms| rooms.len()), Some(0));
}

#[test]
fn test_wire_format() {
    let msg: ClientMessage = serde_json::from_str(
        r#"{"t":"submitAnswers","room_code":"ABC123","answers":{"Shtet":"Shqipëri"}}"#,
    )
    .unwrap();
    match msg {
        ClientMessage::SubmitAnswers {
            room_code,
            answers,
            is_time_up,
        } => {
            assert_eq!(room_code, "ABC123");
            assert_eq!(answers["Shtet"], "Shqipëri");
            assert!(!is_time_up);
        }
        other => panic!("Unexpected {:?}", other),
    }

    let json = serde_json::to_value(ServerMessage::PlayerFinished {
        id: "timeout".to_string(),
        username: "timeout".to_string(),
    })
    .unwrap();
    assert_eq!(json["t"], "playerFinished");
    assert_eq!(json["id"], "timeout");
}

#[tokio::test]
async fn test_joiner_hears_game_start_before_reading_feed() {
    let (state, _) = new_state();
    let (code, _) = create(&state, "ana", settings("Ana"), None).await;

    let mut ben_feed = None;
    accepted(
        handle_message(
            ClientMessage::JoinRoom {
                room_code: code.clone(),
                display_name: Some("Ben".to_string()),
                account_id: None,
            },
            "ben",
            &state,
            &mut ben_feed,
        )
        .await,
    );
    let (feed_code, mut rx) = ben_feed.unwrap();
    assert_eq!(feed_code, code);

    // The host starts before the guest's connection gets to its feed
    accepted(
        handle_message(
            ClientMessage::StartGame {
                room_code: code.clone(),
            },
            "ana",
            &state,
            &mut None,
        )
        .await,
    );
    assert_eq!(room(&state, &code).await.lock().await.state(), RoomState::Spinning);

    let events = drain(&mut rx);
    assert!(matches!(events[0], ServerMessage::PlayerJoined { .. }));
    assert!(events
        .iter()
        .any(|msg| matches!(msg, ServerMessage::GameStarted { .. })));
}

#[tokio::test]
async fn test_failed_join_leaves_feed_empty() {
    let (state, _) = new_state();
    let mut feed = None;
    handle_message(
        ClientMessage::JoinRoom {
            room_code: "NOPE42".to_string(),
            display_name: None,
            account_id: None,
        },
        "ben",
        &state,
        &mut feed,
    )
    .await;
    assert!(feed.is_none());
}
