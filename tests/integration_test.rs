//! Integration tests against a running narrator server

mod common;

use common::NarratorTest;

#[tokio::test]
async fn test_server_starts_and_stops() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");
    // Server shuts down automatically when narrator is dropped
    drop(narrator);
}

#[tokio::test]
async fn test_health_endpoint() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");

    let body = narrator.get("/health").await.expect("Failed to get health");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "ok");
}

#[tokio::test]
async fn test_parallel_servers() {
    let narrator1 = NarratorTest::start().await.expect("Failed to start server 1");
    let narrator2 = NarratorTest::start().await.expect("Failed to start server 2");

    assert_ne!(narrator1.addr, narrator2.addr);

    narrator1.command("attack", Some("enemy_goblin_1")).await.unwrap();
    let state1 = narrator1.get("/state").await.unwrap();
    let state2 = narrator2.get("/state").await.unwrap();
    assert_eq!(state1["in_combat"], true);
    assert_eq!(state2["in_combat"], false);
}

#[tokio::test]
async fn test_combat_reaches_player_turn() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");

    let body = narrator
        .command("attack", Some("enemy_goblin_1"))
        .await
        .unwrap();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["entries"][0]["content"], "Combat has begun!");

    // Enemies ahead of the player in initiative are played by the scheduler
    let state = narrator.wait_for_player_turn().await.unwrap();
    assert_eq!(state["in_combat"], true);
    assert_eq!(state["current_scene"]["current_turn"], "pc_theron");

    let tracker = narrator.get("/tracker").await.unwrap();
    let rows = tracker.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().filter(|r| r["is_current"] == true).count(),
        1
    );
}

#[tokio::test]
async fn test_player_turn_attack_is_narrated() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");
    narrator.command("attack", Some("enemy_goblin_1")).await.unwrap();
    narrator.wait_for_player_turn().await.unwrap();

    let body = narrator
        .command("attack", Some("enemy_goblin_1"))
        .await
        .unwrap();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(
        entries[0]["content"],
        "Theron attacks Goblin Scout with Longsword!"
    );
    assert!(entries[1]["content"]
        .as_str()
        .unwrap()
        .starts_with("Attack Roll: "));
    // No service key: the narration is the fallback text
    assert!(entries.iter().any(|e| e["type"] == "narrative"
        && e["content"] == narrator::narrative::FALLBACK_NARRATIVE));
}

#[tokio::test]
async fn test_save_and_load_over_http() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");

    let body = narrator.command("load", None).await.unwrap();
    assert_eq!(body["entries"][0]["content"], "No saved game found.");

    narrator.command("save", None).await.unwrap();
    narrator.command("attack", Some("enemy_goblin_1")).await.unwrap();
    narrator.wait_for_player_turn().await.unwrap();

    let body = narrator.command("load", None).await.unwrap();
    assert_eq!(body["entries"][0]["content"], "Game loaded.");

    let state = narrator.get("/state").await.unwrap();
    assert_eq!(state["in_combat"], false);
    assert_eq!(state["current_scene"]["round_number"], 0);
}

#[tokio::test]
async fn test_unknown_verb_ignored() {
    let narrator = NarratorTest::start().await.expect("Failed to start server");
    let before = narrator.session().revision();

    let body = narrator.command("cast", Some("fireball")).await.unwrap();
    assert_eq!(body["accepted"], false);
    assert_eq!(narrator.session().revision(), before);
}
