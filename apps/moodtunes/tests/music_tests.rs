//! Integration tests for song endpoints.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;

use moodtunes::services::MediaStorage;

use common::{TestApp, BASE_URL};

fn mp3_part(file_name: &str, size: usize) -> Part {
    Part::bytes(vec![0u8; size])
        .file_name(file_name)
        .mime_type("audio/mpeg")
}

// =============================================================================
// Listing & Lookup
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let response = app.server().get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_list_songs_empty() {
    let app = TestApp::new().await;

    let response = app.server().get("/api/music").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 0);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_songs_filtered_by_emotion() {
    let app = TestApp::new().await;
    app.seed_song("Sunflower", "Post Malone", "Joy").await;
    app.seed_song("Happy", "Pharrell", "joy").await;
    app.seed_song("Hurt", "Johnny Cash", "Sad").await;

    let response = app.server().get("/api/music?emotion=JOY").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Happy", "Sunflower"]);
}

#[tokio::test]
async fn test_get_song_resolves_urls() {
    let app = TestApp::new().await;
    let song = app.seed_song("Sunflower (Lyrics)", "Post Malone", "Joy").await;

    let response = app.server().get(&format!("/api/music/{}", song.id)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    let data = &body["data"];
    assert_eq!(data["title"], "Sunflower (Lyrics)");
    assert_eq!(
        data["fileUrl"],
        "https://host:3000/music/Joy%2FSunflower%20(Lyrics).mp3"
    );
    assert_eq!(data["thumbnailUrl"], "https://host:3000/thumbnails/default.jpg");
    assert_eq!(data["defaultThumbnail"], true);
    assert_eq!(data["durationSeconds"], 200.0);
}

#[tokio::test]
async fn test_get_song_with_existing_thumbnail() {
    let app = TestApp::new().await;
    let audio = app.write_file("Sad/rain.mp3", b"ID3");
    let cover = app.write_file("thumb/rain cover.jpg", b"jpg");
    let song = app
        .insert_song(
            "Rain",
            "Clouds",
            "Sad",
            &audio.to_string_lossy(),
            Some(&cover.to_string_lossy()),
        )
        .await;

    let response = app.server().get(&format!("/api/music/{}", song.id)).await;

    let body: Value = response.json();
    assert_eq!(
        body["data"]["thumbnailUrl"],
        "https://host:3000/thumbnails/rain%20cover.jpg"
    );
    assert_eq!(body["data"]["defaultThumbnail"], false);
}

#[tokio::test]
async fn test_dangling_thumbnail_uses_default() {
    let app = TestApp::new().await;
    let audio = app.write_file("Sad/rain.mp3", b"ID3");
    let missing = app.thumbnail_root().join("deleted.jpg");
    let song = app
        .insert_song(
            "Rain",
            "Clouds",
            "Sad",
            &audio.to_string_lossy(),
            Some(&missing.to_string_lossy()),
        )
        .await;

    let response = app.server().get(&format!("/api/music/{}", song.id)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["thumbnailUrl"], "https://host:3000/thumbnails/default.jpg");
    assert_eq!(body["data"]["defaultThumbnail"], true);
}

#[tokio::test]
async fn test_get_song_not_found() {
    let app = TestApp::new().await;

    let response = app.server().get("/api/music/9999").await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "Song not found");
}

#[tokio::test]
async fn test_play_song_by_title() {
    let app = TestApp::new().await;
    app.seed_song("Sunflower (Lyrics)", "Post Malone", "Joy").await;

    let response = app
        .server()
        .get("/api/music/play/Sunflower%20(Lyrics)")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "Sunflower (Lyrics)");
    assert_eq!(body["data"]["artist"], "Post Malone");
    assert_eq!(
        body["data"]["fileUrl"],
        "https://host:3000/music/Joy%2FSunflower%20(Lyrics).mp3"
    );
    assert!(body["data"]["thumbnailUrl"].is_string());

    app.server()
        .get("/api/music/play/Nope")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_https_responses_never_leak_http() {
    let app = TestApp::new().await;
    let audio = app.write_file("Joy/old.mp3", b"ID3");
    app.insert_song(
        "Old",
        "Someone",
        "Joy",
        &audio.to_string_lossy(),
        Some("http://old-host:3000/thumbnails/old.jpg"),
    )
    .await;

    let response = app.server().get("/api/music").await;

    let body: Value = response.json();
    assert_eq!(
        body["data"][0]["thumbnailUrl"],
        "https://old-host:3000/thumbnails/old.jpg"
    );
    assert!(!response.text().contains("http://"));
}

// =============================================================================
// Search & Emotions
// =============================================================================

#[tokio::test]
async fn test_search_requires_keyword() {
    let app = TestApp::new().await;

    let response = app.server().get("/api/music/search").await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["message"], "Search keyword is required");

    app.server()
        .get("/api/music/search?keyword=%20%20")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_search_matches_title_and_artist() {
    let app = TestApp::new().await;
    app.seed_song("Sunflower", "Post Malone", "Joy").await;
    app.seed_song("Morning", "Sunny Day", "Joy").await;
    app.seed_song("Rain", "Clouds", "Sad").await;

    let response = app.server().get("/api/music/search?keyword=sun").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Morning", "Sunflower"]);
}

#[tokio::test]
async fn test_list_emotions() {
    let app = TestApp::new().await;
    app.seed_song("A", "X", "Sad").await;
    app.seed_song("B", "X", "Joy").await;
    app.seed_song("C", "X", "Sad").await;

    let response = app.server().get("/api/music/emotions").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"], serde_json::json!(["Joy", "Sad"]));
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_song() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .add_text("emotion", "Joy")
        .add_part("audioFile", mp3_part("My Song.mp3", 1024));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Song uploaded successfully");
    let data = &body["data"];
    assert_eq!(data["title"], "My Song");
    assert_eq!(data["artist"], "Unknown Artist");
    assert_eq!(data["album"], "Unknown Album");
    assert_eq!(data["emotion"], "Joy");
    assert_eq!(data["fileUrl"], format!("{}/music/my_song.mp3", BASE_URL));
    assert_eq!(data["defaultThumbnail"], true);

    let stored = app.media_root().join("my_song.mp3");
    assert_eq!(std::fs::read(stored).unwrap().len(), 1024);
}

#[tokio::test]
async fn test_upload_without_emotion_is_unknown() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().add_part("audioFile", mp3_part("untagged.mp3", 16));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["emotion"], "Unknown");
}

#[cfg(unix)]
#[tokio::test]
async fn test_upload_uses_classifier_when_configured() {
    let app = TestApp::with_config(|config| {
        config.classifier.command = Some("sh".to_string());
        config.classifier.args = vec!["-c".to_string(), "echo energetic".to_string()];
    })
    .await;

    let form = MultipartForm::new().add_part("audioFile", mp3_part("loud.mp3", 16));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["emotion"], "Excitement");
}

#[tokio::test]
async fn test_upload_requires_file() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().add_text("emotion", "Joy");
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_rejects_non_mp3() {
    let app = TestApp::new().await;

    let part = Part::bytes(b"RIFF....WAVE".to_vec())
        .file_name("song.wav")
        .mime_type("audio/wav");
    let form = MultipartForm::new().add_part("audioFile", part);
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status_bad_request();
    assert!(!app.media_root().join("song.wav").exists());
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = TestApp::with_config(|config| config.media.max_upload_mb = 1).await;

    let form = MultipartForm::new().add_part("audioFile", mp3_part("big.mp3", 2 * 1024 * 1024));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!app.media_root().join("big.mp3").exists());
}

#[tokio::test]
async fn test_upload_duplicate_title_conflicts_and_cleans_up() {
    let app = TestApp::new().await;
    app.seed_song("Sunflower", "Post Malone", "Joy").await;

    let form = MultipartForm::new()
        .add_text("emotion", "Joy")
        .add_part("audioFile", mp3_part("Sunflower.mp3", 64));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "conflict");
    assert!(!app.media_root().join("sunflower.mp3").exists());

    let listed: Value = app.server().get("/api/music").await.json();
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn test_upload_existing_file_name_conflicts() {
    let app = TestApp::new().await;
    app.write_file("taken.mp3", b"already here");

    let form = MultipartForm::new().add_part("audioFile", mp3_part("Taken.mp3", 8));
    let response = app.server().post("/api/music").multipart(form).await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        std::fs::read(app.media_root().join("taken.mp3")).unwrap(),
        b"already here"
    );
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_song_removes_record_and_file() {
    let app = TestApp::new().await;
    let song = app.seed_song("Gone", "X", "Sad").await;
    let audio = app.media_root().join("Sad/Gone.mp3");
    assert!(audio.exists());

    let response = app.server().delete(&format!("/api/music/{}", song.id)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Song and associated files deleted successfully");
    assert_eq!(body["data"]["id"], song.id);
    assert!(!audio.exists());

    app.server()
        .get(&format!("/api/music/{}", song.id))
        .await
        .assert_status_not_found();
    app.server()
        .delete(&format!("/api/music/{}", song.id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_delete_song_with_missing_file_still_succeeds() {
    let app = TestApp::new().await;
    let song = app
        .insert_song("Ghost", "X", "Sad", "/nowhere/ghost.mp3", None)
        .await;

    let response = app.server().delete(&format!("/api/music/{}", song.id)).await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_delete_song_keeps_default_thumbnail() {
    let app = TestApp::new().await;
    let audio = app.write_file("Joy/a.mp3", b"ID3");
    let default = app.thumbnail_root().join("default.jpg");
    let cover = app.write_file("thumb/a.jpg", b"jpg");
    let with_default = app
        .insert_song("A", "X", "Joy", &audio.to_string_lossy(), Some(&default.to_string_lossy()))
        .await;
    let with_cover = app
        .insert_song("B", "X", "Joy", "/nowhere/b.mp3", Some(&cover.to_string_lossy()))
        .await;

    app.server()
        .delete(&format!("/api/music/{}", with_default.id))
        .await
        .assert_status_ok();
    app.server()
        .delete(&format!("/api/music/{}", with_cover.id))
        .await
        .assert_status_ok();

    assert!(default.exists());
    assert!(!cover.exists());
}

#[tokio::test]
async fn test_delete_song_keeps_art_of_song_with_same_file_stem() {
    let app = TestApp::new().await;
    let storage = MediaStorage::new(app.media_root().to_path_buf(), app.thumbnail_root());
    let joy_audio = app.write_file("Joy/intro.mp3", b"ID3");
    let sad_audio = app.write_file("Sad/intro.mp3", b"ID3");
    let joy_cover = storage.thumbnail_path_for(&joy_audio);
    let sad_cover = storage.thumbnail_path_for(&sad_audio);
    assert_ne!(joy_cover, sad_cover);
    std::fs::write(&joy_cover, b"joy-art").unwrap();
    std::fs::write(&sad_cover, b"sad-art").unwrap();

    let joy = app
        .insert_song("Intro", "X", "Joy", &joy_audio.to_string_lossy(), Some(&joy_cover.to_string_lossy()))
        .await;
    let sad = app
        .insert_song("Intro (Sad)", "X", "Sad", &sad_audio.to_string_lossy(), Some(&sad_cover.to_string_lossy()))
        .await;

    app.server()
        .delete(&format!("/api/music/{}", joy.id))
        .await
        .assert_status_ok();

    let body: Value = app.server().get(&format!("/api/music/{}", sad.id)).await.json();
    assert_eq!(body["data"]["defaultThumbnail"], false);
    assert_eq!(std::fs::read(&sad_cover).unwrap(), b"sad-art");
    assert!(!joy_cover.exists());
}

// =============================================================================
// Malformed Requests
// =============================================================================

#[tokio::test]
async fn test_non_numeric_id_uses_error_envelope() {
    let app = TestApp::new().await;

    for response in [
        app.server().get("/api/music/abc").await,
        app.server().delete("/api/music/abc").await,
    ] {
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_upload_without_multipart_uses_error_envelope() {
    let app = TestApp::new().await;

    let response = app.server().post("/api/music").text("not a form").await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "bad_request");
}

// =============================================================================
// Import
// =============================================================================

#[tokio::test]
async fn test_import_library() {
    let app = TestApp::new().await;
    app.write_file("Joy/First Song.mp3", b"not audio");
    app.write_file("Anger/deep/Second.mp3", b"not audio");
    app.write_file("Anger/cover.png", b"not audio");

    let response = app.server().post("/api/music/import").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["scanned"], 2);
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(body["data"]["skipped"], 0);

    let listed: Value = app.server().get("/api/music?emotion=anger").await.json();
    assert_eq!(listed["data"][0]["title"], "Second");
    assert_eq!(
        listed["data"][0]["fileUrl"],
        "https://host:3000/music/Anger%2Fdeep%2FSecond.mp3"
    );
}
