//! Integration tests for POST /api/songs/import

mod helpers;

use axum::http::StatusCode;
use helpers::{get, import, mock_app, post, test_app_with, FnModel};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use utamemo_ai::llm::{CompletionRequest, LlmError, LlmTask};
use utamemo_ai::services::extract_json;

/// Annotation reply that repeats each prompted line with a fixed translation
fn echo_annotation(request: &CompletionRequest) -> Result<String, LlmError> {
    let payload = extract_json(&request.user).expect("prompt starts with a JSON payload");
    let lines: Vec<Value> = payload["lines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| {
            json!({
                "lineNumber": line["lineNumber"],
                "contentJa": line["text"],
                "contentZh": "译文",
                "furigana": [],
                "tokens": [{ "surface": line["text"], "partOfSpeech": "other" }],
            })
        })
        .collect();
    Ok(json!({ "lines": lines }).to_string())
}

fn ten_lines() -> Vec<String> {
    (1..=10)
        .map(|i| format!("[00:{:02}.00]夢の歌 {}", i * 3, i))
        .collect()
}

#[tokio::test]
async fn test_mock_import_annotates_every_line() {
    let (app, _pool) = mock_app().await;

    let report = import(
        &app,
        Some("alice"),
        json!({
            "song": { "title": "テスト", "artist": "Tester", "durationMs": 40000 },
            "lines": ten_lines(),
        }),
    )
    .await;

    assert_eq!(report["lineCount"], 10);
    assert_eq!(report["annotatedLineCount"], 10);
    assert_eq!(report["cardCount"], 0);
    assert!(report["conversationId"].is_string());

    let song_id = report["songId"].as_str().unwrap();
    let (status, song) = get(&app, &format!("/api/songs/{}", song_id), Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(song["title"], "テスト");

    let lines = song["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 10);
    for (index, line) in lines.iter().enumerate() {
        assert_eq!(line["lineNumber"], index as u64 + 1);
        assert_eq!(line["contentJa"], format!("夢の歌 {}", index + 1));
        assert!(line["contentZh"].as_str().unwrap().starts_with("[模拟翻译]"));
        assert_eq!(line["startMs"], (index as i64 + 1) * 3000);
    }

    // Timing: each line ends where the next begins, the last at the duration
    assert_eq!(lines[0]["endMs"], 6000);
    assert_eq!(lines[9]["endMs"], 40000);

    let furigana = lines[0]["furigana"].as_array().unwrap();
    assert_eq!(furigana.len(), 1);
    assert_eq!(furigana[0]["word"], "夢");
    assert_eq!(furigana[0]["reading"], "ゆめ");
    assert_eq!(furigana[0]["start"], 0);
    assert_eq!(furigana[0]["end"], 1);
}

#[tokio::test]
async fn test_import_transcript_records_each_chunk() {
    let (app, _pool) = mock_app().await;

    let report = import(
        &app,
        Some("alice"),
        json!({ "song": { "title": "Chunks" }, "lines": ten_lines() }),
    )
    .await;

    let conversation_id = report["conversationId"].as_str().unwrap();
    let (status, conversation) =
        get(&app, &format!("/api/conversations/{}", conversation_id), Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation["title"], "Import: Chunks");

    // Two chunks (8 + 2 lines), three messages each
    let messages = conversation["messages"].as_array().unwrap();
    let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "system", "user", "assistant"]
    );
    let seqs: Vec<u64> = messages.iter().map(|m| m["seq"].as_u64().unwrap()).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_import_without_ai_makes_no_model_calls() {
    let model = FnModel::new(echo_annotation);
    let (app, _pool) = test_app_with(model.clone(), false).await;

    let report = import(
        &app,
        None,
        json!({
            "song": { "title": "Plain" },
            "lines": ["一行目", "", "二行目"],
            "options": { "parseWithAI": false },
        }),
    )
    .await;

    assert_eq!(model.request_count(), 0);
    assert_eq!(report["lineCount"], 2);
    assert_eq!(report["annotatedLineCount"], 0);
    assert!(report.get("conversationId").is_none());

    let song_id = report["songId"].as_str().unwrap();
    let (_, song) = get(&app, &format!("/api/songs/{}", song_id), None).await;
    let lines = song["lines"].as_array().unwrap();
    assert_eq!(lines[1]["contentJa"], "二行目");
    assert!(lines[1]["contentZh"].is_null());
    assert_eq!(lines[1]["furigana"], json!([]));
    assert_eq!(lines[1]["tokens"], json!([]));
}

#[tokio::test]
async fn test_failed_chunk_falls_back_to_placeholders() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let model = FnModel::new(move |request| {
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(LlmError::Api(500, "upstream down".into()));
        }
        echo_annotation(request)
    });
    let (app, _pool) = test_app_with(model.clone(), false).await;

    let report = import(
        &app,
        Some("alice"),
        json!({ "song": { "title": "Partial" }, "lines": ten_lines() }),
    )
    .await;

    assert_eq!(model.request_count(), 2);
    assert_eq!(report["lineCount"], 10);
    assert_eq!(report["annotatedLineCount"], 8);

    let song_id = report["songId"].as_str().unwrap();
    let (_, song) = get(&app, &format!("/api/songs/{}", song_id), Some("alice")).await;
    let lines = song["lines"].as_array().unwrap();
    assert_eq!(lines[7]["contentZh"], "译文");
    assert!(lines[8]["contentZh"].is_null());
    assert_eq!(lines[9]["contentJa"], "夢の歌 10");
    assert_eq!(lines[9]["lineNumber"], 10);
}

#[tokio::test]
async fn test_import_with_cards_from_mock() {
    let (app, _pool) = mock_app().await;

    let report = import(
        &app,
        Some("alice"),
        json!({
            "song": { "title": "Cards" },
            "lines": ["明日も歌う", "空を走る", "君の心"],
            "options": { "generateCards": true, "cardsPerLine": 2 },
        }),
    )
    .await;

    assert_eq!(report["cardCount"], 6);
    assert_eq!(report["cardFailures"], 0);

    let song_id = report["songId"].as_str().unwrap();
    let (status, cards) = get(&app, &format!("/api/songs/{}/cards", song_id), Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards["count"], 6);

    let words: Vec<&str> = cards["cards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["word"].as_str().unwrap())
        .collect();
    assert_eq!(&words[0..2], &["明日", "歌う"]);
    assert_eq!(&words[2..4], &["空", "走る"]);
    assert_eq!(&words[4..6], &["君", "心"]);

    let first = &cards["cards"][0];
    assert_eq!(first["example"], "明日も歌う");
    assert_eq!(first["wordPosition"], json!({ "start": 0, "end": 2 }));
}

#[tokio::test]
async fn test_rejected_key_stops_card_requests() {
    let model = FnModel::new(|request| match request.task {
        LlmTask::LyricParsing => echo_annotation(request),
        LlmTask::CardGeneration => Err(LlmError::Unauthorized(401)),
    });
    let (app, _pool) = test_app_with(model.clone(), false).await;

    let report = import(
        &app,
        Some("alice"),
        json!({
            "song": { "title": "No key" },
            "lines": ["一", "二", "三"],
            "options": { "generateCards": true },
        }),
    )
    .await;

    // One annotation chunk, then a single card attempt
    assert_eq!(model.request_count(), 2);
    assert_eq!(report["cardCount"], 0);
    assert_eq!(report["cardFailures"], 3);
    assert_eq!(report["annotatedLineCount"], 3);
}

#[tokio::test]
async fn test_import_validation_errors() {
    let (app, _pool) = mock_app().await;

    let cases = [
        json!({ "song": { "title": "  " }, "lines": ["歌"] }),
        json!({ "song": { "title": "t" }, "lines": ["", "   ", "[ar:Someone]"] }),
        json!({ "song": { "title": "t" }, "lines": ["歌"], "options": { "cardsPerLine": 4 } }),
        json!({ "song": { "title": "t", "durationMs": -1 }, "lines": ["歌"] }),
    ];

    for body in cases {
        let (status, error) = post(&app, "/api/songs/import", Some("alice"), body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(error["error"]["code"], "BAD_REQUEST");
    }

    let (_, songs) = get(&app, "/api/songs", Some("alice")).await;
    assert_eq!(songs["count"], 0);
}
