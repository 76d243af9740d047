//! Mock API tests for the chat bot
//!
//! A wiremock server stands in for the Bot API; nothing here reaches the real service.

use dubsync::bot::{BotService, TelegramClient, TelegramSink, USAGE};
use dubsync::config::Config;
use dubsync::delivery::ReplySink;
use dubsync::error::DubsyncError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:TEST";

fn sent_message(chat_id: i64, message_id: i64) -> serde_json::Value {
    json!({
        "ok": true,
        "result": { "message_id": message_id, "chat": { "id": chat_id }, "text": "sent" }
    })
}

// ============================================================================
// Client Mock Tests
// ============================================================================

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_updates_sends_offset_and_parses_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .and(query_param("offset", "41"))
            .and(query_param("timeout", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 41, "message": { "message_id": 1, "chat": { "id": 5 }, "text": "hi" } },
                    { "update_id": 42 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), TOKEN);
        let updates = client.get_updates(Some(41), Duration::ZERO).await.unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("hi"));
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn test_send_message_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .and(body_partial_json(json!({
                "chat_id": 5,
                "text": "hello",
                "reply_to_message_id": 9
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(5, 10)))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), TOKEN);
        let message = client.send_message(5, "hello", Some(9)).await.unwrap();
        assert_eq!(message.message_id, 10);
    }

    #[tokio::test]
    async fn test_api_failure_surfaces_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), TOKEN);
        let err = client.send_message(5, "hello", None).await.unwrap_err();
        match err {
            DubsyncError::Api(msg) => assert!(msg.contains("chat not found")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), TOKEN);
        let err = client.get_updates(None, Duration::ZERO).await.unwrap_err();
        assert_eq!(err.kind(), "api");
    }

    #[tokio::test]
    async fn test_send_video_uploads_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendVideo")))
            .and(body_string_contains("🧪 Preview File"))
            .and(body_string_contains("fake mp4 bytes"))
            .and(body_string_contains("name=\"supports_streaming\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(5, 11)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("preview_fixed.mp4");
        std::fs::write(&video, b"fake mp4 bytes").unwrap();

        let client = TelegramClient::new(&server.uri(), TOKEN);
        client
            .send_video(5, &video, "🧪 Preview File\nnote", None)
            .await
            .unwrap();
    }
}

// ============================================================================
// Sink Mock Tests
// ============================================================================

mod sink_tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_delivers_to_configured_destination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendVideo")))
            .and(body_string_contains("name=\"chat_id\"\r\n\r\n-100777\r\n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(-100777, 3)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .and(body_partial_json(json!({ "chat_id": 5, "reply_to_message_id": 8 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(5, 4)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("preview_fixed.mp4");
        std::fs::write(&video, b"bytes").unwrap();

        let client = Arc::new(TelegramClient::new(&server.uri(), TOKEN));
        let sink = TelegramSink::new(client, 5)
            .replying_to(8)
            .with_destination(Some(-100777));

        sink.notify("working").await.unwrap();
        sink.deliver(&video, "caption").await.unwrap();
    }
}

// ============================================================================
// Bot Service Mock Tests
// ============================================================================

mod service_tests {
    use super::*;

    fn service_for(server: &MockServer) -> BotService {
        let config = Config {
            bot_token: Some(TOKEN.to_string()),
            api_base: server.uri(),
            ..Config::default()
        };
        BotService::new(&config)
            .unwrap()
            .with_poll_timeout(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_malformed_command_gets_usage_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 7, "message": { "message_id": 70, "chat": { "id": 5 }, "text": "/delay only-one-url" } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .and(body_partial_json(json!({
                "chat_id": 5,
                "text": USAGE,
                "reply_to_message_id": 70
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(5, 71)))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let mut offset = None;
        let handles = service.poll_once(&mut offset).await.unwrap();

        assert_eq!(offset, Some(8));
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_plain_chat_is_ignored_but_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 12, "message": { "message_id": 1, "chat": { "id": 5 }, "text": "hello bot" } },
                    { "update_id": 15, "message": { "message_id": 2, "chat": { "id": 5 } } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(5, 3)))
            .expect(0)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let mut offset = Some(10);
        let handles = service.poll_once(&mut offset).await.unwrap();

        assert!(handles.is_empty());
        assert_eq!(offset, Some(16));
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let mut offset = Some(3);
        assert!(service.poll_once(&mut offset).await.is_err());
        assert_eq!(offset, Some(3));
    }
}
