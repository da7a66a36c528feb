//! Router-level tests: authentication, input validation, and degrade
//! behavior through the real middleware stack.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::{Router, middleware, routing::get};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use std::sync::Arc;
use tower::util::ServiceExt;

use scribe_gateway::config::{DEFAULT_MAX_AUDIO_FRAGMENT_BYTES, ServerConfig};
use scribe_gateway::core::relay::OverflowPolicy;
use scribe_gateway::middleware::auth_middleware;
use scribe_gateway::state::AppState;
use scribe_gateway::{handlers, routes};

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        deepgram_api_key: None,
        deepgram_url: "wss://api.deepgram.com/v1/listen".to_string(),
        recognizer_model: "nova-2-general".to_string(),
        recognizer_encoding: "opus".to_string(),
        recognizer_sample_rate: 48000,
        recognizer_channels: 1,
        recognizer_smart_format: true,
        recognizer_keep_alive_secs: 4,
        pending_audio_capacity: 256,
        pending_audio_overflow: OverflowPolicy::DropOldest,
        openai_api_key: None,
        openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
        openai_model: "gpt-4o-mini".to_string(),
        auth_jwt_secret: None,
        auth_required: false,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
        max_audio_fragment_bytes: DEFAULT_MAX_AUDIO_FRAGMENT_BYTES,
    }
}

fn build_app(state: Arc<AppState>) -> Router {
    let protected = routes::api::create_api_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));
    let transcription =
        routes::transcription::create_transcription_router(state.config.max_audio_fragment_bytes)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));

    Router::new()
        .route("/", get(handlers::api::health_check))
        .merge(protected)
        .merge(transcription)
        .with_state(state)
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: usize,
}

fn make_token(user_id: &str, secret: &str) -> String {
    encode(
        &Header::default(),
        &TestClaims {
            sub: user_id.to_string(),
            exp: 4102444800, // 2100-01-01
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_health_check_is_public() {
    let app = build_app(AppState::new(test_config()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_empty_audio_fragment_is_rejected() {
    let app = build_app(AppState::new(test_config()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/transcription/audio")
                .header(header::CONTENT_TYPE, "audio/webm")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_audio_accepted_with_recognizer_disabled() {
    // No recognizer API key: the fragment is dropped but the caller still
    // gets a success response.
    let state = AppState::new(test_config());
    let app = build_app(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/transcription/audio")
                .header(header::CONTENT_TYPE, "audio/webm")
                .body(Body::from(vec![0u8; 64]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["queued"], true);
    assert_eq!(state.sessions.session_count(), 0);
}

#[tokio::test]
async fn test_audio_requires_token_when_auth_enabled() {
    let mut config = test_config();
    config.auth_jwt_secret = Some("signing-secret".to_string());
    config.auth_required = true;
    let app = build_app(AppState::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/transcription/audio")
                .body(Body::from(vec![0u8; 8]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_audio_accepted_with_valid_token() {
    let mut config = test_config();
    config.auth_jwt_secret = Some("signing-secret".to_string());
    config.auth_required = true;
    let app = build_app(AppState::new(config));

    let token = make_token("clinician-1", "signing-secret");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/transcription/audio")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(vec![0u8; 8]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_audio_rejects_bad_token() {
    let mut config = test_config();
    config.auth_jwt_secret = Some("signing-secret".to_string());
    config.auth_required = true;
    let app = build_app(AppState::new(config));

    let token = make_token("clinician-1", "wrong-secret");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/transcription/audio")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(vec![0u8; 8]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stream_attach_unauthorized_before_any_frame() {
    let mut config = test_config();
    config.auth_jwt_secret = Some("signing-secret".to_string());
    config.auth_required = true;
    let app = build_app(AppState::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/appointments/a1/transcription/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stream_attach_accepts_query_token() {
    // EventSource cannot set headers, so the credential rides the query
    // string.
    let mut config = test_config();
    config.auth_jwt_secret = Some("signing-secret".to_string());
    config.auth_required = true;
    let state = AppState::new(config);
    let app = build_app(state.clone());

    let token = make_token("clinician-1", "signing-secret");
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/appointments/a1/transcription/stream?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_list_transcriptions_empty() {
    let app = build_app(AppState::new(test_config()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/appointments/a1/transcription")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_note_draft_unavailable_without_api_key() {
    let app = build_app(AppState::new(test_config()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/notes/draft")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_note_draft_streams_deltas() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Plan: \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"rest\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.openai_api_key = Some("test-key".to_string());
    config.openai_api_url = format!("{}/v1/chat/completions", server.uri());
    let app = build_app(AppState::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/appointments/a1/notes/draft")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"instructions":"brief"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let plan_pos = text.find(r#"{"text":"Plan: ","type":"delta"}"#)
        .or_else(|| text.find("Plan: "))
        .expect("first delta present");
    let rest_pos = text.find(r#""rest""#).expect("second delta present");
    assert!(plan_pos < rest_pos, "deltas arrive in order");
    assert!(text.contains(r#""type":"done""#) || text.contains("done"));
}
