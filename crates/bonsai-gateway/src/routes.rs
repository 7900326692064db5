//! API route handlers for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, extract::State};
use bonsai_core::error::BonsaiError;
use serde::Deserialize;
use std::sync::Arc;

use super::server::AppState;

/// Error envelope: `{"ok": false, "code": ..., "error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub BonsaiError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BonsaiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BonsaiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BonsaiError> for ApiError {
    fn from(e: BonsaiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "request failed: {}", self.0);
        } else {
            tracing::debug!(code = self.0.code(), "request rejected: {}", self.0);
        }
        let body = serde_json::json!({
            "ok": false,
            "code": self.0.code(),
            "error": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "bonsai-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();
    let retriever = state.agent.retriever();
    let generator = state.agent.generator();
    let llm = &state.config.llm;
    Json(serde_json::json!({
        "name": "bonsai-sensei",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime.as_secs(),
        "provider": llm.provider,
        "embedding_model": llm.embedding_model,
        "chat_model": generator.params().model,
        "answer_mode": generator.mode(),
        "retrieval": {
            "mode": retriever.kind(),
            "chunks": retriever.len(),
            "dim": retriever.dim(),
            "default_top_k": state.agent.default_top_k(),
            "max_top_k": state.agent.max_top_k(),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Answer a question from the knowledge base.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let resp = state.agent.ask(&req.question, req.top_k).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "answer": resp.answer,
        "matched_chunks": resp.matched_chunks,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use bonsai_agent::testing::{FailingChat, ScriptedChat};
    use bonsai_agent::{Agent, AnswerGenerator};
    use bonsai_core::config::BonsaiConfig;
    use bonsai_core::traits::ChatModel;
    use bonsai_knowledge::testing::{KeywordEmbedder, bonsai_embedded_chunks};
    use bonsai_knowledge::{CosineRetriever, EmbeddingCache};
    use tower::ServiceExt;

    fn app_state(chat: Arc<dyn ChatModel>) -> AppState {
        let config = BonsaiConfig::default();
        let cache = EmbeddingCache::from_embedded(bonsai_embedded_chunks()).unwrap();
        let retriever = Arc::new(CosineRetriever::new(cache, Arc::new(KeywordEmbedder::default())));
        let generator = AnswerGenerator::from_config(chat, &config.llm, &config.answer);
        let agent = Agent::new(retriever, generator, &config.retrieval);
        AppState::new(config, agent)
    }

    fn test_state() -> State<Arc<AppState>> {
        State(Arc::new(app_state(Arc::new(ScriptedChat::new("春と秋は一日一回が目安です。")))))
    }

    fn ask_body(question: &str, top_k: Option<usize>) -> Json<AskRequest> {
        Json(AskRequest { question: question.into(), top_k })
    }

    async fn read_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ---- Health & Info ----

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "bonsai-gateway");
    }

    #[tokio::test]
    async fn test_system_info() {
        let json = system_info(test_state()).await.0;
        assert_eq!(json["retrieval"]["mode"], "cosine");
        assert_eq!(json["retrieval"]["chunks"], 3);
        assert_eq!(json["retrieval"]["dim"], 4);
        assert_eq!(json["chat_model"], "gpt-3.5-turbo");
        assert_eq!(json["answer_mode"], "generate");
    }

    // ---- Ask ----

    #[tokio::test]
    async fn test_ask_success() {
        let json = ask(test_state(), ask_body("how often should I water my bonsai", None))
            .await
            .unwrap()
            .0;
        assert_eq!(json["ok"], true);
        assert!(json["answer"].as_str().unwrap().ends_with("北谷隆一"));
        let chunks = json["matched_chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0]["category"], "watering");
        assert_eq!(chunks[0]["rank"], 1);
    }

    #[tokio::test]
    async fn test_ask_invalid_request() {
        let err = ask(test_state(), ask_body("", None)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ask(test_state(), ask_body("water?", Some(99))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.0.code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let resp = ApiError(BonsaiError::Upstream("timeout".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = read_json(resp).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["code"], "upstream_error");
        assert!(json["error"].as_str().unwrap().contains("timeout"));

        let resp = ApiError(BonsaiError::Data("bad index".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(resp).await["code"], "data_error");
    }

    // ---- Router ----

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_aliases_share_one_contract() {
        for uri in ["/api/v1/ask", "/ask", "/chat"] {
            let app = build_router(app_state(Arc::new(ScriptedChat::new("ok"))));
            let resp = app
                .oneshot(post_json(uri, serde_json::json!({"question": "水やりの頻度は？", "top_k": 1})))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            let json = read_json(resp).await;
            assert_eq!(json["matched_chunks"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_router_upstream_failure_is_502() {
        let app = build_router(app_state(Arc::new(FailingChat)));
        let resp = app
            .oneshot(post_json("/api/v1/ask", serde_json::json!({"question": "water?"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = read_json(resp).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["code"], "upstream_error");
    }

    #[tokio::test]
    async fn test_router_health() {
        let app = build_router(app_state(Arc::new(ScriptedChat::new("ok"))));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
