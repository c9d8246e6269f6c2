//! Local HTTP server: engine reverse proxy plus the session gateway

pub mod auth;
pub mod error;
pub mod proxy;
pub mod routes;

use axum::{
    middleware::from_fn_with_state,
    routing::{any, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backend::Backend;
use crate::config::{AuthConfig, ServerConfig};
use crate::coordinator::PollingCoordinator;
use crate::discovery::EntityDiscovery;
use crate::error::{Error, Result};

pub use error::ApiError;
pub use proxy::{ProxiedResponse, ReverseProxy};

/// How long shutdown waits for in-flight requests
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ServerState {
    pub proxy: Arc<ReverseProxy>,
    pub backend: Backend,
    pub coordinator: Arc<PollingCoordinator>,
    pub discovery: Arc<EntityDiscovery>,
    /// Proxy mount point without a trailing slash
    pub proxy_prefix: Arc<str>,
}

/// Build the router. Everything except `/health` requires authentication.
pub fn router(state: ServerState, auth_config: AuthConfig) -> Router {
    let proxy_route = format!("{}/{{*path}}", state.proxy_prefix);

    let protected = Router::new()
        .route(&proxy_route, any(proxy::forward))
        .route("/api/session/start", post(routes::start_session))
        .route("/api/session/status", get(routes::session_status))
        .route("/api/session/qr", get(routes::session_qr))
        .route("/api/account_status", get(routes::account_status))
        .route("/api/observables", get(routes::observables))
        .route("/api/services", post(routes::call_service))
        .route_layer(from_fn_with_state(Arc::new(auth_config), auth::require_auth));

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Resolve the configured bind address
pub fn bind_addr(config: &ServerConfig) -> Result<SocketAddr> {
    let host = if config.bind == "localhost" {
        "127.0.0.1"
    } else {
        config.bind.as_str()
    };
    format!("{}:{}", host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", config.bind, e)))
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Server listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthMode, EngineConfig, SessionConfig};
    use crate::coordinator::poller::tests::{instance, ScriptedSource};
    use crate::engine::{EngineClient, Snapshot};
    use crate::session::driver::fake::{FakeLauncher, FakePage};
    use crate::session::qr::tests::tiny_png_data_url;
    use crate::session::selectors::QR_CANVAS;
    use crate::session::SessionClient;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "local-token";

    fn auth() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Token,
            password: None,
            tokens: vec![SecretString::from(TOKEN)],
        }
    }

    async fn state(engine_url: &str, backend: Option<Backend>) -> ServerState {
        let config = EngineConfig {
            api_key: SecretString::from("engine-key"),
            ..EngineConfig::default()
        };
        let engine = EngineClient::with_base_url(&config, engine_url).unwrap();
        let source = ScriptedSource::new(vec![Ok(Snapshot::new(vec![instance(1, "connected")]))]);
        let coordinator = Arc::new(PollingCoordinator::new(source, Duration::from_secs(10)));
        let discovery = Arc::new(EntityDiscovery::new());
        discovery.attach(&coordinator);
        coordinator.first_refresh().await.unwrap();

        ServerState {
            proxy: Arc::new(ReverseProxy::new(engine.clone())),
            backend: backend.unwrap_or(Backend::Engine(engine)),
            coordinator,
            discovery,
            proxy_prefix: Arc::from("/api/whatsapp_proxy"),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let app = router(state("http://127.0.0.1:1", None).await, auth());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_requires_auth() {
        let app = router(state("http://127.0.0.1:1", None).await, auth());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/whatsapp_proxy/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_proxy_passes_engine_404_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .and(header_eq("x-api-key", "engine-key"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), None).await, auth());
        let response = app.oneshot(get("/api/whatsapp_proxy/api/stats")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await, json!({"error": "not found"}));
    }

    #[tokio::test]
    async fn test_proxy_reports_unreachable_engine_as_502() {
        let app = router(state("http://127.0.0.1:1", None).await, auth());
        let response = app.oneshot(get("/api/whatsapp_proxy/api/instances")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_account_status_and_observables() {
        let app = router(state("http://127.0.0.1:1", None).await, auth());

        let response = app.clone().oneshot(get("/api/account_status")).await.unwrap();
        let accounts = body_json(response).await;
        assert_eq!(accounts[0]["status"], "connected");
        assert_eq!(accounts[0]["presence"], "unknown");

        let response = app.oneshot(get("/api/observables")).await.unwrap();
        let body = body_json(response).await;
        let ids: Vec<&str> = body["observables"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|o| o["unique_id"].as_str())
            .collect();
        assert_eq!(ids, vec!["whatsapp_1_connectivity", "whatsapp_1_status"]);
        assert_eq!(body["observables"][0]["value"], true);
    }

    #[tokio::test]
    async fn test_service_call_reaches_engine() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send_message"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), None).await, auth());
        let request = Request::builder()
            .method("POST")
            .uri("/api/services")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"service": "send_message", "contact": "123", "message": "hi"}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_session_routes_without_browser_backend() {
        let app = router(state("http://127.0.0.1:1", None).await, auth());
        let response = app.oneshot(get("/api/session/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_start_returns_qr() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let session = Arc::new(SessionClient::new(
            &SessionConfig::default(),
            FakeLauncher::new(page),
        ));
        let backend = Backend::Browser(session);
        let app = router(state("http://127.0.0.1:1", Some(backend)).await, auth());

        let request = Request::builder()
            .method("POST")
            .uri("/api/session/start")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "awaiting_qr");
        assert!(body["qr"].as_str().is_some_and(|q| !q.is_empty()));

        let response = app.oneshot(get("/api/session/qr")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    }

    #[tokio::test]
    async fn test_session_start_reports_missing_browser() {
        let session = Arc::new(SessionClient::new(
            &SessionConfig::default(),
            FakeLauncher::unavailable("No usable sandbox!"),
        ));
        let app = router(
            state("http://127.0.0.1:1", Some(Backend::Browser(session))).await,
            auth(),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/session/start")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response)
            .await["error"]
            .as_str()
            .is_some_and(|e| e.contains("sandbox")));
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            bind: "localhost".into(),
            port: 5001,
            ..ServerConfig::default()
        };
        assert_eq!(bind_addr(&config).unwrap().to_string(), "127.0.0.1:5001");
    }
}
