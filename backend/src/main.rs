//! Manufacturing Order Workflow - Backend Server
//!
//! Tracks production orders through the seven-stage workflow from material
//! sourcing to delivery, gating each stage and keeping a document trail.

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod external;
mod handlers;
mod middleware;
mod routes;
mod services;

pub use config::Config;
use external::{DocumentRenderer, LocalDocumentRenderer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mow_server=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::load()?;

    tracing::info!("Starting Manufacturing Order Workflow Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    tracing::info!("Document store: {}", config.documents.base_path);
    let renderer = LocalDocumentRenderer::new(&config.documents.base_path);

    // Create application state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        renderer: Arc::new(renderer),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Manufacturing Order Workflow API v1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            environment: "test".to_string(),
            server: config::ServerConfig::default(),
            database: config::DatabaseConfig {
                url: "postgres://localhost/unused".to_string(),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: config::JwtConfig {
                secret: "test-secret".to_string(),
            },
            documents: config::DocumentsConfig {
                base_path: std::env::temp_dir()
                    .join("mow-router-test")
                    .display()
                    .to_string(),
            },
        };

        let db = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();

        AppState {
            db,
            renderer: Arc::new(LocalDocumentRenderer::new(&config.documents.base_path)),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn test_root() {
        let app = create_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stage_catalog_is_public() {
        let app = create_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stages: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stages.as_array().map(|a| a.len()), Some(7));
        assert_eq!(stages[0]["key"], "sourcing");
        assert_eq!(stages[6]["key"], "delivering");
    }

    #[tokio::test]
    async fn test_orders_require_token() {
        let app = create_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/orders/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_stage_key_is_rejected() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "sub": uuid::Uuid::new_v4().to_string(),
            "exp": now + 3600,
            "iat": now,
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let app = create_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/orders/{}/stages/mixing", uuid::Uuid::new_v4()))
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"regenerate"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
