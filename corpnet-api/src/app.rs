/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use corpnet_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = corpnet_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use corpnet_shared::auth::{context::AuthContext, jwt};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Secret used to verify access tokens
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── /health                               public
/// └── /v1/                                  bearer access token
///     ├── /contacts                         GET
///     ├── /contact-requests                 GET, POST
///     │   ├── /:id                          DELETE
///     │   ├── /:id/accept                   POST
///     │   └── /:id/reject                   POST
///     ├── /events/:kind                     GET
///     │   ├── /dashboard                    GET
///     │   ├── /:id/parties/:role            GET, PUT
///     │   ├── /:id/stats                    GET
///     │   └── /:id/stats/refresh            POST
///     └── /notifications                    GET
///         └── /:id/read                     POST
/// ```
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let contact_routes = Router::new()
        .route("/contacts", get(routes::contacts::list_contacts))
        .route(
            "/contact-requests",
            get(routes::contacts::list_requests).post(routes::contacts::send_request),
        )
        .route("/contact-requests/:id", delete(routes::contacts::delete_request))
        .route("/contact-requests/:id/accept", post(routes::contacts::accept_request))
        .route("/contact-requests/:id/reject", post(routes::contacts::reject_request));

    let event_routes = Router::new()
        .route("/events/:kind", get(routes::events::list_events))
        .route("/events/:kind/dashboard", get(routes::events::dashboard))
        .route(
            "/events/:kind/:id/parties/:role",
            get(routes::parties::list_parties).put(routes::parties::replace_parties),
        )
        .route("/events/:kind/:id/stats", get(routes::stats::get_stats))
        .route("/events/:kind/:id/stats/refresh", post(routes::stats::refresh_stats));

    let notification_routes = Router::new()
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/:id/read", post(routes::notifications::mark_read));

    let v1_routes = Router::new()
        .merge(contact_routes)
        .merge(event_routes)
        .merge(notification_routes)
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let cors = if state.config.api.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn bearer_token(req: &Request) -> Result<&str, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))
}

/// Validates the bearer access token and stores an [`AuthContext`] in the
/// request extensions
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = jwt::validate_access_token(bearer_token(&req)?, state.jwt_secret())?;

    let auth = AuthContext::from_claims(&claims);
    tracing::debug!(
        user_id = %auth.user_id,
        account_id = %auth.account_id,
        "Authenticated request"
    );
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
