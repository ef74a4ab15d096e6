use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::catalog::store::KeyCatalog;
use crate::cli::ServeArgs;
use crate::core::character::State as CharacterState;
use crate::core::types::{CharacterId, CharacterKind, KeyId, Narrowing, Selection};
use crate::matching::engine::{
    CandidateEngine, EngineConfig, Outcome, Progress, RemainingTaxa, SelectionView,
    DEFAULT_PREVIEW_LIMIT,
};
use crate::matching::navigator::{
    BackOutcome, Header, KeyNavigator, NavOption, NavigatorConfig, NavigatorError, Transition,
    DEFAULT_MAX_KEY_DEPTH, DEFAULT_START_KEY,
};
use crate::utils::validation::{validate_key_id, ValidationError, MAX_SESSION_STEPS};

/// Largest remaining-taxa preview a client may ask for
pub const MAX_PREVIEW_LIMIT: usize = 1_000;

/// Request bodies are small JSON documents
pub const MAX_BODY_SIZE: usize = 256 * 1024; // 256KB

/// Shared application state
pub struct AppState {
    pub catalog: KeyCatalog,
}

/// Enhanced error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    // Log detailed error server-side for debugging (not exposed to client)
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to prevent information disclosure
    }
}

fn error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    (
        status,
        Json(create_safe_error_response(error_type, message, None)),
    )
        .into_response()
}

fn validation_error_response(error: &ValidationError) -> Response {
    let error_type = match error {
        ValidationError::TooManySteps => "too_many_steps",
        _ => "invalid_key_id",
    };
    error_response(StatusCode::BAD_REQUEST, error_type, &error.to_string())
}

/// One observation replayed by the multi-access endpoint.
///
/// Serialized as `{"character": "habit", "state": "habit-tree"}` or
/// `{"character": "leaf-length", "numeric": 55.0}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub character: CharacterId,
    #[serde(flatten)]
    pub selection: Selection,
}

#[derive(Debug, Default, Deserialize)]
pub struct MultiSessionRequest {
    /// Selections in the order they were made
    #[serde(default)]
    pub selections: Vec<SelectionRequest>,
    /// Remaining-taxa preview size
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A relevant character with the states a client can offer
#[derive(Debug, Serialize)]
pub struct CharacterChoice {
    pub id: CharacterId,
    pub name: String,
    pub kind: CharacterKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<CharacterState>,
}

#[derive(Debug, Serialize)]
pub struct MultiSessionResponse {
    pub key_id: KeyId,
    pub title: String,
    /// Effect of each replayed selection, in request order
    pub steps: Vec<Narrowing>,
    pub remaining: RemainingTaxa,
    pub relevant_characters: Vec<CharacterChoice>,
    pub selections: Vec<SelectionView>,
    pub outcome: Outcome,
    pub progress: Progress,
}

/// One step replayed by the dichotomous endpoint: `{"choose": 0}`, `"back"` or `"reset"`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStep {
    /// Take the option at this zero-based index
    Choose(usize),
    Back,
    Reset,
}

#[derive(Debug, Default, Deserialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub steps: Vec<NavigationStep>,
    /// Cap on linked keys followed (never above the server default)
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Result of the final step of a replay
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LastStep {
    Choose(Transition),
    Back(BackOutcome),
    Reset { reset: bool },
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    pub header: Header,
    pub trail: Vec<KeyId>,
    pub options: Vec<NavOption>,
    pub dead_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_step: Option<LastStep>,
    /// Linked keys that could not be entered during the replay
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the tokio runtime cannot be
/// created, or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let catalog = crate::cli::load_catalog(args.catalog.as_deref(), false)?;

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args, catalog).await })
}

/// API routes without middleware
pub fn api_router(catalog: KeyCatalog) -> Router {
    let state = Arc::new(AppState { catalog });

    Router::new()
        .route("/", get(index_handler))
        .route("/api/keys", get(keys_handler))
        .route("/api/multi/{key_id}/session", post(multi_session_handler))
        .route(
            "/api/dichotomous/{key_id}/navigate",
            post(navigate_handler),
        )
        .with_state(state)
}

/// Create the application router with all routes and middleware configured.
///
/// Rate limiting is keyed by peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is rejected.
pub fn create_router(catalog: KeyCatalog) -> anyhow::Result<Router> {
    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?;

    // Build router with comprehensive security layers
    let app = api_router(catalog).layer(
        ServiceBuilder::new()
            // Security headers for browser protection
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("x-frame-options"),
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("1; mode=block"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("strict-transport-security"),
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ))
            // IP-based rate limiting to prevent abuse
            .layer(GovernorLayer {
                config: Arc::new(governor_conf),
            })
            // Request timeout to prevent slow client attacks
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(30),
            ))
            // Limit concurrent requests to prevent DOS
            .layer(ConcurrencyLimitLayer::new(100))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
    );

    Ok(app)
}

async fn run_server(args: ServeArgs, catalog: KeyCatalog) -> anyhow::Result<()> {
    let key_count = catalog.len();
    let app = create_router(catalog)?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting key-solver web server at http://{addr} ({key_count} keys)");

    if args.open {
        let _ = open::that(format!("http://{addr}"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Main page handler
async fn index_handler() -> Html<&'static str> {
    Html(include_str!("templates/index.html"))
}

/// Both key listings, the default start key first among the dichotomous keys
async fn keys_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let multi = state.catalog.list_multi_keys();
    let dichotomous = state
        .catalog
        .list_dichotomous_keys(&KeyId::new(DEFAULT_START_KEY));

    Json(serde_json::json!({
        "count": multi.len() + dichotomous.len(),
        "multi_access": multi,
        "dichotomous": dichotomous,
    }))
}

/// Replay a multi-access session on a fresh engine
async fn multi_session_handler(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
    Json(request): Json<MultiSessionRequest>,
) -> Response {
    let key_id = match validate_key_id(&key_id) {
        Ok(id) => KeyId::new(id),
        Err(e) => return validation_error_response(&e),
    };
    if request.selections.len() > MAX_SESSION_STEPS {
        return validation_error_response(&ValidationError::TooManySteps);
    }
    let Some(key) = state.catalog.multi_access(&key_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "key_not_found",
            "Multi-access key not found",
        );
    };

    let limit = request
        .limit
        .unwrap_or(DEFAULT_PREVIEW_LIMIT)
        .min(MAX_PREVIEW_LIMIT);
    let mut engine = CandidateEngine::with_config(
        key,
        EngineConfig {
            preview_limit: limit,
        },
    );

    let steps: Vec<Narrowing> = request
        .selections
        .iter()
        .map(|s| engine.choose(&s.character, &s.selection))
        .collect();

    let relevant_characters = engine
        .relevant_characters()
        .into_iter()
        .map(|character| CharacterChoice {
            id: character.id.clone(),
            name: key.character_display_name(&character.id),
            kind: character.kind,
            states: engine
                .states_of(&character.id)
                .into_iter()
                .cloned()
                .collect(),
        })
        .collect();

    Json(MultiSessionResponse {
        key_id: key.id.clone(),
        title: key.title.clone(),
        steps,
        remaining: engine.preview(),
        relevant_characters,
        selections: engine.selections(),
        outcome: engine.outcome(),
        progress: engine.progress(),
    })
    .into_response()
}

/// Replay a dichotomous navigation on a fresh navigator
async fn navigate_handler(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> Response {
    let key_id = match validate_key_id(&key_id) {
        Ok(id) => KeyId::new(id),
        Err(e) => return validation_error_response(&e),
    };
    if request.steps.len() > MAX_SESSION_STEPS {
        return validation_error_response(&ValidationError::TooManySteps);
    }

    let config = NavigatorConfig {
        start_key: key_id,
        max_depth: request
            .max_depth
            .unwrap_or(DEFAULT_MAX_KEY_DEPTH)
            .min(DEFAULT_MAX_KEY_DEPTH),
    };
    let mut navigator = match KeyNavigator::new(&state.catalog, config) {
        Ok(navigator) => navigator,
        Err(e) => {
            return error_response(StatusCode::NOT_FOUND, "key_not_found", &e.to_string());
        }
    };

    let mut last_step = None;
    let mut warnings = Vec::new();
    for (position, step) in request.steps.iter().enumerate() {
        last_step = match *step {
            NavigationStep::Choose(index) => match navigator.choose_option(index) {
                Ok(transition) => Some(LastStep::Choose(transition)),
                Err(
                    e @ (NavigatorError::LinkedKeyNotFound { .. }
                    | NavigatorError::DepthExceeded(_)),
                ) => {
                    warnings.push(e.to_string());
                    None
                }
                Err(e) => {
                    let message = format!("Step {position}: {e}");
                    return error_response(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "invalid_step",
                        &message,
                    );
                }
            },
            NavigationStep::Back => Some(LastStep::Back(navigator.back())),
            NavigationStep::Reset => {
                navigator.reset();
                Some(LastStep::Reset { reset: true })
            }
        };
    }

    Json(NavigateResponse {
        header: navigator.header(),
        trail: navigator.trail().into_iter().cloned().collect(),
        options: navigator.options(),
        dead_end: navigator.is_dead_end(),
        last_step,
        warnings,
    })
    .into_response()
}
