pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{ClimateCatalog, WeatherCatalog};
use crate::config::AppConfig;
use crate::error::WeatherError;
use crate::flower::FlowerRules;
use crate::session::{SessionStore, Slot, StoreLimits};
use protocol::{
    Ack, CellState, ClimateList, CurrentState, DebugInfo, Failure, HealthStatus, SeasonList,
    TransitionResult, WeatherDetail, name_map, states_map,
};

pub const SESSION_COOKIE: &str = "wf_session";

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared, read-only rules and data plus the per-client session store.
pub struct AppState {
    pub rules: FlowerRules,
    pub climates: ClimateCatalog,
    pub weather: WeatherCatalog,
    pub sessions: SessionStore,
    pub default_climate: String,
    pub default_season: String,
    pub debug: bool,
    pub environment: String,
}

impl AppState {
    pub fn new(
        rules: FlowerRules,
        climates: ClimateCatalog,
        weather: WeatherCatalog,
        config: &AppConfig,
    ) -> Self {
        let sessions = SessionStore::new(
            config.app.default_climate.clone(),
            config.app.default_season.clone(),
            StoreLimits {
                idle: Duration::from_secs(config.app.session_idle_secs),
                max_sessions: config.app.max_sessions,
            },
            config.app.dice_seed,
        );
        AppState {
            rules,
            climates,
            weather,
            sessions,
            default_climate: config.app.default_climate.clone(),
            default_season: config.app.default_season.clone(),
            debug: config.server.debug,
            environment: config.environment_name().to_string(),
        }
    }

    /// The caller's `(climate, season)` without issuing a session. A client
    /// with no session sees the configured defaults.
    async fn selection(&self, jar: &CookieJar) -> Option<(String, String)> {
        match self.sessions.find(session_id(jar)).await {
            Some(slot) => {
                let slot = slot.lock().await;
                slot.session
                    .selection()
                    .map(|(c, s)| (c.to_string(), s.to_string()))
            }
            None => Some((self.default_climate.clone(), self.default_season.clone())),
        }
    }
}

/// A request-scoped failure, reported as `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(e: WeatherError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::bad_request(format!("Invalid JSON body: {}", e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Failure::new(self.message))).into_response()
    }
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value().trim()).ok())
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// All API routes over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/climates", get(list_climates))
        .route("/api/seasons", get(list_seasons))
        .route("/api/set-weather", post(set_weather))
        .route("/api/current-state", get(current_state))
        .route("/api/transition", post(transition))
        .route("/api/set-cell", post(set_cell))
        .route("/api/reset", post(reset))
        .route("/api/debug-info", get(debug_info))
        .route("/health", get(health))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the given address.
pub async fn start_server(
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Weather flower API listening on http://{}", addr);
    serve(listener, state).await
}

/// Serve on an already bound listener until it fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Open (or issue) the caller's session, run `f` under that session's lock,
/// and attach the cookie when the session is new.
async fn with_session<T, F>(state: &AppState, jar: CookieJar, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&AppState, &mut Slot) -> Result<T, ApiError>,
{
    let (id, slot, created) = state.sessions.open(session_id(&jar), &state.climates).await;
    let result = {
        let mut slot = slot.lock().await;
        f(state, &mut slot)
    };

    let jar = if created {
        jar.add(session_cookie(id))
    } else {
        jar
    };
    match result {
        Ok(body) => (jar, Json(body)).into_response(),
        Err(e) => {
            debug!(session = %id, status = %e.status, "Request failed: {}", e.message);
            (jar, e).into_response()
        }
    }
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: format!("No route for {}", uri.path()),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        message: "Method not allowed".to_string(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        sessions: state.sessions.len().await,
        climates: state.climates.len(),
    })
}

async fn debug_info(State(state): State<Arc<AppState>>) -> Json<DebugInfo> {
    Json(DebugInfo {
        debug: state.debug,
        environment: state.environment.clone(),
    })
}

async fn list_climates(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<ClimateList> {
    let default_climate = state
        .selection(&jar)
        .await
        .map(|(climate, _)| climate)
        .unwrap_or_else(|| state.default_climate.clone());
    Json(ClimateList {
        success: true,
        climates: name_map(state.climates.list_climates()),
        climate_order: state
            .climates
            .list_climates()
            .map(|(id, _)| id.to_string())
            .collect(),
        default_climate,
    })
}

#[derive(Debug, Deserialize)]
struct SeasonsQuery {
    #[serde(default)]
    climate: Option<String>,
}

async fn list_seasons(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<SeasonsQuery>,
) -> Result<Json<SeasonList>, ApiError> {
    let current = state.selection(&jar).await;
    let climate_id = match query.climate.filter(|c| !c.is_empty()) {
        Some(c) => c,
        None => current
            .as_ref()
            .map(|(c, _)| c.clone())
            .unwrap_or_else(|| state.default_climate.clone()),
    };

    let climate = state.climates.climate(&climate_id)?;
    let seasons = state.climates.list_seasons(&climate_id)?;
    let selected_season = current
        .filter(|(c, _)| *c == climate_id)
        .map(|(_, s)| s);

    Ok(Json(SeasonList {
        success: true,
        season_order: seasons.iter().map(|(id, _)| id.to_string()).collect(),
        seasons: name_map(seasons),
        description: climate.description.clone(),
        selected_season,
    }))
}

#[derive(Debug, Deserialize)]
struct SetWeatherBody {
    #[serde(default)]
    climate: Option<String>,
    #[serde(default)]
    season: Option<String>,
}

async fn set_weather(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<SetWeatherBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(e) => return ApiError::from(e).into_response(),
    };
    with_session(&state, jar, move |state, slot| {
        let (Some(climate), Some(season)) = (
            body.climate.filter(|c| !c.is_empty()),
            body.season.filter(|s| !s.is_empty()),
        ) else {
            return Err(ApiError::bad_request("Climate and season required"));
        };

        let start = slot.session.select_season(&state.climates, &climate, &season)?;
        info!(%climate, %season, start = start.get(), "Weather set");
        Ok(Ack { success: true })
    })
    .await
}

async fn current_state(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    with_session(&state, jar, |state, slot| {
        let session = &slot.session;
        let (climate, season) = session.selection().ok_or(WeatherError::NotReady)?;
        let position = session.position().ok_or(WeatherError::NotReady)?;
        let (assignment, season_description) = state.climates.get_assignment(climate, season)?;
        let label = assignment.label(position);

        Ok(CurrentState {
            success: true,
            climate: climate.to_string(),
            season: season.to_string(),
            season_description: season_description.map(str::to_string),
            cell: position.get(),
            state: label.to_string(),
            detail: WeatherDetail::lookup(&state.weather, label),
            states: states_map(assignment),
        })
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
struct TransitionBody {
    #[serde(default)]
    roll: Option<i64>,
}

async fn transition(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Option<Json<TransitionBody>>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Some(Json(body))) => body,
        Ok(None) => TransitionBody::default(),
        Err(e) => return ApiError::from(e).into_response(),
    };
    with_session(&state, jar, move |state, slot| {
        let Slot { session, dice } = slot;
        let t = match body.roll {
            Some(total) => session.roll_transition(&state.rules, &state.climates, total)?,
            None => session.roll(&state.rules, &state.climates, dice)?,
        };
        debug!(
            from = t.from.get(),
            to = t.to.get(),
            direction = %t.direction,
            total = t.roll.total,
            "Transition"
        );

        Ok(TransitionResult {
            success: true,
            from: t.from.get(),
            cell: t.to.get(),
            direction: t.direction,
            direction_code: t.direction.code(),
            roll: t.roll,
            detail: WeatherDetail::lookup(&state.weather, &t.label),
            state: t.label,
        })
    })
    .await
}

/// `cell` as an integer or a numeric string.
fn cell_field(body: &Value) -> Result<i64, ApiError> {
    let invalid = || ApiError::bad_request("cell must be an integer");
    match body.get("cell") {
        None | Some(Value::Null) => Err(ApiError::bad_request("No cell ID provided")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

async fn set_cell(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let cell = match payload.map_err(ApiError::from).and_then(|Json(body)| cell_field(&body)) {
        Ok(cell) => cell,
        Err(e) => return e.into_response(),
    };
    with_session(&state, jar, move |state, slot| {
        let position = slot.session.jump_to(cell)?;
        cell_state(state, slot, position.get())
    })
    .await
}

async fn reset(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    with_session(&state, jar, |state, slot| {
        let position = slot.session.reset(&state.climates)?;
        cell_state(state, slot, position.get())
    })
    .await
}

fn cell_state(state: &AppState, slot: &Slot, cell: u8) -> Result<CellState, ApiError> {
    let label = slot.session.current_weather(&state.climates)?;
    Ok(CellState {
        success: true,
        cell,
        state: label.to_string(),
        detail: WeatherDetail::lookup(&state.weather, label),
    })
}
