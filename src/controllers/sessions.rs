use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{CinemaError, CinemaResult, Entity};
use crate::models::UpcomingSession;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_upcoming).post(create_session))
        .route("/sessions/{id}/seats", get(get_seat_map))
        .route("/sessions/{id}/availability", get(get_availability))
        .route("/sessions/{id}/reconcile", post(reconcile_session))
}

/* ---------- helpers ---------- */

// Названия фильмов и залов повторяются между сеансами, ходим за ними один раз
#[derive(Default)]
struct NameLookup {
    movies: HashMap<i64, String>,
    halls: HashMap<i64, String>,
}

impl NameLookup {
    async fn movie(&mut self, state: &AppState, id: i64) -> CinemaResult<String> {
        if let Some(name) = self.movies.get(&id) {
            return Ok(name.clone());
        }
        let movie = state
            .store
            .movie(id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Movie, id))?;
        self.movies.insert(id, movie.name.clone());
        Ok(movie.name)
    }

    async fn hall(&mut self, state: &AppState, id: i64) -> CinemaResult<String> {
        if let Some(name) = self.halls.get(&id) {
            return Ok(name.clone());
        }
        let hall = state
            .store
            .hall(id)
            .await?
            .ok_or_else(|| CinemaError::not_found(Entity::Hall, id))?;
        self.halls.insert(id, hall.name.clone());
        Ok(hall.name)
    }
}

/* ---------- SESSIONS ---------- */

// GET /api/sessions
#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    now: Option<DateTime<Utc>>,
}

async fn list_upcoming(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpcomingQuery>,
) -> Result<impl IntoResponse, CinemaError> {
    // Кешируем только витрину "на сейчас", запросы с явным now идут мимо кеша
    let use_cache = params.now.is_none();
    let now = params.now.unwrap_or_else(Utc::now);

    let mut generation = None;
    if use_cache {
        if let Some(cached) = state.cache.get_upcoming(now).await {
            return Ok(Json(cached));
        }
        generation = state.cache.upcoming_generation().await;
    }

    let mut names = NameLookup::default();
    let mut upcoming = Vec::new();
    let mut sessions = state.scheduler.list_upcoming_with_availability(now);
    while let Some(session) = sessions.try_next().await? {
        let movie_name = names.movie(&state, session.movie_id).await?;
        let hall_name = names.hall(&state, session.hall_id).await?;
        upcoming.push(UpcomingSession {
            session,
            movie_name,
            hall_name,
        });
    }

    if let Some(generation) = &generation {
        state.cache.save_upcoming(&upcoming, generation).await;
    }
    Ok(Json(upcoming))
}

// POST /api/sessions
#[derive(Debug, Deserialize, Validate)]
struct CreateSessionRequest {
    #[validate(range(min = 1))]
    movie_id: i64,
    #[validate(range(min = 1))]
    hall_id: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    super::validate(&req)?;

    let session = state
        .scheduler
        .create_session(req.movie_id, req.hall_id, req.starts_at, req.ends_at)
        .await?;
    state.cache.invalidate_upcoming().await;

    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/sessions/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, CinemaError> {
    if let Some(cached) = state.cache.get_seat_map(session_id).await {
        return Ok(Json(cached));
    }

    // Поколение до чтения: бронь, закоммиченная после него, не даст записать карту
    let generation = state.cache.seat_map_generation(session_id).await;
    let seat_map = state.availability.seat_map(session_id).await?;
    if let Some(generation) = &generation {
        state.cache.save_seat_map(&seat_map, generation).await;
    }
    Ok(Json(seat_map))
}

// GET /api/sessions/{id}/availability
#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    #[serde(default)]
    verify: bool,
}

async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, CinemaError> {
    let seats_available = if params.verify {
        state.availability.verify(session_id).await?.stored
    } else {
        state.availability.seats_available(session_id).await?
    };

    Ok(Json(serde_json::json!({
        "session_id": session_id,
        "seats_available": seats_available,
        "verified": params.verify,
    })))
}

// POST /api/sessions/{id}/reconcile
async fn reconcile_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, CinemaError> {
    let report = state.engine.reconcile(session_id).await?;
    if report.drifted() {
        state.cache.invalidate_session(session_id).await;
    }
    Ok(Json(report))
}
