//! Read-only HTTP endpoints beside the WebSocket: health, catalog, ledger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use concierge_core::ids::{ReservationId, RoomTypeId};
use concierge_engine::{BookingError, ReservationFilter};

use crate::server::AppState;

/// A [`BookingError`] rendered as an HTTP response.
pub struct ApiError(BookingError);

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            BookingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.error_kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let provider = &state.services.provider;
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "activeSessions": state.sessions.len(),
        "connectedClients": state.clients.count(),
        "roomTypes": state.services.catalog().len(),
        "llmProvider": provider.name(),
        "model": provider.model(),
    }))
}

pub async fn room_types(State(state): State<AppState>) -> impl IntoResponse {
    let room_types = state.services.catalog().list_room_types();
    Json(json!({
        "roomTypes": room_types,
        "total": room_types.len(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservationQuery {
    pub include_cancelled: bool,
    pub room_type: Option<String>,
}

pub async fn reservations(
    State(state): State<AppState>,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room_type = match query.room_type {
        Some(raw) => {
            let id = RoomTypeId::from_raw(raw);
            state.services.catalog().get(&id)?;
            Some(id)
        }
        None => None,
    };
    let filter = ReservationFilter {
        include_cancelled: query.include_cancelled,
        room_type,
    };
    let list = state.services.ledger.list_reservations(&filter);
    Ok(Json(json!({
        "total": list.len(),
        "reservations": list,
    })))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reservation = state
        .services
        .ledger
        .cancel(&ReservationId::from_raw(id))?;
    tracing::info!(reservation_id = %reservation.id, "Reservation cancelled via HTTP");
    Ok(Json(json!({ "reservation": reservation })))
}
