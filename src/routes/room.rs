use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{dto::room::RoomSummary, error::AppError, services::quiz_service, state::SharedState};

/// Routes handling quiz session control for rooms.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{id}/start", post(start_quiz))
}

/// Start the quiz for a waiting room and broadcast the begin signal.
#[utoipa::path(
    post,
    path = "/rooms/{id}/start",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room to start")),
    responses(
        (status = 200, description = "Quiz session started", body = RoomSummary),
        (status = 404, description = "Room does not exist"),
        (status = 409, description = "Room already started or has no connected participants"),
        (status = 503, description = "Storage backend unavailable")
    )
)]
pub async fn start_quiz(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = quiz_service::start_quiz(&state, id).await?;
    Ok(Json(summary))
}
