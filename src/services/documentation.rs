use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quizwire Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::start_quiz,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSummary,
            crate::dto::room::ParticipantSummary,
            crate::dto::quiz::QuestionHostView,
            crate::dto::quiz::LeaderboardEntry,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dao::models::RoomStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Quiz session control for rooms"),
        (name = "quiz", description = "WebSocket operations for quiz participants"),
    )
)]
pub struct ApiDoc;
