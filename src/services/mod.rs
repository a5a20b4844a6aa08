/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Server-side countdown for active questions.
pub mod question_timer;
/// Core quiz session engine.
pub mod quiz_service;
/// Room event emission helpers.
pub mod room_events;
/// Storage connection supervision and degraded-mode tracking.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
