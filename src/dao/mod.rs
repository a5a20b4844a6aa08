/// Persisted entity definitions shared across storage backends.
pub mod models;
/// Quiz state storage and retrieval operations.
pub mod quiz_store;
/// Storage abstraction layer for database operations.
pub mod storage;
