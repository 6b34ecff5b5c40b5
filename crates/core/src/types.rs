/// Runs are identified by random UUIDs.
pub type RunId = uuid::Uuid;

/// Connected notification clients are identified by random UUIDs.
pub type ClientId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
