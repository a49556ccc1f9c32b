use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// A todo item. Serialized the same way for API responses and for the copy
/// embedded in its list's `tasks` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct Task {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub title: String,
    pub description: String,
    pub status: i32,
}

/// A list and the embedded copies of its tasks. The owner never leaves the server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct List {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip)]
    pub username: String,
    pub title: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, FromRow)]
pub struct ListRow {
    pub id: Uuid,
    pub username: String,
    pub title: String,
    pub tasks: Json<Vec<Task>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ListRow> for List {
    fn from(r: ListRow) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            username: r.username,
            title: r.title,
            tasks: r.tasks.0,
        }
    }
}

/// Current time at the microsecond precision Postgres keeps, so the column
/// copy and the JSON copy of a timestamp compare equal.
pub fn timestamp() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
