//! SQLite session listings.
//!
//! Implements `SessionQuery`: filters, sort, and pagination are translated to
//! one SELECT over the metadata projection. Message bodies are never read;
//! message count and last message time come from the JSON functions.

use chatvault_core::retry::RetryExecutor;
use chatvault_core::session::repository::SessionQuery;
use chatvault_types::error::StoreError;
use chatvault_types::session::{SessionListOptions, SessionMetadata, SortField, SortOrder};

use super::LIST_TIMEOUT;
use super::document::{MetadataRow, format_datetime, map_sqlx};
use super::pool::DatabasePool;

const PROJECTION: &str = "SELECT id, uid, nm, model_id, ts, end_ts, last_activity, \
     admin_assisted, total_tokens, max_resp_ms, avg_resp_ms, \
     json_array_length(msgs) AS message_count, \
     COALESCE(json_extract(msgs, '$[#-1].ts'), ts) AS last_message_time \
     FROM sessions";

/// SQLite-backed implementation of `SessionQuery`.
pub struct SqliteSessionQuery {
    pool: DatabasePool,
    retry: RetryExecutor,
}

impl SqliteSessionQuery {
    pub fn new(pool: DatabasePool, retry: RetryExecutor) -> Self {
        Self { pool, retry }
    }
}

enum Bind {
    Text(String),
    Bool(bool),
    Int(i64),
}

/// A rendered listing statement and its positional parameters.
struct ListQuery {
    sql: String,
    binds: Vec<Bind>,
}

/// Column (or projection alias) a sort field orders by.
fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::StartTime => "ts",
        SortField::EndTime => "end_ts",
        SortField::MessageCount => "message_count",
        SortField::TotalTokens => "total_tokens",
        SortField::UserId => "uid",
    }
}

fn build_list_query(options: &SessionListOptions) -> ListQuery {
    let mut sql = String::from(PROJECTION);
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut binds = Vec::new();

    if let Some(ref user_id) = options.user_id {
        conditions.push("uid = ?");
        binds.push(Bind::Text(user_id.clone()));
    }
    if let Some(admin_assisted) = options.admin_assisted {
        conditions.push("admin_assisted = ?");
        binds.push(Bind::Bool(admin_assisted));
    }
    match options.active {
        Some(true) => conditions.push("end_ts IS NULL"),
        Some(false) => conditions.push("end_ts IS NOT NULL"),
        None => {}
    }
    if let Some(from) = options.start_time_from {
        conditions.push("ts >= ?");
        binds.push(Bind::Text(format_datetime(&from)));
    }
    if let Some(to) = options.start_time_to {
        conditions.push("ts <= ?");
        binds.push(Bind::Text(format_datetime(&to)));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let order = match options.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let column = sort_column(options.sort_by);
    // id breaks ties so pages never overlap
    sql.push_str(&format!(" ORDER BY {column} {order}, id {order}"));

    // SQLite needs a LIMIT before OFFSET; -1 means no limit.
    let limit = if options.limit == 0 {
        -1
    } else {
        i64::try_from(options.limit).unwrap_or(i64::MAX)
    };
    sql.push_str(" LIMIT ? OFFSET ?");
    binds.push(Bind::Int(limit));
    binds.push(Bind::Int(i64::try_from(options.offset).unwrap_or(i64::MAX)));

    ListQuery { sql, binds }
}

impl SessionQuery for SqliteSessionQuery {
    async fn list_sessions_with_options(
        &self,
        options: &SessionListOptions,
    ) -> Result<Vec<SessionMetadata>, StoreError> {
        let query = build_list_query(options);
        let query = &query;
        let reader = &self.pool.reader;

        let rows = self
            .retry
            .run("ListSessionsWithOptions", LIST_TIMEOUT, move || async move {
                let mut statement = sqlx::query(&query.sql);
                for bind in &query.binds {
                    statement = match bind {
                        Bind::Text(value) => statement.bind(value.as_str()),
                        Bind::Bool(value) => statement.bind(*value),
                        Bind::Int(value) => statement.bind(*value),
                    };
                }
                statement.fetch_all(reader).await.map_err(map_sqlx)
            })
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_row = MetadataRow::from_row(row).map_err(map_sqlx)?;
            sessions.push(metadata_row.into_metadata()?);
        }

        tracing::debug!(
            count = sessions.len(),
            sort_by = options.sort_by.as_logical(),
            "sessions listed"
        );
        Ok(sessions)
    }
}
