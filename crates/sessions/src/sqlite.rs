//! SQLite-backed session store.
//!
//! One row per session plus one row per message, keyed by `(session_id, seq)`.
//! Each turn is written in a single transaction so a session never holds a
//! user message without its reply.

use std::path::Path;

use async_trait::async_trait;
use babysquad_common::{Message, MessageRole, Result, RoutingDecision, SquadError};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{ConnectOptions, Row};
use tracing::{debug, info};

use crate::state::{ConversationState, SessionSummary};
use crate::store::ConversationStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id            TEXT PRIMARY KEY,
    last_routing_decision TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    session_id   TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    seq          INTEGER NOT NULL,
    role         TEXT NOT NULL,
    text         TEXT NOT NULL,
    citations    TEXT NOT NULL DEFAULT '[]',
    source_agent TEXT,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (session_id, seq)
);
"#;

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> SquadError {
    move |e| SquadError::Session(format!("{context}: {e}"))
}

/// Fixed-width UTC so stored timestamps sort as text.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SquadError::Session(format!("Invalid timestamp '{value}': {e}")))
}

fn parse_decision(value: Option<String>) -> Result<Option<RoutingDecision>> {
    value
        .map(|v| {
            RoutingDecision::parse(&v)
                .ok_or_else(|| SquadError::Session(format!("Unknown routing decision '{v}'")))
        })
        .transpose()
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.try_get("role").map_err(db_err("Bad message row"))?;
    let role = MessageRole::parse(&role)
        .ok_or_else(|| SquadError::Session(format!("Unknown message role '{role}'")))?;
    let text: String = row.try_get("text").map_err(db_err("Bad message row"))?;
    let citations: String = row.try_get("citations").map_err(db_err("Bad message row"))?;
    let source_agent: Option<String> = row.try_get("source_agent").map_err(db_err("Bad message row"))?;
    let created_at: String = row.try_get("created_at").map_err(db_err("Bad message row"))?;

    let mut message = Message::new(role, text)
        .with_citations(serde_json::from_str(&citations)?)
        .with_created_at(parse_time(&created_at)?);
    if let Some(agent) = source_agent {
        message = message.with_agent(agent);
    }
    Ok(message)
}

pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        info!(path = %db_path.display(), "Opening session database");

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to session database"))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_err("Failed to create session schema"))?;

        debug!("Session database ready");
        Ok(Self { pool })
    }

    /// Checkpoint the WAL and close the pool.
    pub async fn close(self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to flush WAL"))?;
        self.pool.close().await;
        info!("Session database closed");
        Ok(())
    }

    async fn insert_session_if_missing<'e, E>(executor: E, session_id: &str) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let now = format_time(Utc::now());
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (session_id, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await
        .map_err(db_err("Failed to create session"))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn get_or_create(&self, session_id: &str) -> Result<ConversationState> {
        Self::insert_session_if_missing(&self.pool, session_id).await?;
        self.load(session_id)
            .await?
            .ok_or_else(|| SquadError::Session(format!("Session '{session_id}' vanished after creation")))
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let Some(session) = sqlx::query(
            "SELECT last_routing_decision, created_at, updated_at FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to load session"))?
        else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT role, text, citations, source_agent, created_at
            FROM messages
            WHERE session_id = ?
            ORDER BY seq
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load messages"))?;

        let history = rows.iter().map(message_from_row).collect::<Result<Vec<_>>>()?;
        let created_at: String = session.try_get("created_at").map_err(db_err("Bad session row"))?;
        let updated_at: String = session.try_get("updated_at").map_err(db_err("Bad session row"))?;

        Ok(Some(ConversationState::from_parts(
            session_id.to_string(),
            history,
            parse_decision(session.try_get("last_routing_decision").map_err(db_err("Bad session row"))?)?,
            parse_time(&created_at)?,
            parse_time(&updated_at)?,
        )))
    }

    async fn append_turn(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
        decision: RoutingDecision,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin turn"))?;

        // write first so the transaction holds the lock before reading seq
        Self::insert_session_if_missing(&mut *tx, session_id).await?;

        let next_seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err("Failed to read sequence"))?;

        for (offset, message) in [&user, &assistant].into_iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO messages (session_id, seq, role, text, citations, source_agent, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(next_seq + offset as i64)
            .bind(message.role().as_str())
            .bind(message.text())
            .bind(serde_json::to_string(message.source_citations())?)
            .bind(message.source_agent())
            .bind(format_time(message.created_at()))
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert message"))?;
        }

        sqlx::query("UPDATE sessions SET last_routing_decision = ?, updated_at = ? WHERE session_id = ?")
            .bind(decision.as_str())
            .bind(format_time(Utc::now()))
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to update session"))?;

        tx.commit().await.map_err(db_err("Failed to commit turn"))?;

        debug!(session_id, seq = next_seq, decision = %decision, "Turn persisted");
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.session_id, s.last_routing_decision, s.updated_at, COUNT(m.seq) AS message_count
            FROM sessions s
            LEFT JOIN messages m ON m.session_id = s.session_id
            GROUP BY s.session_id
            ORDER BY s.updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list sessions"))?;

        rows.iter()
            .map(|row| {
                let updated_at: String = row.try_get("updated_at").map_err(db_err("Bad session row"))?;
                let count: i64 = row.try_get("message_count").map_err(db_err("Bad session row"))?;
                Ok(SessionSummary {
                    session_id: row.try_get("session_id").map_err(db_err("Bad session row"))?,
                    message_count: count as usize,
                    last_routing_decision: parse_decision(
                        row.try_get("last_routing_decision").map_err(db_err("Bad session row"))?,
                    )?,
                    updated_at: parse_time(&updated_at)?,
                })
            })
            .collect()
    }
}
