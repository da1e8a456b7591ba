use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use match_core::{ClockSnapshot, MatchRecord, MoveEntry, Outcome};

use crate::store::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct GameRow {
    game_id: Uuid,
    time_control: String,
    time_limit: Option<i32>,
    spectator_link: Option<String>,
    is_private: bool,
    move_history: Json<Vec<MoveEntry>>,
    winner: Option<String>,
    white_time: Option<i32>,
    black_time: Option<i32>,
    current_turn: String,
    timer_started: bool,
    created_at: DateTime<Utc>,
}

const GAME_COLUMNS: &str = "game_id, time_control, time_limit, spectator_link, is_private, \
     move_history, winner, white_time, black_time, current_turn, timer_started, created_at";

impl TryFrom<GameRow> for MatchRecord {
    type Error = StoreError;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        let id = row.game_id;
        let corrupt = move |e: match_core::ParseError| StoreError::Corrupt(format!("{id}: {e}"));
        Ok(MatchRecord {
            id,
            time_control: row.time_control.parse().map_err(corrupt)?,
            time_limit: row.time_limit.map(to_u32),
            spectator_link: row.spectator_link,
            is_private: row.is_private,
            move_history: row.move_history.0,
            white_seconds: row.white_time.map(to_u32),
            black_seconds: row.black_time.map(to_u32),
            current_turn: row.current_turn.parse().map_err(corrupt)?,
            clock_started: row.timer_started,
            outcome: row.winner.as_deref().map(str::parse).transpose().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

fn to_u32(v: i32) -> u32 {
    v.max(0) as u32
}

fn to_column(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

pub async fn insert_match(pool: &PgPool, record: &MatchRecord) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO games (game_id, time_control, time_limit, spectator_link, is_private, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(record.id)
    .bind(record.time_control.as_str())
    .bind(record.time_limit.map(to_column))
    .bind(&record.spectator_link)
    .bind(record.is_private)
    .bind(record.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_match(pool: &PgPool, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
    let query = format!("SELECT {GAME_COLUMNS} FROM games WHERE game_id = $1");
    let row: Option<GameRow> = sqlx::query_as(&query)
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    row.map(MatchRecord::try_from).transpose()
}

/// Public matches without an outcome, newest first.
pub async fn list_open(pool: &PgPool) -> Result<Vec<MatchRecord>, StoreError> {
    let query = format!(
        "SELECT {GAME_COLUMNS} FROM games \
         WHERE is_private = false AND winner IS NULL \
         ORDER BY created_at DESC"
    );
    let rows: Vec<GameRow> = sqlx::query_as(&query).fetch_all(pool).await?;
    rows.into_iter().map(MatchRecord::try_from).collect()
}

/// Replace the ledger and write the clock fields alongside it.
pub async fn save_moves(
    pool: &PgPool,
    match_id: Uuid,
    moves: &[MoveEntry],
    clock: &ClockSnapshot,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"UPDATE games SET
               move_history = $1,
               white_time = COALESCE($2, white_time),
               black_time = COALESCE($3, black_time),
               current_turn = $4,
               timer_started = timer_started OR $5
           WHERE game_id = $6"#,
    )
    .bind(Json(moves))
    .bind(clock.white_seconds.map(to_column))
    .bind(clock.black_seconds.map(to_column))
    .bind(clock.current_turn.as_str())
    .bind(clock.clock_started)
    .bind(match_id)
    .execute(pool)
    .await?;
    expect_row(result.rows_affected(), match_id)
}

pub async fn save_clock(
    pool: &PgPool,
    match_id: Uuid,
    clock: &ClockSnapshot,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"UPDATE games SET
               white_time = COALESCE($1, white_time),
               black_time = COALESCE($2, black_time),
               current_turn = $3,
               timer_started = timer_started OR $4
           WHERE game_id = $5"#,
    )
    .bind(clock.white_seconds.map(to_column))
    .bind(clock.black_seconds.map(to_column))
    .bind(clock.current_turn.as_str())
    .bind(clock.clock_started)
    .bind(match_id)
    .execute(pool)
    .await?;
    expect_row(result.rows_affected(), match_id)
}

/// Write-once: only fills a NULL winner. Returns false if one was already set.
pub async fn record_outcome(
    pool: &PgPool,
    match_id: Uuid,
    outcome: Outcome,
) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE games SET winner = $1 WHERE game_id = $2 AND winner IS NULL")
        .bind(outcome.as_str())
        .bind(match_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

fn expect_row(rows: u64, match_id: Uuid) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::NotFound(match_id));
    }
    Ok(())
}
