use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per match, created before anyone connects
CREATE TABLE IF NOT EXISTS games (
    game_id        UUID PRIMARY KEY,
    time_control   TEXT NOT NULL DEFAULT 'unlimited',
    time_limit     INTEGER,
    spectator_link TEXT,
    is_private     BOOLEAN NOT NULL DEFAULT false,
    move_history   JSONB NOT NULL DEFAULT '[]'::jsonb,
    winner         TEXT,
    white_time     INTEGER,
    black_time     INTEGER,
    current_turn   TEXT NOT NULL DEFAULT 'white',
    timer_started  BOOLEAN NOT NULL DEFAULT false,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_games_open
    ON games (created_at DESC)
    WHERE is_private = false AND winner IS NULL;

-- Chat transcript
CREATE TABLE IF NOT EXISTS chat_messages (
    id         BIGSERIAL PRIMARY KEY,
    game_id    UUID NOT NULL REFERENCES games(game_id) ON DELETE CASCADE,
    sender     TEXT NOT NULL,
    message    TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_game
    ON chat_messages (game_id, created_at);
"#;
