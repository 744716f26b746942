//! SQL migration definitions for the Prospector database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: icp_profiles, missions, generation_cache",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ideal customer profiles, one document per user
CREATE TABLE IF NOT EXISTS icp_profiles (
    user_id      TEXT PRIMARY KEY,
    payload_json TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- Mission documents, one per (user, slot), version-guarded writes
CREATE TABLE IF NOT EXISTS missions (
    user_id      TEXT NOT NULL,
    slot         TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    version      INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (user_id, slot)
);

-- Generation result cache, so resumed missions never re-pay an LLM call
CREATE TABLE IF NOT EXISTS generation_cache (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    prompt_hash TEXT NOT NULL,
    model_id    TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE(user_id, prompt_hash, model_id)
);

CREATE INDEX IF NOT EXISTS idx_generation_cache_user ON generation_cache(user_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
