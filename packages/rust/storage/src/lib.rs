//! libSQL profile store (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database for ICP documents,
//! mission documents, and the generation cache.
//!
//! **Write rules:**
//! - Mission writes are version-guarded: every write carries the version
//!   the writer last read, and a mismatch fails with
//!   [`ProspectorError::Conflict`] instead of silently clobbering a
//!   concurrent writer's progress.
//! - `merge_mission` is a shallow read-merge-write: top-level keys in the
//!   partial document replace their counterparts, unrelated keys survive.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde_json::Value;
use uuid::Uuid;

use prospector_shared::{IdealCustomerProfile, ProspectorError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A mission document as read from the store.
#[derive(Debug, Clone)]
pub struct MissionRecord {
    /// The mission payload document.
    pub payload: Value,
    /// Optimistic-concurrency sequence; pass back on write.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ProspectorError::Persistence(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProspectorError::Persistence(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // ICP operations
    // -----------------------------------------------------------------------

    /// Read the current ICP document for a user.
    pub async fn get_icp(&self, user_id: &str) -> Result<Option<IdealCustomerProfile>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json FROM icp_profiles WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let payload: String = row
                    .get(0)
                    .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
                let icp = serde_json::from_str(&payload).map_err(|e| {
                    ProspectorError::Persistence(format!("corrupt ICP document: {e}"))
                })?;
                Ok(Some(icp))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProspectorError::Persistence(e.to_string())),
        }
    }

    /// Write-replace the ICP document for a user.
    pub async fn put_icp(&self, user_id: &str, icp: &IdealCustomerProfile) -> Result<()> {
        self.check_writable()?;
        let payload = serde_json::to_string(icp)
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO icp_profiles (user_id, payload_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   updated_at = excluded.updated_at",
                params![user_id, payload.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mission operations
    // -----------------------------------------------------------------------

    /// Read the current mission document for a `(user, slot)` key.
    pub async fn read_mission(&self, user_id: &str, slot: &str) -> Result<Option<MissionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json, version, created_at, updated_at
                 FROM missions WHERE user_id = ?1 AND slot = ?2",
                params![user_id, slot],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let payload: String = row
                    .get(0)
                    .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
                let payload = serde_json::from_str(&payload).map_err(|e| {
                    ProspectorError::Persistence(format!("corrupt mission document: {e}"))
                })?;
                Ok(Some(MissionRecord {
                    payload,
                    version: row
                        .get(1)
                        .map_err(|e| ProspectorError::Persistence(e.to_string()))?,
                    created_at: row
                        .get(2)
                        .map_err(|e| ProspectorError::Persistence(e.to_string()))?,
                    updated_at: row
                        .get(3)
                        .map_err(|e| ProspectorError::Persistence(e.to_string()))?,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProspectorError::Persistence(e.to_string())),
        }
    }

    /// Create a mission document at version 1. The slot must be empty.
    pub async fn create_mission(&self, user_id: &str, slot: &str, payload: &Value) -> Result<i64> {
        self.check_writable()?;
        let json = payload.to_string();
        let now = Utc::now().to_rfc3339();
        let result = self
            .conn
            .execute(
                "INSERT INTO missions (user_id, slot, payload_json, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![user_id, slot, json.as_str(), now.as_str()],
            )
            .await;

        match result {
            Ok(_) => Ok(1),
            Err(e) if e.to_string().contains("UNIQUE") => Err(ProspectorError::validation(
                format!("mission slot '{slot}' is already occupied"),
            )),
            Err(e) => Err(ProspectorError::Persistence(e.to_string())),
        }
    }

    /// Write-replace the mission document, guarded by the expected version.
    ///
    /// Returns the new version on success; a stale `expected_version` fails
    /// with [`ProspectorError::Conflict`] carrying the actual version.
    pub async fn replace_mission(
        &self,
        user_id: &str,
        slot: &str,
        payload: &Value,
        expected_version: i64,
    ) -> Result<i64> {
        self.check_writable()?;
        let json = payload.to_string();
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE missions SET payload_json = ?1, version = version + 1, updated_at = ?2
                 WHERE user_id = ?3 AND slot = ?4 AND version = ?5",
                params![json.as_str(), now.as_str(), user_id, slot, expected_version],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        if changed == 1 {
            return Ok(expected_version + 1);
        }

        // Zero rows changed: either the slot vanished or the version moved.
        match self.read_mission(user_id, slot).await? {
            Some(record) => Err(ProspectorError::Conflict {
                expected: expected_version,
                actual: record.version,
            }),
            None => Err(ProspectorError::Persistence(format!(
                "mission slot '{slot}' does not exist"
            ))),
        }
    }

    /// Write-merge a partial mission document, guarded by the expected
    /// version. Top-level keys in `partial` replace their counterparts;
    /// unrelated keys are untouched.
    pub async fn merge_mission(
        &self,
        user_id: &str,
        slot: &str,
        partial: &Value,
        expected_version: i64,
    ) -> Result<i64> {
        self.check_writable()?;
        let Some(record) = self.read_mission(user_id, slot).await? else {
            return Err(ProspectorError::Persistence(format!(
                "mission slot '{slot}' does not exist"
            )));
        };
        if record.version != expected_version {
            return Err(ProspectorError::Conflict {
                expected: expected_version,
                actual: record.version,
            });
        }

        let mut merged = record.payload;
        match (&mut merged, partial) {
            (Value::Object(base), Value::Object(update)) => {
                for (key, value) in update {
                    base.insert(key.clone(), value.clone());
                }
            }
            _ => {
                return Err(ProspectorError::validation(
                    "merge requires JSON object documents",
                ));
            }
        }

        self.replace_mission(user_id, slot, &merged, expected_version)
            .await
    }

    /// Delete a mission document, freeing its slot.
    pub async fn delete_mission(&self, user_id: &str, slot: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM missions WHERE user_id = ?1 AND slot = ?2",
                params![user_id, slot],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Generation cache operations
    // -----------------------------------------------------------------------

    /// Get a cached generation result.
    pub async fn get_generation_cache(
        &self,
        user_id: &str,
        prompt_hash: &str,
        model_id: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM generation_cache
                 WHERE user_id = ?1 AND prompt_hash = ?2 AND model_id = ?3",
                params![user_id, prompt_hash, model_id],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let result: String = row
                    .get(0)
                    .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProspectorError::Persistence(e.to_string())),
        }
    }

    /// Store a generation result in the cache (upserts).
    pub async fn set_generation_cache(
        &self,
        user_id: &str,
        prompt_hash: &str,
        model_id: &str,
        result_json: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO generation_cache (id, user_id, prompt_hash, model_id, result_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, prompt_hash, model_id) DO UPDATE SET
                   result_json = excluded.result_json,
                   created_at = excluded.created_at",
                params![id.as_str(), user_id, prompt_hash, model_id, result_json, now.as_str()],
            )
            .await
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        Ok(())
    }
}
