use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::Row;
use tokio::sync::RwLock;

use crate::{database::DatabasePool, error::ApiError};

/// Named slots of durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSlot {
    Scans,
    ScanResults,
    ScanConfig,
}

impl StateSlot {
    pub const ALL: [StateSlot; 3] = [
        StateSlot::Scans,
        StateSlot::ScanResults,
        StateSlot::ScanConfig,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StateSlot::Scans => "scans",
            StateSlot::ScanResults => "scan_results",
            StateSlot::ScanConfig => "scan_config",
        }
    }
}

impl std::fmt::Display for StateSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[async_trait]
pub trait StateStore {
    /// Read a slot. `Ok(None)` means the slot has never been written.
    async fn load(&self, slot: StateSlot) -> Result<Option<Value>, ApiError>;
    async fn save(&self, slot: StateSlot, value: &Value) -> Result<(), ApiError>;
    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn load_typed<T, S>(store: &S, slot: StateSlot) -> Result<Option<T>, ApiError>
where
    T: DeserializeOwned,
    S: StateStore + Send + Sync + ?Sized,
{
    match store.load(slot).await? {
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            ApiError::persistence(format!("Failed to decode slot '{}': {}", slot, e))
        }),
        None => Ok(None),
    }
}

pub async fn save_typed<T, S>(store: &S, slot: StateSlot, value: &T) -> Result<(), ApiError>
where
    T: Serialize + ?Sized,
    S: StateStore + Send + Sync + ?Sized,
{
    let value = serde_json::to_value(value)?;
    store.save(slot, &value).await
}

pub struct SqlxStateStore {
    pool: DatabasePool,
}

impl SqlxStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqlxStateStore {
    async fn load(&self, slot: StateSlot) -> Result<Option<Value>, ApiError> {
        let row = sqlx::query(
            r#"
            SELECT payload
            FROM state_slots
            WHERE slot = ?1
            "#,
        )
        .bind(slot.key())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                let value = serde_json::from_str(&payload).map_err(|e| {
                    ApiError::persistence(format!("Corrupt payload in slot '{}': {}", slot, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, slot: StateSlot, value: &Value) -> Result<(), ApiError> {
        let payload = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO state_slots (slot, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (slot)
            DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(slot.key())
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        crate::database::health_check(&self.pool).await
    }
}

/// Process-local store. Writes can be made to fail to exercise degraded
/// persistence paths.
#[derive(Default)]
pub struct InMemoryStateStore {
    slots: RwLock<HashMap<StateSlot, Value>>,
    fail_writes: AtomicBool,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn raw(&self, slot: StateSlot) -> Option<Value> {
        self.slots.read().await.get(&slot).cloned()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, slot: StateSlot) -> Result<Option<Value>, ApiError> {
        Ok(self.slots.read().await.get(&slot).cloned())
    }

    async fn save(&self, slot: StateSlot, value: &Value) -> Result<(), ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::persistence(format!(
                "Write to slot '{}' rejected",
                slot
            )));
        }
        self.slots.write().await.insert(slot, value.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::persistence("In-memory store is read-only"));
        }
        Ok(())
    }
}
