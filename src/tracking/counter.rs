use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::db::Database;

/// The day's delivery count. Automatic detection, audit confirmations and
/// manual taps all go through the same mutex; every change is written through
/// to the database before the lock is released.
#[derive(Clone)]
pub struct DeliveryCounter {
    value: Arc<Mutex<u32>>,
    db: Database,
}

impl DeliveryCounter {
    pub async fn load(db: Database) -> Result<Self> {
        let value = db.load_delivery_count().await?;
        Ok(Self {
            value: Arc::new(Mutex::new(value)),
            db,
        })
    }

    pub async fn get(&self) -> u32 {
        *self.value.lock().await
    }

    pub async fn increment(&self) -> Result<u32> {
        self.update(|value| value.saturating_add(1)).await
    }

    /// Never goes below zero.
    pub async fn decrement(&self) -> Result<u32> {
        self.update(|value| value.saturating_sub(1)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.update(|_| 0).await.map(|_| ())
    }

    async fn update(&self, apply: impl FnOnce(u32) -> u32) -> Result<u32> {
        let mut guard = self.value.lock().await;
        let next = apply(*guard);
        if next != *guard {
            self.db.store_delivery_count(next).await?;
            *guard = next;
        }
        Ok(next)
    }
}
