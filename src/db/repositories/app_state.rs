//! Small key/value rows that outlive a tracking session.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

const DELIVERY_COUNT_KEY: &str = "delivery_count";

impl Database {
    pub async fn load_delivery_count(&self) -> Result<u32> {
        self.execute(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM app_state WHERE key = ?1",
                    params![DELIVERY_COUNT_KEY],
                    |row| row.get(0),
                )
                .optional()?;

            match raw {
                Some(value) => value
                    .parse::<u32>()
                    .with_context(|| format!("invalid stored delivery count '{value}'")),
                None => Ok(0),
            }
        })
        .await
    }

    pub async fn store_delivery_count(&self, count: u32) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO app_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![DELIVERY_COUNT_KEY, count.to_string()],
            )
            .with_context(|| "failed to store delivery count")?;
            Ok(())
        })
        .await
    }
}
