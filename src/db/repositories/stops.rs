use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{helpers::parse_stop_status, Database},
    models::{Coordinate, Stop, StopStatus},
};

fn row_to_stop(row: &Row) -> Result<Stop> {
    let status: String = row.get("status")?;

    Ok(Stop {
        id: row.get("id")?,
        timestamp: row.get("timestamp_ms")?,
        location: Coordinate::new(row.get("latitude")?, row.get("longitude")?),
        status: parse_stop_status(&status)?,
    })
}

impl Database {
    pub async fn insert_stop(&self, stop: &Stop) -> Result<()> {
        let record = stop.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO stops (id, timestamp_ms, latitude, longitude, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.timestamp,
                    record.location.latitude,
                    record.location.longitude,
                    record.status.as_str(),
                ],
            )
            .with_context(|| "failed to insert stop")?;
            Ok(())
        })
        .await
    }

    #[cfg(test)]
    pub async fn get_stop(&self, stop_id: &str) -> Result<Option<Stop>> {
        let stop_id = stop_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp_ms, latitude, longitude, status
                 FROM stops
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![stop_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_stop(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Stops with `status`, oldest first.
    pub async fn list_stops_by_status(&self, status: StopStatus) -> Result<Vec<Stop>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp_ms, latitude, longitude, status
                 FROM stops
                 WHERE status = ?1
                 ORDER BY timestamp_ms ASC",
            )?;

            let mut rows = stmt.query(params![status.as_str()])?;
            let mut stops = Vec::new();
            while let Some(row) = rows.next()? {
                stops.push(row_to_stop(row)?);
            }

            Ok(stops)
        })
        .await
    }

    /// Moves a pending stop to `status`. Returns `false` when no pending stop
    /// has that id, so a stop is never counted twice.
    pub async fn update_stop_status(&self, stop_id: &str, status: StopStatus) -> Result<bool> {
        let stop_id = stop_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE stops
                     SET status = ?1
                     WHERE id = ?2 AND status = 'pending'",
                    params![status.as_str(), stop_id],
                )
                .with_context(|| "failed to update stop status")?;
            Ok(rows_affected > 0)
        })
        .await
    }

    #[cfg(test)]
    pub async fn count_stops_by_status(&self, status: StopStatus) -> Result<u64> {
        self.execute(move |conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT COUNT(*) FROM stops WHERE status = ?1",
                    params![status.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0).max(0) as u64)
        })
        .await
    }

    pub async fn clear_stops(&self) -> Result<usize> {
        self.execute(|conn| {
            conn.execute("DELETE FROM stops", [])
                .with_context(|| "failed to clear stops")
        })
        .await
    }
}
