use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Row};

use crate::{
    db::{
        helpers::{parse_date, to_u32},
        Database,
    },
    models::DailyEntry,
};

const SELECT_COLUMNS: &str = "SELECT id, date, is_day_off, company_id, vehicle_id, deliveries_count,
        daily_rate, delivery_fee, total_from_deliveries, tips, total_earned,
        start_km, end_km, km_driven
 FROM daily_entries";

fn row_to_entry(row: &Row) -> Result<DailyEntry> {
    let date: String = row.get("date")?;
    let deliveries_count: i64 = row.get("deliveries_count")?;

    Ok(DailyEntry {
        id: row.get("id")?,
        date: parse_date(&date, "date")?,
        is_day_off: row.get("is_day_off")?,
        company_id: row.get("company_id")?,
        vehicle_id: row.get("vehicle_id")?,
        deliveries_count: to_u32(deliveries_count, "deliveries_count")?,
        daily_rate: row.get("daily_rate")?,
        delivery_fee: row.get("delivery_fee")?,
        total_from_deliveries: row.get("total_from_deliveries")?,
        tips: row.get("tips")?,
        total_earned: row.get("total_earned")?,
        start_km: row.get("start_km")?,
        end_km: row.get("end_km")?,
        km_driven: row.get("km_driven")?,
    })
}

impl Database {
    /// Upsert keyed by date; saving the same day twice replaces the entry.
    pub async fn save_daily_entry(&self, entry: &DailyEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO daily_entries (
                    id, date, is_day_off, company_id, vehicle_id, deliveries_count,
                    daily_rate, delivery_fee, total_from_deliveries, tips, total_earned,
                    start_km, end_km, km_driven
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.id,
                    record.date.format("%Y-%m-%d").to_string(),
                    record.is_day_off,
                    record.company_id,
                    record.vehicle_id,
                    i64::from(record.deliveries_count),
                    record.daily_rate,
                    record.delivery_fee,
                    record.total_from_deliveries,
                    record.tips,
                    record.total_earned,
                    record.start_km,
                    record.end_km,
                    record.km_driven,
                ],
            )
            .with_context(|| "failed to save daily entry")?;
            Ok(())
        })
        .await
    }

    pub async fn get_daily_entry(&self, date: NaiveDate) -> Result<Option<DailyEntry>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE date = ?1"))?;
            let mut rows = stmt.query(params![date.format("%Y-%m-%d").to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_entry(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Most recent day first.
    pub async fn list_daily_entries(&self) -> Result<Vec<DailyEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY date DESC"))?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}
