//! Finalized record of one working day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    /// Same as `date`; one entry per day.
    pub id: String,
    pub date: NaiveDate,
    pub is_day_off: bool,
    pub company_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub deliveries_count: u32,
    pub daily_rate: f64,
    pub delivery_fee: f64,
    pub total_from_deliveries: f64,
    pub tips: f64,
    pub total_earned: f64,
    pub start_km: f64,
    pub end_km: f64,
    pub km_driven: f64,
}

/// What the end-of-day form hands back before totals are derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntryInput {
    pub date: Option<NaiveDate>,
    pub is_day_off: bool,
    pub company_id: Option<String>,
    pub vehicle_id: Option<String>,
    /// Overrides the tracked counter when set.
    pub deliveries_count: Option<u32>,
    pub daily_rate: f64,
    pub delivery_fee: f64,
    pub tips: f64,
    pub start_km: f64,
    pub end_km: f64,
}

impl DailyEntry {
    pub fn from_input(date: NaiveDate, input: DailyEntryInput, tracked_deliveries: u32) -> Self {
        let day_off = input.is_day_off;
        let deliveries_count = if day_off {
            0
        } else {
            input.deliveries_count.unwrap_or(tracked_deliveries)
        };
        let daily_rate = if day_off { 0.0 } else { input.daily_rate };
        let delivery_fee = if day_off { 0.0 } else { input.delivery_fee };
        let total_from_deliveries = f64::from(deliveries_count) * delivery_fee;
        let km_driven = if input.end_km > input.start_km {
            input.end_km - input.start_km
        } else {
            0.0
        };

        Self {
            id: date.format("%Y-%m-%d").to_string(),
            date,
            is_day_off: day_off,
            company_id: if day_off { None } else { input.company_id },
            vehicle_id: if day_off { None } else { input.vehicle_id },
            deliveries_count,
            daily_rate,
            delivery_fee,
            total_from_deliveries,
            tips: input.tips,
            total_earned: daily_rate + total_from_deliveries + input.tips,
            start_km: input.start_km,
            end_km: input.end_km,
            km_driven,
        }
    }
}
