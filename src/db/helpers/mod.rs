use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::models::{PaymentType, StopStatus};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| format!("failed to parse {field}"))
}

pub fn parse_stop_status(value: &str) -> Result<StopStatus> {
    match value {
        "pending" => Ok(StopStatus::Pending),
        "confirmed" => Ok(StopStatus::Confirmed),
        "ignored" => Ok(StopStatus::Ignored),
        other => Err(anyhow!("unknown stop status {other}")),
    }
}

pub fn parse_payment_type(value: &str) -> Result<PaymentType> {
    match value {
        "daily" => Ok(PaymentType::Daily),
        "fixed" => Ok(PaymentType::Fixed),
        other => Err(anyhow!("unknown payment type {other}")),
    }
}
