use serde::{Deserialize, Serialize};

use super::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PaymentType {
    /// Paid a daily rate plus a fee per delivery.
    #[default]
    Daily,
    /// Fixed monthly payment; only the per-delivery fee counts per day.
    Fixed,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Daily => "daily",
            PaymentType::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Depot used as the tracking origin; tracking cannot start without it.
    pub base_location: Option<Coordinate>,
    pub payment_type: PaymentType,
    pub daily_rate: f64,
    pub delivery_fee: f64,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_location: None,
            payment_type: PaymentType::Daily,
            daily_rate: 0.0,
            delivery_fee: 0.0,
        }
    }

    pub fn with_base_location(mut self, base: Coordinate) -> Self {
        self.base_location = Some(base);
        self
    }

    /// Daily rate to prefill for a new entry. Fixed-pay companies earn no daily rate.
    pub fn default_daily_rate(&self) -> f64 {
        match self.payment_type {
            PaymentType::Daily => self.daily_rate,
            PaymentType::Fixed => 0.0,
        }
    }
}
