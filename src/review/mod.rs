//! Audit of detected stops. A driver confirms each pending stop (one
//! delivery) or ignores it (false positive).

use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    db::Database,
    models::{Stop, StopStatus},
    platform::Notifier,
    tracking::DeliveryCounter,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReviewDecision {
    Confirm,
    Ignore,
}

impl ReviewDecision {
    fn target_status(self) -> StopStatus {
        match self {
            ReviewDecision::Confirm => StopStatus::Confirmed,
            ReviewDecision::Ignore => StopStatus::Ignored,
        }
    }
}

#[derive(Clone)]
pub struct StopReview {
    db: Database,
    counter: DeliveryCounter,
    notifier: Arc<dyn Notifier>,
}

impl StopReview {
    pub fn new(db: Database, counter: DeliveryCounter, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            counter,
            notifier,
        }
    }

    pub async fn pending(&self) -> Result<Vec<Stop>> {
        self.db.list_stops_by_status(StopStatus::Pending).await
    }

    pub async fn list_by_status(&self, status: StopStatus) -> Result<Vec<Stop>> {
        self.db.list_stops_by_status(status).await
    }

    /// Applies `decision` to a pending stop. Unknown ids and stops already
    /// decided are left alone and return `false`; the counter only moves when
    /// a pending stop actually becomes confirmed.
    pub async fn decide(&self, stop_id: &str, decision: ReviewDecision) -> Result<bool> {
        let changed = self
            .db
            .update_stop_status(stop_id, decision.target_status())
            .await?;
        if !changed {
            debug!("Stop {stop_id} is not pending; {decision:?} ignored");
            return Ok(false);
        }

        if decision == ReviewDecision::Confirm {
            let count = self.counter.increment().await?;
            self.notifier.notify_success();
            info!("Stop {stop_id} confirmed, {count} deliveries today");
        }
        Ok(true)
    }

    pub async fn confirm(&self, stop_id: &str) -> Result<bool> {
        self.decide(stop_id, ReviewDecision::Confirm).await
    }

    pub async fn ignore(&self, stop_id: &str) -> Result<bool> {
        self.decide(stop_id, ReviewDecision::Ignore).await
    }

    pub async fn clear_all(&self) -> Result<usize> {
        self.db.clear_stops().await
    }
}
