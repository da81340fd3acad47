use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedDate {
    pub id: i64,
    pub date: NaiveDate,
    pub reason: String,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
}

/// Outcome of blocking a date: how many scheduled bookings existed versus how many were cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub blocked_date: BlockedDate,
    pub affected_count: usize,
    pub cancelled_count: usize,
}
