use chrono::NaiveDate;
use serde::Serialize;

use super::booking::Booking;

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub bookings: Vec<Booking>,
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}
