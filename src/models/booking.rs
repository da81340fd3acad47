use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::format::hhmm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub dog_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub scheduled_time: NaiveTime,
    pub status: BookingStatus,
    pub approval_status: ApprovalStatus,
    pub requires_approval: bool,
    pub approved_by: Option<i64>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub admin_cancellation_reason: Option<String>,
    pub user_notes: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub reminder_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.scheduled_time)
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == BookingStatus::Scheduled
    }
}

/// A booking that passed admission and is about to be inserted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub dog_id: i64,
    pub date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub requires_approval: bool,
}

impl NewBooking {
    pub fn initial_approval_status(&self) -> ApprovalStatus {
        if self.requires_approval {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(BookingStatus::Scheduled),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Pending,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ApprovalStatus::Approved),
            "pending" => Some(ApprovalStatus::Pending),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

/// Filters for listing bookings. `user_id` is forced to the caller for non-admins.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<i64>,
    pub dog_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
    pub limit: i64,
}
