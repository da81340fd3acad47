use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::queries;
use crate::models::format::{fmt_date, fmt_time};
use crate::models::Booking;
use crate::services::mail::{Mailer, OutboundEmail};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    BookingConfirmation { requires_approval: bool },
    BookingCancelled,
    AdminCancellation { reason: String },
    BookingMoved {
        old_date: NaiveDate,
        old_time: NaiveTime,
        reason: String,
    },
    BookingApproved,
    BookingRejected { reason: String },
    WalkReminder,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub booking_id: i64,
    pub recipient: String,
    pub name: String,
    pub dog_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn render(&self) -> OutboundEmail {
        let when = format!("{} at {}", fmt_date(&self.date), fmt_time(&self.time));
        let (subject, detail) = match &self.kind {
            NotificationKind::BookingConfirmation { requires_approval: false } => (
                "Walk booked".to_string(),
                format!("Your walk with {} on {when} is confirmed.", self.dog_name),
            ),
            NotificationKind::BookingConfirmation { requires_approval: true } => (
                "Walk request received".to_string(),
                format!(
                    "Your walk with {} on {when} is waiting for approval. We'll let you know once it has been reviewed.",
                    self.dog_name
                ),
            ),
            NotificationKind::BookingCancelled => (
                "Walk cancelled".to_string(),
                format!("Your walk with {} on {when} has been cancelled.", self.dog_name),
            ),
            NotificationKind::AdminCancellation { reason } => (
                "Walk cancelled by the shelter".to_string(),
                format!(
                    "Your walk with {} on {when} was cancelled by the shelter. Reason: {reason}",
                    self.dog_name
                ),
            ),
            NotificationKind::BookingMoved {
                old_date,
                old_time,
                reason,
            } => (
                "Walk rescheduled".to_string(),
                format!(
                    "Your walk with {} has moved from {} at {} to {when}. Reason: {reason}",
                    self.dog_name,
                    fmt_date(old_date),
                    fmt_time(old_time)
                ),
            ),
            NotificationKind::BookingApproved => (
                "Walk approved".to_string(),
                format!("Your walk with {} on {when} has been approved.", self.dog_name),
            ),
            NotificationKind::BookingRejected { reason } => (
                "Walk request declined".to_string(),
                format!(
                    "Your walk request with {} on {when} was declined. Reason: {reason}",
                    self.dog_name
                ),
            ),
            NotificationKind::WalkReminder => (
                "Upcoming walk reminder".to_string(),
                format!("Reminder: you are walking {} on {when}.", self.dog_name),
            ),
        };

        OutboundEmail {
            to: self.recipient.clone(),
            subject,
            body: format!("Hi {},\n\n{detail}\n", self.name),
        }
    }
}

/// Hands notifications to the dispatcher task. Enqueueing never waits on delivery.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| anyhow::anyhow!("notification dispatcher is not running"))
    }

    /// Resolve the booking's user and dog and enqueue. Errors are returned so batch
    /// callers can decide; request paths use [`Notifier::notify_quietly`].
    pub fn notify_booking(
        &self,
        conn: &Connection,
        booking: &Booking,
        kind: NotificationKind,
    ) -> anyhow::Result<()> {
        let user = queries::get_user(conn, booking.user_id)?
            .with_context(|| format!("user {} not found", booking.user_id))?;
        let dog_name = queries::get_dog(conn, booking.dog_id)?
            .map(|d| d.name)
            .unwrap_or_else(|| "your dog".to_string());

        self.send(Notification {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            recipient: user.email,
            name: user.name,
            dog_name,
            date: booking.date,
            time: booking.scheduled_time,
            kind,
        })
    }

    pub fn notify_quietly(&self, conn: &Connection, booking: &Booking, kind: NotificationKind) {
        if let Err(e) = self.notify_booking(conn, booking, kind) {
            tracing::warn!(booking_id = booking.id, error = %e, "failed to enqueue notification");
        }
    }
}

/// Drains the queue until every `Notifier` is dropped. Each email is retried with
/// backoff before the failure is logged and dropped.
pub async fn run_dispatcher(mut rx: mpsc::UnboundedReceiver<Notification>, mailer: Arc<dyn Mailer>) {
    while let Some(notification) = rx.recv().await {
        deliver(mailer.as_ref(), &notification).await;
    }
    tracing::info!("notification dispatcher stopped");
}

async fn deliver(mailer: &dyn Mailer, notification: &Notification) {
    let email = notification.render();
    for attempt in 1..=MAX_ATTEMPTS {
        match mailer.send_email(&email).await {
            Ok(()) => {
                tracing::debug!(id = %notification.id, booking_id = notification.booking_id, "notification sent");
                return;
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(id = %notification.id, attempt, error = %e, "notification failed, retrying");
                tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    id = %notification.id,
                    booking_id = notification.booking_id,
                    to = %email.to,
                    error = %e,
                    "notification failed, giving up"
                );
            }
        }
    }
}
