use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::format::{
    fmt_date, fmt_datetime, fmt_time, parse_date, parse_datetime, parse_time,
};
use crate::models::settings::{APPROVAL_CUTOFF, BOOKING_ADVANCE_DAYS, CANCELLATION_NOTICE_HOURS};
use crate::models::{
    ApprovalStatus, BlockedDate, Booking, BookingFilter, BookingSettings, BookingStatus,
    BookingTimeRule, DayType, Dog, NewBooking, RuleDraft, SystemSetting, User,
};

/// Slot start as stored: `YYYY-MM-DD HH:MM`, comparable as text.
fn slot_key(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

// ── Users ──

const USER_COLUMNS: &str =
    "id, name, email, experience_level, is_active, is_admin, last_activity_at";

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let last_activity: Option<String> = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        experience_level: row.get(3)?,
        is_active: row.get(4)?,
        is_admin: row.get(5)?,
        last_activity_at: last_activity.as_deref().and_then(parse_datetime),
    })
}

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE api_token = ?1"),
            params![token],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn insert_user(
    conn: &Connection,
    name: &str,
    email: &str,
    experience_level: &str,
    is_admin: bool,
    api_token: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (name, email, experience_level, is_admin, api_token)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, email, experience_level, is_admin, api_token],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_user_active(conn: &Connection, id: i64, is_active: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET is_active = ?1 WHERE id = ?2",
        params![is_active, id],
    )?;
    Ok(count > 0)
}

pub fn touch_user_activity(conn: &Connection, id: i64, now: &NaiveDateTime) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET last_activity_at = ?1 WHERE id = ?2",
        params![fmt_datetime(now), id],
    )?;
    Ok(())
}

// ── Dogs ──

pub fn get_dog(conn: &Connection, id: i64) -> anyhow::Result<Option<Dog>> {
    let dog = conn
        .query_row(
            "SELECT id, name, category, is_available FROM dogs WHERE id = ?1",
            params![id],
            |row| {
                Ok(Dog {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    is_available: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(dog)
}

pub fn insert_dog(
    conn: &Connection,
    name: &str,
    category: &str,
    is_available: bool,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO dogs (name, category, is_available) VALUES (?1, ?2, ?3)",
        params![name, category, is_available],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, dog_id, date, scheduled_time, status, approval_status, \
     requires_approval, approved_by, approved_at, rejection_reason, admin_cancellation_reason, \
     user_notes, completed_at, cancelled_at, reminder_sent_at, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: i64 = row.get(0)?;
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let approval_str: String = row.get(6)?;
    let created_at_str: String = row.get(16)?;
    let updated_at_str: String = row.get(17)?;

    let opt_datetime = |idx: usize| -> rusqlite::Result<Option<NaiveDateTime>> {
        let raw: Option<String> = row.get(idx)?;
        Ok(raw.as_deref().and_then(parse_datetime))
    };

    Ok(Booking {
        id,
        user_id: row.get(1)?,
        dog_id: row.get(2)?,
        date: parse_date(&date_str)
            .with_context(|| format!("booking {id} has invalid date {date_str:?}"))?,
        scheduled_time: parse_time(&time_str)
            .with_context(|| format!("booking {id} has invalid time {time_str:?}"))?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("booking {id} has unknown status {status_str:?}"))?,
        approval_status: ApprovalStatus::parse(&approval_str)
            .with_context(|| format!("booking {id} has unknown approval status {approval_str:?}"))?,
        requires_approval: row.get(7)?,
        approved_by: row.get(8)?,
        approved_at: opt_datetime(9)?,
        rejection_reason: row.get(10)?,
        admin_cancellation_reason: row.get(11)?,
        user_notes: row.get(12)?,
        completed_at: opt_datetime(13)?,
        cancelled_at: opt_datetime(14)?,
        reminder_sent_at: opt_datetime(15)?,
        created_at: parse_datetime(&created_at_str)
            .with_context(|| format!("booking {id} has invalid created_at"))?,
        updated_at: parse_datetime(&updated_at_str)
            .with_context(|| format!("booking {id} has invalid updated_at"))?,
    })
}

fn collect_bookings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Inserts a scheduled booking. Fails with a UNIQUE violation if the walk slot is
/// already held by another scheduled booking.
pub fn insert_booking(
    conn: &Connection,
    booking: &NewBooking,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    let now = fmt_datetime(now);
    conn.execute(
        "INSERT INTO bookings (user_id, dog_id, date, scheduled_time, status, approval_status, requires_approval, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            booking.user_id,
            booking.dog_id,
            fmt_date(&booking.date),
            fmt_time(&booking.scheduled_time),
            BookingStatus::Scheduled.as_str(),
            booking.initial_approval_status().as_str(),
            booking.requires_approval,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn has_active_booking(
    conn: &Connection,
    dog_id: i64,
    date: &NaiveDate,
    time: &NaiveTime,
    excluding: Option<i64>,
) -> anyhow::Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM bookings
         WHERE dog_id = ?1 AND date = ?2 AND scheduled_time = ?3 AND status = 'scheduled'
           AND (?4 IS NULL OR id != ?4)",
        params![dog_id, fmt_date(date), fmt_time(time), excluding],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let date = filter.date.as_ref().map(fmt_date);
    let status = filter.status.map(|s| s.as_str());
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR dog_id = ?2)
               AND (?3 IS NULL OR date = ?3)
               AND (?4 IS NULL OR status = ?4)
             ORDER BY date DESC, scheduled_time DESC
             LIMIT ?5"
        ),
        params![filter.user_id, filter.dog_id, date, status, filter.limit],
    )
}

pub fn get_bookings_in_range(
    conn: &Connection,
    user_id: Option<i64>,
    start: &NaiveDate,
    end: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR user_id = ?3)
             ORDER BY date ASC, scheduled_time ASC"
        ),
        params![fmt_date(start), fmt_date(end), user_id],
    )
}

pub fn list_pending_bookings(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE approval_status = 'pending' AND status = 'scheduled'
             ORDER BY date ASC, scheduled_time ASC"
        ),
        params![],
    )
}

pub fn scheduled_bookings_on(conn: &Connection, date: &NaiveDate) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE date = ?1 AND status = 'scheduled'
             ORDER BY scheduled_time ASC"
        ),
        params![fmt_date(date)],
    )
}

/// Conditional on the booking still awaiting review; returns false if no row changed.
pub fn approve_booking(
    conn: &Connection,
    id: i64,
    reviewer_id: i64,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(now);
    let count = conn.execute(
        "UPDATE bookings
         SET approval_status = 'approved', approved_by = ?1, approved_at = ?2, updated_at = ?2
         WHERE id = ?3 AND approval_status = 'pending' AND status = 'scheduled'",
        params![reviewer_id, now, id],
    )?;
    Ok(count > 0)
}

/// Rejection also cancels the booking, releasing its walk slot.
pub fn reject_booking(
    conn: &Connection,
    id: i64,
    reviewer_id: i64,
    reason: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(now);
    let count = conn.execute(
        "UPDATE bookings
         SET approval_status = 'rejected', status = 'cancelled', approved_by = ?1, approved_at = ?2,
             rejection_reason = ?3, admin_cancellation_reason = ?3, cancelled_at = ?2, updated_at = ?2
         WHERE id = ?4 AND approval_status = 'pending' AND status = 'scheduled'",
        params![reviewer_id, now, reason, id],
    )?;
    Ok(count > 0)
}

/// Fails with a UNIQUE violation when the target slot is taken.
pub fn move_booking(
    conn: &Connection,
    id: i64,
    date: &NaiveDate,
    time: &NaiveTime,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET date = ?1, scheduled_time = ?2, reminder_sent_at = NULL, updated_at = ?3
         WHERE id = ?4 AND status = 'scheduled'",
        params![fmt_date(date), fmt_time(time), fmt_datetime(now), id],
    )?;
    Ok(count > 0)
}

pub fn cancel_booking(
    conn: &Connection,
    id: i64,
    admin_reason: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(now);
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'cancelled', admin_cancellation_reason = COALESCE(?1, admin_cancellation_reason),
             cancelled_at = ?2, updated_at = ?2
         WHERE id = ?3 AND status = 'scheduled'",
        params![admin_reason, now, id],
    )?;
    Ok(count > 0)
}

pub fn set_user_notes(
    conn: &Connection,
    id: i64,
    notes: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET user_notes = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'completed'",
        params![notes, fmt_datetime(now), id],
    )?;
    Ok(count > 0)
}

/// Marks every scheduled booking whose start is strictly before `now` as completed.
pub fn complete_elapsed_bookings(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'completed', completed_at = ?1, updated_at = ?1
         WHERE status = 'scheduled' AND (date || ' ' || scheduled_time) < ?2",
        params![fmt_datetime(now), slot_key(now)],
    )?;
    Ok(count)
}

/// Scheduled bookings starting within `[from, to]` that have not had a reminder yet.
pub fn bookings_due_for_reminder(
    conn: &Connection,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE status = 'scheduled' AND reminder_sent_at IS NULL
               AND (date || ' ' || scheduled_time) >= ?1
               AND (date || ' ' || scheduled_time) <= ?2
             ORDER BY date ASC, scheduled_time ASC"
        ),
        params![slot_key(from), slot_key(to)],
    )
}

/// Set-once, and only while the booking is still scheduled.
pub fn mark_reminder_sent(conn: &Connection, id: i64, now: &NaiveDateTime) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET reminder_sent_at = ?1
         WHERE id = ?2 AND status = 'scheduled' AND reminder_sent_at IS NULL",
        params![fmt_datetime(now), id],
    )?;
    Ok(count > 0)
}

// ── Blocked dates ──

fn parse_blocked_row(row: &rusqlite::Row) -> anyhow::Result<BlockedDate> {
    let date_str: String = row.get(1)?;
    let created_at_str: String = row.get(4)?;
    Ok(BlockedDate {
        id: row.get(0)?,
        date: parse_date(&date_str)
            .with_context(|| format!("blocked date has invalid date {date_str:?}"))?,
        reason: row.get(2)?,
        created_by: row.get(3)?,
        created_at: parse_datetime(&created_at_str)
            .with_context(|| format!("blocked date {date_str} has invalid created_at"))?,
    })
}

/// Fails with a UNIQUE violation if the date is already blocked.
pub fn insert_blocked_date(
    conn: &Connection,
    date: &NaiveDate,
    reason: &str,
    admin_id: i64,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO blocked_dates (date, reason, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![fmt_date(date), reason, admin_id, fmt_datetime(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_blocked_date(conn: &Connection, date: &NaiveDate) -> anyhow::Result<Option<BlockedDate>> {
    let result = conn.query_row(
        "SELECT id, date, reason, created_by, created_at FROM blocked_dates WHERE date = ?1",
        params![fmt_date(date)],
        |row| Ok(parse_blocked_row(row)),
    );

    match result {
        Ok(blocked) => Ok(Some(blocked?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_blocked_dates(
    conn: &Connection,
    start: Option<&NaiveDate>,
    end: Option<&NaiveDate>,
) -> anyhow::Result<Vec<BlockedDate>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, reason, created_by, created_at FROM blocked_dates
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(
        params![start.map(fmt_date), end.map(fmt_date)],
        |row| Ok(parse_blocked_row(row)),
    )?;

    let mut blocked = vec![];
    for row in rows {
        blocked.push(row??);
    }
    Ok(blocked)
}

pub fn delete_blocked_date(conn: &Connection, date: &NaiveDate) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM blocked_dates WHERE date = ?1",
        params![fmt_date(date)],
    )?;
    Ok(count > 0)
}

// ── Time rules ──

fn parse_rule_row(row: &rusqlite::Row) -> anyhow::Result<BookingTimeRule> {
    let id: i64 = row.get(0)?;
    let day_type_str: String = row.get(1)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    Ok(BookingTimeRule {
        id,
        day_type: DayType::parse(&day_type_str)
            .with_context(|| format!("rule {id} has unknown day type {day_type_str:?}"))?,
        rule_name: row.get(2)?,
        start_time: parse_time(&start_str)
            .with_context(|| format!("rule {id} has invalid start_time {start_str:?}"))?,
        end_time: parse_time(&end_str)
            .with_context(|| format!("rule {id} has invalid end_time {end_str:?}"))?,
        is_blocked: row.get(5)?,
        description: row.get(6)?,
    })
}

pub fn list_time_rules(
    conn: &Connection,
    day_type: Option<DayType>,
) -> anyhow::Result<Vec<BookingTimeRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, day_type, rule_name, start_time, end_time, is_blocked, description
         FROM booking_time_rules
         WHERE (?1 IS NULL OR day_type = ?1)
         ORDER BY day_type ASC, start_time ASC",
    )?;
    let rows = stmt.query_map(params![day_type.map(|d| d.as_str())], |row| {
        Ok(parse_rule_row(row))
    })?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row??);
    }
    Ok(rules)
}

pub fn get_time_rule(conn: &Connection, id: i64) -> anyhow::Result<Option<BookingTimeRule>> {
    let result = conn.query_row(
        "SELECT id, day_type, rule_name, start_time, end_time, is_blocked, description
         FROM booking_time_rules WHERE id = ?1",
        params![id],
        |row| Ok(parse_rule_row(row)),
    );

    match result {
        Ok(rule) => Ok(Some(rule?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_time_rule(conn: &Connection, draft: &RuleDraft) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_time_rules (day_type, rule_name, start_time, end_time, is_blocked, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            draft.day_type.as_str(),
            draft.rule_name.trim(),
            fmt_time(&draft.start_time),
            fmt_time(&draft.end_time),
            draft.is_blocked,
            draft.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_time_rule(conn: &Connection, id: i64, draft: &RuleDraft) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE booking_time_rules
         SET day_type = ?1, rule_name = ?2, start_time = ?3, end_time = ?4, is_blocked = ?5, description = ?6
         WHERE id = ?7",
        params![
            draft.day_type.as_str(),
            draft.rule_name.trim(),
            fmt_time(&draft.start_time),
            fmt_time(&draft.end_time),
            draft.is_blocked,
            draft.description,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_time_rule(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM booking_time_rules WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Settings ──

pub fn get_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM system_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn list_settings(conn: &Connection) -> anyhow::Result<Vec<SystemSetting>> {
    let mut stmt =
        conn.prepare("SELECT key, value, updated_at FROM system_settings ORDER BY key ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(SystemSetting {
            key: row.get(0)?,
            value: row.get(1)?,
            updated_at: row.get(2)?,
        })
    })?;

    let mut settings = vec![];
    for row in rows {
        settings.push(row?);
    }
    Ok(settings)
}

pub fn load_booking_settings(conn: &Connection) -> anyhow::Result<BookingSettings> {
    let mut pairs = vec![];
    for key in [BOOKING_ADVANCE_DAYS, CANCELLATION_NOTICE_HOURS, APPROVAL_CUTOFF] {
        if let Some(value) = get_setting(conn, key)? {
            pairs.push((key.to_string(), value));
        }
    }
    Ok(BookingSettings::from_pairs(&pairs))
}

pub fn upsert_setting(
    conn: &Connection,
    key: &str,
    value: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO system_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, fmt_datetime(now)],
    )?;
    Ok(())
}
