use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::models::{
    ActorRole, Booking, BookingNote, BookingStatus, Cancellation, ContactInfo, Coordinates,
    Location, Notification, NotificationType, ParticipantPair, Priority, Professional,
    ServiceType, Slot, UnreadCounts,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

// ── Professionals ──

pub fn get_professional(conn: &Connection, id: &str) -> anyhow::Result<Option<Professional>> {
    let row = conn
        .query_row(
            "SELECT id, display_name, hourly_rate, services, availability, timezone, phone
             FROM professionals WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, display_name, hourly_rate, services_json, availability, timezone, phone)) = row
    else {
        return Ok(None);
    };

    let services: Vec<ServiceType> = serde_json::from_str(&services_json)
        .with_context(|| format!("invalid services list for professional {id}"))?;

    Ok(Some(Professional {
        id,
        display_name,
        hourly_rate,
        services,
        availability,
        timezone,
        phone,
    }))
}

pub fn save_professional(conn: &Connection, pro: &Professional) -> anyhow::Result<()> {
    let services = serde_json::to_string(&pro.services)?;
    conn.execute(
        "INSERT INTO professionals (id, display_name, hourly_rate, services, availability, timezone, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           display_name = excluded.display_name,
           hourly_rate = excluded.hourly_rate,
           services = excluded.services,
           availability = excluded.availability,
           timezone = excluded.timezone,
           phone = excluded.phone,
           updated_at = datetime('now')",
        params![
            pro.id,
            pro.display_name,
            pro.hourly_rate,
            services,
            pro.availability,
            pro.timezone,
            pro.phone,
        ],
    )?;
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, professional_id, service_type, scheduled_start, \
     duration_minutes, scheduled_end, address, latitude, longitude, contact_phone, contact_email, \
     status, priority, estimated_cost, cancellation_reason, cancelled_at, refund_requested, \
     created_at, last_updated";

const ACTIVE_STATUSES_SQL: &str = "('pending', 'confirmed', 'in_progress')";

/// Inserts a booking row and its initial notes. The overlap trigger makes a
/// conflicting insert fail; see [`is_slot_conflict`].
pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    let (latitude, longitude) = match &booking.location.coordinates {
        Some(c) => (Some(c.lat), Some(c.lng)),
        None => (None, None),
    };

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            booking.id,
            booking.customer_id,
            booking.professional_id,
            booking.service_type.as_str(),
            format_ts(&booking.scheduled_start),
            booking.duration_minutes,
            format_ts(&booking.scheduled_end),
            booking.location.address,
            latitude,
            longitude,
            booking.contact_info.phone,
            booking.contact_info.email,
            booking.status.as_str(),
            booking.priority.as_str(),
            booking.estimated_cost,
            booking.cancellation.as_ref().and_then(|c| c.cancellation_reason.clone()),
            booking.cancellation.as_ref().map(|c| format_ts(&c.cancelled_at)),
            booking.cancellation.as_ref().map(|c| c.refund_requested).unwrap_or(false),
            format_ts(&booking.created_at),
            format_ts(&booking.last_updated),
        ],
    )?;

    for note in &booking.notes {
        insert_note(conn, &booking.id, note)?;
    }
    Ok(())
}

/// True when `err` came from the `bookings_no_overlap` trigger.
pub fn is_slot_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation && msg.contains("slot conflict")
    )
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    match result {
        Some(booking) => {
            let mut booking = booking?;
            booking.notes = get_notes(conn, &booking.id)?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

/// Active bookings of `professional_id` overlapping `slot`. Notes are not loaded.
pub fn get_active_bookings_overlapping(
    conn: &Connection,
    professional_id: &str,
    slot: &Slot,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE professional_id = ?1
           AND status IN {ACTIVE_STATUSES_SQL}
           AND scheduled_start < ?3
           AND scheduled_end > ?2
         ORDER BY scheduled_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            professional_id,
            format_ts(&slot.start()),
            format_ts(&slot.end())
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    /// Restrict to bookings where the actor holds this role.
    pub role: Option<ActorRole>,
    pub limit: i64,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            status: None,
            role: None,
            limit: 50,
        }
    }
}

pub fn list_bookings_for_actor(
    conn: &Connection,
    actor_id: &str,
    filter: &BookingFilter,
) -> anyhow::Result<Vec<Booking>> {
    let party_clause = match filter.role {
        Some(ActorRole::Customer) => "customer_id = ?1",
        Some(ActorRole::Professional) => "professional_id = ?1",
        Some(ActorRole::Outsider) => return Ok(vec![]),
        None => "(customer_id = ?1 OR professional_id = ?1)",
    };

    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match filter.status {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {party_clause} AND status = ?2 \
                 ORDER BY scheduled_start DESC LIMIT ?3"
            ),
            vec![
                Box::new(actor_id.to_string()),
                Box::new(status.as_str()),
                Box::new(filter.limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {party_clause} \
                 ORDER BY scheduled_start DESC LIMIT ?2"
            ),
            vec![Box::new(actor_id.to_string()), Box::new(filter.limit)],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        let mut booking = row??;
        booking.notes = get_notes(conn, &booking.id)?;
        bookings.push(booking);
    }
    Ok(bookings)
}

/// Writes `next` only if the stored status still equals `expected`.
/// Returns false when another writer got there first.
pub fn compare_and_set_status(
    conn: &Connection,
    id: &str,
    expected: BookingStatus,
    next: BookingStatus,
    cancellation: Option<&Cancellation>,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = match cancellation {
        Some(c) => conn.execute(
            "UPDATE bookings SET status = ?1, last_updated = ?2,
               cancellation_reason = ?3, cancelled_at = ?4, refund_requested = ?5
             WHERE id = ?6 AND status = ?7",
            params![
                next.as_str(),
                format_ts(now),
                c.cancellation_reason,
                format_ts(&c.cancelled_at),
                c.refund_requested,
                id,
                expected.as_str(),
            ],
        )?,
        None => conn.execute(
            "UPDATE bookings SET status = ?1, last_updated = ?2 WHERE id = ?3 AND status = ?4",
            params![next.as_str(), format_ts(now), id, expected.as_str()],
        )?,
    };
    Ok(count > 0)
}

pub fn touch_booking(conn: &Connection, id: &str, now: &DateTime<Utc>) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET last_updated = ?1 WHERE id = ?2",
        params![format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn insert_note(conn: &Connection, booking_id: &str, note: &BookingNote) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO booking_notes (booking_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![booking_id, note.author, note.text, format_ts(&note.timestamp)],
    )?;
    Ok(())
}

pub fn get_notes(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<BookingNote>> {
    let mut stmt = conn.prepare(
        "SELECT author, text, created_at FROM booking_notes WHERE booking_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut notes = vec![];
    for row in rows {
        let (author, text, created_at) = row?;
        notes.push(BookingNote {
            author,
            text,
            timestamp: parse_ts(&created_at)?,
        });
    }
    Ok(notes)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let service_str: String = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(6)?;
    let latitude: Option<f64> = row.get(8)?;
    let longitude: Option<f64> = row.get(9)?;
    let status_str: String = row.get(12)?;
    let priority_str: String = row.get(13)?;
    let cancellation_reason: Option<String> = row.get(15)?;
    let cancelled_at_str: Option<String> = row.get(16)?;
    let refund_requested: bool = row.get(17)?;
    let created_at_str: String = row.get(18)?;
    let last_updated_str: String = row.get(19)?;

    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("unknown status {status_str:?} on booking {id}"))?;
    let service_type = ServiceType::parse(&service_str)
        .with_context(|| format!("unknown service type {service_str:?} on booking {id}"))?;
    let priority = Priority::parse(&priority_str)
        .with_context(|| format!("unknown priority {priority_str:?} on booking {id}"))?;

    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
        _ => None,
    };

    let cancellation = match (status, cancelled_at_str) {
        (BookingStatus::Cancelled, Some(at)) => Some(Cancellation {
            cancellation_reason,
            cancelled_at: parse_ts(&at)?,
            refund_requested,
        }),
        _ => None,
    };

    Ok(Booking {
        customer_id: row.get(1)?,
        professional_id: row.get(2)?,
        service_type,
        scheduled_start: parse_ts(&start_str)?,
        duration_minutes: row.get(5)?,
        scheduled_end: parse_ts(&end_str)?,
        location: Location {
            address: row.get(7)?,
            coordinates,
        },
        contact_info: ContactInfo {
            phone: row.get(10)?,
            email: row.get(11)?,
        },
        status,
        priority,
        estimated_cost: row.get(14)?,
        notes: vec![],
        cancellation,
        created_at: parse_ts(&created_at_str)?,
        last_updated: parse_ts(&last_updated_str)?,
        id,
    })
}

// ── Chats ──

pub fn find_chat_by_pair(conn: &Connection, pair: &ParticipantPair) -> anyhow::Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM chats WHERE participant_a = ?1 AND participant_b = ?2",
            params![pair.first(), pair.second()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_chat(
    conn: &Connection,
    id: &str,
    pair: &ParticipantPair,
    booking_id: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO chats (id, participant_a, participant_b, chat_type, booking_id)
         VALUES (?1, ?2, ?3, 'booking', ?4)",
        params![id, pair.first(), pair.second(), booking_id],
    )?;
    for participant in [pair.first(), pair.second()] {
        conn.execute(
            "INSERT OR IGNORE INTO chat_participants (chat_id, participant_id) VALUES (?1, ?2)",
            params![id, participant],
        )?;
    }
    Ok(())
}

/// Links a booking to a chat and points the chat at it. Returns false when
/// the link already existed.
pub fn link_chat_booking(conn: &Connection, chat_id: &str, booking_id: &str) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO chat_bookings (chat_id, booking_id) VALUES (?1, ?2)",
        params![chat_id, booking_id],
    )?;
    conn.execute(
        "UPDATE chats SET booking_id = ?1 WHERE id = ?2",
        params![booking_id, chat_id],
    )?;
    Ok(inserted > 0)
}

pub fn get_chat_bookings(conn: &Connection, chat_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id FROM chat_bookings WHERE chat_id = ?1 ORDER BY linked_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![chat_id], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn count_chats(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))?)
}

pub fn increment_unread(conn: &Connection, chat_id: &str, participant: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO chat_participants (chat_id, participant_id, unread_count) VALUES (?1, ?2, 1)
         ON CONFLICT(chat_id, participant_id) DO UPDATE SET unread_count = unread_count + 1",
        params![chat_id, participant],
    )?;
    Ok(())
}

pub fn get_unread_counts(conn: &Connection, chat_id: &str) -> anyhow::Result<UnreadCounts> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, unread_count FROM chat_participants WHERE chat_id = ?1",
    )?;
    let rows = stmt.query_map(params![chat_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut counts = UnreadCounts::default();
    for row in rows {
        let (participant, count) = row?;
        counts.set(&participant, count);
    }
    Ok(counts)
}

// ── Notifications ──

pub fn insert_notification(conn: &Connection, n: &Notification) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, recipient, kind, title, message, related_booking_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            n.id,
            n.recipient,
            n.kind.as_str(),
            n.title,
            n.message,
            n.related_booking_id,
            n.read,
            format_ts(&n.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_notifications(
    conn: &Connection,
    recipient: &str,
    unread_only: bool,
    limit: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient, kind, title, message, related_booking_id, is_read, created_at
         FROM notifications
         WHERE recipient = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY created_at DESC, rowid DESC LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![recipient, unread_only, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, bool>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut notifications = vec![];
    for row in rows {
        let (id, recipient, kind, title, message, related_booking_id, read, created_at) = row?;
        let kind = NotificationType::parse(&kind)
            .with_context(|| format!("unknown notification type {kind:?}"))?;
        notifications.push(Notification {
            id,
            recipient,
            kind,
            title,
            message,
            related_booking_id,
            read,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(notifications)
}

pub fn mark_notification_read(conn: &Connection, id: &str, recipient: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient = ?2",
        params![id, recipient],
    )?;
    Ok(count > 0)
}
