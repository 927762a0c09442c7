use rusqlite::Connection;

use crate::db::queries;
use crate::errors::BookingError;
use crate::models::{Professional, Slot};

/// Outcome of checking a slot against a professional's commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotVerdict {
    Open,
    OutsideBusinessHours { hours: String },
    Conflict { booking_id: String },
}

impl SlotVerdict {
    pub fn is_open(&self) -> bool {
        matches!(self, SlotVerdict::Open)
    }
}

impl std::fmt::Display for SlotVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotVerdict::Open => write!(f, "slot is open"),
            SlotVerdict::OutsideBusinessHours { hours } if hours.is_empty() => {
                write!(f, "professional has not declared any working hours")
            }
            SlotVerdict::OutsideBusinessHours { hours } => {
                write!(f, "requested time is outside working hours ({hours})")
            }
            SlotVerdict::Conflict { .. } => {
                write!(f, "requested time overlaps an existing booking")
            }
        }
    }
}

/// Template containment, then conflict check against active bookings. Read-only.
pub fn check_slot(
    conn: &Connection,
    professional: &Professional,
    slot: &Slot,
) -> anyhow::Result<SlotVerdict> {
    let template = professional.weekly_template()?;
    let local_start = professional.local_time(slot.start());
    let local_end = professional.local_time(slot.end());

    if !template.contains(&local_start, &local_end) {
        return Ok(SlotVerdict::OutsideBusinessHours {
            hours: template.to_human_readable(),
        });
    }

    let existing = queries::get_active_bookings_overlapping(conn, &professional.id, slot)?;
    let clash = existing
        .iter()
        .find(|b| b.slot().map(|s| s.overlaps(slot)).unwrap_or(true));

    match clash {
        Some(booking) => Ok(SlotVerdict::Conflict {
            booking_id: booking.id.clone(),
        }),
        None => Ok(SlotVerdict::Open),
    }
}

pub fn is_slot_available(
    conn: &Connection,
    professional_id: &str,
    slot: &Slot,
) -> Result<bool, BookingError> {
    let professional = queries::get_professional(conn, professional_id)?
        .ok_or_else(|| BookingError::NotFound(format!("professional {professional_id}")))?;

    Ok(check_slot(conn, &professional, slot)?.is_open())
}
