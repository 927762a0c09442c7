//! Booking status state machine.
//!
//! ```text
//! pending ──► confirmed ──► in_progress ──► completed
//!    │            │
//!    └────────────┴──► cancelled
//! ```
//!
//! The only gate through which a booking's status may change. Pure: no I/O.

use serde::Serialize;

use super::booking::{Booking, BookingStatus};

/// The actor's relation to one specific booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Professional,
    Outsider,
}

impl ActorRole {
    pub fn of(booking: &Booking, actor_id: &str) -> Self {
        if booking.professional_id == actor_id {
            ActorRole::Professional
        } else if booking.customer_id == actor_id {
            ActorRole::Customer
        } else {
            ActorRole::Outsider
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Professional => "professional",
            ActorRole::Outsider => "outsider",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot transition booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("{role} may not move a booking from {from} to {to}")]
    Forbidden {
        from: BookingStatus,
        to: BookingStatus,
        role: &'static str,
    },
}

const PROFESSIONAL_ONLY: &[ActorRole] = &[ActorRole::Professional];
const EITHER_PARTY: &[ActorRole] = &[ActorRole::Customer, ActorRole::Professional];

/// Roles permitted to request `from -> to`, or `None` when the edge does not exist.
fn allowed_roles(from: BookingStatus, to: BookingStatus) -> Option<&'static [ActorRole]> {
    use BookingStatus::*;

    match (from, to) {
        (Pending, Confirmed) => Some(PROFESSIONAL_ONLY),
        (Pending, Cancelled) => Some(EITHER_PARTY),
        (Confirmed, InProgress) => Some(PROFESSIONAL_ONLY),
        (Confirmed, Cancelled) => Some(EITHER_PARTY),
        (InProgress, Completed) => Some(PROFESSIONAL_ONLY),
        _ => None,
    }
}

/// Validates `current -> requested` for an actor holding `role`.
///
/// Outsiders are always `Forbidden`; a missing edge is `InvalidTransition`;
/// an existing edge the role may not take is `Forbidden`.
pub fn transition(
    current: BookingStatus,
    requested: BookingStatus,
    role: ActorRole,
) -> Result<BookingStatus, TransitionError> {
    let forbidden = TransitionError::Forbidden {
        from: current,
        to: requested,
        role: role.as_str(),
    };

    if role == ActorRole::Outsider {
        return Err(forbidden);
    }

    match allowed_roles(current, requested) {
        None => Err(TransitionError::InvalidTransition {
            from: current,
            to: requested,
        }),
        Some(roles) if roles.contains(&role) => Ok(requested),
        Some(_) => Err(forbidden),
    }
}
