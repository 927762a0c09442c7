use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingRequest,
    BookingStatusUpdate,
    BookingCancelled,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BookingRequest => "booking_request",
            NotificationType::BookingStatusUpdate => "booking_status_update",
            NotificationType::BookingCancelled => "booking_cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "booking_request" => Some(NotificationType::BookingRequest),
            "booking_status_update" => Some(NotificationType::BookingStatusUpdate),
            "booking_cancelled" => Some(NotificationType::BookingCancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_booking_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Names of the events pushed on a party's private channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RealtimeKind {
    #[serde(rename = "newBooking")]
    NewBooking,
    #[serde(rename = "bookingStatusUpdate")]
    BookingStatusUpdate,
    #[serde(rename = "bookingCancelled")]
    BookingCancelled,
}

impl RealtimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeKind::NewBooking => "newBooking",
            RealtimeKind::BookingStatusUpdate => "bookingStatusUpdate",
            RealtimeKind::BookingCancelled => "bookingCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub recipient: String,
    pub kind: RealtimeKind,
    pub payload: serde_json::Value,
}
