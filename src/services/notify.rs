use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use tokio::sync::broadcast;

use crate::db::queries;
use crate::errors::DependencyError;
use crate::models::{
    Booking, BookingStatus, Notification, NotificationType, RealtimeEvent, RealtimeKind,
};
use crate::services::messaging::MessagingProvider;

/// External in-app notification service.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DependencyError>;
}

pub struct SqliteNotificationService {
    db: Arc<Mutex<Connection>>,
}

impl SqliteNotificationService {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationService for SqliteNotificationService {
    async fn send(&self, notification: &Notification) -> Result<(), DependencyError> {
        let db = self
            .db
            .lock()
            .map_err(|_| DependencyError::Notification("database lock poisoned".to_string()))?;
        queries::insert_notification(&db, notification)
            .map_err(|e| DependencyError::Notification(format!("{e:#}")))
    }
}

/// Something that happened to a booking and that both parties hear about.
#[derive(Debug, Clone)]
pub enum BookingEvent {
    Created {
        booking: Booking,
    },
    StatusChanged {
        booking: Booking,
        previous: BookingStatus,
    },
    Cancelled {
        booking: Booking,
        previous: BookingStatus,
    },
}

impl BookingEvent {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingEvent::Created { booking }
            | BookingEvent::StatusChanged { booking, .. }
            | BookingEvent::Cancelled { booking, .. } => booking,
        }
    }

    fn realtime_kind(&self) -> RealtimeKind {
        match self {
            BookingEvent::Created { .. } => RealtimeKind::NewBooking,
            BookingEvent::StatusChanged { .. } => RealtimeKind::BookingStatusUpdate,
            BookingEvent::Cancelled { .. } => RealtimeKind::BookingCancelled,
        }
    }

    fn notification_type(&self) -> NotificationType {
        match self {
            BookingEvent::Created { .. } => NotificationType::BookingRequest,
            BookingEvent::StatusChanged { .. } => NotificationType::BookingStatusUpdate,
            BookingEvent::Cancelled { .. } => NotificationType::BookingCancelled,
        }
    }

    /// `{bookingId, ...changed fields}`.
    fn payload(&self) -> serde_json::Value {
        match self {
            BookingEvent::Created { booking } => {
                let mut value = serde_json::to_value(booking).unwrap_or_else(|_| json!({}));
                value["bookingId"] = json!(booking.id);
                value
            }
            BookingEvent::StatusChanged { booking, previous } => json!({
                "bookingId": booking.id,
                "status": booking.status,
                "previousStatus": previous,
                "lastUpdated": booking.last_updated,
            }),
            BookingEvent::Cancelled { booking, previous } => json!({
                "bookingId": booking.id,
                "status": booking.status,
                "previousStatus": previous,
                "cancellationReason": booking.cancellation.as_ref().and_then(|c| c.cancellation_reason.clone()),
                "cancelledAt": booking.cancellation.as_ref().map(|c| c.cancelled_at),
                "refundRequested": booking.cancellation.as_ref().map(|c| c.refund_requested).unwrap_or(false),
                "lastUpdated": booking.last_updated,
            }),
        }
    }

    fn title_and_message(&self, recipient_is_professional: bool) -> (String, String) {
        let booking = self.booking();
        let when = booking.scheduled_start.format("%Y-%m-%d %H:%M UTC");
        let service = booking.service_type.as_str().replace('_', " ");

        match self {
            BookingEvent::Created { .. } if recipient_is_professional => (
                "New booking request".to_string(),
                format!("You have a new {service} request for {when}."),
            ),
            BookingEvent::Created { .. } => (
                "Booking requested".to_string(),
                format!("Your {service} request for {when} is awaiting confirmation."),
            ),
            BookingEvent::StatusChanged { booking, .. } => (
                format!("Booking {}", booking.status.as_str().replace('_', " ")),
                format!(
                    "Your {service} booking for {when} is now {}.",
                    booking.status.as_str().replace('_', " ")
                ),
            ),
            BookingEvent::Cancelled { booking, .. } => {
                let reason = booking
                    .cancellation
                    .as_ref()
                    .and_then(|c| c.cancellation_reason.as_deref())
                    .map(|r| format!(" Reason: {r}"))
                    .unwrap_or_default();
                (
                    "Booking cancelled".to_string(),
                    format!("The {service} booking for {when} was cancelled.{reason}"),
                )
            }
        }
    }

    /// Phone numbers worth texting for this event.
    fn sms_targets<'a>(&'a self, professional_phone: Option<&'a str>) -> Vec<&'a str> {
        let customer_phone = self.booking().contact_info.phone.as_deref();
        let targets = match self {
            BookingEvent::Created { .. } => vec![professional_phone],
            BookingEvent::StatusChanged { .. } => vec![customer_phone],
            BookingEvent::Cancelled { .. } => vec![customer_phone, professional_phone],
        };
        targets.into_iter().flatten().collect()
    }
}

/// Counts of side-effect calls for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans booking events out to in-app notifications, live push and SMS.
/// Every call is independent and best-effort.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationService>,
    sms: Option<Arc<dyn MessagingProvider>>,
    realtime: broadcast::Sender<RealtimeEvent>,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationService>,
        realtime: broadcast::Sender<RealtimeEvent>,
    ) -> Self {
        Self {
            notifications,
            sms: None,
            realtime,
        }
    }

    pub fn with_sms(mut self, sms: Arc<dyn MessagingProvider>) -> Self {
        self.sms = Some(sms);
        self
    }

    pub async fn dispatch(&self, event: &BookingEvent, professional_phone: Option<&str>) -> DispatchReport {
        let booking = event.booking();
        let mut report = DispatchReport::default();

        for (recipient, is_professional) in [
            (booking.customer_id.as_str(), false),
            (booking.professional_id.as_str(), true),
        ] {
            let (title, message) = event.title_and_message(is_professional);
            let notification = Notification {
                id: uuid::Uuid::new_v4().to_string(),
                recipient: recipient.to_string(),
                kind: event.notification_type(),
                title,
                message,
                related_booking_id: Some(booking.id.clone()),
                read: false,
                created_at: Utc::now(),
            };

            match self.notifications.send(&notification).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(booking_id = %booking.id, recipient, error = %e, "notification failed");
                }
            }

            let live = RealtimeEvent {
                recipient: recipient.to_string(),
                kind: event.realtime_kind(),
                payload: event.payload(),
            };
            // No subscribers is not a failure
            if self.realtime.send(live).is_ok() {
                report.delivered += 1;
            }
        }

        if let Some(sms) = &self.sms {
            let (_, text) = event.title_and_message(false);
            for phone in event.sms_targets(professional_phone) {
                match sms.send_sms(phone, &text).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(booking_id = %booking.id, error = %e, "sms notification failed");
                    }
                }
            }
        }

        tracing::debug!(
            booking_id = %booking.id,
            kind = event.realtime_kind().as_str(),
            delivered = report.delivered,
            failed = report.failed,
            "booking event dispatched"
        );
        report
    }
}
