use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::db::queries::{self, BookingFilter};
use crate::errors::BookingError;
use crate::models::lifecycle;
use crate::models::{
    ActorRole, Booking, BookingNote, BookingStatus, Cancellation, ContactInfo, Location,
    Priority, ServiceType, Slot, SYSTEM_AUTHOR,
};
use crate::services::chat::ChatLinker;
use crate::services::notify::{BookingEvent, NotificationDispatcher};
use crate::services::scheduling::{self, SlotVerdict};

pub const MIN_DURATION_MINUTES: i64 = 30;
pub const MAX_DURATION_MINUTES: i64 = 1440;
pub const MAX_NOTE_CHARS: usize = 2000;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Current time at the precision the store keeps.
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Body of `POST /bookings`. The customer is the authenticated caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub professional_id: String,
    pub service_type: ServiceType,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub location: Location,
    #[serde(default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub priority: Priority,
}

impl CreateBookingRequest {
    pub fn validate(&self, customer_id: &str) -> Result<(), BookingError> {
        let fail = |msg: &str| Err(BookingError::Validation(msg.to_string()));

        if self.professional_id.trim().is_empty() {
            return fail("professionalId is required");
        }
        if self.professional_id == customer_id {
            return fail("customer and professional must be different users");
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(BookingError::Validation(format!(
                "durationMinutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}"
            )));
        }
        if self.location.address.trim().is_empty() {
            return fail("location.address is required");
        }
        if let Some(c) = &self.location.coordinates {
            if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng) {
                return fail("location.coordinates out of range");
            }
        }

        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has(&self.contact_info.phone) && !has(&self.contact_info.email) {
            return fail("contactInfo needs a phone or an email");
        }
        Ok(())
    }
}

/// Booking use cases. Holds no per-request state; every call is one unit of
/// work against the shared store, with chat and notification side effects
/// run after commit.
pub struct BookingService {
    db: Arc<Mutex<Connection>>,
    chats: ChatLinker,
    dispatcher: NotificationDispatcher,
}

/// A committed transition, ready for side effects.
struct Transitioned {
    booking: Booking,
    previous: BookingStatus,
    professional_phone: Option<String>,
}

impl BookingService {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        chats: ChatLinker,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            chats,
            dispatcher,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BookingError> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned").into())
    }

    pub async fn create_booking(
        &self,
        customer_id: &str,
        req: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        req.validate(customer_id)?;

        let slot = Slot::from_duration(req.scheduled_start.trunc_subsecs(0), req.duration_minutes)
            .ok_or_else(|| BookingError::Validation("scheduledStart out of range".to_string()))?;

        // Check and insert share one IMMEDIATE transaction so no other writer
        // can slip an overlapping booking in between.
        let (booking, professional_phone) = {
            let mut db = self.lock()?;
            let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let professional = queries::get_professional(&tx, &req.professional_id)?
                .ok_or_else(|| BookingError::NotFound(format!("professional {}", req.professional_id)))?;
            if !professional.offers(req.service_type) {
                return Err(BookingError::ServiceNotOffered(
                    req.service_type.as_str().to_string(),
                ));
            }

            match scheduling::check_slot(&tx, &professional, &slot)? {
                SlotVerdict::Open => {}
                verdict => {
                    tracing::info!(
                        professional_id = %professional.id,
                        start = %slot.start(),
                        reason = %verdict,
                        "booking rejected"
                    );
                    return Err(BookingError::SlotUnavailable(verdict.to_string()));
                }
            }

            let now = stored_now();
            let booking = Booking {
                id: uuid::Uuid::new_v4().to_string(),
                customer_id: customer_id.to_string(),
                professional_id: professional.id.clone(),
                service_type: req.service_type,
                scheduled_start: slot.start(),
                duration_minutes: req.duration_minutes,
                scheduled_end: slot.end(),
                location: req.location,
                contact_info: req.contact_info,
                status: BookingStatus::Pending,
                priority: req.priority,
                estimated_cost: professional.estimate_cost(req.duration_minutes),
                notes: vec![],
                cancellation: None,
                created_at: now,
                last_updated: now,
            };

            if let Err(e) = queries::insert_booking(&tx, &booking) {
                if queries::is_slot_conflict(&e) {
                    return Err(BookingError::SlotUnavailable(
                        "requested time overlaps an existing booking".to_string(),
                    ));
                }
                return Err(e.into());
            }
            tx.commit()?;

            (booking, professional.phone)
        };

        tracing::info!(
            booking_id = %booking.id,
            professional_id = %booking.professional_id,
            customer_id = %booking.customer_id,
            start = %booking.scheduled_start,
            "booking created"
        );

        self.chats.link(&booking).await;
        self.dispatcher
            .dispatch(
                &BookingEvent::Created {
                    booking: booking.clone(),
                },
                professional_phone.as_deref(),
            )
            .await;

        Ok(booking)
    }

    /// Moves a booking to `requested`. A request for `cancelled` takes the
    /// cancellation path with no reason.
    pub async fn change_status(
        &self,
        booking_id: &str,
        requested: BookingStatus,
        actor_id: &str,
    ) -> Result<Booking, BookingError> {
        if requested == BookingStatus::Cancelled {
            return self.cancel_booking(booking_id, actor_id, None).await;
        }

        let done = self.commit_transition(booking_id, actor_id, requested, None)?;
        self.dispatcher
            .dispatch(
                &BookingEvent::StatusChanged {
                    booking: done.booking.clone(),
                    previous: done.previous,
                },
                done.professional_phone.as_deref(),
            )
            .await;

        Ok(done.booking)
    }

    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        actor_id: &str,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let done = self.commit_transition(booking_id, actor_id, BookingStatus::Cancelled, reason)?;
        self.dispatcher
            .dispatch(
                &BookingEvent::Cancelled {
                    booking: done.booking.clone(),
                    previous: done.previous,
                },
                done.professional_phone.as_deref(),
            )
            .await;

        Ok(done.booking)
    }

    /// State machine check, compare-and-swap on status, system note. One transaction.
    fn commit_transition(
        &self,
        booking_id: &str,
        actor_id: &str,
        requested: BookingStatus,
        cancellation_reason: Option<String>,
    ) -> Result<Transitioned, BookingError> {
        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = queries::get_booking_by_id(&tx, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let role = ActorRole::of(&current, actor_id);
        let next = lifecycle::transition(current.status, requested, role)?;

        let now = stored_now();
        let cancellation = (next == BookingStatus::Cancelled).then(|| Cancellation {
            cancellation_reason,
            cancelled_at: now,
            refund_requested: true,
        });

        if !queries::compare_and_set_status(
            &tx,
            booking_id,
            current.status,
            next,
            cancellation.as_ref(),
            &now,
        )? {
            return Err(BookingError::Conflict(format!(
                "booking {booking_id} changed concurrently"
            )));
        }

        let note = BookingNote {
            author: SYSTEM_AUTHOR.to_string(),
            text: format!(
                "status changed from {} to {} by {}",
                current.status,
                next,
                role.as_str()
            ),
            timestamp: now,
        };
        queries::insert_note(&tx, booking_id, &note)?;

        let booking = queries::get_booking_by_id(&tx, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let professional_phone = queries::get_professional(&tx, &booking.professional_id)?
            .and_then(|p| p.phone);
        tx.commit()?;

        tracing::info!(
            booking_id,
            from = %current.status,
            to = %next,
            role = role.as_str(),
            "booking status changed"
        );

        Ok(Transitioned {
            booking,
            previous: current.status,
            professional_phone,
        })
    }

    pub fn get_booking(&self, booking_id: &str, actor_id: &str) -> Result<Booking, BookingError> {
        let db = self.lock()?;
        let booking = queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;

        if !booking.is_participant(actor_id) {
            return Err(BookingError::Forbidden(
                "not a participant in this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    pub fn list_bookings(
        &self,
        actor_id: &str,
        mut filter: BookingFilter,
    ) -> Result<Vec<Booking>, BookingError> {
        filter.limit = filter.limit.clamp(1, MAX_LIST_LIMIT);
        let db = self.lock()?;
        Ok(queries::list_bookings_for_actor(&db, actor_id, &filter)?)
    }

    /// Appends a participant-authored note.
    pub fn add_note(
        &self,
        booking_id: &str,
        actor_id: &str,
        text: &str,
    ) -> Result<Booking, BookingError> {
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_NOTE_CHARS {
            return Err(BookingError::Validation(format!(
                "note text must be 1 to {MAX_NOTE_CHARS} characters"
            )));
        }

        let db = self.lock()?;
        let tx = db.unchecked_transaction()?;

        let booking = queries::get_booking_by_id(&tx, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        if !booking.is_participant(actor_id) {
            return Err(BookingError::Forbidden(
                "not a participant in this booking".to_string(),
            ));
        }

        let now = stored_now();
        let note = BookingNote {
            author: actor_id.to_string(),
            text: text.to_string(),
            timestamp: now,
        };
        queries::insert_note(&tx, booking_id, &note)?;
        queries::touch_booking(&tx, booking_id, &now)?;

        let updated = queries::get_booking_by_id(&tx, booking_id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        tx.commit()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::errors::DependencyError;
    use crate::models::{
        Coordinates, Notification, ParticipantPair, Professional, RealtimeEvent, RealtimeKind,
    };
    use crate::services::chat::{ChatService, SqliteChatService};
    use crate::services::notify::{NotificationService, SqliteNotificationService};
    use async_trait::async_trait;
    use chrono::{NaiveDateTime, TimeZone};
    use tokio::sync::broadcast;

    struct DownChat;

    #[async_trait]
    impl ChatService for DownChat {
        async fn create_or_reuse_chat(
            &self,
            _participants: &ParticipantPair,
            _booking_id: &str,
        ) -> Result<String, DependencyError> {
            Err(DependencyError::Chat("unreachable".to_string()))
        }
    }

    struct DownNotifications;

    #[async_trait]
    impl NotificationService for DownNotifications {
        async fn send(&self, _notification: &Notification) -> Result<(), DependencyError> {
            Err(DependencyError::Notification("unreachable".to_string()))
        }
    }

    fn painter() -> Professional {
        Professional {
            id: "pro-1".to_string(),
            display_name: "Pat Painter".to_string(),
            hourly_rate: 45.0,
            services: vec![ServiceType::InteriorPainting, ServiceType::ExteriorPainting],
            availability: Some(
                r#"{"slots":[{"day":"mon","start":"09:00","end":"17:00"}]}"#.to_string(),
            ),
            timezone: "UTC".to_string(),
            phone: Some("+15550002222".to_string()),
        }
    }

    fn shared_db() -> Arc<Mutex<Connection>> {
        let conn = db::init_db(":memory:").unwrap();
        queries::save_professional(&conn, &painter()).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn service_with(
        db: Arc<Mutex<Connection>>,
        chat: Arc<dyn ChatService>,
        notifications: Arc<dyn NotificationService>,
    ) -> (BookingService, broadcast::Receiver<RealtimeEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let dispatcher = NotificationDispatcher::new(notifications, tx);
        (
            BookingService::new(db, ChatLinker::new(chat), dispatcher),
            rx,
        )
    }

    fn service() -> (BookingService, Arc<Mutex<Connection>>) {
        let db = shared_db();
        let (svc, _rx) = service_with(
            db.clone(),
            Arc::new(SqliteChatService::new(db.clone())),
            Arc::new(SqliteNotificationService::new(db.clone())),
        );
        (svc, db)
    }

    fn at(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
    }

    // 2025-06-16 is a Monday
    fn request(start: &str, minutes: i64) -> CreateBookingRequest {
        CreateBookingRequest {
            professional_id: "pro-1".to_string(),
            service_type: ServiceType::InteriorPainting,
            scheduled_start: at(start),
            duration_minutes: minutes,
            location: Location {
                address: "12 Elm St".to_string(),
                coordinates: Some(Coordinates {
                    lat: 40.7,
                    lng: -74.0,
                }),
            },
            contact_info: ContactInfo {
                phone: Some("+15550001111".to_string()),
                email: None,
            },
            priority: Priority::default(),
        }
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let (svc, _db) = service();

        let existing = svc
            .create_booking("cust-0", request("2025-06-16 10:00", 120))
            .await
            .unwrap();
        svc.change_status(&existing.id, BookingStatus::Confirmed, "pro-1")
            .await
            .unwrap();

        let clash = svc.create_booking("cust-1", request("2025-06-16 11:00", 120)).await;
        assert!(matches!(clash, Err(BookingError::SlotUnavailable(_))));

        let booking = svc
            .create_booking("cust-1", request("2025-06-16 12:00", 120))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.estimated_cost, 90.0);
        assert_eq!(booking.scheduled_end, at("2025-06-16 14:00"));

        let confirmed = svc
            .change_status(&booking.id, BookingStatus::Confirmed, "pro-1")
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.notes.len(), 1);
        assert_eq!(confirmed.notes[0].author, SYSTEM_AUTHOR);
        assert_eq!(
            confirmed.notes[0].text,
            "status changed from pending to confirmed by professional"
        );

        let denied = svc
            .change_status(&booking.id, BookingStatus::InProgress, "cust-1")
            .await;
        assert!(matches!(denied, Err(BookingError::Forbidden(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_creates_admit_one() {
        let (svc, db) = service();
        let svc = Arc::new(svc);

        let mut set = tokio::task::JoinSet::new();
        for i in 0..8 {
            let svc = svc.clone();
            // All overlap 10:30-11:00
            let start = if i % 2 == 0 { "2025-06-16 10:00" } else { "2025-06-16 10:30" };
            set.spawn(async move {
                svc.create_booking(&format!("cust-{i}"), request(start, 60)).await
            });
        }

        let mut ok = 0;
        let mut unavailable = 0;
        while let Some(result) = set.join_next().await {
            match result.unwrap() {
                Ok(_) => ok += 1,
                Err(BookingError::SlotUnavailable(_)) => unavailable += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(unavailable, 7);

        let conn = db.lock().unwrap();
        let stored = queries::list_bookings_for_actor(
            &conn,
            "pro-1",
            &BookingFilter::default(),
        )
        .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_confirms_have_one_winner() {
        let (svc, _db) = service();
        let svc = Arc::new(svc);
        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let id = booking.id.clone();
            set.spawn(async move {
                svc.change_status(&id, BookingStatus::Confirmed, "pro-1").await
            });
        }

        let mut ok = 0;
        let mut lost = 0;
        while let Some(result) = set.join_next().await {
            match result.unwrap() {
                Ok(b) => {
                    assert_eq!(b.status, BookingStatus::Confirmed);
                    ok += 1;
                }
                Err(BookingError::InvalidTransition { .. }) | Err(BookingError::Conflict(_)) => {
                    lost += 1
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(lost, 7);

        let stored = svc.get_booking(&booking.id, "pro-1").unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_adjacent_bookings_both_accepted() {
        let (svc, _db) = service();
        svc.create_booking("cust-1", request("2025-06-16 10:00", 60)).await.unwrap();
        svc.create_booking("cust-2", request("2025-06-16 11:00", 60)).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let (svc, _db) = service();

        let mut unknown = request("2025-06-16 10:00", 60);
        unknown.professional_id = "pro-404".to_string();
        assert!(matches!(
            svc.create_booking("cust-1", unknown).await,
            Err(BookingError::NotFound(_))
        ));

        let mut reno = request("2025-06-16 10:00", 60);
        reno.service_type = ServiceType::Renovation;
        assert!(matches!(
            svc.create_booking("cust-1", reno).await,
            Err(BookingError::ServiceNotOffered(_))
        ));

        assert!(matches!(
            svc.create_booking("cust-1", request("2025-06-16 16:00", 120)).await,
            Err(BookingError::SlotUnavailable(_))
        ));

        assert!(matches!(
            svc.create_booking("cust-1", request("2025-06-16 10:00", 15)).await,
            Err(BookingError::Validation(_))
        ));

        assert!(matches!(
            svc.create_booking("pro-1", request("2025-06-16 10:00", 60)).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_contact_and_coordinates() {
        let mut req = request("2025-06-16 10:00", 60);
        req.contact_info = ContactInfo::default();
        assert!(req.validate("cust-1").is_err());

        req.contact_info.email = Some("c@example.com".to_string());
        assert!(req.validate("cust-1").is_ok());

        req.location.coordinates = Some(Coordinates { lat: 91.0, lng: 0.0 });
        assert!(req.validate("cust-1").is_err());
    }

    #[tokio::test]
    async fn test_side_effect_failures_do_not_fail_booking() {
        let db = shared_db();
        let (svc, _rx) = service_with(db.clone(), Arc::new(DownChat), Arc::new(DownNotifications));

        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();
        let cancelled = svc
            .cancel_booking(&booking.id, "cust-1", Some("changed plans".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_two_bookings_share_one_chat() {
        let (svc, db) = service();
        svc.create_booking("cust-1", request("2025-06-16 09:00", 60)).await.unwrap();
        svc.create_booking("cust-1", request("2025-06-16 13:00", 60)).await.unwrap();

        let conn = db.lock().unwrap();
        assert_eq!(queries::count_chats(&conn).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_transition_or_cancel() {
        let (svc, _db) = service();
        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();

        assert!(matches!(
            svc.get_booking(&booking.id, "mallory"),
            Err(BookingError::Forbidden(_))
        ));
        assert!(matches!(
            svc.change_status(&booking.id, BookingStatus::Confirmed, "mallory").await,
            Err(BookingError::Forbidden(_))
        ));
        assert!(matches!(
            svc.cancel_booking(&booking.id, "mallory", None).await,
            Err(BookingError::Forbidden(_))
        ));
        assert!(matches!(
            svc.add_note(&booking.id, "mallory", "hi"),
            Err(BookingError::Forbidden(_))
        ));
        assert!(matches!(
            svc.get_booking("missing", "cust-1"),
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_sets_metadata_and_frees_slot() {
        let db = shared_db();
        let (svc, mut rx) = service_with(
            db.clone(),
            Arc::new(SqliteChatService::new(db.clone())),
            Arc::new(SqliteNotificationService::new(db.clone())),
        );

        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.kind, RealtimeKind::NewBooking);
        }

        let cancelled = svc
            .cancel_booking(&booking.id, "cust-1", Some("  rain  ".to_string()))
            .await
            .unwrap();
        let meta = cancelled.cancellation.clone().unwrap();
        assert_eq!(meta.cancellation_reason.as_deref(), Some("rain"));
        assert!(meta.refund_requested);
        assert_eq!(cancelled.last_updated, meta.cancelled_at);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, RealtimeKind::BookingCancelled);
        assert_eq!(event.payload["bookingId"], booking.id.as_str());

        // Cancelled is terminal
        assert!(matches!(
            svc.cancel_booking(&booking.id, "cust-1", None).await,
            Err(BookingError::InvalidTransition { .. })
        ));

        svc.create_booking("cust-2", request("2025-06-16 10:00", 60)).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_status_to_cancelled_uses_cancel_path() {
        let (svc, _db) = service();
        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();

        let cancelled = svc
            .change_status(&booking.id, BookingStatus::Cancelled, "pro-1")
            .await
            .unwrap();
        let meta = cancelled.cancellation.unwrap();
        assert!(meta.refund_requested);
        assert_eq!(meta.cancellation_reason, None);
    }

    #[tokio::test]
    async fn test_full_lifecycle_and_cancel_after_start() {
        let (svc, _db) = service();
        let booking = svc
            .create_booking("cust-1", request("2025-06-16 10:00", 60))
            .await
            .unwrap();

        for next in [
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
        ] {
            svc.change_status(&booking.id, next, "pro-1").await.unwrap();
        }

        assert!(matches!(
            svc.cancel_booking(&booking.id, "pro-1", None).await,
            Err(BookingError::InvalidTransition { .. })
        ));

        let done = svc
            .change_status(&booking.id, BookingStatus::Completed, "pro-1")
            .await
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.notes.len(), 3);
        assert!(done.cancellation.is_none());
    }

    #[tokio::test]
    async fn test_notes_and_listing() {
        let (svc, _db) = service();
        let first = svc
            .create_booking("cust-1", request("2025-06-16 09:00", 60))
            .await
            .unwrap();
        let second = svc
            .create_booking("cust-2", request("2025-06-16 13:00", 60))
            .await
            .unwrap();

        let noted = svc.add_note(&first.id, "cust-1", "  bring drop cloths ").unwrap();
        assert_eq!(noted.notes.last().unwrap().text, "bring drop cloths");
        assert_eq!(noted.notes.last().unwrap().author, "cust-1");
        assert!(noted.last_updated >= first.last_updated);

        assert!(matches!(
            svc.add_note(&first.id, "cust-1", "   "),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            svc.add_note(&first.id, "cust-1", &"x".repeat(MAX_NOTE_CHARS + 1)),
            Err(BookingError::Validation(_))
        ));

        let pro_view = svc.list_bookings("pro-1", BookingFilter::default()).unwrap();
        assert_eq!(
            pro_view.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );

        let cust_view = svc.list_bookings("cust-2", BookingFilter::default()).unwrap();
        assert_eq!(cust_view.len(), 1);

        let as_customer = svc
            .list_bookings(
                "pro-1",
                BookingFilter {
                    role: Some(ActorRole::Customer),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(as_customer.is_empty());

        let capped = svc
            .list_bookings(
                "pro-1",
                BookingFilter {
                    limit: 0,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(capped.len(), 1);
    }
}
