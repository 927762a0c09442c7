pub mod availability;
pub mod booking;
pub mod chat;
pub mod lifecycle;
pub mod notification;
pub mod professional;
pub mod schedule;

pub use availability::Availability;
pub use booking::{
    Booking, BookingNote, BookingStatus, Cancellation, ContactInfo, Coordinates, Location,
    Priority, ServiceType, SYSTEM_AUTHOR,
};
pub use chat::{ParticipantPair, UnreadCounts};
pub use lifecycle::{ActorRole, TransitionError};
pub use notification::{Notification, NotificationType, RealtimeEvent, RealtimeKind};
pub use professional::Professional;
pub use schedule::Slot;
