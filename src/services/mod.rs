pub mod booking;
pub mod chat;
pub mod identity;
pub mod messaging;
pub mod notify;
pub mod scheduling;
