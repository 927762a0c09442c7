use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::DependencyError;
use crate::models::{Booking, ParticipantPair};

/// External conversation service. One chat per participant pair.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn create_or_reuse_chat(
        &self,
        participants: &ParticipantPair,
        booking_id: &str,
    ) -> Result<String, DependencyError>;
}

/// Chat store sharing the booking database.
pub struct SqliteChatService {
    db: Arc<Mutex<Connection>>,
}

impl SqliteChatService {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Finds or creates the pair's chat and links the booking. A new link
    /// bumps both participants' unread counts.
    fn link(
        conn: &Connection,
        participants: &ParticipantPair,
        booking_id: &str,
    ) -> anyhow::Result<String> {
        let tx = conn.unchecked_transaction()?;

        let chat_id = match queries::find_chat_by_pair(&tx, participants)? {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                queries::insert_chat(&tx, &id, participants, booking_id)?;
                id
            }
        };

        if queries::link_chat_booking(&tx, &chat_id, booking_id)? {
            for participant in [participants.first(), participants.second()] {
                queries::increment_unread(&tx, &chat_id, participant)?;
            }
        }

        tx.commit()?;
        Ok(chat_id)
    }
}

#[async_trait]
impl ChatService for SqliteChatService {
    async fn create_or_reuse_chat(
        &self,
        participants: &ParticipantPair,
        booking_id: &str,
    ) -> Result<String, DependencyError> {
        let db = self
            .db
            .lock()
            .map_err(|_| DependencyError::Chat("database lock poisoned".to_string()))?;

        Self::link(&db, participants, booking_id)
            .map_err(|e| DependencyError::Chat(format!("{e:#}")))
    }
}

/// Best-effort adapter the orchestrator calls after a booking commits.
#[derive(Clone)]
pub struct ChatLinker {
    service: Arc<dyn ChatService>,
}

impl ChatLinker {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self { service }
    }

    /// Returns the chat id, or `None` when the chat service failed.
    pub async fn link(&self, booking: &Booking) -> Option<String> {
        let pair = ParticipantPair::new(&booking.customer_id, &booking.professional_id);
        match self.service.create_or_reuse_chat(&pair, &booking.id).await {
            Ok(chat_id) => {
                tracing::debug!(booking_id = %booking.id, chat_id = %chat_id, "booking chat linked");
                Some(chat_id)
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "failed to link booking chat");
                None
            }
        }
    }
}
