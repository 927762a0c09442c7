use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::RealtimeEvent;
use crate::services::booking::BookingService;
use crate::services::chat::{ChatLinker, ChatService, SqliteChatService};
use crate::services::identity::{HmacIdentity, IdentityProvider};
use crate::services::messaging::MessagingProvider;
use crate::services::notify::{
    NotificationDispatcher, NotificationService, SqliteNotificationService,
};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub identity: Box<dyn IdentityProvider>,
    pub bookings: BookingService,
    pub realtime_tx: broadcast::Sender<RealtimeEvent>,
}

impl AppState {
    /// Wires the SQLite-backed collaborators around one shared connection.
    pub fn new(
        conn: Connection,
        config: AppConfig,
        sms: Option<Arc<dyn MessagingProvider>>,
    ) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let chat = Arc::new(SqliteChatService::new(db.clone()));
        let notifications = Arc::new(SqliteNotificationService::new(db.clone()));
        Self::with_collaborators(db, config, chat, notifications, sms)
    }

    pub fn with_collaborators(
        db: Arc<Mutex<Connection>>,
        config: AppConfig,
        chat: Arc<dyn ChatService>,
        notifications: Arc<dyn NotificationService>,
        sms: Option<Arc<dyn MessagingProvider>>,
    ) -> Self {
        let (realtime_tx, _) = broadcast::channel(config.event_buffer);

        let mut dispatcher = NotificationDispatcher::new(notifications, realtime_tx.clone());
        if let Some(sms) = sms {
            dispatcher = dispatcher.with_sms(sms);
        }

        Self {
            bookings: BookingService::new(db.clone(), ChatLinker::new(chat), dispatcher),
            identity: Box::new(HmacIdentity::new(config.auth_secret.clone())),
            db,
            config,
            realtime_tx,
        }
    }
}
