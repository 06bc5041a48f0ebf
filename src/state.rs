use std::{sync::Arc, time::Instant};

use crate::config::{Config, StorageKind};
use crate::error::Result;
use crate::repositories::{
    booked_dates::BookedDates,
    sessions::{self, SessionStore},
};
use crate::services::{
    mail::{Mailer, SmtpMailer},
    thumbnails::Thumbnailer,
};
use crate::storage::{self, StorageBackend};

/// The application's state.
///
/// Optional capabilities are resolved once here and handed to handlers as
/// plain fields; nothing is probed per request.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// The admin session store.
    pub sessions: Arc<dyn SessionStore>,
    /// Where uploads are saved.
    pub storage: Arc<dyn StorageBackend>,
    /// Thumbnail generation, when enabled and usable.
    pub thumbnails: Option<Thumbnailer>,
    /// The booking mailer, when SMTP is fully configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    /// The booked-dates ledger.
    pub booked_dates: BookedDates,
    /// When the process started, for `/health`.
    pub started_at: Instant,
}

impl AppState {
    /// Creates a new `AppState`, connecting every configured service.
    pub async fn new(config: &Config) -> Result<Self> {
        let sessions = sessions::connect(config.session.redis_url.as_deref(), config.session.ttl).await;
        tracing::info!("✅ Session store initialized");

        let storage = storage::from_config(&config.storage).await?;

        let thumbnails = match storage.kind() {
            StorageKind::Local => Thumbnailer::probe(config.thumbnails),
            StorageKind::S3 => None,
        };
        if thumbnails.is_some() {
            tracing::info!("✅ Thumbnail generation enabled");
        }

        let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
            Some(smtp) => match SmtpMailer::new(smtp) {
                Ok(mailer) => {
                    tracing::info!("✅ SMTP mailer initialized for {}", smtp.host);
                    Some(Arc::new(mailer))
                }
                Err(e) => {
                    tracing::error!("❌ SMTP mailer could not be built: {}", e);
                    None
                }
            },
            None => {
                tracing::warn!("⚠️ SMTP not configured; bookings will be refused");
                None
            }
        };

        let booked_dates = BookedDates::new(&config.booked_dates_file);
        booked_dates.ensure_parent().await?;
        tracing::info!("✅ Booked dates ledger at {}", booked_dates.path().display());

        Ok(Self::assemble(
            config.clone(),
            sessions,
            storage,
            thumbnails,
            mailer,
            booked_dates,
        ))
    }

    /// Assembles a state from already-built services.
    pub fn with_services(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        storage: Arc<dyn StorageBackend>,
        thumbnails: Option<Thumbnailer>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let booked_dates = BookedDates::new(&config.booked_dates_file);
        Self::assemble(config, sessions, storage, thumbnails, mailer, booked_dates)
    }

    fn assemble(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        storage: Arc<dyn StorageBackend>,
        thumbnails: Option<Thumbnailer>,
        mailer: Option<Arc<dyn Mailer>>,
        booked_dates: BookedDates,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            storage,
            thumbnails,
            mailer,
            booked_dates,
            started_at: Instant::now(),
        }
    }
}
