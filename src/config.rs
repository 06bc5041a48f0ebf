use std::{
    env,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use anyhow::{Context, Result};
use zeroize::Zeroizing;

const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_ADMIN_PASS: &str = "PleaseChangeMe!2026";
const DEFAULT_PASSCODE: &str = "change-me";
const DEFAULT_SESSION_TTL_MS: u64 = 24 * 60 * 60 * 1000;
/// Longest accepted session lifetime: one year.
const MAX_SESSION_TTL_MS: u64 = 365 * DEFAULT_SESSION_TTL_MS;
const DEFAULT_UPLOAD_MAX_FILES: usize = 100;
const DEFAULT_UPLOAD_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_S3_REGION: &str = "us-east-1";

/// The admin identity accepted by login and HTTP Basic auth.
#[derive(Clone)]
pub struct AdminCredentials {
    pub user: String,
    pub pass: Zeroizing<String>,
}

/// Session cookie and store settings.
#[derive(Clone)]
pub struct SessionConfig {
    /// Sliding lifetime of an admin session.
    pub ttl: Duration,
    /// Optional Redis connection string for the external session store.
    pub redis_url: Option<String>,
    /// Whether cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

/// Which storage backend was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
}

/// Object storage settings.
#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub public_url: Option<String>,
}

/// Where uploads live.
#[derive(Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Directory served as static files; uploads live under `public_dir/uploads`.
    pub public_dir: PathBuf,
    /// Staging area for multipart bodies.
    pub tmp_dir: PathBuf,
    /// Only set when `kind` is `S3`.
    pub s3: Option<S3Config>,
}

impl StorageConfig {
    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join("uploads")
    }
}

/// Per-request limits on `POST /api/upload`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_UPLOAD_MAX_FILES,
            max_file_bytes: DEFAULT_UPLOAD_MAX_FILE_BYTES,
        }
    }
}

/// Outbound mail transport for the booking relay.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    pub secure: bool,
    pub user: String,
    pub pass: Zeroizing<String>,
    pub from: String,
    pub to: String,
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether `APP_ENV` is `production`.
    pub production: bool,
    /// The admin identity.
    pub admin: AdminCredentials,
    /// The secret for the passcode gate.
    pub passcode: Zeroizing<String>,
    /// Session settings.
    pub session: SessionConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Upload limits.
    pub uploads: UploadLimits,
    /// Whether thumbnail generation was requested.
    pub thumbnails: bool,
    /// The JSON file holding booked dates.
    pub booked_dates_file: PathBuf,
    /// SMTP settings, present only when fully configured.
    pub smtp: Option<SmtpConfig>,
    /// Allowed CORS origins; empty mirrors the request origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let production = var("APP_ENV").is_some_and(|v| v == "production");

        let required_in_production = |key: &str, default: &str| -> Result<String> {
            match var(key) {
                Some(value) => Ok(value),
                None if production => {
                    anyhow::bail!("{} must be set when APP_ENV=production", key)
                }
                None => Ok(default.to_string()),
            }
        };

        let host: IpAddr = var("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse()
            .context("Invalid HOST")?;
        let port: u16 = var("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .context("Invalid PORT")?;

        let admin = AdminCredentials {
            user: required_in_production("ADMIN_USER", DEFAULT_ADMIN_USER)?,
            pass: Zeroizing::new(required_in_production("ADMIN_PASS", DEFAULT_ADMIN_PASS)?),
        };
        let passcode = Zeroizing::new(required_in_production("PASSCODE", DEFAULT_PASSCODE)?);

        let ttl_ms: u64 = match var("SESSION_TTL_MS") {
            Some(v) => v.parse().context("Invalid SESSION_TTL_MS")?,
            None => DEFAULT_SESSION_TTL_MS,
        };
        if ttl_ms == 0 {
            anyhow::bail!("SESSION_TTL_MS must be greater than 0");
        }
        if ttl_ms > MAX_SESSION_TTL_MS {
            anyhow::bail!("SESSION_TTL_MS must be at most {} (one year)", MAX_SESSION_TTL_MS);
        }

        let session = SessionConfig {
            ttl: Duration::from_millis(ttl_ms),
            redis_url: var("REDIS_URL"),
            cookie_secure: parse_flag(var("COOKIE_SECURE"), false),
        };

        let storage = Self::storage_from(&var)?;

        let uploads = UploadLimits {
            max_files: match var("UPLOAD_MAX_FILES") {
                Some(v) => v.parse().context("Invalid UPLOAD_MAX_FILES")?,
                None => DEFAULT_UPLOAD_MAX_FILES,
            },
            max_file_bytes: match var("UPLOAD_MAX_FILE_BYTES") {
                Some(v) => v.parse().context("Invalid UPLOAD_MAX_FILE_BYTES")?,
                None => DEFAULT_UPLOAD_MAX_FILE_BYTES,
            },
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            production,
            admin,
            passcode,
            session,
            storage,
            uploads,
            thumbnails: parse_flag(var("THUMBNAILS"), true),
            booked_dates_file: var("BOOKED_DATES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/booked-dates.json")),
            smtp: Self::smtp_from(&var)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    fn storage_from(var: &impl Fn(&str) -> Option<String>) -> Result<StorageConfig> {
        let requested = var("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase();

        let (kind, s3) = match requested.as_str() {
            "local" => (StorageKind::Local, None),
            "s3" => match var("S3_BUCKET") {
                Some(bucket) => (
                    StorageKind::S3,
                    Some(S3Config {
                        bucket,
                        region: var("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                        public_url: var("S3_PUBLIC_URL"),
                    }),
                ),
                None => {
                    tracing::warn!(
                        "⚠️ STORAGE_BACKEND=s3 but S3_BUCKET is not set; falling back to local storage"
                    );
                    (StorageKind::Local, None)
                }
            },
            other => anyhow::bail!("Unknown STORAGE_BACKEND: {} (expected local or s3)", other),
        };

        Ok(StorageConfig {
            kind,
            public_dir: var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            tmp_dir: var("TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tmp")),
            s3,
        })
    }

    fn smtp_from(var: &impl Fn(&str) -> Option<String>) -> Result<Option<SmtpConfig>> {
        let (host, user, pass) = match (var("SMTP_HOST"), var("SMTP_USER"), var("SMTP_PASS")) {
            (Some(host), Some(user), Some(pass)) => (host, user, pass),
            (None, None, None) => return Ok(None),
            _ => {
                tracing::warn!(
                    "⚠️ SMTP partially configured; set SMTP_HOST, SMTP_USER and SMTP_PASS to enable bookings"
                );
                return Ok(None);
            }
        };

        let port = match var("SMTP_PORT") {
            Some(v) => v.parse().context("Invalid SMTP_PORT")?,
            None => DEFAULT_SMTP_PORT,
        };
        let from = var("SMTP_FROM").unwrap_or_else(|| user.clone());
        let to = var("BOOKING_TO").unwrap_or_else(|| from.clone());

        Ok(Some(SmtpConfig {
            host,
            port,
            secure: parse_flag(var("SMTP_SECURE"), false),
            user,
            pass: Zeroizing::new(pass),
            from,
            to,
        }))
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => true,
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => false,
        _ => default,
    }
}
