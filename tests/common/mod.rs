#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use booking_gallery::{
    app,
    config::Config,
    repositories::sessions::MemorySessionStore,
    config::StorageKind,
    error::{AppError, Result as AppResult},
    models::image::ImageEntry,
    services::mail::{MailError, Mailer, OutgoingMail},
    state::AppState,
    storage::{DeleteOutcome, ObjectKey, SavedObject, StorageBackend, local::LocalStorage},
};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "s3cret";
pub const PASSCODE: &str = "open-sesame";

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Fails every send.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        Err(MailError::Build("relay down".to_string()))
    }
}

/// Local storage that refuses to save any file whose name contains `marker`.
pub struct FlakyStorage {
    pub inner: LocalStorage,
    pub marker: String,
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        self.inner.public_url(key)
    }

    async fn save(&self, staged: &Path, key: &ObjectKey) -> AppResult<SavedObject> {
        if key.name.contains(&self.marker) {
            return Err(AppError::Storage(format!("refusing {}", key)));
        }
        self.inner.save(staged, key).await
    }

    async fn list(&self, target: Option<&str>) -> AppResult<Vec<ImageEntry>> {
        self.inner.list(target).await
    }

    async fn delete(&self, key: &ObjectKey) -> AppResult<DeleteOutcome> {
        self.inner.delete(key).await
    }
}

/// A router over a throwaway directory tree.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.state.config.storage.uploads_dir()
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.state.config.storage.tmp_dir
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub struct TestAppBuilder {
    vars: HashMap<String, String>,
    mailer: Option<Arc<dyn Mailer>>,
    failing_marker: Option<String>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let vars = [
            ("ADMIN_USER", ADMIN_USER),
            ("ADMIN_PASS", ADMIN_PASS),
            ("PASSCODE", PASSCODE),
            ("THUMBNAILS", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            vars,
            mailer: None,
            failing_marker: None,
        }
    }

    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Makes storage fail for file names containing `marker`.
    pub fn failing_storage(mut self, marker: &str) -> Self {
        self.failing_marker = Some(marker.to_string());
        self
    }

    pub fn build(mut self) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (key, relative) in [
            ("PUBLIC_DIR", "public"),
            ("TMP_DIR", "tmp"),
            ("BOOKED_DATES_FILE", "data/booked-dates.json"),
        ] {
            self.vars
                .insert(key.to_string(), root.join(relative).to_string_lossy().into_owned());
        }

        let config = Config::from_lookup(|key| self.vars.get(key).cloned()).unwrap();
        std::fs::create_dir_all(&config.storage.tmp_dir).unwrap();
        std::fs::create_dir_all(config.storage.uploads_dir()).unwrap();

        let sessions = Arc::new(MemorySessionStore::new(config.session.ttl));
        let local = LocalStorage::new(config.storage.uploads_dir());
        let storage: Arc<dyn StorageBackend> = match self.failing_marker {
            Some(marker) => Arc::new(FlakyStorage { inner: local, marker }),
            None => Arc::new(local),
        };
        let thumbnails = booking_gallery::services::thumbnails::Thumbnailer::probe(config.thumbnails);

        let state = AppState::with_services(config, sessions, storage, thumbnails, self.mailer);
        let router = app::router(state.clone());

        TestApp { router, state, dir }
    }
}

pub fn test_app() -> TestApp {
    TestAppBuilder::new().build()
}

pub fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
}

pub fn admin_basic() -> String {
    basic_auth(ADMIN_USER, ADMIN_PASS)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Adds a header to an already-built request.
pub fn with_header(mut request: Request<Body>, name: header::HeaderName, value: &str) -> Request<Body> {
    request.headers_mut().insert(name, value.parse().unwrap());
    request
}

pub async fn body_json(response: Response<Body>) -> sonic_rs::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    sonic_rs::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `name=value` pair of a `Set-Cookie` header for `name`.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

/// Full `Set-Cookie` header for `name`.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

/// Logs in as the admin and returns the `admin_token=...` cookie pair.
pub async fn login(app: &TestApp) -> String {
    let body = format!(r#"{{"user":"{}","pass":"{}"}}"#, ADMIN_USER, ADMIN_PASS);
    let response = app.send(json_request("POST", "/api/login", &body)).await;
    assert_eq!(response.status(), 200);
    cookie_pair(&response, "admin_token").unwrap()
}

/// A hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----booking-gallery-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Smallest byte sequence `infer` recognizes as PNG.
pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// A real 4x3 PNG.
pub fn tiny_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Names of the entries in `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
