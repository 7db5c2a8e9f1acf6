// Client of the IS notepad export API (`/export/pb_blok_api`)
//
// Every operation is a single GET against the same endpoint; the operation
// name and its parameters travel in the query string. Responses are parsed
// into a shared `Document` and handed out as typed entities.

use crate::document::{Document, DocumentError};
use crate::entities::{
    CourseInfo, CourseStudents, Exams, NotepadContent, NotesList, SeminarStudents,
    SeminarTeachers, WriteResult,
};
use crate::params::Params;
use crate::resource::{Entity, TIMESTAMP_FORMAT};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, Level};

/// Path of the export API below the IS domain.
pub const API_PATH: &str = "/export/pb_blok_api";

/// Query key of the access token; masked in logs.
pub const TOKEN_KEY: &str = "klic";

/// Root element of an error payload returned with a success status.
pub const ERROR_ELEMENT: &str = "CHYBA";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("API error payload: {0}")]
    ErrorPayload(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    DocumentError(#[from] DocumentError),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// IS domain, e.g. `is.muni.cz`.
    pub domain: String,
    /// Access key of the notepad API.
    pub token: String,
    pub course_code: String,
    pub faculty_id: u32,
    /// Turn non-2xx responses and error payloads into `Err`. When off, they are
    /// logged and the operation yields an entity over an empty document.
    pub fail_on_error: bool,
    pub timeout_ms: u64,
    /// Most verbose level this client emits events at.
    pub log_level: LevelFilter,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: "is.muni.cz".to_string(),
            token: String::new(),
            course_code: String::new(),
            faculty_id: 0,
            fail_on_error: true,
            timeout_ms: 30000,
            log_level: LevelFilter::DEBUG,
        }
    }
}

impl ClientConfig {
    pub fn new(domain: &str, token: &str, course_code: &str, faculty_id: u32) -> Self {
        Self {
            domain: domain.to_string(),
            token: token.to_string(),
            course_code: course_code.to_string(),
            faculty_id,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        for (name, value) in [
            ("domain", &self.domain),
            ("token", &self.token),
            ("course_code", &self.course_code),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::ConfigError(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    pub fn api_url(&self) -> String {
        format!("https://{}{}", self.domain, API_PATH)
    }
}

/// Which extra students a listing includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFilter {
    /// Also list students who only registered for the course.
    pub registered: bool,
    /// Also list students whose studies were terminated.
    pub terminated: bool,
    /// Also list inactive students.
    pub inactive: bool,
}

impl StudentFilter {
    fn apply(&self, params: &mut Params) {
        params
            .flag("zareg", self.registered)
            .flag("vcukonc", self.terminated)
            .flag("vcneaktiv", self.inactive);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotepad {
    pub name: String,
    pub shortcut: String,
    /// Students may see their own entry.
    pub visible: bool,
    /// Teachers are expected to fill in every student.
    pub complete: bool,
    pub statistic: bool,
}

impl NewNotepad {
    pub fn new(name: &str, shortcut: &str) -> Self {
        Self {
            name: name.to_string(),
            shortcut: shortcut.to_string(),
            visible: false,
            complete: true,
            statistic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotepadUpdate {
    pub shortcut: String,
    pub uco: i64,
    pub content: String,
    /// Last change the caller has seen; the server refuses the write if the
    /// entry changed since.
    pub last_change: Option<NaiveDateTime>,
    pub overwrite: bool,
}

impl NotepadUpdate {
    pub fn new(shortcut: &str, uco: i64, content: &str) -> Self {
        Self {
            shortcut: shortcut.to_string(),
            uco,
            content: content.to_string(),
            last_change: None,
            overwrite: true,
        }
    }
}

/// Raw outcome of one GET.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse, ApiError>;
}

/// `reqwest` transport; the inner client is reused as the session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        Ok(Self { client, timeout_ms })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, ApiError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout_ms)
            } else {
                ApiError::NetworkError(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        Ok(RawResponse { status, body })
    }
}

pub struct IsApiClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl IsApiClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.timeout_ms)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> IsApiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        config.validate()?;
        let client = Self { config, transport };
        if client.logs(Level::DEBUG) {
            debug!(client = %client, "[INIT] Created client");
        }
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url(&self) -> String {
        self.config.api_url()
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    pub fn course(&self) -> &str {
        &self.config.course_code
    }

    pub fn faculty(&self) -> u32 {
        self.config.faculty_id
    }

    fn logs(&self, level: Level) -> bool {
        level <= self.config.log_level
    }

    pub async fn course_info(&self) -> Result<CourseInfo, ApiError> {
        self.read("predmet-info", Params::new()).await
    }

    pub async fn course_list_students(
        &self,
        filter: StudentFilter,
    ) -> Result<CourseStudents, ApiError> {
        let mut params = Params::new();
        filter.apply(&mut params);
        self.read("predmet-seznam", params).await
    }

    /// Students of the given seminar groups. Registration-only students are
    /// not part of seminar listings, so `filter.registered` is ignored.
    pub async fn seminar_list_students(
        &self,
        seminars: &[&str],
        filter: StudentFilter,
    ) -> Result<SeminarStudents, ApiError> {
        let mut params = Params::new();
        params.set_all("seminar", seminars.iter());
        StudentFilter {
            registered: false,
            ..filter
        }
        .apply(&mut params);
        self.read("seminar-seznam", params).await
    }

    pub async fn seminar_list_teachers(
        &self,
        seminars: &[&str],
    ) -> Result<SeminarTeachers, ApiError> {
        let mut params = Params::new();
        params.set_all("seminar", seminars.iter());
        self.read("seminar-cvicici-seznam", params).await
    }

    /// Content of the notepad `shortcut`, for every student or only `ucos`.
    pub async fn notepad_content(
        &self,
        shortcut: &str,
        ucos: &[i64],
    ) -> Result<NotepadContent, ApiError> {
        let mut params = Params::new();
        params.set("zkratka", shortcut);
        if !ucos.is_empty() {
            params.set_all("uco", ucos.iter());
        }
        self.read("blok-dej-obsah", params).await
    }

    pub async fn notepad_list(&self) -> Result<NotesList, ApiError> {
        self.read("bloky-seznam", Params::new()).await
    }

    pub async fn notepad_new(&self, notepad: &NewNotepad) -> Result<WriteResult, ApiError> {
        let mut params = Params::new();
        params
            .set("jmeno", &notepad.name)
            .set("zkratka", &notepad.shortcut)
            .yes_no("nahlizi", notepad.visible)
            .yes_no("nedoplnovat", !notepad.complete)
            .yes_no("statistika", notepad.statistic);
        self.write("blok-novy", params).await
    }

    pub async fn notepad_update(&self, update: &NotepadUpdate) -> Result<WriteResult, ApiError> {
        let mut params = Params::new();
        params
            .set("zkratka", &update.shortcut)
            .set("uco", update.uco)
            .set("obsah", &update.content);
        if let Some(last_change) = update.last_change {
            params.set("poslzmeneno", last_change.format(TIMESTAMP_FORMAT));
        }
        params.flag("prepis", update.overwrite);
        self.write("blok-pis-student-obsah", params).await
    }

    pub async fn exams_list(&self, filter: StudentFilter) -> Result<Exams, ApiError> {
        let mut params = Params::new();
        StudentFilter {
            registered: false,
            ..filter
        }
        .apply(&mut params);
        self.read("terminy-seznam", params).await
    }

    async fn read<E: Entity>(&self, operation: &str, params: Params) -> Result<E, ApiError> {
        if self.logs(Level::DEBUG) {
            debug!(operation, params = %params, "[READ] Invoking operation");
        }
        let document = self.operation(operation, &params).await?;
        Ok(E::from_document(document))
    }

    async fn write<E: Entity>(&self, operation: &str, params: Params) -> Result<E, ApiError> {
        if self.logs(Level::INFO) {
            info!(operation, params = %params, "[NOTES] Invoking operation");
        }
        let document = self.operation(operation, &params).await?;
        Ok(E::from_document(document))
    }

    // Credentials and operation first, then `params`
    fn request_query(&self, operation: &str, params: &Params) -> Params {
        let mut query = Params::new();
        query
            .set(TOKEN_KEY, &self.config.token)
            .set("fakulta", self.config.faculty_id)
            .set("kod", &self.config.course_code)
            .set("operace", operation)
            .extend(params);
        query
    }

    /// Builds the request URL: credentials and operation first, then `params`.
    pub fn request_url(&self, operation: &str, params: &Params) -> Result<Url, ApiError> {
        let query = self.request_query(operation, params);
        let mut url =
            Url::parse(&self.url()).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.set_query(Some(&query.serialize()));
        Ok(url)
    }

    /// The request of `operation` as logged, with the access key masked.
    pub fn redacted_request(&self, operation: &str, params: &Params) -> String {
        format!(
            "{}?{}",
            self.url(),
            self.request_query(operation, params).redacted(TOKEN_KEY)
        )
    }

    /// Invokes `operation` and parses the response document.
    pub async fn operation(
        &self,
        operation: &str,
        params: &Params,
    ) -> Result<Arc<Document>, ApiError> {
        let url = self.request_url(operation, params)?;
        if self.logs(Level::DEBUG) {
            let request = self.redacted_request(operation, params);
            debug!(%request, "[REQ] New request");
        }

        let response = self.transport.get(&url).await?;

        if !response.is_success() {
            let message = response.text();
            if self.logs(Level::ERROR) {
                error!(status = response.status, %message, "[RES] Request failed");
            }
            if self.config.fail_on_error {
                return Err(ApiError::ApiResponseError {
                    status_code: response.status,
                    message,
                });
            }
            return Ok(Arc::new(Document::empty()));
        }

        if self.logs(Level::DEBUG) {
            debug!(
                status = response.status,
                bytes = response.body.len(),
                "[RES] Response received"
            );
        }

        let document = Document::from_bytes(&response.body)?;
        if let Some(message) = error_payload(&document) {
            if self.logs(Level::ERROR) {
                error!(%message, "[RES] Server reported an error");
            }
            if self.config.fail_on_error {
                return Err(ApiError::ErrorPayload(message));
            }
            return Ok(Arc::new(Document::empty()));
        }

        Ok(Arc::new(document))
    }
}

impl<T: Transport> fmt::Display for IsApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]: (FAC={}, COURSE={})",
            self.config.domain, self.config.faculty_id, self.config.course_code
        )
    }
}

fn error_payload(document: &Document) -> Option<String> {
    let root = document.root_element()?;
    if document.name(root) == Some(ERROR_ELEMENT) {
        Some(document.string_value(root).trim().to_string())
    } else {
        None
    }
}
