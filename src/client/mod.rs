use std::thread;

use http::{header, HeaderValue, Method, Request, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Serialize};
use slog::{debug, info, Logger};

use crate::session::{Session, SessionState};

mod access_key;
mod backup;
mod error;
mod project;
mod transport;
mod user;

pub use access_key::AccessKey;
pub use backup::{Backup, BackupType};
pub use error::{ApiError, TransportError};
pub use project::{
    BackupStatus, NotificationKind, NotificationParams, Project, ProjectCreateParams,
    ProjectUpdateParams,
};
pub use transport::{Transport, UreqTransport};
pub use user::User;

#[cfg(test)]
pub use transport::testing;

use access_key::AccessKeyCreateParams;
use project::TestNotificationRequest;
use user::{AuthRequest, AuthResponse, ChangePasswordRequest};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

/// Everything shown on a project's page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOverview {
    pub project: Project,
    pub backups: Vec<Backup>,
    pub access_keys: Vec<AccessKey>,
}

pub struct Client {
    log: Logger,
    transport: Box<dyn Transport>,
    base_url: String,
    session: SessionState,
}

impl Client {
    pub fn new(
        log: Logger,
        base_url: impl Into<String>,
        transport: Box<dyn Transport>,
        session: SessionState,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            log,
            transport,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authorized(&self) -> bool {
        self.session.is_authorized()
    }

    pub fn user(&self) -> Option<User> {
        self.session.user()
    }

    fn send_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = Request::builder().method(method.clone()).uri(&url);

        // Add bearer token, if there is a session
        if let Some(token) = self.session.token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError(e.to_string()))?;
            value.set_sensitive(true);
            builder = builder.header(header::AUTHORIZATION, value);
        }
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.unwrap_or_default())
            .map_err(TransportError::from)?;

        let response = self.transport.send(request)?;
        let status = response.status();
        debug!(self.log, "Response received"; "method" => %method, "url" => &url, "status" => status.as_u16());

        if !status.is_success() {
            return Err(ApiError::from_response(status, response.body()));
        }
        Ok(response.into_body())
    }

    fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>, ApiError> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_request(method, path, body)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let bytes = self.send_request(Method::GET, path, None)?;
        decode(&bytes)
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send_request(Method::DELETE, path, None)?;
        Ok(())
    }

    pub fn authorize(&self, username: &str, password: &str) -> Result<User, ApiError> {
        debug!(self.log, "Authorizing"; "url" => &self.base_url, "username" => username);

        // A stale token must not ride along with a login attempt
        let request = Request::post(format!("{}/api/authorize", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .body(
                serde_json::to_vec(&AuthRequest { username, password })
                    .map_err(|e| ApiError::Decode(e.to_string()))?,
            )
            .map_err(TransportError::from)?;
        let response = self.transport.send(request)?;
        if !response.status().is_success() {
            return Err(ApiError::from_response(response.status(), response.body()));
        }

        let AuthResponse { token, user } = decode(response.body())?;
        self.session
            .begin(Session {
                token,
                user: user.clone(),
            })
            .map_err(|e| ApiError::Session(e.to_string()))?;

        info!(self.log, "Logged in"; "username" => &user.username, "id" => user.id);
        Ok(user)
    }

    pub fn unauthorize(&self) -> Result<(), ApiError> {
        self.session
            .end()
            .map_err(|e| ApiError::Session(e.to_string()))?;
        info!(self.log, "Logged out");
        Ok(())
    }

    pub fn get_me(&self) -> Result<User, ApiError> {
        self.get("/api/me")
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        debug!(self.log, "Changing password"; "url" => &self.base_url);
        self.call(
            Method::POST,
            "/api/me/password",
            Some(&ChangePasswordRequest {
                old_password,
                new_password,
            }),
        )?;
        Ok(())
    }

    pub fn get_projects(&self) -> Result<Vec<Project>, ApiError> {
        debug!(self.log, "Getting projects"; "url" => &self.base_url);
        self.get("/api/projects")
    }

    pub fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        debug!(self.log, "Getting project"; "url" => &self.base_url, "id" => id);
        self.get(&format!("/api/projects/{}", segment(id)))
    }

    pub fn create_project(&self, params: &ProjectCreateParams) -> Result<Project, ApiError> {
        debug!(self.log, "Creating project"; "url" => &self.base_url, "id" => &params.id);
        let bytes = self.call(Method::POST, "/api/projects", Some(params))?;
        decode(&bytes)
    }

    pub fn update_project(
        &self,
        id: &str,
        params: &ProjectUpdateParams,
    ) -> Result<Project, ApiError> {
        debug!(self.log, "Updating project"; "url" => &self.base_url, "id" => id);
        let bytes = self.call(Method::PUT, &format!("/api/projects/{}", segment(id)), Some(params))?;
        decode(&bytes)
    }

    pub fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        debug!(self.log, "Deleting project"; "url" => &self.base_url, "id" => id);
        self.delete(&format!("/api/projects/{}", segment(id)))
    }

    pub fn get_project_backups(&self, id: &str) -> Result<Vec<Backup>, ApiError> {
        debug!(self.log, "Getting backups"; "url" => &self.base_url, "project" => id);
        self.get(&format!("/api/projects/{}/backup", segment(id)))
    }

    pub fn backup_download_url(&self, backup_id: &str) -> String {
        format!("{}/api/backup/{}", self.base_url, segment(backup_id))
    }

    /// Fetches the stored backup file.
    pub fn download_backup(&self, backup_id: &str) -> Result<Vec<u8>, ApiError> {
        debug!(self.log, "Downloading backup"; "url" => &self.base_url, "id" => backup_id);
        self.send_request(
            Method::GET,
            &format!("/api/backup/{}", segment(backup_id)),
            None,
        )
    }

    pub fn delete_backup(&self, backup_id: &str) -> Result<(), ApiError> {
        debug!(self.log, "Deleting backup"; "url" => &self.base_url, "id" => backup_id);
        self.delete(&format!("/api/backup/{}", segment(backup_id)))
    }

    pub fn get_project_access_keys(&self, project_id: &str) -> Result<Vec<AccessKey>, ApiError> {
        debug!(self.log, "Getting access keys"; "url" => &self.base_url, "project" => project_id);
        self.get(&format!("/api/projects/{}/keys", segment(project_id)))
    }

    pub fn get_project_access_key(
        &self,
        project_id: &str,
        key_id: i64,
    ) -> Result<AccessKey, ApiError> {
        self.get(&format!("/api/projects/{}/keys/{}", segment(project_id), key_id))
    }

    pub fn create_project_access_key(
        &self,
        project_id: &str,
        label: &str,
    ) -> Result<AccessKey, ApiError> {
        debug!(self.log, "Creating access key"; "url" => &self.base_url, "project" => project_id, "label" => label);
        let bytes = self.call(
            Method::POST,
            &format!("/api/projects/{}/keys", segment(project_id)),
            Some(&AccessKeyCreateParams { label }),
        )?;
        decode(&bytes)
    }

    pub fn delete_project_access_key(&self, project_id: &str, key_id: i64) -> Result<(), ApiError> {
        debug!(self.log, "Deleting access key"; "url" => &self.base_url, "project" => project_id, "id" => key_id);
        self.delete(&format!("/api/projects/{}/keys/{}", segment(project_id), key_id))
    }

    /// Asks the server to send a test message to `target`.
    pub fn test_notification(&self, kind: NotificationKind, target: &str) -> Result<(), ApiError> {
        debug!(self.log, "Sending test notification"; "url" => &self.base_url, "kind" => kind.as_str(), "target" => target);
        self.call(
            Method::POST,
            &format!("/api/notify/{}", kind.as_str()),
            Some(&TestNotificationRequest { target }),
        )?;
        Ok(())
    }

    /// Loads a project with its backups and access keys.
    ///
    /// The three requests run concurrently. On failure the error of the
    /// project request wins, then backups, then keys.
    pub fn get_project_overview(&self, id: &str) -> Result<ProjectOverview, ApiError> {
        thread::scope(|s| {
            let backups = s.spawn(|| self.get_project_backups(id));
            let access_keys = s.spawn(|| self.get_project_access_keys(id));
            let project = self.get_project(id);

            let backups = backups
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e));
            let access_keys = access_keys
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e));

            Ok(ProjectOverview {
                project: project?,
                backups: backups?,
                access_keys: access_keys?,
            })
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

impl ApiError {
    /// The session was rejected, so logging in again is the fix.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use slog::o;

    use super::{
        testing::{empty, json, FakeTransport},
        *,
    };
    use crate::session::{testing::MemoryStore, SessionStore, TOKEN_KEY, USER_KEY};

    fn project_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Main DB",
            "isActive": true,
            "backupFrequency": 86400,
            "backupRetention": 10,
            "notifications": {"enabled": false, "slack": [], "telegram": [], "webhook": []},
            "backupStatus": "none"
        })
    }

    fn backend(method: &Method, path: &str) -> Result<http::Response<Vec<u8>>, TransportError> {
        match (method.as_str(), path) {
            ("POST", "/api/authorize") => json(
                StatusCode::OK,
                json!({"token": "t0k3n", "user": {"id": 7, "username": "alice"}}),
            ),
            ("GET", "/api/projects") => json(StatusCode::OK, json!([project_json("db-main")])),
            ("GET", "/api/projects/db-main") => json(StatusCode::OK, project_json("db-main")),
            ("GET", "/api/projects/db-main/backup") => json(
                StatusCode::OK,
                json!([
                    {"id": "b2", "filename": "2.zip", "time": "2020-01-02T00:00:00Z", "type": "last", "length": 2048},
                    {"id": "b1", "filename": "1.zip", "time": "2020-01-01T00:00:00Z", "type": "archive"}
                ]),
            ),
            ("GET", "/api/projects/db-main/keys") => json(
                StatusCode::OK,
                json!([{"id": 1, "label": "ci", "key": "secret"}]),
            ),
            ("GET", "/api/projects/missing") => json(
                StatusCode::NOT_FOUND,
                json!({"error": "not_found", "message": "project \"missing\" not found"}),
            ),
            ("GET", "/api/projects/missing/backup") | ("GET", "/api/projects/missing/keys") => {
                empty(StatusCode::NOT_FOUND)
            }
            ("DELETE", _) => empty(StatusCode::NO_CONTENT),
            ("POST", "/api/notify/telegram") | ("POST", "/api/me/password") => {
                json(StatusCode::OK, json!({}))
            }
            _ => Err(TransportError("connection refused".to_owned())),
        }
    }

    fn client_with(store: Arc<MemoryStore>) -> (Client, Arc<FakeTransport>) {
        let log = Logger::root(slog::Discard, o!());
        let transport = FakeTransport::new(backend);
        let session = SessionState::restore(log.clone(), Box::new(store));
        let client = Client::new(log, "http://backup.local/", Box::new(transport.clone()), session);
        (client, transport)
    }

    #[test]
    fn login_attaches_bearer_and_logout_clears_it() {
        let store = Arc::new(MemoryStore::default());
        let (client, transport) = client_with(store.clone());

        client.get_projects().unwrap();
        assert_eq!(transport.last().authorization, None);

        let user = client.authorize("alice", "secret").unwrap();
        assert_eq!(user.username, "alice");
        let login = transport.last();
        assert_eq!(login.authorization, None);
        assert_eq!(login.json(), json!({"username": "alice", "password": "secret"}));
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("t0k3n"));
        assert!(store.get(USER_KEY).unwrap().unwrap().contains("alice"));

        client.get_projects().unwrap();
        assert_eq!(transport.last().authorization.as_deref(), Some("Bearer t0k3n"));

        client.unauthorize().unwrap();
        assert!(!client.is_authorized());
        assert!(store.get(TOKEN_KEY).unwrap().is_none());
        assert!(store.get(USER_KEY).unwrap().is_none());

        client.get_projects().unwrap();
        assert_eq!(transport.last().authorization, None);
    }

    #[test]
    fn session_is_restored_from_store() {
        let store = Arc::new(MemoryStore::default());
        store.set(TOKEN_KEY, "persisted").unwrap();
        store.set(USER_KEY, r#"{"id":3,"username":"bob"}"#).unwrap();

        let (client, transport) = client_with(store);
        assert_eq!(client.user().unwrap().username, "bob");

        client.get_project("db-main").unwrap();
        assert_eq!(transport.last().authorization.as_deref(), Some("Bearer persisted"));
    }

    #[test]
    fn errors_are_normalized() {
        let (client, _) = client_with(Arc::new(MemoryStore::default()));

        let err = client.get_project("missing").unwrap_err();
        assert_eq!(err.to_string(), "project \"missing\" not found");

        let err = client.get_project_backups("missing").unwrap_err();
        assert_eq!(err.to_string(), "404");

        let err = client.get_project("offline").unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn failed_login_keeps_session_empty() {
        let log = Logger::root(slog::Discard, o!());
        let transport = FakeTransport::new(|_, _| {
            json(
                StatusCode::BAD_REQUEST,
                json!({"error": "bad_request", "message": "invalid credentials"}),
            )
        });
        let store = Arc::new(MemoryStore::default());
        let session = SessionState::restore(log.clone(), Box::new(store.clone()));
        let client = Client::new(log, "http://backup.local", Box::new(transport), session);

        let err = client.authorize("alice", "wrong").unwrap_err();
        assert_eq!(err.to_string(), "invalid credentials");
        assert!(!client.is_authorized());
        assert!(store.get(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn overview_matches_individual_calls() {
        let (client, transport) = client_with(Arc::new(MemoryStore::default()));

        let overview = client.get_project_overview("db-main").unwrap();
        assert_eq!(overview.project, client.get_project("db-main").unwrap());
        assert_eq!(overview.backups, client.get_project_backups("db-main").unwrap());
        assert_eq!(
            overview.access_keys,
            client.get_project_access_keys("db-main").unwrap()
        );
        assert_eq!(overview.backups[0].r#type, BackupType::Last);
        assert_eq!(transport.requests().len(), 6);
    }

    #[test]
    fn overview_reports_project_error_first() {
        let (client, _) = client_with(Arc::new(MemoryStore::default()));

        let err = client.get_project_overview("missing").unwrap_err();
        assert_eq!(err.to_string(), "project \"missing\" not found");
    }

    #[test]
    fn requests_hit_expected_endpoints() {
        let (client, transport) = client_with(Arc::new(MemoryStore::default()));

        client.delete_backup("b1").unwrap();
        assert_eq!(transport.last().method, Method::DELETE);
        assert_eq!(transport.last().path, "/api/backup/b1");

        client.delete_project_access_key("db-main", 4).unwrap();
        assert_eq!(transport.last().path, "/api/projects/db-main/keys/4");

        client
            .test_notification(NotificationKind::Telegram, "-100123")
            .unwrap();
        let sent = transport.last();
        assert_eq!(sent.path, "/api/notify/telegram");
        assert_eq!(sent.json(), json!({"target": "-100123"}));

        client.change_password("old", "new").unwrap();
        assert_eq!(
            transport.last().json(),
            json!({"oldPassword": "old", "newPassword": "new"})
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let (client, _) = client_with(Arc::new(MemoryStore::default()));
        assert_eq!(
            client.backup_download_url("a b/c"),
            "http://backup.local/api/backup/a%20b%2Fc"
        );
    }
}
