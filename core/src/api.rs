//! The executing wrapper: builds a request, runs it, parses the answer.
//!
//! `Api` pairs a `SchoolClient` with a `Transport` and the `SessionStore`.
//! When a call carries no explicit token, the stored token is attached.
//! Endpoint facades (`api.classes()`, `api.teacher()`, ...) live in
//! `crate::endpoints` and all funnel through `Api::send`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::client::{non_blank, RequestOptions, SchoolClient, TokenResponse};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::session::{FileStorage, SessionStorage, SessionStore};
use crate::transport::{Transport, UreqTransport};

pub struct Api {
    client: SchoolClient,
    transport: Box<dyn Transport>,
    session: SessionStore,
}

impl Api {
    pub fn new(
        client: SchoolClient,
        transport: impl Transport + 'static,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            client,
            transport: Box::new(transport),
            session: SessionStore::new(storage),
        }
    }

    /// Production wiring: ureq transport and file-backed session storage.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let dir = match &config.session_dir {
            Some(dir) => dir.clone(),
            None => FileStorage::default_dir()?,
        };
        Ok(Self::new(
            SchoolClient::new(&config.base_url),
            UreqTransport::new(config.timeout()),
            Arc::new(FileStorage::new(dir)),
        ))
    }

    pub fn client(&self) -> &SchoolClient {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn get(&self, path: &str, options: &RequestOptions) -> Result<Value, ApiError> {
        self.send::<()>(HttpMethod::Get, path, None, options)
    }

    pub fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        self.send(HttpMethod::Post, path, Some(body), options)
    }

    pub fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        self.send(HttpMethod::Put, path, body, options)
    }

    pub fn delete(&self, path: &str, options: &RequestOptions) -> Result<Value, ApiError> {
        self.send::<()>(HttpMethod::Delete, path, None, options)
    }

    pub fn send<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        let stored = match non_blank(options.token.as_deref()) {
            Some(_) => None,
            None => self.session.token()?,
        };
        let request = self
            .client
            .build(method, path, body, stored.as_deref(), options)?;
        self.execute(request)
    }

    /// Exchange credentials for a token. Does not touch the session.
    pub fn login(&self, username: &str, password: &str) -> Result<Value, ApiError> {
        self.execute(self.client.build_login(username, password))
    }

    /// `GET /auth/me` with `token`, or the stored token when `None`.
    pub fn current_user(&self, token: Option<&str>) -> Result<Value, ApiError> {
        let stored = match non_blank(token) {
            Some(_) => None,
            None => self.session.token()?,
        };
        self.execute(self.client.build_current_user(token, stored.as_deref()))
    }

    /// Log in, fetch the profile with the new token, and store the session.
    ///
    /// The `loading` cell is raised for the duration of the calls.
    pub fn sign_in(&self, username: &str, password: &str) -> Result<Value, ApiError> {
        self.session.set_loading(true);
        let result = self.sign_in_inner(username, password);
        self.session.set_loading(false);
        result
    }

    fn sign_in_inner(&self, username: &str, password: &str) -> Result<Value, ApiError> {
        let token: TokenResponse = serde_json::from_value(self.login(username, password)?)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let user = self.current_user(Some(token.access_token.as_str()))?;
        self.session.login(user.clone(), &token.access_token)?;
        tracing::info!(username, "signed in");
        Ok(user)
    }

    pub fn sign_out(&self) -> Result<(), ApiError> {
        self.session.logout()
    }

    fn execute(&self, request: HttpRequest) -> Result<Value, ApiError> {
        let method = request.method;
        let path = request.path.clone();
        tracing::debug!(%method, %path, "sending request");

        let response = self.transport.execute(request)?;
        let result = self.client.parse_value(response);
        if let Err(ApiError::Http { status, message, .. }) = &result {
            tracing::warn!(%method, %path, status, %message, "request failed");
        }
        result
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("client", &self.client)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::session::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every request and answers from a fixed queue.
    #[derive(Clone)]
    pub(crate) struct Recorder {
        inner: Arc<RecorderState>,
    }

    struct RecorderState {
        requests: Mutex<Vec<HttpRequest>>,
        responses: Mutex<Vec<HttpResponse>>,
    }

    impl Recorder {
        pub(crate) fn new(responses: Vec<(u16, &str)>) -> Self {
            let responses = responses
                .into_iter()
                .rev()
                .map(|(status, body)| HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                })
                .collect();
            Self {
                inner: Arc::new(RecorderState {
                    requests: Mutex::new(Vec::new()),
                    responses: Mutex::new(responses),
                }),
            }
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.inner.requests.lock().unwrap().clone()
        }

        pub(crate) fn last(&self) -> HttpRequest {
            self.requests().last().cloned().expect("no request recorded")
        }
    }

    impl Transport for Recorder {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.inner.requests.lock().unwrap().push(request);
            self.inner
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ApiError::Transport("no canned response left".into()))
        }
    }

    pub(crate) fn api_with(recorder: &Recorder) -> Api {
        Api::new(
            SchoolClient::new("http://school.test/api"),
            recorder.clone(),
            Arc::new(MemoryStorage::new()),
        )
    }

    #[test]
    fn stored_token_is_attached() {
        let recorder = Recorder::new(vec![(200, "[]")]);
        let api = api_with(&recorder);
        api.session().login(json!({"id": 1}), "stored").unwrap();

        api.get("/admin/classes", &RequestOptions::default()).unwrap();
        assert_eq!(recorder.last().header("authorization"), Some("Bearer stored"));
    }

    #[test]
    fn per_call_token_does_not_leak_into_next_call() {
        let recorder = Recorder::new(vec![(200, "{}"), (200, "{}")]);
        let api = api_with(&recorder);

        api.get("/auth/me", &RequestOptions::with_token("once")).unwrap();
        assert_eq!(recorder.last().header("authorization"), Some("Bearer once"));

        api.get("/auth/me", &RequestOptions::default()).unwrap();
        assert_eq!(recorder.last().header("authorization"), None);
    }

    #[test]
    fn empty_per_call_token_falls_back_to_stored_token() {
        let recorder = Recorder::new(vec![(200, "{}"), (200, "{}")]);
        let api = api_with(&recorder);
        api.session().login(json!({"id": 1}), "stored").unwrap();

        api.get("/admin/classes", &RequestOptions::with_token("")).unwrap();
        assert_eq!(recorder.last().header("authorization"), Some("Bearer stored"));

        api.current_user(Some("")).unwrap();
        assert_eq!(recorder.last().header("authorization"), Some("Bearer stored"));
    }

    #[test]
    fn sign_in_stores_session_and_clears_loading() {
        let recorder = Recorder::new(vec![
            (200, r#"{"access_token":"jwt-1","token_type":"bearer"}"#),
            (200, r#"{"id":7,"email":"t@school.test","role":"teacher"}"#),
        ]);
        let api = api_with(&recorder);

        let user = api.sign_in("t@school.test", "pw").unwrap();
        assert_eq!(user["role"], "teacher");
        assert_eq!(api.session().token().unwrap().as_deref(), Some("jwt-1"));
        assert_eq!(api.session().current_user(), Some(user));
        assert!(!api.session().is_loading());

        let requests = recorder.requests();
        assert_eq!(requests[0].header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(requests[1].path, "http://school.test/api/auth/me");
        assert_eq!(requests[1].header("authorization"), Some("Bearer jwt-1"));
    }

    #[test]
    fn failed_sign_in_leaves_session_empty() {
        let recorder = Recorder::new(vec![(401, r#"{"detail":"Incorrect email or password"}"#)]);
        let api = api_with(&recorder);

        let err = api.sign_in("x@school.test", "bad").unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Incorrect email or password");
        assert!(!api.session().is_authenticated());
        assert!(!api.session().is_loading());
    }

    #[test]
    fn sign_out_clears_session() {
        let recorder = Recorder::new(vec![]);
        let api = api_with(&recorder);
        api.session().login(json!({"id": 1}), "tok").unwrap();
        api.sign_out().unwrap();
        assert_eq!(api.session().token().unwrap(), None);
        assert!(!api.session().init_auth().unwrap());
    }
}
