use serde::Serialize;
use serde_json::Value;

use crate::api::Api;
use crate::client::RequestOptions;
use crate::error::ApiError;

/// `/auth/*` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    api: &'a Api,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    /// `POST /auth/login` with form-encoded credentials. Returns the token body.
    pub fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        self.api.login(email, password)
    }

    /// `GET /auth/me`. An explicit `token` is used instead of the stored one.
    pub fn current_user(&self, token: Option<&str>) -> Result<Value, ApiError> {
        self.api.current_user(token)
    }

    /// `POST /auth/register`.
    pub fn register<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.api.post("/auth/register", data, &RequestOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{api_with, Recorder};
    use crate::http::HttpMethod;
    use serde_json::json;

    #[test]
    fn login_never_sends_json() {
        let recorder = Recorder::new(vec![(200, r#"{"access_token":"a","token_type":"bearer"}"#)]);
        let api = api_with(&recorder);
        api.session().login(json!({"id": 1}), "old").unwrap();

        let body = api.auth().login("a@school.test", "pw").unwrap();
        assert_eq!(body["access_token"], "a");

        let req = recorder.last();
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.header("authorization"), None);
        assert_eq!(req.body.as_deref(), Some("username=a%40school.test&password=pw"));
    }

    #[test]
    fn register_posts_json() {
        let recorder = Recorder::new(vec![(201, r#"{"id":3,"email":"n@school.test","role":"student"}"#)]);
        let api = api_with(&recorder);
        api.auth()
            .register(&json!({"email": "n@school.test", "password": "pw", "role": "student"}))
            .unwrap();

        let req = recorder.last();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://school.test/api/auth/register");
        assert_eq!(req.header("content-type"), Some("application/json"));
    }
}
