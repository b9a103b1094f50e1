use serde_json::Value;

use crate::api::Api;
use crate::client::RequestOptions;
use crate::error::ApiError;
use crate::query::Query;

/// `/student/*`: endpoints for the signed-in student.
#[derive(Debug, Clone, Copy)]
pub struct StudentRole<'a> {
    api: &'a Api,
}

impl<'a> StudentRole<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    pub fn profile(&self) -> Result<Value, ApiError> {
        self.api.get("/student/profile", &RequestOptions::default())
    }

    /// `GET /student/results[?term_id=..]`.
    pub fn my_results(&self, term_id: Option<u64>) -> Result<Value, ApiError> {
        self.get_for_term("/student/results", term_id)
    }

    /// `GET /student/results/summary[?term_id=..]`: totals, average and class position.
    pub fn results_summary(&self, term_id: Option<u64>) -> Result<Value, ApiError> {
        self.get_for_term("/student/results/summary", term_id)
    }

    fn get_for_term(&self, path: &str, term_id: Option<u64>) -> Result<Value, ApiError> {
        let path = Query::new().with_opt("term_id", term_id).apply(path);
        self.api.get(&path, &RequestOptions::default())
    }
}
