use serde::Serialize;
use serde_json::Value;

use crate::api::Api;
use crate::client::RequestOptions;
use crate::error::ApiError;
use crate::query::Query;

/// `/teacher/*`: endpoints for the signed-in teacher.
#[derive(Debug, Clone, Copy)]
pub struct TeacherRole<'a> {
    api: &'a Api,
}

impl<'a> TeacherRole<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    /// `GET /teacher/my-assignments[?term_id=..]`.
    pub fn my_assignments(&self, term_id: Option<u64>) -> Result<Value, ApiError> {
        let path = Query::new()
            .with_opt("term_id", term_id)
            .apply("/teacher/my-assignments");
        self.api.get(&path, &RequestOptions::default())
    }

    /// `GET /teacher/classes/{class_id}/students`.
    pub fn students_in_class(&self, class_id: u64) -> Result<Value, ApiError> {
        self.api.get(
            &format!("/teacher/classes/{class_id}/students"),
            &RequestOptions::default(),
        )
    }

    /// `POST /teacher/results`: one student's mark for a subject and term.
    pub fn upload_result<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.api.post("/teacher/results", data, &RequestOptions::default())
    }

    /// `POST /teacher/results/bulk`: marks for a whole class at once.
    pub fn upload_bulk_results<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.api
            .post("/teacher/results/bulk", data, &RequestOptions::default())
    }

    /// `GET /teacher/results[?filters]`.
    pub fn my_results(&self, filters: &Query) -> Result<Value, ApiError> {
        self.api
            .get(&filters.apply("/teacher/results"), &RequestOptions::default())
    }

    /// `PUT /teacher/results/{id}`.
    pub fn update_result<B: Serialize + ?Sized>(&self, id: u64, data: &B) -> Result<Value, ApiError> {
        self.api.put(
            &format!("/teacher/results/{id}"),
            Some(data),
            &RequestOptions::default(),
        )
    }
}
