use serde::Serialize;
use serde_json::Value;

use crate::api::Api;
use crate::client::RequestOptions;
use crate::error::ApiError;
use crate::query::Query;

/// Plain CRUD over `/admin/<resource>`.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    api: &'a Api,
    path: &'static str,
}

impl<'a> Resource<'a> {
    pub(crate) fn new(api: &'a Api, path: &'static str) -> Self {
        Self { api, path }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn get_all(&self) -> Result<Value, ApiError> {
        self.api.get(self.path, &RequestOptions::default())
    }

    pub fn get_one(&self, id: u64) -> Result<Value, ApiError> {
        self.api.get(&self.item(id), &RequestOptions::default())
    }

    pub fn create<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.api.post(self.path, data, &RequestOptions::default())
    }

    pub fn update<B: Serialize + ?Sized>(&self, id: u64, data: &B) -> Result<Value, ApiError> {
        self.api.put(&self.item(id), Some(data), &RequestOptions::default())
    }

    pub fn delete(&self, id: u64) -> Result<Value, ApiError> {
        self.api.delete(&self.item(id), &RequestOptions::default())
    }

    fn item(&self, id: u64) -> String {
        format!("{}/{id}", self.path)
    }

    fn list_with(&self, query: &Query) -> Result<Value, ApiError> {
        self.api.get(&query.apply(self.path), &RequestOptions::default())
    }
}

/// `/admin/terms`, with activation and the active-term lookup.
#[derive(Debug, Clone, Copy)]
pub struct Terms<'a> {
    resource: Resource<'a>,
}

impl<'a> Terms<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self {
            resource: Resource::new(api, "/admin/terms"),
        }
    }

    pub fn get_all(&self) -> Result<Value, ApiError> {
        self.resource.get_all()
    }

    pub fn get_one(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.get_one(id)
    }

    /// `GET /admin/terms/active`.
    pub fn get_active(&self) -> Result<Value, ApiError> {
        self.resource
            .api
            .get("/admin/terms/active", &RequestOptions::default())
    }

    pub fn create<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.resource.create(data)
    }

    pub fn update<B: Serialize + ?Sized>(&self, id: u64, data: &B) -> Result<Value, ApiError> {
        self.resource.update(id, data)
    }

    /// `PUT /admin/terms/{id}/activate`, no body. Deactivates every other term.
    pub fn activate(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.api.put::<()>(
            &format!("{}/activate", self.resource.item(id)),
            None,
            &RequestOptions::default(),
        )
    }

    pub fn delete(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.delete(id)
    }
}

/// `/admin/students`, optionally filtered by class.
#[derive(Debug, Clone, Copy)]
pub struct Students<'a> {
    resource: Resource<'a>,
}

impl<'a> Students<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self {
            resource: Resource::new(api, "/admin/students"),
        }
    }

    /// `GET /admin/students[?class_id=..]`.
    pub fn get_all(&self, class_id: Option<u64>) -> Result<Value, ApiError> {
        self.resource
            .list_with(&Query::new().with_opt("class_id", class_id))
    }

    pub fn get_one(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.get_one(id)
    }

    pub fn create<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.resource.create(data)
    }

    pub fn update<B: Serialize + ?Sized>(&self, id: u64, data: &B) -> Result<Value, ApiError> {
        self.resource.update(id, data)
    }

    pub fn delete(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.delete(id)
    }
}

/// `/admin/assignments`: teacher-to-subject/class/term links. No update.
#[derive(Debug, Clone, Copy)]
pub struct Assignments<'a> {
    resource: Resource<'a>,
}

impl<'a> Assignments<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self {
            resource: Resource::new(api, "/admin/assignments"),
        }
    }

    /// `GET /admin/assignments[?filters]`, e.g. `teacher_id`, `class_id`, `term_id`.
    pub fn get_all(&self, filters: &Query) -> Result<Value, ApiError> {
        self.resource.list_with(filters)
    }

    pub fn get_one(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.get_one(id)
    }

    pub fn create<B: Serialize + ?Sized>(&self, data: &B) -> Result<Value, ApiError> {
        self.resource.create(data)
    }

    pub fn delete(&self, id: u64) -> Result<Value, ApiError> {
        self.resource.delete(id)
    }
}

/// School-wide admin views.
#[derive(Debug, Clone, Copy)]
pub struct AdminOverview<'a> {
    api: &'a Api,
}

impl<'a> AdminOverview<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    /// `GET /admin/dashboard`: headline counts.
    pub fn dashboard(&self) -> Result<Value, ApiError> {
        self.api.get("/admin/dashboard", &RequestOptions::default())
    }

    /// `GET /admin/users`.
    pub fn users(&self) -> Result<Value, ApiError> {
        self.api.get("/admin/users", &RequestOptions::default())
    }
}
