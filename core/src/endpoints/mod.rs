//! Endpoint tables: one facade per REST resource.
//!
//! Each facade borrows the `Api`, builds a path (plus an optional query
//! string), and returns the parsed JSON body unchanged. Ids are the
//! server's integer primary keys.

mod admin;
mod auth;
mod student;
mod teacher;

pub use admin::{AdminOverview, Assignments, Resource, Students, Terms};
pub use auth::Auth;
pub use student::StudentRole;
pub use teacher::TeacherRole;

use crate::api::Api;

impl Api {
    pub fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    pub fn admin(&self) -> AdminOverview<'_> {
        AdminOverview::new(self)
    }

    pub fn classes(&self) -> Resource<'_> {
        Resource::new(self, "/admin/classes")
    }

    pub fn subjects(&self) -> Resource<'_> {
        Resource::new(self, "/admin/subjects")
    }

    pub fn terms(&self) -> Terms<'_> {
        Terms::new(self)
    }

    pub fn teachers(&self) -> Resource<'_> {
        Resource::new(self, "/admin/teachers")
    }

    pub fn students(&self) -> Students<'_> {
        Students::new(self)
    }

    pub fn assignments(&self) -> Assignments<'_> {
        Assignments::new(self)
    }

    pub fn teacher(&self) -> TeacherRole<'_> {
        TeacherRole::new(self)
    }

    pub fn student(&self) -> StudentRole<'_> {
        StudentRole::new(self)
    }
}
