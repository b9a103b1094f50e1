use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::ApiFailure;

pub const ADMIN_EMAIL: &str = "admin@school.test";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Resources served under `/admin/<name>`, plus `results` which only the
/// teacher and student routes touch.
pub const RESOURCES: [&str; 7] = [
    "classes",
    "subjects",
    "terms",
    "teachers",
    "students",
    "assignments",
    "results",
];

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
}

/// In-memory state: users, issued tokens, and one table per resource.
#[derive(Debug)]
pub struct Store {
    users: Vec<User>,
    tokens: HashMap<String, u64>,
    tables: HashMap<&'static str, BTreeMap<u64, Value>>,
    next_id: u64,
}

impl Default for Store {
    fn default() -> Self {
        let mut store = Self {
            users: Vec::new(),
            tokens: HashMap::new(),
            tables: RESOURCES.iter().map(|name| (*name, BTreeMap::new())).collect(),
            next_id: 1,
        };
        store
            .add_user(ADMIN_EMAIL, ADMIN_PASSWORD, "admin")
            .expect("seed admin");
        store
    }
}

impl Store {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_user(&mut self, email: &str, password: &str, role: &str) -> Result<User, ApiFailure> {
        if !matches!(role, "admin" | "teacher" | "student") {
            return Err(ApiFailure::bad_request(
                "Role must be 'admin', 'teacher', or 'student'",
            ));
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(ApiFailure::bad_request("Email already registered"));
        }
        let user = User {
            id: self.allocate_id(),
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Check credentials and issue a fresh bearer token.
    pub fn issue_token(&mut self, email: &str, password: &str) -> Option<String> {
        let user_id = self
            .users
            .iter()
            .find(|u| u.email == email && u.password == password)?
            .id;
        let token = format!("mock-token-{user_id}-{}", self.allocate_id());
        self.tokens.insert(token.clone(), user_id);
        Some(token)
    }

    pub fn user_for_token(&self, token: &str) -> Option<&User> {
        self.tokens.get(token).and_then(|id| self.user(*id))
    }

    pub fn table(&self, name: &str) -> &BTreeMap<u64, Value> {
        self.tables.get(name).expect("known resource")
    }

    fn table_mut(&mut self, name: &str) -> &mut BTreeMap<u64, Value> {
        self.tables.get_mut(name).expect("known resource")
    }

    pub fn get(&self, name: &str, id: u64) -> Result<Value, ApiFailure> {
        self.table(name)
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiFailure::not_found(name))
    }

    /// Records whose fields match every filter, compared as strings.
    pub fn list(&self, name: &str, filters: &HashMap<String, String>) -> Vec<Value> {
        self.table(name)
            .values()
            .filter(|record| matches_filters(record, filters))
            .cloned()
            .collect()
    }

    pub fn find(&self, name: &str, predicate: impl Fn(&Value) -> bool) -> Option<Value> {
        self.table(name).values().find(|r| predicate(r)).cloned()
    }

    pub fn insert(&mut self, name: &'static str, mut fields: Map<String, Value>) -> Value {
        let id = self.allocate_id();
        fields.insert("id".into(), json!(id));
        let record = Value::Object(fields);
        self.table_mut(name).insert(id, record.clone());
        record
    }

    pub fn update(&mut self, name: &str, id: u64, changes: Map<String, Value>) -> Result<Value, ApiFailure> {
        let record = self
            .table_mut(name)
            .get_mut(&id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| ApiFailure::not_found(name))?;
        for (key, value) in changes {
            if key != "id" {
                record.insert(key, value);
            }
        }
        Ok(Value::Object(record.clone()))
    }

    pub fn delete(&mut self, name: &str, id: u64) -> Result<(), ApiFailure> {
        self.table_mut(name)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiFailure::not_found(name))
    }

    /// Make `id` the only active term.
    pub fn activate_term(&mut self, id: u64) -> Result<(), ApiFailure> {
        if !self.table("terms").contains_key(&id) {
            return Err(ApiFailure::not_found("terms"));
        }
        for (term_id, term) in self.table_mut("terms").iter_mut() {
            if let Some(fields) = term.as_object_mut() {
                fields.insert("is_active".into(), json!(*term_id == id));
            }
        }
        Ok(())
    }
}

/// Singular display name used in "not found" messages.
pub fn singular(name: &str) -> &'static str {
    match name {
        "classes" => "Class",
        "subjects" => "Subject",
        "terms" => "Term",
        "teachers" => "Teacher",
        "students" => "Student",
        "assignments" => "Assignment",
        "results" => "Result",
        _ => "Resource",
    }
}

pub fn field_as_string(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn field_u64(record: &Value, key: &str) -> Option<u64> {
    record.get(key).and_then(Value::as_u64)
}

fn matches_filters(record: &Value, filters: &HashMap<String, String>) -> bool {
    filters
        .iter()
        .all(|(key, wanted)| field_as_string(record, key).as_deref() == Some(wanted.as_str()))
}
