//! Teacher- and student-scoped routes. Each request is resolved to the
//! teacher or student record linked to the caller's account.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::store::{field_u64, Store};
use crate::{object, ApiFailure, AuthUser, Db};

#[derive(Deserialize)]
pub struct TermFilter {
    pub term_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct BulkResults {
    pub class_id: u64,
    pub subject_id: u64,
    pub term_id: u64,
    pub results: Vec<Value>,
}

pub fn routes() -> Router<Db> {
    Router::new()
        .route("/teacher/my-assignments", get(my_assignments))
        .route("/teacher/classes/{class_id}/students", get(students_in_class))
        .route("/teacher/results", post(upload_result).get(teacher_results))
        .route("/teacher/results/bulk", post(upload_bulk))
        .route("/teacher/results/{id}", put(update_result))
        .route("/student/profile", get(profile))
        .route("/student/results", get(student_results))
        .route("/student/results/summary", get(results_summary))
}

fn linked_record(store: &Store, table: &str, user: &AuthUser) -> Result<Value, ApiFailure> {
    let role = if table == "teachers" { "teacher" } else { "student" };
    user.require_role(role)?;
    store
        .find(table, |r| field_u64(r, "user_id") == Some(user.0.id))
        .ok_or_else(|| {
            let label = if table == "teachers" { "Teacher" } else { "Student" };
            ApiFailure::new(StatusCode::NOT_FOUND, format!("{label} profile not found"))
        })
}

fn record_id(record: &Value) -> u64 {
    field_u64(record, "id").unwrap_or_default()
}

fn is_assigned(store: &Store, teacher_id: u64, subject_id: Option<u64>, class_id: u64, term_id: Option<u64>) -> bool {
    store
        .find("assignments", |a| {
            field_u64(a, "teacher_id") == Some(teacher_id)
                && field_u64(a, "class_id") == Some(class_id)
                && subject_id.map_or(true, |s| field_u64(a, "subject_id") == Some(s))
                && term_id.map_or(true, |t| field_u64(a, "term_id") == Some(t))
        })
        .is_some()
}

fn validate_marks(marks: Option<f64>) -> Result<f64, ApiFailure> {
    match marks {
        Some(m) if (0.0..=100.0).contains(&m) => Ok(m),
        Some(_) => Err(ApiFailure::bad_request("Marks must be between 0 and 100")),
        None => Err(ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "marks is required")),
    }
}

async fn my_assignments(
    State(db): State<Db>,
    user: AuthUser,
    Query(filter): Query<TermFilter>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);
    let mut filters = HashMap::from([("teacher_id".to_string(), teacher_id.to_string())]);
    if let Some(term_id) = filter.term_id {
        filters.insert("term_id".into(), term_id.to_string());
    }
    Ok(Json(Value::Array(store.list("assignments", &filters))))
}

async fn students_in_class(
    State(db): State<Db>,
    user: AuthUser,
    Path(class_id): Path<u64>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);
    if !is_assigned(&store, teacher_id, None, class_id, None) {
        return Err(ApiFailure::forbidden("You are not assigned to this class"));
    }
    let filters = HashMap::from([("class_id".to_string(), class_id.to_string())]);
    Ok(Json(Value::Array(store.list("students", &filters))))
}

async fn upload_result(
    State(db): State<Db>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiFailure> {
    let mut fields = object(body)?;
    let mut store = db.write().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);

    let id_of = |key: &str| {
        fields.get(key).and_then(Value::as_u64).ok_or_else(|| {
            ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, format!("{key} is required"))
        })
    };
    let student_id = id_of("student_id")?;
    let subject_id = id_of("subject_id")?;
    let term_id = id_of("term_id")?;
    let student = store.get("students", student_id)?;
    let class_id = field_u64(&student, "class_id").unwrap_or_default();

    if !is_assigned(&store, teacher_id, Some(subject_id), class_id, Some(term_id)) {
        return Err(ApiFailure::forbidden(
            "You are not assigned to teach this subject to this class",
        ));
    }
    validate_marks(fields.get("marks").and_then(Value::as_f64))?;

    let duplicate = store
        .find("results", |r| {
            field_u64(r, "student_id") == Some(student_id)
                && field_u64(r, "subject_id") == Some(subject_id)
                && field_u64(r, "term_id") == Some(term_id)
        })
        .is_some();
    if duplicate {
        return Err(ApiFailure::bad_request(
            "Result already exists for this student, subject, and term",
        ));
    }

    fields.insert("teacher_id".into(), json!(teacher_id));
    Ok((StatusCode::CREATED, Json(store.insert("results", fields))))
}

async fn upload_bulk(
    State(db): State<Db>,
    user: AuthUser,
    Json(bulk): Json<BulkResults>,
) -> Result<(StatusCode, Json<Value>), ApiFailure> {
    let mut store = db.write().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);
    if !is_assigned(&store, teacher_id, Some(bulk.subject_id), bulk.class_id, Some(bulk.term_id)) {
        return Err(ApiFailure::forbidden(
            "You are not assigned to teach this subject to this class",
        ));
    }

    let (mut created, mut updated) = (0u64, 0u64);
    let mut errors = Vec::new();
    for item in &bulk.results {
        let student_id = item.get("student_id").and_then(Value::as_u64);
        let marks = item.get("marks").and_then(Value::as_f64);
        let (Some(student_id), Some(marks)) = (student_id, marks) else {
            errors.push("Missing student_id or marks in result item".to_string());
            continue;
        };
        if validate_marks(Some(marks)).is_err() {
            errors.push(format!("Student {student_id}: Marks must be between 0 and 100"));
            continue;
        }

        let existing = store.find("results", |r| {
            field_u64(r, "student_id") == Some(student_id)
                && field_u64(r, "subject_id") == Some(bulk.subject_id)
                && field_u64(r, "term_id") == Some(bulk.term_id)
        });
        match existing {
            Some(result) => {
                let changes = Map::from_iter([
                    ("marks".to_string(), json!(marks)),
                    ("teacher_id".to_string(), json!(teacher_id)),
                ]);
                store.update("results", record_id(&result), changes)?;
                updated += 1;
            }
            None => {
                let fields = Map::from_iter([
                    ("student_id".to_string(), json!(student_id)),
                    ("subject_id".to_string(), json!(bulk.subject_id)),
                    ("term_id".to_string(), json!(bulk.term_id)),
                    ("marks".to_string(), json!(marks)),
                    ("teacher_id".to_string(), json!(teacher_id)),
                ]);
                store.insert("results", fields);
                created += 1;
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Bulk upload completed",
            "created": created,
            "updated": updated,
            "errors": errors,
        })),
    ))
}

async fn teacher_results(
    State(db): State<Db>,
    user: AuthUser,
    Query(mut filters): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);
    filters.insert("teacher_id".into(), teacher_id.to_string());
    Ok(Json(Value::Array(store.list("results", &filters))))
}

async fn update_result(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiFailure> {
    let changes = object(body)?;
    let mut store = db.write().await;
    let teacher_id = record_id(&linked_record(&store, "teachers", &user)?);
    let result = store.get("results", id)?;
    if field_u64(&result, "teacher_id") != Some(teacher_id) {
        return Err(ApiFailure::not_found("results"));
    }
    if changes.contains_key("marks") {
        validate_marks(changes.get("marks").and_then(Value::as_f64))?;
    }
    store.update("results", id, changes).map(Json)
}

async fn profile(State(db): State<Db>, user: AuthUser) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let mut student = linked_record(&store, "students", &user)?;
    let class_name = field_u64(&student, "class_id")
        .and_then(|id| store.get("classes", id).ok())
        .and_then(|class| class.get("name").cloned())
        .unwrap_or(Value::Null);
    if let Some(fields) = student.as_object_mut() {
        fields.insert("email".into(), json!(user.0.email));
        fields.insert("class_name".into(), class_name);
    }
    Ok(Json(student))
}

fn results_for(store: &Store, student_id: u64, term_id: Option<u64>) -> Vec<Value> {
    let mut filters = HashMap::from([("student_id".to_string(), student_id.to_string())]);
    if let Some(term_id) = term_id {
        filters.insert("term_id".into(), term_id.to_string());
    }
    store.list("results", &filters)
}

fn total_marks(results: &[Value]) -> f64 {
    results
        .iter()
        .filter_map(|r| r.get("marks").and_then(Value::as_f64))
        .sum()
}

async fn student_results(
    State(db): State<Db>,
    user: AuthUser,
    Query(filter): Query<TermFilter>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let student_id = record_id(&linked_record(&store, "students", &user)?);
    Ok(Json(Value::Array(results_for(&store, student_id, filter.term_id))))
}

/// Totals, average, and position by total marks among classmates.
async fn results_summary(
    State(db): State<Db>,
    user: AuthUser,
    Query(filter): Query<TermFilter>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    let student = linked_record(&store, "students", &user)?;
    let student_id = record_id(&student);
    let results = results_for(&store, student_id, filter.term_id);
    let total = total_marks(&results);
    let average = if results.is_empty() {
        0.0
    } else {
        total / results.len() as f64
    };

    let (position, class_size) = match field_u64(&student, "class_id") {
        Some(class_id) => {
            let classmates = store.list(
                "students",
                &HashMap::from([("class_id".to_string(), class_id.to_string())]),
            );
            let better = classmates
                .iter()
                .filter(|s| total_marks(&results_for(&store, record_id(s), filter.term_id)) > total)
                .count();
            (json!(better + 1), json!(classmates.len()))
        }
        None => (Value::Null, Value::Null),
    };

    Ok(Json(json!({
        "student_id": student_id,
        "term_id": filter.term_id,
        "subjects_count": results.len(),
        "total_marks": total,
        "average": average,
        "position": position,
        "class_size": class_size,
        "results": results,
    })))
}
