use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Map, Value};

use crate::store::{field_as_string, field_u64, singular, Store};
use crate::{object, ApiFailure, AuthUser, Db};

const ADMIN_RESOURCES: [&str; 6] = ["classes", "subjects", "terms", "teachers", "students", "assignments"];

type Filters = Query<HashMap<String, String>>;

pub fn routes() -> Router<Db> {
    let mut router = Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/users", get(users))
        .route("/admin/terms/active", get(active_term))
        .route("/admin/terms/{id}/activate", put(activate_term));

    for name in ADMIN_RESOURCES {
        router = router
            .route(
                &format!("/admin/{name}"),
                get(move |db: State<Db>, user: AuthUser, filters: Filters| list(name, db, user, filters))
                    .post(move |db: State<Db>, user: AuthUser, body: Json<Value>| create(name, db, user, body)),
            )
            .route(
                &format!("/admin/{name}/{{id}}"),
                get(move |db: State<Db>, user: AuthUser, id: Path<u64>| get_one(name, db, user, id))
                    .put(move |db: State<Db>, user: AuthUser, id: Path<u64>, body: Json<Value>| {
                        update(name, db, user, id, body)
                    })
                    .delete(move |db: State<Db>, user: AuthUser, id: Path<u64>| delete(name, db, user, id)),
            );
    }
    router
}

async fn dashboard(State(db): State<Db>, user: AuthUser) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    let store = db.read().await;
    Ok(Json(json!({
        "total_students": store.table("students").len(),
        "total_teachers": store.table("teachers").len(),
        "total_classes": store.table("classes").len(),
        "total_subjects": store.table("subjects").len(),
    })))
}

async fn users(State(db): State<Db>, user: AuthUser) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    let store = db.read().await;
    Ok(Json(json!(store.users())))
}

async fn active_term(State(db): State<Db>, user: AuthUser) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    db.read()
        .await
        .find("terms", |t| t["is_active"] == true)
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "No active term found"))
}

async fn activate_term(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    db.write().await.activate_term(id)?;
    Ok(Json(json!({ "message": "Term activated successfully" })))
}

async fn list(
    name: &'static str,
    State(db): State<Db>,
    user: AuthUser,
    Query(filters): Filters,
) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    Ok(Json(Value::Array(db.read().await.list(name, &filters))))
}

async fn get_one(
    name: &'static str,
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    db.read().await.get(name, id).map(Json)
}

async fn create(
    name: &'static str,
    State(db): State<Db>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiFailure> {
    user.require_role("admin")?;
    let mut fields = object(body)?;
    let mut store = db.write().await;

    match name {
        "classes" | "subjects" => ensure_unique_name(&store, name, &fields)?,
        "terms" => {
            fields.entry("is_active").or_insert(json!(false));
        }
        "teachers" | "students" => attach_account(&mut store, name, &mut fields)?,
        "assignments" => {
            for (key, table) in [
                ("teacher_id", "teachers"),
                ("subject_id", "subjects"),
                ("class_id", "classes"),
                ("term_id", "terms"),
            ] {
                let id = fields.get(key).and_then(Value::as_u64).ok_or_else(|| {
                    ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, format!("{key} is required"))
                })?;
                store.get(table, id)?;
            }
        }
        _ => {}
    }

    let record = store.insert(name, fields);
    tracing::debug!(resource = name, id = ?field_u64(&record, "id"), "created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update(
    name: &'static str,
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    let changes = object(body)?;
    db.write().await.update(name, id, changes).map(Json)
}

async fn delete(
    name: &'static str,
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiFailure> {
    user.require_role("admin")?;
    db.write().await.delete(name, id)?;
    Ok(Json(json!({
        "message": format!("{} deleted successfully", singular(name))
    })))
}

fn ensure_unique_name(store: &Store, name: &str, fields: &Map<String, Value>) -> Result<(), ApiFailure> {
    let Some(wanted) = fields.get("name").and_then(Value::as_str) else {
        return Err(ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "name is required"));
    };
    let taken = store
        .find(name, |r| field_as_string(r, "name").as_deref() == Some(wanted))
        .is_some();
    if taken {
        return Err(ApiFailure::bad_request(format!(
            "{} with this name already exists",
            singular(name)
        )));
    }
    Ok(())
}

/// Teachers and students come with a login: create the user account from
/// `email`/`password` and link it through `user_id`.
fn attach_account(store: &mut Store, name: &str, fields: &mut Map<String, Value>) -> Result<(), ApiFailure> {
    let role = if name == "teachers" { "teacher" } else { "student" };
    let email = fields.get("email").and_then(Value::as_str).map(str::to_string);
    let password = fields.remove("password");
    let (Some(email), Some(Value::String(password))) = (email, password) else {
        return Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "email and password are required",
        ));
    };
    let account = store.add_user(&email, &password, role)?;
    fields.insert("user_id".into(), json!(account.id));
    Ok(())
}
