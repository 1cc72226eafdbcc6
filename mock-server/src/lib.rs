use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
}

/// What `/echo` saw of the request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<String, User>>>;

pub const BLOB: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x01\xff";

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/form", post(create_user_form))
        .route("/users/nested", get(nested_users))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/greeting", get(greeting))
        .route("/blob", get(blob))
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_users(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<Vec<User>> {
    let users = db.read().await;
    let mut found: Vec<User> = users
        .values()
        .filter(|u| params.name.as_ref().is_none_or(|name| &u.name == name))
        .cloned()
        .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Json(found)
}

async fn insert(db: &Db, input: CreateUser) -> User {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email,
    };
    db.write().await.insert(user.id.clone(), user.clone());
    user
}

async fn create_user(
    State(db): State<Db>,
    Json(input): Json<CreateUser>,
) -> (StatusCode, Json<User>) {
    (StatusCode::CREATED, Json(insert(&db, input).await))
}

async fn create_user_form(
    State(db): State<Db>,
    Form(input): Form<CreateUser>,
) -> (StatusCode, Json<User>) {
    (StatusCode::CREATED, Json(insert(&db, input).await))
}

async fn nested_users(State(db): State<Db>) -> Json<serde_json::Value> {
    let users = db.read().await;
    let mut all: Vec<User> = users.values().cloned().collect();
    all.sort_by(|a, b| a.name.cmp(&b.name));
    Json(serde_json::json!({ "data": { "users": all, "total": all.len() } }))
}

async fn get_user(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<User>, StatusCode> {
    let users = db.read().await;
    users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, StatusCode> {
    let mut users = db.write().await;
    let user = users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(email) = input.email {
        user.email = Some(email);
    }
    Ok(Json(user.clone()))
}

async fn delete_user(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut users = db.write().await;
    users.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

async fn greeting() -> &'static str {
    "hello, world"
}

async fn blob() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], BLOB)
}

async fn echo(
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
