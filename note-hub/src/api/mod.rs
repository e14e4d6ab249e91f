//! HTTP API layer mapping requests onto the folder hierarchy operations.
//!
//! Every response body is either the expected result fields or a JSON
//! object with a single `error` string.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use note_hub_core::auth::TokenVerifier;
use note_hub_core::events::{Event, EventBus};
use note_hub_core::storage::{FolderRecord, FolderStore};
use note_hub_core::Error;

/// Authentication context extracted from request headers.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
    pub agent_id: Option<String>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                if let Some(claims) = state.verifier.verify(token).await {
                    return Ok(Self {
                        user_id: claims.sub,
                        agent_id: claims.agent,
                    });
                }
            }
        }
        let user = headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if let Some(user_id) = user {
            let agent_id = headers
                .get("X-Agent-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            Ok(Self { user_id, agent_id })
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    error: "missing credentials".to_string(),
                }),
            ))
        }
    }
}

/// Shared application state containing the folder store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<FolderStore>>,
    pub events: EventBus,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Error wire convention: a JSON object with a single `error` string.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn reject(err: Error) -> ApiError {
    let status = match &err {
        Error::FolderNotFound(_) | Error::ParentNotFound(_) | Error::ItemNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        Error::AlreadyInitialized(_) => StatusCode::CONFLICT,
        Error::NotOwner { .. } | Error::OwnerMismatch { .. } => StatusCode::FORBIDDEN,
        Error::SelfMove(_) | Error::CycleDetected { .. } => StatusCode::BAD_REQUEST,
        Error::Io(_) | Error::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "store failure");
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody {
            error: "forbidden".to_string(),
        }),
    )
}

#[derive(Serialize)]
struct RootResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct CreateFolderRequest {
    title: String,
    parent_id: Uuid,
}

#[derive(Deserialize)]
struct MoveRequest {
    new_parent_id: Uuid,
}

#[derive(Deserialize)]
struct InsertItemRequest {
    folder_id: Uuid,
}

#[derive(Serialize)]
struct ChildrenResponse {
    children: Vec<Uuid>,
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<String>,
}

pub fn router(
    store: Arc<RwLock<FolderStore>>,
    events: EventBus,
    verifier: Arc<dyn TokenVerifier>,
) -> Router {
    let app_state = AppState {
        store,
        events,
        verifier,
    };
    Router::new()
        .route("/root", get(get_root).post(init_root))
        .route("/folders", post(create_folder))
        .route("/folders/{id}", get(get_folder).delete(delete_folder))
        .route("/folders/{id}/move", put(move_folder))
        .route("/folders/{id}/children", get(list_children))
        .route("/folders/{id}/items", get(list_items))
        .route("/items/{item}", put(put_item).delete(remove_item))
        .with_state(app_state)
}

async fn init_root(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RootResponse>, ApiError> {
    let store = state.store.write().await;
    let id = store.initialize(&auth.user_id).map_err(reject)?;
    drop(store);
    state.events.send(Event::Created { id });
    Ok(Json(RootResponse { id }))
}

async fn get_root(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RootResponse>, ApiError> {
    let store = state.store.read().await;
    match store.root(&auth.user_id).map_err(reject)? {
        Some(id) => Ok(Json(RootResponse { id })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("user {} has no folder tree", auth.user_id),
            }),
        )),
    }
}

async fn create_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<FolderRecord>, ApiError> {
    let store = state.store.write().await;
    let id = store
        .create(&auth.user_id, &req.title, req.parent_id)
        .map_err(reject)?;
    let rec = store.details(id).map_err(reject)?;
    drop(store);
    state.events.send(Event::Created { id });
    Ok(Json(rec))
}

async fn get_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderRecord>, ApiError> {
    let store = state.store.read().await;
    let rec = store.details(id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    Ok(Json(rec))
}

async fn delete_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.write().await;
    let rec = store.details(id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    store.delete(id).map_err(reject)?;
    drop(store);
    state.events.send(Event::Deleted { id });
    Ok(StatusCode::NO_CONTENT)
}

async fn move_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.write().await;
    let rec = store.details(id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    store.move_folder(id, req.new_parent_id).map_err(reject)?;
    drop(store);
    state.events.send(Event::Moved {
        id,
        new_parent: req.new_parent_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn list_children(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ChildrenResponse>, ApiError> {
    let store = state.store.read().await;
    let rec = store.details(id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    Ok(Json(ChildrenResponse {
        children: rec.children,
    }))
}

async fn list_items(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let store = state.store.read().await;
    let rec = store.details(id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    Ok(Json(ItemsResponse { items: rec.items }))
}

async fn put_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(item): Path<String>,
    Json(req): Json<InsertItemRequest>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.write().await;
    let rec = store.details(req.folder_id).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    store.insert_item(&item, req.folder_id).map_err(reject)?;
    drop(store);
    state.events.send(Event::ItemInserted {
        item,
        folder: req.folder_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(item): Path<String>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.write().await;
    let holder = store
        .locate_item(&item)
        .map_err(reject)?
        .ok_or_else(|| reject(Error::ItemNotFound(item.clone())))?;
    let rec = store.details(holder).map_err(reject)?;
    if rec.owner != auth.user_id {
        return Err(forbidden());
    }
    store.delete_item(&item).map_err(reject)?;
    drop(store);
    state.events.send(Event::ItemDeleted { item });
    Ok(StatusCode::NO_CONTENT)
}
