use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use rilievo_core::survey::{EntityKind, EntityRecord};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

/// Accepts the payload collection name (`edifici`) or the storage name (`edificio`).
fn parse_kind(value: &str) -> ApiResult<EntityKind> {
    EntityKind::from_collection_name(value)
        .or_else(|| EntityKind::from_db_str(value))
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown entity kind '{}'", value)))
}

async fn list_entities(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<EntityRecord>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.entity_repository.list_entities(kind)?))
}

async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<EntityRecord>> {
    let kind = parse_kind(&kind)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid id '{}': {}", id, e)))?;
    state
        .entity_repository
        .get_entity(kind, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No {} with id {}", kind.as_db_str(), id)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/entities/:kind", get(list_entities))
        .route("/entities/:kind/:id", get(get_entity))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use rilievo_core::sync::derive_id;

    use crate::api::test_support::{app, get, post_json, send};

    #[tokio::test]
    async fn synced_entities_are_listed_by_kind() {
        let (app, _) = app();
        send(
            &app,
            post_json(
                "/api/v1/sync",
                json!({
                    "deviceId": "tablet-1",
                    "data": {
                        "complessi": [{ "Id": "C1", "Cod": "X" }],
                        "edifici": [{ "Id": "E1", "ParentId": "C1" }]
                    }
                }),
            ),
        )
        .await;

        let (status, body) = send(&app, get("/api/v1/entities/edifici")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/v1/entities/complesso/{}", derive_id("C1"));
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"]["Cod"], json!("X"));
        assert_eq!(
            body["childIds"]["edificio"],
            json!([derive_id("E1").to_string()])
        );
    }

    #[tokio::test]
    async fn unknown_kinds_and_ids_are_rejected() {
        let (app, _) = app();

        let (status, _) = send(&app, get("/api/v1/entities/garage")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get("/api/v1/entities/complessi/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/entities/complessi/{}", derive_id("C404"));
        let (status, _) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
