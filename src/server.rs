//! Development score store.
//!
//! Speaks the same protocol as the spreadsheet web app so clients can be
//! developed offline against it.
//!
//! - `POST /` appends one row (JSON in any content type, or a form body)
//! - `GET /` returns `{ "success": true, "data": [rows] }`

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::store::MemoryStore;

pub fn router(store: Arc<MemoryStore>) -> Router {
    Router::new()
        .route("/", get(list_rows).post(append_row))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// All rows, oldest first.
///
/// GET /
///
/// Query parameters (`action`, `gaming`, `_`) are accepted and ignored;
/// clients filter for themselves.
async fn list_rows(State(store): State<Arc<MemoryStore>>) -> Json<Value> {
    Json(json!({ "success": true, "data": store.raw_rows().await }))
}

/// Append one row.
///
/// POST /
async fn append_row(State(store): State<Arc<MemoryStore>>, request: Request) -> Response {
    let row = match read_row(request).await {
        Ok(row) => row,
        Err(message) => {
            tracing::warn!("Rejected row: {}", message);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response();
        }
    };

    tracing::debug!("Appending row {}", row);
    store.append_raw(row).await;
    Json(json!({ "success": true })).into_response()
}

async fn read_row(request: Request) -> Result<Value, String> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| e.body_text())?;
        let row: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        return Ok(Value::Object(row));
    }

    let body = String::from_request(request, &())
        .await
        .map_err(|e| e.body_text())?;
    match serde_json::from_str::<Value>(&body) {
        Ok(row @ Value::Object(_)) => Ok(row),
        Ok(_) => Err("row must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use tower::ServiceExt;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(content_type: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_appends_text_plain_json() {
        let store = Arc::new(MemoryStore::new());
        let response = router(store.clone())
            .oneshot(post(
                "text/plain;charset=utf-8",
                &json!({
                    "action": "registerPlayer",
                    "gaming": "4821",
                    "player_name": "Hana",
                    "score": "",
                    "points": 0,
                    "place": "Host"
                })
                .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
        assert_eq!(store.raw_rows().await[0]["player_name"], "Hana");
    }

    #[tokio::test]
    async fn test_appends_form_body() {
        let store = Arc::new(MemoryStore::new());
        let response = router(store.clone())
            .oneshot(post(
                "application/x-www-form-urlencoded",
                "action=updateScore&gaming=4821&player_name=Sara+K&score=01%3A05&points=30",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let rows = store.raw_rows().await;
        assert_eq!(rows[0]["player_name"], "Sara K");
        assert_eq!(rows[0]["score"], "01:05");
    }

    #[tokio::test]
    async fn test_rejects_non_object_body() {
        let store = Arc::new(MemoryStore::new());
        let response = router(store.clone())
            .oneshot(post("application/json", "[1, 2]"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
        assert!(store.raw_rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_lists_rows_in_envelope() {
        let store = Arc::new(MemoryStore::new());
        store.append_raw(json!({ "gaming": "1", "player_name": "Hana" })).await;

        let response = router(store)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/?action=getScores&rsult=rsult&gaming=1&_=1700000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["player_name"], "Hana");
    }
}
