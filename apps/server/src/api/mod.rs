//! HTTP surface. Every route lives under `/api`.

pub mod sync;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::main_lib::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(sync::router());
    Router::new().nest("/api", api).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::main_lib::build_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: dir.path().to_string_lossy().to_string(),
            pool_size: 2,
            ..Config::default()
        };
        let state = build_state(&config).expect("state");
        (app_router(state), dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn post_json(uri: &str, user: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header(sync::USER_HEADER, user)
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::get(uri)
            .header(sync::USER_HEADER, user)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _dir) = test_app();
        let (status, body) = send(&app, get_as("/api/health", "Guest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn pushed_records_come_back_on_pull() {
        let (app, _dir) = test_app();
        let push = json!({
            "data": [
                {
                    "storeName": "outgrowers",
                    "recordId": "OG-1",
                    "payload": { "outgrowerId": "OG-1", "fullName": "Ama", "region": "North" }
                },
                {
                    "storeName": "outgrowers",
                    "recordId": "OG-2",
                    "payload": { "outgrowerId": "OG-2", "fullName": "Kofi", "region": "South" }
                }
            ]
        });
        let (status, body) =
            send(&app, post_json("/api/sync/push", "officer@example.com", push)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["results"][0]["status"], "success");
        assert_eq!(body["results"][1]["doctype"], "Outgrower");

        let (status, body) = send(
            &app,
            get_as("/api/sync/pull?officer_region=North", "officer@example.com"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let outgrowers = body["data"]["outgrowers"].as_array().expect("outgrowers");
        assert_eq!(outgrowers.len(), 1);
        assert_eq!(outgrowers[0]["fullName"], "Ama");
        assert!(body["data"]["regions"].is_array());
        assert!(body["server_time"].is_string());
    }

    #[tokio::test]
    async fn malformed_push_is_reported_in_band() {
        let (app, _dir) = test_app();
        let (status, body) = send(
            &app,
            post_json("/api/sync/push", "officer@example.com", json!({ "rows": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn bad_watermark_is_a_client_error() {
        let (app, _dir) = test_app();
        let (status, body) =
            send(&app, get_as("/api/sync/pull?last_sync=yesterday", "officer")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn conflicts_are_checked_and_listed() {
        let (app, _dir) = test_app();
        let push = json!([{
            "storeName": "crops",
            "payload": { "name": "Maize", "cropName": "Maize" }
        }]);
        send(&app, post_json("/api/sync/push", "admin@example.com", push)).await;

        let (_, check) = send(
            &app,
            get_as(
                "/api/sync/conflicts/check?doctype=Crop&name=Maize&mobile_modified=2020-01-01T00:00:00Z",
                "officer",
            ),
        )
        .await;
        assert_eq!(check["has_conflict"], true);

        let (_, missing) = send(
            &app,
            get_as(
                "/api/sync/conflicts/check?doctype=Crop&name=Rice&mobile_modified=2020-01-01T00:00:00Z",
                "officer",
            ),
        )
        .await;
        assert_eq!(missing["reason"], "not_found");

        let stale = json!([{
            "storeName": "crops",
            "recordId": "Maize",
            "payload": { "cropName": "Corn", "updatedAt": "2020-01-01T00:00:00Z" }
        }]);
        let (_, body) = send(&app, post_json("/api/sync/push", "officer", stale)).await;
        assert_eq!(body["results"][0]["status"], "conflict");

        let (status, conflicts) =
            send(&app, get_as("/api/sync/conflicts?status=pending", "admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conflicts.as_array().map(Vec::len), Some(1));
        assert_eq!(conflicts[0]["user"], "officer");

        let (status, _) = send(&app, get_as("/api/sync/conflicts?status=archived", "admin")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_sync_and_reference_data() {
        let (app, _dir) = test_app();
        let bulk = json!({
            "data": [
                { "doctype": "Region", "operation": "CREATE", "doc": { "name": "North", "region_name": "North" } },
                { "doctype": "Region", "operation": "DELETE", "doc": { "name": "West" } }
            ]
        });
        let (_, body) = send(&app, post_json("/api/sync/bulk", "admin", bulk)).await;
        assert_eq!(body["results"][0]["status"], "success");
        assert_eq!(body["results"][1]["status"], "not_found");

        let (_, reference) = send(&app, get_as("/api/sync/reference-data", "officer")).await;
        assert_eq!(reference["success"], true);
        assert_eq!(reference["reference_data"]["Region"][0]["region_name"], "North");

        let (_, modified) = send(
            &app,
            get_as(
                "/api/sync/modified?last_sync_timestamp=2000-01-01T00:00:00Z&doctypes=Region",
                "officer",
            ),
        )
        .await;
        assert_eq!(modified["success"], true);
        assert_eq!(
            modified["modified_records"]["Region"].as_array().map(Vec::len),
            Some(1)
        );
    }
}
