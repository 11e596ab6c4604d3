//! HTTP entrypoint for the migration engine.
//!
//! `tiny_http` blocks on `recv`, so the accept loop lives on a blocking
//! thread and drives the async engine through the runtime handle. Requests
//! are served one at a time; the engine still rejects overlapping runs for
//! the same guest.
//!
//! Routes:
//! - `POST /migrate`
//! - `GET /guests/{guestId}/eligibility`
//! - `GET /health`

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use lum_core::responses::{ErrorResponse, MigrateRequest};
use serde::Serialize;
use serde_json::json;
use tokio::runtime::Handle;

use crate::context::AppContext;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Status code and JSON body of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(error) => {
                tracing::error!(%error, "failed to encode response body");
                Self {
                    status: 500,
                    body: r#"{"success":false,"error":"failed to encode response"}"#.to_string(),
                }
            }
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &ErrorResponse {
                success: false,
                error: message.into(),
            },
        )
    }
}

/// Route one request. `url` may carry a query string, which is ignored.
pub async fn route(ctx: &AppContext, method: &str, url: &str, body: &[u8]) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        ("GET", ["health"]) => Reply::json(200, &json!({"status": "ok"})),
        ("POST", ["migrate"]) => migrate(ctx, body).await,
        ("GET", ["guests", guest_id, "eligibility"]) => eligibility(ctx, guest_id).await,
        (_, ["health" | "migrate"] | ["guests", _, "eligibility"]) => {
            Reply::error(405, format!("method {method} not allowed on {path}"))
        }
        _ => Reply::error(404, format!("no route for {method} {path}")),
    }
}

async fn migrate(ctx: &AppContext, body: &[u8]) -> Reply {
    let request: MigrateRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(error) => return Reply::error(400, format!("invalid migrate request: {error}")),
    };

    match ctx.engine.migrate(request.into()).await {
        Ok(outcome) => {
            let response = outcome.to_response();
            Reply::json(response.status_code(), &response)
        }
        Err(error) => {
            tracing::error!(%error, "migration could not start");
            Reply::error(500, error.to_string())
        }
    }
}

async fn eligibility(ctx: &AppContext, guest_id: &str) -> Reply {
    match ctx.engine.check_eligibility(guest_id).await {
        Ok(response) => Reply::json(200, &response),
        Err(error) => {
            tracing::error!(guest = guest_id, %error, "eligibility check failed");
            Reply::error(500, error.to_string())
        }
    }
}

/// Accept loop. Returns once `shutdown` is set.
pub fn serve_blocking(
    server: &tiny_http::Server,
    ctx: &AppContext,
    runtime: &Handle,
    max_body_bytes: u64,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let mut request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(error) => {
                tracing::warn!(%error, "failed to receive request");
                continue;
            }
        };

        let method = request.method().to_string();
        let url = request.url().to_string();
        let reply = match read_body(&mut request, max_body_bytes) {
            Ok(body) => runtime.block_on(route(ctx, &method, &url, &body)),
            Err(reply) => reply,
        };
        tracing::debug!(%method, %url, status = reply.status, "request served");
        respond(request, reply);

        let pruned = ctx.engine.logger().prune_expired(Utc::now());
        if pruned > 0 {
            tracing::debug!(pruned, "expired migration sessions dropped");
        }
    }
}

fn read_body(request: &mut tiny_http::Request, max_body_bytes: u64) -> Result<Vec<u8>, Reply> {
    let declared = request
        .body_length()
        .map(|len| u64::try_from(len).unwrap_or(u64::MAX));
    if declared.is_some_and(|len| len > max_body_bytes) {
        return Err(too_large(max_body_bytes));
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_body_bytes.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|error| Reply::error(400, format!("failed to read request body: {error}")))?;

    if u64::try_from(body.len()).unwrap_or(u64::MAX) > max_body_bytes {
        return Err(too_large(max_body_bytes));
    }
    Ok(body)
}

fn too_large(max_body_bytes: u64) -> Reply {
    Reply::error(413, format!("request body exceeds {max_body_bytes} bytes"))
}

fn respond(request: tiny_http::Request, reply: Reply) {
    let mut response = tiny_http::Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = tiny_http::Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    if let Err(error) = request.respond(response) {
        tracing::warn!(%error, "failed to send response");
    }
}

#[cfg(test)]
mod tests {
    use lum_config::{LoggingConfig, LumConfig, StoreConfig};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::route;
    use crate::context::AppContext;

    async fn context() -> AppContext {
        let config = LumConfig {
            store: StoreConfig {
                db_path: ":memory:".into(),
            },
            logging: LoggingConfig {
                log_dir: String::new(),
                ..LoggingConfig::default()
            },
            ..LumConfig::default()
        };
        AppContext::init(config).await.expect("context should start")
    }

    fn migrate_body(title: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "guestId": "guest-9",
            "accountId": "acct-9",
            "guestData": {
                "curricula": [{
                    "id": "c1",
                    "title": title,
                    "domain": "languages",
                    "created_at": "2026-05-01T10:00:00Z",
                    "modules": [{
                        "id": "m1",
                        "title": "Greetings",
                        "lessons": [{
                            "id": "l1",
                            "title": "Hola",
                            "duration_minutes": 10,
                            "completed": false,
                            "completed_at": null
                        }]
                    }]
                }],
                "flashcards": [{
                    "id": "f1",
                    "front": "hola",
                    "back": "hello",
                    "last_reviewed_at": null
                }]
            }
        }))
        .expect("body")
    }

    fn body(reply: &super::Reply) -> Value {
        serde_json::from_str(&reply.body).expect("reply body is json")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let ctx = context().await;
        let reply = route(&ctx, "GET", "/health", &[]).await;
        assert_eq!(reply.status, 200);
        assert_eq!(body(&reply), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn migrate_then_eligibility() {
        let ctx = context().await;

        let before = route(&ctx, "GET", "/guests/guest-9/eligibility", &[]).await;
        assert_eq!(before.status, 200);
        assert_eq!(body(&before)["shouldMigrate"], false);

        let reply = route(&ctx, "POST", "/migrate", &migrate_body("Spanish Basics")).await;
        assert_eq!(reply.status, 200, "{}", reply.body);
        let value = body(&reply);
        assert_eq!(value["success"], true);
        assert_eq!(value["migrationResults"]["plans"]["success"], 1);
        assert_eq!(value["migrationResults"]["flashcards"]["success"], 1);
        assert_eq!(value["conflictResolution"]["strategy"], "merge_with_preference");
        assert!(value["sessionId"].as_str().is_some_and(|id| id.starts_with("mig-")));

        let after = route(&ctx, "GET", "/guests/guest-9/eligibility?verbose=1", &[]).await;
        let value = body(&after);
        assert_eq!(value["shouldMigrate"], false);
        assert_eq!(value["reason"], "guest data already migrated");
        assert_eq!(value["stats"]["consumed"], true);
    }

    #[tokio::test]
    async fn invalid_guest_data_is_a_400_with_report() {
        let ctx = context().await;
        let reply = route(&ctx, "POST", "/migrate", &migrate_body("   ")).await;
        assert_eq!(reply.status, 400);
        let value = body(&reply);
        assert_eq!(value["success"], false);
        assert_eq!(value["validationReport"]["valid"], false);
        assert!(value["sessionId"].is_string());
    }

    #[tokio::test]
    async fn blank_account_id_is_a_400_without_rollback() {
        let ctx = context().await;
        let mut request: Value = serde_json::from_slice(&migrate_body("Spanish Basics")).unwrap();
        request["accountId"] = json!("  ");

        let reply = route(&ctx, "POST", "/migrate", &serde_json::to_vec(&request).unwrap()).await;
        assert_eq!(reply.status, 400, "{}", reply.body);
        let value = body(&reply);
        assert_eq!(value["error"], "accountId must not be empty");
        assert_eq!(value["validationReport"]["valid"], false);
        assert!(value.get("rollbackPerformed").is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let ctx = context().await;
        let reply = route(&ctx, "POST", "/migrate", b"{\"guestId\": 7}").await;
        assert_eq!(reply.status, 400);
        let value = body(&reply);
        assert_eq!(value["success"], false);
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|e| e.starts_with("invalid migrate request"))
        );
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let ctx = context().await;
        assert_eq!(route(&ctx, "GET", "/nope", &[]).await.status, 404);
        assert_eq!(route(&ctx, "GET", "/migrate", &[]).await.status, 405);
        assert_eq!(route(&ctx, "DELETE", "/guests/g1/eligibility", &[]).await.status, 405);
    }
}
