// SPDX-License-Identifier: Apache-2.0

use crate::{AppState, StoreError, StoreErrorKind, CRATE_NAME};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use contactd_api::{
    contact_dto, contact_list_dto, map_error, ApiError, ApiErrorCode, ContactDto, ContactForm,
};
use contactd_model::{Contact, ContactId};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(map_error(&err).status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": err}))).into_response()
}

pub(crate) fn store_error_to_api(err: &StoreError) -> ApiError {
    let code = match err.kind {
        StoreErrorKind::Unavailable | StoreErrorKind::QueryFailed => ApiErrorCode::StoreUnavailable,
        StoreErrorKind::Conflict => ApiErrorCode::StoreConflict,
        StoreErrorKind::Corrupt => ApiErrorCode::Internal,
    };
    ApiError::new(
        code,
        "store operation failed",
        json!({"message": err.message}),
        "req-unknown",
    )
}

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    if let Some(raw) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    make_request_id(state)
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}

fn is_draining(state: &AppState) -> bool {
    !state.accepting_requests.load(Ordering::Relaxed)
}

fn draining_response(request_id: &str) -> Response {
    api_error_response(
        ApiError::new(
            ApiErrorCode::NotReady,
            "server draining; refusing new requests",
            json!({}),
            request_id,
        ),
    )
}

fn timeout_response(request_id: &str) -> Response {
    api_error_response(ApiError::new(
        ApiErrorCode::Timeout,
        "request timed out",
        json!({}),
        request_id,
    ))
}

/// Bounds handler store work by the configured request timeout. Elapsing
/// answers 504 regardless of how far the work got.
async fn with_deadline<F>(state: &AppState, request_id: &str, work: F) -> Response
where
    F: Future<Output = Response>,
{
    match timeout(state.api.request_timeout, work).await {
        Ok(resp) => resp,
        Err(_) => {
            warn!(request_id = %request_id, "request deadline elapsed");
            timeout_response(request_id)
        }
    }
}

fn write_token_ok(state: &AppState, headers: &HeaderMap) -> bool {
    if !state.api.require_write_token {
        return true;
    }
    let presented = headers
        .get("x-write-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    !presented.is_empty()
        && state
            .api
            .allowed_write_tokens
            .iter()
            .any(|t| t == presented)
}

fn write_token_rejected(request_id: &str) -> Response {
    api_error_response(ApiError::new(
        ApiErrorCode::WriteTokenRejected,
        "missing or unknown write token",
        json!({}),
        request_id,
    ))
}

fn parse_id(raw: &str, request_id: &str) -> Result<ContactId, Response> {
    ContactId::parse(raw).map_err(|_| {
        api_error_response(ApiError::invalid_param("id", raw).with_request_id(request_id))
    })
}

fn validated_contact(form: &ContactForm, request_id: &str) -> Result<Contact, Response> {
    Contact::new(form.name.clone(), form.number.clone()).map_err(|e| {
        api_error_response(
            ApiError::validation_failed(json!([
                {"field": "name", "reason": e.to_string()}
            ]))
            .with_request_id(request_id),
        )
    })
}

async fn finish(
    state: &AppState,
    route: &str,
    started: Instant,
    request_id: &str,
    resp: Response,
) -> Response {
    state
        .metrics
        .observe_request(route, resp.status(), started.elapsed())
        .await;
    with_request_id(resp, request_id)
}

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = (StatusCode::OK, "ok").into_response();
    finish(&state, "/healthz", started, &request_id, resp).await
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    // A draining server stops reporting ready so balancers pull it out of
    // rotation before the listener closes.
    let resp = if state.ready.load(Ordering::Relaxed) && !is_draining(&state) {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not-ready").into_response()
    };
    finish(&state, "/readyz", started, &request_id, resp).await
}

pub(crate) async fn version_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let payload = json!({
        "server": {
            "crate": CRATE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "config_schema_version": crate::config::CONFIG_SCHEMA_VERSION,
            "store_backend": state.context.backend_tag(),
        }
    });
    let resp = Json(payload).into_response();
    finish(&state, "/v1/version", started, &request_id, resp).await
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let body = state.metrics.render().await;
    let resp = (StatusCode::OK, body).into_response();
    finish(&state, "/metrics", started, &request_id, resp).await
}

pub(crate) async fn list_contacts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if is_draining(&state) {
        let resp = draining_response(&request_id);
        return finish(&state, "/contacts", started, &request_id, resp).await;
    }
    info!(request_id = %request_id, route = "/contacts", "request start");
    let resp = with_deadline(&state, &request_id, async {
        match state.context.list().await {
            Ok(contacts) => Json(contact_list_dto(&contacts)).into_response(),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "list failed");
                api_error_response(store_error_to_api(&e).with_request_id(&request_id))
            }
        }
    })
    .await;
    finish(&state, "/contacts", started, &request_id, resp).await
}

pub(crate) async fn new_contact_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let resp = if is_draining(&state) {
        draining_response(&request_id)
    } else {
        Json(ContactDto::blank()).into_response()
    };
    finish(&state, "/contacts/new", started, &request_id, resp).await
}

pub(crate) async fn create_contact_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<ContactForm>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if is_draining(&state) {
        let resp = draining_response(&request_id);
        return finish(&state, "/contacts", started, &request_id, resp).await;
    }
    if !write_token_ok(&state, &headers) {
        let resp = write_token_rejected(&request_id);
        return finish(&state, "/contacts", started, &request_id, resp).await;
    }
    // Clients may round-trip the blank form's empty id, but a real id on
    // create would let them pick identity, which only the store does.
    if let Some(body_id) = form.asserted_id() {
        let resp = api_error_response(
            ApiError::validation_failed(json!([
                {"field": "id", "reason": "identity is assigned by the store", "value": body_id}
            ]))
            .with_request_id(&request_id),
        );
        return finish(&state, "/contacts", started, &request_id, resp).await;
    }
    let contact = match validated_contact(&form, &request_id) {
        Ok(contact) => contact,
        Err(resp) => return finish(&state, "/contacts", started, &request_id, resp).await,
    };
    let resp = with_deadline(&state, &request_id, async {
        match state.context.save(&contact).await {
            Ok(saved) => {
                info!(request_id = %request_id, id = ?saved.id, "contact created");
                (StatusCode::CREATED, Json(contact_dto(&saved))).into_response()
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "create failed");
                api_error_response(store_error_to_api(&e).with_request_id(&request_id))
            }
        }
    })
    .await;
    finish(&state, "/contacts", started, &request_id, resp).await
}

async fn lookup_response(state: &AppState, raw_id: &str, request_id: &str) -> Response {
    let id = match parse_id(raw_id, request_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.context.find_by_id(&id).await {
        Ok(Some(contact)) => Json(contact_dto(&contact)).into_response(),
        Ok(None) => {
            api_error_response(ApiError::contact_not_found(id.as_str()).with_request_id(request_id))
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "lookup failed");
            api_error_response(store_error_to_api(&e).with_request_id(request_id))
        }
    }
}

pub(crate) async fn contact_details_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let resp = if is_draining(&state) {
        draining_response(&request_id)
    } else {
        with_deadline(&state, &request_id, lookup_response(&state, &raw_id, &request_id)).await
    };
    finish(&state, "/contacts/:id", started, &request_id, resp).await
}

pub(crate) async fn edit_contact_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let resp = if is_draining(&state) {
        draining_response(&request_id)
    } else {
        with_deadline(&state, &request_id, lookup_response(&state, &raw_id, &request_id)).await
    };
    finish(&state, "/contacts/:id/edit", started, &request_id, resp).await
}

pub(crate) async fn delete_confirm_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let resp = if is_draining(&state) {
        draining_response(&request_id)
    } else {
        with_deadline(&state, &request_id, lookup_response(&state, &raw_id, &request_id)).await
    };
    finish(&state, "/contacts/:id/delete", started, &request_id, resp).await
}

/// Edit loads the existing record by the path id and overwrites name and
/// number at that same identity, so a re-save can never mint a duplicate.
pub(crate) async fn update_contact_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(form): Json<ContactForm>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if is_draining(&state) {
        let resp = draining_response(&request_id);
        return finish(&state, "/contacts/:id", started, &request_id, resp).await;
    }
    if !write_token_ok(&state, &headers) {
        let resp = write_token_rejected(&request_id);
        return finish(&state, "/contacts/:id", started, &request_id, resp).await;
    }
    let id = match parse_id(&raw_id, &request_id) {
        Ok(id) => id,
        Err(resp) => return finish(&state, "/contacts/:id", started, &request_id, resp).await,
    };
    // The path names the record being edited; a differing body id would
    // silently retarget the write.
    if let Some(body_id) = form.asserted_id() {
        if body_id != id.as_str() {
            let resp = api_error_response(
                ApiError::validation_failed(json!([
                    {"field": "id", "reason": "body id differs from the path id", "value": body_id}
                ]))
                .with_request_id(&request_id),
            );
            return finish(&state, "/contacts/:id", started, &request_id, resp).await;
        }
    }
    let edited = match validated_contact(&form, &request_id) {
        Ok(contact) => contact,
        Err(resp) => return finish(&state, "/contacts/:id", started, &request_id, resp).await,
    };
    let resp = with_deadline(&state, &request_id, async {
        match state.context.find_by_id(&id).await {
            Ok(None) => api_error_response(
                ApiError::contact_not_found(id.as_str()).with_request_id(&request_id),
            ),
            Ok(Some(existing)) => {
                let mut target = existing;
                target.name = edited.name.clone();
                target.number = edited.number.clone();
                match state.context.save(&target).await {
                    Ok(saved) => {
                        info!(request_id = %request_id, id = %id, "contact updated");
                        Json(contact_dto(&saved)).into_response()
                    }
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "update failed");
                        api_error_response(store_error_to_api(&e).with_request_id(&request_id))
                    }
                }
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "update lookup failed");
                api_error_response(store_error_to_api(&e).with_request_id(&request_id))
            }
        }
    })
    .await;
    finish(&state, "/contacts/:id", started, &request_id, resp).await
}

/// Delete pre-checks existence: a missing id is an explicit not-found and
/// performs no store mutation.
pub(crate) async fn delete_contact_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if is_draining(&state) {
        let resp = draining_response(&request_id);
        return finish(&state, "/contacts/:id", started, &request_id, resp).await;
    }
    if !write_token_ok(&state, &headers) {
        let resp = write_token_rejected(&request_id);
        return finish(&state, "/contacts/:id", started, &request_id, resp).await;
    }
    let id = match parse_id(&raw_id, &request_id) {
        Ok(id) => id,
        Err(resp) => return finish(&state, "/contacts/:id", started, &request_id, resp).await,
    };
    let resp = with_deadline(&state, &request_id, async {
        match state.context.find_by_id(&id).await {
            Ok(None) => api_error_response(
                ApiError::contact_not_found(id.as_str()).with_request_id(&request_id),
            ),
            Ok(Some(_)) => match state.context.remove(&id).await {
                Ok(()) => {
                    info!(request_id = %request_id, id = %id, "contact removed");
                    StatusCode::NO_CONTENT.into_response()
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "delete failed");
                    api_error_response(store_error_to_api(&e).with_request_id(&request_id))
                }
            },
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "delete lookup failed");
                api_error_response(store_error_to_api(&e).with_request_id(&request_id))
            }
        }
    })
    .await;
    finish(&state, "/contacts/:id", started, &request_id, resp).await
}
