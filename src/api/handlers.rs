//! HTTP request handlers for the Incentive Engine API.
//!
//! Every handler tags its work with a fresh correlation id, delegates to the
//! [`crate::service::IncentiveService`] and maps engine errors to JSON error
//! bodies.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::Money;
use crate::service::CalculationRequest;

use super::request::{
    AdjustRequest, ApproveRequest, BatchRequest, BulkApproveRequest, CreateAdjustmentRequest,
    DelegateRequest, EscalateRequest, FindQuery, PayRequest, RecalculateRequest, RejectRequest,
    SubmitRequest, VoidRequest,
};
use super::response::{ApiError, ApiErrorResponse, BatchItemResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/calculations", post(create_calculation).get(find_calculations))
        .route("/calculations/batch", post(run_batch))
        .route("/calculations/:id", get(get_calculation))
        .route("/calculations/:id/history", get(calculation_history))
        .route("/calculations/:id/chain", get(chain_state))
        .route("/calculations/:id/submit", post(submit_for_approval))
        .route("/calculations/:id/adjust", post(adjust))
        .route("/calculations/:id/adjustments", post(create_adjustment))
        .route("/calculations/:id/recalculate", post(recalculate))
        .route("/calculations/:id/void", post(void))
        .route("/calculations/:id/pay", post(mark_paid))
        .route("/approvals/bulk-approve", post(bulk_approve))
        .route("/approvals/:id/approve", post(approve))
        .route("/approvals/:id/reject", post(reject))
        .route("/approvals/:id/delegate", post(delegate))
        .route("/approvals/:id/escalate", post(escalate))
        .route("/sweeps/escalations", post(escalate_overdue))
        .route("/sweeps/expiries", post(expire_overdue))
        .with_state(state)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], Json(body)).into_response()
}

/// Unwraps a JSON body, or builds the 400 response for a rejected one.
fn parse_body<T>(correlation_id: Uuid, payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    let rejection = match payload {
        Ok(Json(request)) => return Ok(request),
        Err(rejection) => rejection,
    };
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::new("VALIDATION_ERROR", body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    Err(json_response(StatusCode::BAD_REQUEST, error))
}

/// Logs the outcome of an operation and renders it.
fn respond<T: Serialize>(
    correlation_id: Uuid,
    operation: &str,
    started: Instant,
    success: StatusCode,
    result: EngineResult<T>,
) -> Response {
    match result {
        Ok(body) => {
            info!(
                correlation_id = %correlation_id,
                operation = operation,
                duration_us = started.elapsed().as_micros(),
                "Request completed"
            );
            json_response(success, body)
        }
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                operation = operation,
                error = %err,
                "Request rejected"
            );
            let api_error: ApiErrorResponse = err.into();
            json_response(api_error.status, api_error.error)
        }
    }
}

fn batch_items<T>(outcomes: Vec<crate::service::BatchOutcome<T>>) -> Vec<BatchItemResponse<T>> {
    outcomes.into_iter().map(BatchItemResponse::from).collect()
}

/// Handler for `POST /calculations`.
async fn create_calculation(
    State(state): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing calculation request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state.service().run_calculation(&request);
    respond(correlation_id, "run_calculation", started, StatusCode::CREATED, result)
}

/// Handler for `POST /calculations/batch`.
async fn run_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    info!(
        correlation_id = %correlation_id,
        requests = request.requests.len(),
        "Processing batch request"
    );
    let started = Instant::now();
    let outcomes = state.service().run_batch(&request.requests);
    respond(correlation_id, "run_batch", started, StatusCode::OK, Ok(batch_items(outcomes)))
}

/// Handler for `GET /calculations`.
async fn find_calculations(State(state): State<AppState>, Query(query): Query<FindQuery>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().find(&query.into());
    respond(correlation_id, "find", started, StatusCode::OK, result)
}

/// Handler for `GET /calculations/:id`.
async fn get_calculation(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().get(id);
    respond(correlation_id, "get", started, StatusCode::OK, result)
}

/// Handler for `GET /calculations/:id/history`.
async fn calculation_history(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().history(id);
    respond(correlation_id, "history", started, StatusCode::OK, result)
}

/// Handler for `GET /calculations/:id/chain`.
async fn chain_state(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().chain_state(id);
    respond(correlation_id, "chain_state", started, StatusCode::OK, result)
}

/// Handler for `POST /calculations/:id/submit`.
async fn submit_for_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing submit request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state.service().submit_for_approval(id, &request.submitted_by);
    respond(correlation_id, "submit_for_approval", started, StatusCode::OK, result)
}

/// Handler for `POST /calculations/:id/adjust`.
///
/// The amount is taken in the calculation's own currency.
async fn adjust(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AdjustRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing adjust request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let service = state.service();
    let result = service.get(id).and_then(|calc| {
        let amount = Money::new(request.new_amount, calc.currency().clone());
        service.adjust(id, amount, &request.reason, &request.adjusted_by)
    });
    respond(correlation_id, "adjust", started, StatusCode::OK, result)
}

/// Handler for `POST /calculations/:id/adjustments`.
async fn create_adjustment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<CreateAdjustmentRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing adjustment request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result =
        state
            .service()
            .create_adjustment(id, request.actual_value, &request.reason, &request.adjusted_by);
    respond(correlation_id, "create_adjustment", started, StatusCode::CREATED, result)
}

/// Handler for `POST /calculations/:id/recalculate`.
async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RecalculateRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing recalculate request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state.service().recalculate(id, request.actual_value);
    respond(correlation_id, "recalculate", started, StatusCode::OK, result)
}

/// Handler for `POST /calculations/:id/void`.
async fn void(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<VoidRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing void request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state.service().void(id, &request.reason, &request.voided_by);
    respond(correlation_id, "void", started, StatusCode::OK, result)
}

/// Handler for `POST /calculations/:id/pay`.
async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PayRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, calculation_id = %id, "Processing payment request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state.service().mark_paid(id, &request.paid_by);
    respond(correlation_id, "mark_paid", started, StatusCode::OK, result)
}

/// Handler for `POST /approvals/:id/approve`.
async fn approve(
    State(state): State<AppState>,
    Path(approval_id): Path<Uuid>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, approval_id = %approval_id, "Processing approve request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state
        .service()
        .approve(approval_id, &request.approver_id, request.comments.as_deref());
    respond(correlation_id, "approve", started, StatusCode::OK, result)
}

/// Handler for `POST /approvals/:id/reject`.
async fn reject(
    State(state): State<AppState>,
    Path(approval_id): Path<Uuid>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, approval_id = %approval_id, "Processing reject request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state
        .service()
        .reject(approval_id, &request.approver_id, &request.reason);
    respond(correlation_id, "reject", started, StatusCode::OK, result)
}

/// Handler for `POST /approvals/:id/delegate`.
async fn delegate(
    State(state): State<AppState>,
    Path(approval_id): Path<Uuid>,
    payload: Result<Json<DelegateRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, approval_id = %approval_id, "Processing delegate request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state
        .service()
        .delegate(approval_id, &request.approver_id, &request.delegate_to);
    respond(correlation_id, "delegate", started, StatusCode::OK, result)
}

/// Handler for `POST /approvals/:id/escalate`.
async fn escalate(
    State(state): State<AppState>,
    Path(approval_id): Path<Uuid>,
    payload: Result<Json<EscalateRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, approval_id = %approval_id, "Processing escalate request");
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let started = Instant::now();
    let result = state
        .service()
        .escalate(approval_id, &request.escalated_by, &request.reason);
    respond(correlation_id, "escalate", started, StatusCode::OK, result)
}

/// Handler for `POST /approvals/bulk-approve`.
async fn bulk_approve(
    State(state): State<AppState>,
    payload: Result<Json<BulkApproveRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match parse_body(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    info!(
        correlation_id = %correlation_id,
        approvals = request.approval_ids.len(),
        approver_id = %request.approver_id,
        "Processing bulk approve request"
    );
    let started = Instant::now();
    let outcomes = state.service().bulk_approve(
        &request.approval_ids,
        &request.approver_id,
        request.comments.as_deref(),
    );
    respond(correlation_id, "bulk_approve", started, StatusCode::OK, Ok(batch_items(outcomes)))
}

/// Handler for `POST /sweeps/escalations`.
async fn escalate_overdue(State(state): State<AppState>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().escalate_overdue().map(batch_items);
    respond(correlation_id, "escalate_overdue", started, StatusCode::OK, result)
}

/// Handler for `POST /sweeps/expiries`.
async fn expire_overdue(State(state): State<AppState>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.service().expire_overdue().map(batch_items);
    respond(correlation_id, "expire_overdue", started, StatusCode::OK, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::str::FromStr;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::clock::ManualClock;
    use crate::config::ConfigLoader;
    use crate::events::{EventOutbox, EventSink, MemorySink};
    use crate::models::{ApprovalStatus, Calculation, CalculationStatus};
    use crate::service::IncentiveService;
    use crate::store::InMemoryStore;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn create_test_state() -> AppState {
        let loader = Arc::new(ConfigLoader::load("./config/sample").expect("Failed to load config"));
        let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()));
        let service = IncentiveService::new(
            loader.clone(),
            loader.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(EventOutbox::new(vec![sink])),
            clock,
            loader.settings().clone(),
        );
        AppState::new(Arc::new(service))
    }

    fn january_request(employee_id: &str) -> Value {
        json!({
            "employee_id": employee_id,
            "plan_id": "plan_sales_2025",
            "period": { "start": "2025-01-01", "end": "2025-01-31" },
            "actual_value": "120000"
        })
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn pending_approval_id(calc: &Calculation) -> Uuid {
        calc.approvals()
            .iter()
            .find(|a| a.status() == ApprovalStatus::Pending)
            .map(|a| a.id())
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_calculation_returns_201() {
        let router = create_router(create_test_state());

        let (status, body) = send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;

        assert_eq!(status, StatusCode::CREATED);
        let calc: Calculation = serde_json::from_slice(&body).unwrap();
        assert_eq!(calc.employee_id(), "emp_001");
        assert_eq!(calc.status(), CalculationStatus::Calculated);
        assert_eq!(calc.achievement().value(), dec("120"));
        assert_eq!(calc.net_incentive().amount, dec("5000"));
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let router = create_router(create_test_state());

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/calculations")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{invalid json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_field_returns_validation_error() {
        let router = create_router(create_test_state());
        let body = json!({ "employee_id": "emp_001", "plan_id": "plan_sales_2025" });

        let (status, body) = send(&router, "POST", "/calculations", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("missing field"), "got: {}", error.message);
    }

    #[tokio::test]
    async fn test_unknown_plan_returns_404() {
        let router = create_router(create_test_state());
        let mut request = january_request("emp_001");
        request["plan_id"] = json!("plan_unknown");

        let (status, body) = send(&router, "POST", "/calculations", Some(request)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_duplicate_calculation_returns_409() {
        let router = create_router(create_test_state());
        send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;

        let (status, body) = send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "DUPLICATE_CALCULATION");
    }

    #[tokio::test]
    async fn test_get_unknown_calculation_returns_404() {
        let router = create_router(create_test_state());
        let (status, _) = send(&router, "GET", &format!("/calculations/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_approver_returns_409() {
        let router = create_router(create_test_state());
        let (_, body) = send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;
        let calc: Calculation = serde_json::from_slice(&body).unwrap();

        let (_, body) = send(
            &router,
            "POST",
            &format!("/calculations/{}/submit", calc.id()),
            Some(json!({ "submitted_by": "analyst" })),
        )
        .await;
        let calc: Calculation = serde_json::from_slice(&body).unwrap();

        let (status, body) = send(
            &router,
            "POST",
            &format!("/approvals/{}/approve", pending_approval_id(&calc)),
            Some(json!({ "approver_id": "head_sales" })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "APPROVER_MISMATCH");
    }

    #[tokio::test]
    async fn test_workflow_to_paid() {
        let router = create_router(create_test_state());
        let (_, body) = send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;
        let calc: Calculation = serde_json::from_slice(&body).unwrap();
        let id = calc.id();

        let (status, body) = send(
            &router,
            "POST",
            &format!("/calculations/{}/submit", id),
            Some(json!({ "submitted_by": "analyst" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calc: Calculation = serde_json::from_slice(&body).unwrap();

        let (status, body) = send(
            &router,
            "POST",
            &format!("/approvals/{}/approve", pending_approval_id(&calc)),
            Some(json!({ "approver_id": "mgr_sales", "comments": "ok" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calc: Calculation = serde_json::from_slice(&body).unwrap();
        assert_eq!(calc.status(), CalculationStatus::PendingApproval);

        let (status, body) = send(&router, "GET", &format!("/calculations/{}/chain", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let chain: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(chain, json!({ "state": "awaiting_level", "level": 2 }));

        let (status, _) = send(
            &router,
            "POST",
            &format!("/approvals/{}/approve", pending_approval_id(&calc)),
            Some(json!({ "approver_id": "head_sales" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            "POST",
            &format!("/calculations/{}/pay", id),
            Some(json!({ "paid_by": "payroll" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calc: Calculation = serde_json::from_slice(&body).unwrap();
        assert_eq!(calc.status(), CalculationStatus::Paid);
        assert!(calc.is_active());
    }

    #[tokio::test]
    async fn test_batch_reports_each_item() {
        let router = create_router(create_test_state());
        let body = json!({ "requests": [january_request("emp_001"), january_request("emp_999")] });

        let (status, body) = send(&router, "POST", "/calculations/batch", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        let items: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].get("result").is_some());
        assert_eq!(items[1]["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_find_filters_by_employee() {
        let router = create_router(create_test_state());
        send(&router, "POST", "/calculations", Some(january_request("emp_001"))).await;
        send(&router, "POST", "/calculations", Some(january_request("emp_002"))).await;

        let (status, body) = send(&router, "GET", "/calculations?employee_id=emp_002", None).await;

        assert_eq!(status, StatusCode::OK);
        let calcs: Vec<Calculation> = serde_json::from_slice(&body).unwrap();
        assert_eq!(calcs.len(), 1);
        assert_eq!(calcs[0].employee_id(), "emp_002");
    }
}
