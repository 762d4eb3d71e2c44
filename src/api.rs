// REST API with Axum
//
// Every JSON body is wrapped in the envelope {status, data, message}.
// Client errors (400/404) carry their message; store failures are logged
// and answered with a generic retryable message.

use crate::db;
use crate::error::{FieldError, LedgerError, LedgerResult};
use crate::listing::{transaction_listing, TransactionListing};
use crate::models::{Agent, AgentPatch, NewAgent, NewTransaction, Transaction, TransactionUpdate};
use crate::reports::{report_data, ChartData, DateWindow, ReportData};
use crate::shaping::ReportSummary;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    clock: fn() -> DateTime<Utc>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            clock: Utc::now,
        }
    }

    /// Fixed "now", for deterministic trailing windows and default dates.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run `f` against the connection; a poisoned lock is a store failure.
    fn with_db<T>(&self, f: impl FnOnce(&mut Connection) -> LedgerResult<T>) -> Result<T, AppError> {
        let mut conn = self
            .db
            .lock()
            .map_err(|_| LedgerError::Unavailable("database lock poisoned".to_string()))?;
        Ok(f(&mut *conn)?)
    }
}

// ============================================================================
// Envelope & errors
// ============================================================================

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::ok(data)
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorData {
    errors: Vec<FieldError>,
}

#[derive(Debug)]
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(LedgerError::validation("body", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            warn!("Rejected request: {}", self.0);
        } else {
            error!("Request failed: {}", self.0);
        }

        let (status, message, data) = match &self.0 {
            LedgerError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                self.0.to_string(),
                Some(ErrorData {
                    errors: errors.clone(),
                }),
            ),
            LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string(), None),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The operation could not be completed, please try again".to_string(),
                None,
            ),
        };

        let body = ApiResponse {
            status: "error".to_string(),
            data,
            message: Some(message),
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Handlers: health
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

// ============================================================================
// Handlers: agents
// ============================================================================

/// GET /agents - All agents
async fn list_agents(State(state): State<AppState>) -> ApiResult<Vec<Agent>> {
    ok(state.with_db(|conn| db::get_all_agents(conn))?)
}

/// GET /agents/:id - One agent
async fn get_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Agent> {
    ok(state.with_db(|conn| db::require_agent(conn, &id))?)
}

/// POST /agents - Create an agent
async fn create_agent(
    State(state): State<AppState>,
    payload: Result<Json<NewAgent>, JsonRejection>,
) -> ApiResult<Agent> {
    let Json(new_agent) = payload?;
    let agent = new_agent.into_agent()?;

    state.with_db(|conn| db::insert_agent(conn, &agent))?;
    info!("Created agent {} ({})", agent.id, agent.display_name());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(agent, "Agent has been created successfully!")),
    ))
}

/// PATCH /agents/:id - Partial update
async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AgentPatch>, JsonRejection>,
) -> ApiResult<Agent> {
    let Json(patch) = payload?;

    let agent = state.with_db(|conn| {
        let current = db::require_agent(conn, &id)?;
        let updated = patch.apply(&current)?;
        if !db::update_agent(conn, &updated)? {
            return Err(LedgerError::not_found("agent", &id));
        }
        Ok(updated)
    })?;
    info!("Updated agent {}", agent.id);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok_with_message(agent, "Agent has been updated successfully!")),
    ))
}

/// DELETE /agents/:id - Delete (no cascade)
async fn delete_agent(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let deleted = state.with_db(|conn| db::delete_agent(conn, &id))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LedgerError::not_found("agent", &id).into())
    }
}

// ============================================================================
// Handlers: transactions
// ============================================================================

/// GET /transactions/transaction-data - Unpaged listing snapshot
async fn transaction_data(State(state): State<AppState>) -> ApiResult<TransactionListing> {
    ok(state.with_db(transaction_listing)?)
}

/// POST /transactions/transaction - Create a transaction
async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> ApiResult<Transaction> {
    let Json(new_tx) = payload?;
    let tx = new_tx.into_transaction(state.now())?;

    state.with_db(|conn| db::insert_transaction(conn, &tx))?;
    info!("Transaction {} inserted ({} for agent {})", tx.id, tx.amount, tx.agent_id);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok_with_message(tx, "Transaction successful!")),
    ))
}

/// PUT /transactions/transaction/:id - Update amount/agent/date
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TransactionUpdate>, JsonRejection>,
) -> ApiResult<Transaction> {
    let Json(update) = payload?;

    let tx = state.with_db(|conn| {
        let current = db::get_transaction(conn, &id)?
            .ok_or_else(|| LedgerError::not_found("transaction", &id))?;
        let updated = update.apply(&current)?;
        db::update_transaction(conn, &updated)?;
        Ok(updated)
    })?;
    info!("Transaction {} updated", tx.id);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok_with_message(tx, "Transaction updated successfully!")),
    ))
}

// ============================================================================
// Handlers: reports
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

impl ReportQuery {
    fn window(&self) -> LedgerResult<DateWindow> {
        DateWindow::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

fn load_report(state: &AppState, query: &ReportQuery) -> Result<ReportData, AppError> {
    let window = query.window()?;
    let today = state.now().date_naive();
    state.with_db(|conn| report_data(conn, &window, today))
}

/// GET /reports/report-data - Bar + line series
async fn get_report_data(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ReportData> {
    ok(load_report(&state, &query)?)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartsResponse {
    pub bar: ChartData,
    pub line: ChartData,
    pub summary: ReportSummary,
}

/// GET /reports/charts - Same report, chart-shaped, with summary figures
async fn get_report_charts(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ChartsResponse> {
    let report = load_report(&state, &query)?;
    ok(ChartsResponse {
        bar: report.bar_chart(),
        line: report.line_chart(),
        summary: ReportSummary::from_report(&report),
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/agents", get(list_agents).post(create_agent))
        .route(
            "/agents/:id",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route("/transactions/transaction-data", get(transaction_data))
        .route("/transactions/transaction", post(create_transaction))
        .route("/transactions/transaction/:id", put(update_transaction))
        .route("/reports/report-data", get(get_report_data))
        .route("/reports/charts", get(get_report_charts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        create_app(AppState::new(conn).with_clock(fixed_now))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_agent_via_api(app: &Router, first: &str, last: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/agents",
            Some(json!({
                "first_name": first,
                "last_name": last,
                "region": "North",
                "rating": 75,
                "fee": 1000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["data"], "OK");
        assert!(body["message"].is_null());
    }

    #[tokio::test]
    async fn test_agent_lifecycle() {
        let app = test_app();
        let id = create_agent_via_api(&app, "Maya", "Ortiz").await;

        let (status, body) = send(&app, Method::GET, &format!("/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_name"], "Maya");
        assert_eq!(body["data"]["region"], "North");

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/agents/{}", id),
            Some(json!({ "fee": 1800, "region": "south" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["fee"], 1800.0);
        assert_eq!(body["data"]["region"], "South");
        assert_eq!(body["data"]["last_name"], "Ortiz");

        let (status, body) = send(&app, Method::GET, "/agents", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &format!("/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, &format!("/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, _) = send(&app, Method::DELETE, &format!("/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_agent_validation_error() {
        let app = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/agents",
            Some(json!({
                "first_name": "Maya",
                "last_name": "Ortiz",
                "region": "North",
                "rating": 140,
                "fee": -3
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        let fields: Vec<&str> = body["data"]["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["rating", "fee"]);
    }

    #[tokio::test]
    async fn test_malformed_body_is_enveloped() {
        let app = test_app();
        let (status, body) = send(&app, Method::POST, "/agents", Some(json!({ "first_name": 5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_transaction_flow_and_listing() {
        let app = test_app();
        let agent_id = create_agent_via_api(&app, "sam", "reed").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 120.0, "agent_id": agent_id, "date": "2024-01-03" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Transaction successful!");
        let tx_id = body["data"]["id"].as_str().unwrap().to_string();

        // Missing date defaults to "now"
        let (_, body) = send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 5.0, "agent_id": agent_id })),
        )
        .await;
        assert_eq!(body["data"]["date"], "2024-01-10T12:00:00Z");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/transactions/transaction/{}", tx_id),
            Some(json!({ "amount": 130.0, "agent_id": agent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amount"], 130.0);
        assert_eq!(body["data"]["date"], "2024-01-03T00:00:00Z");

        let (status, body) = send(&app, Method::GET, "/transactions/transaction-data", None).await;
        assert_eq!(status, StatusCode::OK);
        let transactions = body["data"]["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0]["agentName"], "Sam Reed");
        assert_eq!(body["data"]["agents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_validation_and_not_found() {
        let app = test_app();
        let agent_id = create_agent_via_api(&app, "Sam", "Reed").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 0, "agent_id": agent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["errors"][0]["field"], "amount");

        let (status, _) = send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 10, "agent_id": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/transactions/transaction/missing",
            Some(json!({ "amount": 10, "agent_id": agent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_survives_deleted_agent() {
        let app = test_app();
        let agent_id = create_agent_via_api(&app, "Sam", "Reed").await;
        send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 10, "agent_id": agent_id, "date": "2024-01-05" })),
        )
        .await;
        send(&app, Method::DELETE, &format!("/agents/{}", agent_id), None).await;

        let (status, body) = send(&app, Method::GET, "/transactions/transaction-data", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["transactions"][0]["agentName"], "No agent assigned");

        let (status, body) = send(&app, Method::GET, "/reports/report-data", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["agentBarData"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["transactionLineData"][0]["dailyTotal"], 10.0);
    }

    #[tokio::test]
    async fn test_report_data_with_window() {
        let app = test_app();
        let agent_id = create_agent_via_api(&app, "Ann", "Lee").await;
        for (amount, date) in [(100.0, "2023-12-01"), (40.0, "2024-01-02"), (60.0, "2024-01-02")] {
            send(
                &app,
                Method::POST,
                "/transactions/transaction",
                Some(json!({ "amount": amount, "agent_id": agent_id, "date": date })),
            )
            .await;
        }

        // Trailing default: only January for the line, everything for the bars
        let (_, body) = send(&app, Method::GET, "/reports/report-data", None).await;
        assert_eq!(body["data"]["agentBarData"][0]["totalAmount"], 200.0);
        assert_eq!(
            body["data"]["transactionLineData"],
            json!([{ "date": "2024-01-02", "dailyTotal": 100.0 }])
        );

        let (status, body) = send(
            &app,
            Method::GET,
            "/reports/report-data?startDate=2023-11-01&endDate=2023-12-31",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["agentBarData"][0]["totalAmount"], 100.0);
        assert_eq!(body["data"]["agentBarData"][0]["agentName"], "Ann Lee");
        assert_eq!(body["data"]["transactionLineData"][0]["date"], "2023-12-01");
    }

    #[tokio::test]
    async fn test_report_rejects_bad_dates() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/reports/report-data?startDate=tomorrow", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            &app,
            Method::GET,
            "/reports/report-data?startDate=2024-02-01&endDate=2024-01-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_charts_shape() {
        let app = test_app();
        let agent_id = create_agent_via_api(&app, "Ann", "Lee").await;
        send(
            &app,
            Method::POST,
            "/transactions/transaction",
            Some(json!({ "amount": 75, "agent_id": agent_id, "date": "2024-01-08" })),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/reports/charts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["bar"]["labels"], json!(["Ann Lee"]));
        assert_eq!(body["data"]["bar"]["datasets"][0]["data"], json!([75.0]));
        assert_eq!(body["data"]["line"]["labels"], json!(["2024-01-08"]));
        assert_eq!(body["data"]["summary"]["totalTransactions"], 75.0);
        assert_eq!(body["data"]["summary"]["highestAgentTotal"], 75.0);
    }
}
