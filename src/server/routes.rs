use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::CompanionError;
use crate::recording::compiler::compile_events;
use crate::recording::event_model::EventBatch;
use crate::script::csv::render_csv;
use crate::script::selenese::{render_instructions, render_selenese};
use crate::server::error::ApiError;
use crate::server::state::SharedState;
use crate::server::store::Snapshot;
use crate::suggest::suggestion_model::{ConfirmationRound, FieldSuggestion};
use crate::testcase::generator::{apply_row, build_test_cases};
use crate::trace::trace::{TraceEvent, html_fingerprint};

pub const SCRIPT_TITLE: &str = "Recorded test";

// ============================================================================
// Router
// ============================================================================

pub fn router(state: SharedState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/snapshot", post(snapshot))
        .route("/events", post(events))
        .route("/suggest_inputs", post(suggest_inputs))
        .route("/update_input_suggestion", post(update_input_suggestion))
        .route("/confirm_suggestion", post(confirm_suggestion))
        .route("/test_cases", post(test_cases))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: SharedState, body_limit: usize) -> Result<(), CompanionError> {
    let app = router(state, body_limit);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CompanionError::io(format!("binding {}", addr), e))?;
    info!("recorder companion listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| CompanionError::io("serving HTTP", e))
}

// ============================================================================
// Capture
// ============================================================================

async fn snapshot(
    State(state): State<SharedState>,
    payload: Result<Json<Snapshot>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(snapshot) = payload?;
    let outcome = state.store.save_snapshot(&snapshot)?;

    info!(event = %snapshot.event_type, time = %snapshot.time, "snapshot received");
    state.record(
        TraceEvent::now("/snapshot")
            .with_detail(&outcome.base_name)
            .with_fingerprint(&outcome.fingerprint, outcome.unchanged),
    );
    Ok("ok")
}

async fn events(
    State(state): State<SharedState>,
    payload: Result<Json<EventBatch>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(batch) = payload?;
    let events = batch.into_events();
    state.store.save_events(&events)?;

    let script = compile_events(&events, &state.compiler);
    let html = render_selenese(&script, SCRIPT_TITLE);
    state.store.save_script(&html, &script.instructions)?;

    info!(
        events = events.len(),
        instructions = script.instructions.len(),
        "events saved and compiled"
    );
    state.record(
        TraceEvent::now("/events")
            .with_detail(&script.base_url)
            .with_count(events.len()),
    );
    Ok("ok")
}

// ============================================================================
// Suggestions
// ============================================================================

#[derive(Debug, Deserialize)]
struct SuggestRequest {
    #[serde(default)]
    html: String,
}

async fn suggest_inputs(
    State(state): State<SharedState>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<Vec<FieldSuggestion>>, ApiError> {
    let Json(request) = payload?;

    let worker = state.clone();
    let html = request.html;
    let report = tokio::task::spawn_blocking(move || {
        let report = worker.suggestion_engine().suggest(&html);
        (report, html_fingerprint(&html))
    })
    .await?;
    let (report, fingerprint) = report;

    state.store.save_suggestions(&report.suggestions)?;
    {
        let mut book = state.book();
        book.seed(&report.suggestions);
        state.store.save_book(&book)?;
    }

    state.record(
        TraceEvent::now("/suggest_inputs")
            .with_fingerprint(&fingerprint, false)
            .with_count(report.suggestions.len())
            .with_detail(format!("{} skipped", report.skipped.len())),
    );
    Ok(Json(report.suggestions))
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    status: &'static str,
    range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_examples: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_bad_examples: Option<Vec<String>>,
}

/// Store the user's edit, apply it as a confirmation round and ask the
/// model for values matching the edited range.
async fn update_input_suggestion(
    State(state): State<SharedState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(raw) = payload?;
    state.store.append_update(&raw)?;

    let round: ConfirmationRound =
        serde_json::from_value(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !round.field.is_empty() {
        let mut book = state.book();
        book.apply(&round);
        state.store.save_book(&book)?;
    }

    let mut response = UpdateResponse {
        status: "ok",
        range: round.description.clone(),
        new_examples: None,
        new_bad_examples: None,
    };

    let mut trace = TraceEvent::now("/update_input_suggestion").with_detail(&round.field);
    let description = round.description.clone().unwrap_or_default();
    if !description.trim().is_empty() {
        let worker = state.clone();
        let field = round.field.clone();
        let refined =
            tokio::task::spawn_blocking(move || worker.suggestion_engine().refine(&field, &description))
                .await?;
        match refined {
            Ok(Some(refinement)) => {
                response.new_examples = Some(refinement.examples);
                response.new_bad_examples = Some(refinement.bad_examples);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(field = %round.field, error = %e, "refinement request failed");
                trace = trace.with_error(e);
            }
        }
    }

    state.record(trace);
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn confirm_suggestion(
    State(state): State<SharedState>,
    payload: Result<Json<ConfirmationRound>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(round) = payload?;
    if round.field.is_empty() {
        return Err(ApiError::BadRequest("confirmation names no field".to_string()));
    }

    let (accepted, rejected) = {
        let mut book = state.book();
        let counts = book
            .apply(&round)
            .map(|set| (set.accepted.len(), set.rejected.len()))
            .unwrap_or_default();
        state.store.save_book(&book)?;
        counts
    };

    info!(field = %round.field, accepted, rejected, "suggestion confirmed");
    state.record(TraceEvent::now("/confirm_suggestion").with_detail(&round.field));
    Ok(Json(StatusResponse { status: "ok" }))
}

// ============================================================================
// Test cases
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TestCasesRequest {
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TestCasesResponse {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

async fn test_cases(
    State(state): State<SharedState>,
    payload: Option<Json<TestCasesRequest>>,
) -> Result<Json<TestCasesResponse>, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let count = request.count.unwrap_or(state.case_count);

    let events = state
        .store
        .load_events()?
        .ok_or_else(|| ApiError::NotFound("no recorded events in this run".to_string()))?;

    let script = compile_events(&events, &state.compiler);
    let table = {
        let book = state.book();
        build_test_cases(&script, &book, count)
    };

    let scripts: Vec<String> = table
        .rows
        .iter()
        .enumerate()
        .map(|(n, row)| {
            let instructions = apply_row(&script.instructions, row);
            render_instructions(&script.base_url, &instructions, &format!("Test case {}", n + 1))
        })
        .collect();
    state.store.save_test_cases(&render_csv(&table)?, &scripts)?;

    info!(fields = table.headers.len(), rows = table.len(), "test cases generated");
    state.record(TraceEvent::now("/test_cases").with_count(table.len()));

    Ok(Json(TestCasesResponse {
        rows: table
            .rows
            .iter()
            .map(|row| row.values().map(str::to_string).collect())
            .collect(),
        headers: table.headers,
    }))
}
