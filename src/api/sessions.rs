//! Chat session endpoints

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::api::state::AppState;
use crate::api::types::{AnswerView, ApiError, ErrorView, SessionCreated, StepView, TurnRequest};
use crate::domain::agent::WorkflowGraph;
use crate::domain::conversation::{SessionSnapshot, TurnGuard};
use crate::infrastructure::agent::WorkflowRun;

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create().await;
    info!(session_id = %session.id(), "Session created");

    (
        StatusCode::CREATED,
        Json(SessionCreated {
            id: session.id().to_string(),
        }),
    )
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Session {} not found", id)))?;

    Ok(Json(session.snapshot()?))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id).await {
        info!(session_id = %id, "Session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Session {} not found", id)))
    }
}

/// POST /api/sessions/{id}/turns
///
/// Streams one `step` event per executed node followed by a single
/// `answer` or `error` event.
pub async fn create_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("Question cannot be empty").with_param("question"));
    }

    let session = state.sessions.get_or_create(&id).await;
    let guard = session.begin_turn(question)?;

    info!(session_id = %id, "Starting turn");

    let run = state.agent.start_turn(question).for_session(&id);
    let stream = turn_events(run, guard);

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// GET /api/graph
pub async fn get_graph() -> impl IntoResponse {
    WorkflowGraph::to_mermaid()
}

fn turn_events(
    mut run: WorkflowRun,
    guard: TurnGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    tokio::spawn(async move {
        loop {
            match run.next_step().await {
                Ok(Some(step)) => {
                    let event = sse_event("step", &StepView::from(&step));
                    if tx.send(Ok(event)).await.is_err() {
                        // Client went away; dropping the guard abandons the turn
                        warn!(session_id = %guard.session_id(), "Turn abandoned by client");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(session_id = %guard.session_id(), error = %e, "Turn failed");
                    let transcript = run.state().messages().to_vec();
                    if let Err(record_err) = guard.fail(transcript, e.to_string(), run.usage()) {
                        error!(error = %record_err, "Failed to record turn");
                    }
                    let _ = tx.send(Ok(sse_event("error", &ErrorView::from(&e)))).await;
                    return;
                }
            }
        }

        let session_id = guard.session_id().to_string();
        match run.finish().await {
            Ok(outcome) => {
                let answer = AnswerView::new(&session_id, &outcome);
                let recorded = guard.complete(
                    outcome.state.into_messages(),
                    outcome.answer,
                    outcome.usage,
                );
                if let Err(e) = recorded {
                    error!(error = %e, "Failed to record turn");
                }
                let _ = tx.send(Ok(sse_event("answer", &answer))).await;
            }
            Err(e) => {
                let _ = tx.send(Ok(sse_event("error", &ErrorView::from(&e)))).await;
            }
        }
    });

    ReceiverStream::new(rx)
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(e) => Event::default()
            .event("error")
            .data(format!("{{\"kind\":\"serialization\",\"message\":\"{}\"}}", e)),
    }
}
