//! # HTTP Server
//!
//! Inbound side of the node: every POST route decodes one message and pushes
//! it onto the dispatcher's inbound channel without waiting.
//!
//! | Route          | Body            |
//! |----------------|-----------------|
//! | `/transaction` | `Transaction`   |
//! | `/request`     | `Block`         |
//! | `/preprepare`  | `PrePrepareMsg` |
//! | `/prepare`     | `PrepareMsg`    |
//! | `/commit`      | `CommitMsg`     |
//! | `/reply`       | `ReplyMsg`      |
//! | `GET /health`  | node status     |

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use qb_03_block::{Block, Transaction};
use qb_04_pbft::{CommitMsg, PrePrepareMsg, PrepareMsg, ReplyMsg};
use serde::Serialize;
use shared_types::NodeName;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::wiring::{Envelope, NodeStatus};

/// State shared by all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub node_name: NodeName,
    pub inbound: mpsc::Sender<Envelope>,
    pub status: watch::Receiver<NodeStatus>,
}

impl ApiState {
    fn enqueue(&self, envelope: Envelope) -> StatusCode {
        let kind = envelope.kind();
        match self.inbound.try_send(envelope) {
            Ok(()) => StatusCode::ACCEPTED,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "Inbound channel full, message dropped");
                StatusCode::SERVICE_UNAVAILABLE
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "Inbound channel closed, message dropped");
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/transaction", post(receive_transaction))
        .route("/request", post(receive_request))
        .route("/preprepare", post(receive_preprepare))
        .route("/prepare", post(receive_prepare))
        .route("/commit", post(receive_commit))
        .route("/reply", post(receive_reply))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn receive_transaction(
    State(state): State<ApiState>,
    Json(tx): Json<Transaction>,
) -> StatusCode {
    state.enqueue(tx.into())
}

async fn receive_request(State(state): State<ApiState>, Json(block): Json<Block>) -> StatusCode {
    state.enqueue(block.into())
}

async fn receive_preprepare(
    State(state): State<ApiState>,
    Json(msg): Json<PrePrepareMsg>,
) -> StatusCode {
    state.enqueue(msg.into())
}

async fn receive_prepare(State(state): State<ApiState>, Json(msg): Json<PrepareMsg>) -> StatusCode {
    state.enqueue(msg.into())
}

async fn receive_commit(State(state): State<ApiState>, Json(msg): Json<CommitMsg>) -> StatusCode {
    state.enqueue(msg.into())
}

async fn receive_reply(State(state): State<ApiState>, Json(msg): Json<ReplyMsg>) -> StatusCode {
    state.enqueue(msg.into())
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    node: NodeName,
    version: &'static str,
    #[serde(flatten)]
    node_status: NodeStatus,
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let node_status = *state.status.borrow();
    Json(HealthReport {
        status: "healthy",
        node: state.node_name,
        version: env!("CARGO_PKG_VERSION"),
        node_status,
    })
}
