use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::components::Report;
use crate::Error;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Idle,
    Transferring,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TransferStatus {
    pub state: TransferState,
    pub progress: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Latest state of the transfer as seen through its report stream.
#[derive(Clone, Default)]
pub struct StatusBoard {
    status: Arc<Mutex<TransferStatus>>,
}

impl StatusBoard {
    pub async fn update(&self, report: &Report) {
        let mut status = self.status.lock().await;

        match report {
            Report::Progress { progress, status: text } => {
                status.state = TransferState::Transferring;
                status.progress = *progress;
                status.status = text.clone();
            }
            Report::Success { message, count } => {
                status.state = TransferState::Succeeded;
                status.message = Some(message.clone());
                status.count = Some(*count);
            }
            Report::Error { message, count } => {
                status.state = TransferState::Failed;
                status.message = Some(message.clone());
                status.count = Some(*count);
            }
        }
    }

    pub async fn cancelled(&self) {
        self.status.lock().await.state = TransferState::Cancelled;
    }

    pub async fn snapshot(&self) -> TransferStatus {
        self.status.lock().await.clone()
    }
}

async fn handle_transfer(State(board): State<StatusBoard>) -> Json<TransferStatus> {
    Json(board.snapshot().await)
}

pub async fn run(board: StatusBoard, addr: SocketAddr) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Inspector server listening on: {}", listener.local_addr()?);

    let app = Router::new()
        .route("/api/transfer", get(handle_transfer))
        .with_state(board)
        .layer(CorsLayer::permissive());

    axum::serve(listener, app).await?;
    Ok(())
}
