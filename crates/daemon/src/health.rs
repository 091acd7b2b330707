// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference `/health` endpoint: `{status, uptime, memory,
//! worker: {isRunning}}`, 200 when a worker generation is live, 503
//! otherwise. Provided only as a reference contract — this endpoint is not
//! part of the core, hence living in `hw-daemon` rather than `hw-worker`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use hw_adapters::OrchestrationClient;
use hw_worker::WorkerLifecycleManager;
use serde::Serialize;

#[derive(Serialize)]
struct WorkerStatus {
    #[serde(rename = "isRunning")]
    is_running: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime: f64,
    memory: MemoryStatus,
    worker: WorkerStatus,
}

#[derive(Serialize)]
struct MemoryStatus {
    #[serde(rename = "rssBytes")]
    rss_bytes: Option<u64>,
}

async fn health<C: OrchestrationClient>(
    State(manager): State<Arc<WorkerLifecycleManager<C>>>,
) -> impl IntoResponse {
    let is_running = manager.is_running();
    let body = HealthResponse {
        status: if is_running { "ok" } else { "unhealthy" },
        uptime: manager.uptime().as_secs_f64(),
        memory: MemoryStatus {
            rss_bytes: current_rss_bytes(),
        },
        worker: WorkerStatus { is_running },
    };
    let code = if is_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

/// Best-effort resident-set-size reading from `/proc/self/status`. Returns
/// `None` off Linux or if the file can't be parsed; the health contract
/// treats memory as advisory, not load-bearing.
fn current_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status.lines().find_map(|line| {
        let rest = line.strip_prefix("VmRSS:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

pub fn router<C: OrchestrationClient>(manager: Arc<WorkerLifecycleManager<C>>) -> Router {
    Router::new()
        .route("/health", get(health::<C>))
        .with_state(manager)
}
