//! 모니터 HTTP 서버 -- `GET /monitor`
//!
//! 리스너는 [`MonitorServer::bind`]에서 미리 바인드하므로 포트 충돌은
//! 파이프라인 시작 시점에 바로 보고됩니다.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Monitor;
use crate::error::LogPipelineError;

/// 바인드된 모니터 HTTP 서버
#[derive(Debug)]
pub struct MonitorServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl MonitorServer {
    /// 주어진 주소에 리스너를 바인드합니다.
    pub async fn bind(addr: &str) -> Result<Self, LogPipelineError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LogPipelineError::Monitor(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// 실제 바인드된 주소 (포트 0으로 바인드한 경우 유용)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 취소될 때까지 요청을 처리합니다.
    pub async fn serve(
        self,
        monitor: Monitor,
        cancel: CancellationToken,
    ) -> Result<(), LogPipelineError> {
        info!(addr = %self.local_addr, "monitor endpoint listening");

        axum::serve(self.listener, router(monitor))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| LogPipelineError::Monitor(format!("server error: {e}")))?;

        info!("monitor endpoint stopped");
        Ok(())
    }
}

/// 모니터 라우터
pub fn router(monitor: Monitor) -> Router {
    Router::new()
        .route("/monitor", get(monitor_handler))
        .with_state(monitor)
}

/// GET /monitor
///
/// 요청 시점의 스냅샷을 들여쓰기된 JSON으로 반환합니다.
async fn monitor_handler(State(monitor): State<Monitor>) -> Response {
    let snapshot = monitor.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to serialize monitor snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
