//! 모니터 모듈 -- 처리 라인/에러 카운터, 처리량, `GET /monitor` 스냅샷
//!
//! # 구성
//! - [`StatReporter`]: 수집기와 파서가 이벤트를 보내는 핸들
//! - [`PipelineStats`]: 이벤트 드레인 태스크와 샘플러가 갱신하는 원자 카운터
//! - [`Monitor`]: 카운터와 두 큐를 관찰하여 [`StatSnapshot`]을 만듭니다
//! - [`server`]: axum 기반 HTTP 엔드포인트
//!
//! 모니터는 처리 경로 밖에 있습니다. 카운터는 각각 단일 작성자(드레인 태스크,
//! 샘플러)만 가지며 HTTP 핸들러는 락 없이 읽습니다.

pub mod server;
pub mod throughput;

pub use server::MonitorServer;
pub use throughput::ThroughputWindow;

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use logtail_core::metrics as m;
use logtail_core::types::AccessRecord;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collector::RawLine;

/// 모니터로 전달되는 통계 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    /// 수집기가 라인 하나를 읽음
    LineHandled,
    /// 라인 하나를 처리하지 못함
    ParseError,
}

/// 통계 이벤트 송신 핸들
///
/// 수집기와 파서 워커가 복제해서 사용합니다. 모든 핸들이 drop되면
/// 드레인 태스크가 종료됩니다.
#[derive(Debug, Clone)]
pub struct StatReporter {
    tx: flume::Sender<StatEvent>,
}

impl StatReporter {
    /// 라인 처리 이벤트를 보냅니다.
    pub async fn line_handled(&self) {
        self.send(StatEvent::LineHandled).await;
    }

    /// 처리 실패 이벤트를 보냅니다.
    pub async fn parse_error(&self) {
        self.send(StatEvent::ParseError).await;
    }

    async fn send(&self, event: StatEvent) {
        // 드레인 태스크가 없으면 통계만 잃고 처리는 계속합니다.
        if self.tx.send_async(event).await.is_err() {
            debug!(?event, "stat event dropped: monitor is gone");
        }
    }
}

/// 용량이 제한된 통계 이벤트 채널을 생성합니다.
pub fn stat_channel(capacity: usize) -> (StatReporter, flume::Receiver<StatEvent>) {
    let (tx, rx) = flume::bounded(capacity);
    (StatReporter { tx }, rx)
}

/// 파이프라인 실행 동안 유지되는 공유 카운터
#[derive(Debug)]
pub struct PipelineStats {
    handled_lines: AtomicU64,
    errors: AtomicU64,
    tps_bits: AtomicU64,
    started_at: Instant,
}

impl PipelineStats {
    /// 지금 시각을 시작 시각으로 하는 빈 카운터를 생성합니다.
    pub fn new() -> Self {
        Self {
            handled_lines: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            tps_bits: AtomicU64::new(0f64.to_bits()),
            started_at: Instant::now(),
        }
    }

    /// 이벤트 하나를 반영합니다.
    pub fn apply(&self, event: StatEvent) {
        match event {
            StatEvent::LineHandled => {
                self.handled_lines.fetch_add(1, Ordering::Relaxed);
            }
            StatEvent::ParseError => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// 누적 처리 라인 수
    pub fn handled_lines(&self) -> u64 {
        self.handled_lines.load(Ordering::Relaxed)
    }

    /// 누적 에러 수
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// 마지막으로 계산된 초당 처리 라인 수
    pub fn tps(&self) -> f64 {
        f64::from_bits(self.tps_bits.load(Ordering::Relaxed))
    }

    fn set_tps(&self, tps: f64) {
        self.tps_bits.store(tps.to_bits(), Ordering::Relaxed);
    }

    /// 시작 이후 경과 시간
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /monitor` 응답 본문
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    /// 누적 처리 라인 수
    pub handle_line: u64,
    /// 최근 샘플 구간의 초당 처리 라인 수
    pub tps: f64,
    /// 읽기 큐 적재량 (근사값)
    pub read_chan_len: usize,
    /// 쓰기 큐 적재량 (근사값)
    pub write_chan_len: usize,
    /// 가동 시간 (예: "1h2m3.5s")
    pub run_time: String,
    /// 누적 에러 수
    pub err_num: u64,
}

/// 카운터와 두 큐를 관찰하는 모니터
///
/// 큐의 수신측 복제본을 들고 있으므로 큐 길이를 직접 읽을 수 있습니다.
/// 큐에서 값을 꺼내지는 않습니다.
#[derive(Debug, Clone)]
pub struct Monitor {
    stats: Arc<PipelineStats>,
    read_queue: flume::Receiver<RawLine>,
    write_queue: flume::Receiver<AccessRecord>,
}

impl Monitor {
    /// 새 모니터를 생성합니다.
    pub fn new(
        stats: Arc<PipelineStats>,
        read_queue: flume::Receiver<RawLine>,
        write_queue: flume::Receiver<AccessRecord>,
    ) -> Self {
        Self {
            stats,
            read_queue,
            write_queue,
        }
    }

    /// 공유 카운터
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// 읽기 큐 적재량
    pub fn read_queue_len(&self) -> usize {
        self.read_queue.len()
    }

    /// 쓰기 큐 적재량
    pub fn write_queue_len(&self) -> usize {
        self.write_queue.len()
    }

    /// 현재 상태의 스냅샷을 계산합니다.
    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            handle_line: self.stats.handled_lines(),
            tps: self.stats.tps(),
            read_chan_len: self.read_queue_len(),
            write_chan_len: self.write_queue_len(),
            run_time: format_uptime(self.stats.uptime()),
            err_num: self.stats.errors(),
        }
    }

    /// 이벤트 채널을 비울 때까지 카운터에 반영합니다.
    ///
    /// 모든 [`StatReporter`]가 drop되면 종료하므로 마지막 이벤트까지 반영됩니다.
    pub async fn run_event_drain(&self, events: flume::Receiver<StatEvent>) {
        while let Ok(event) = events.recv_async().await {
            self.stats.apply(event);
        }
        debug!(
            handled = self.stats.handled_lines(),
            errors = self.stats.errors(),
            "stat event channel closed"
        );
    }

    /// 주기마다 처리 라인 수를 샘플링하여 처리량을 갱신합니다.
    pub async fn run_sampler(&self, interval: Duration, cancel: CancellationToken) {
        let mut window = ThroughputWindow::new(interval);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    window.record(self.stats.handled_lines());
                    let tps = window.tps();
                    self.stats.set_tps(tps);

                    metrics::gauge!(m::MONITOR_LINES_PER_SECOND).set(tps);
                    metrics::gauge!(m::QUEUE_READ_DEPTH).set(self.read_queue_len() as f64);
                    metrics::gauge!(m::QUEUE_WRITE_DEPTH).set(self.write_queue_len() as f64);
                }
            }
        }
        debug!("throughput sampler stopped");
    }
}

/// 경과 시간을 `1h2m3.5s` 형태로 렌더링합니다.
///
/// 1초 미만은 `ms`, `µs`, `ns` 단위를 사용합니다.
pub fn format_uptime(d: Duration) -> String {
    let total_nanos = d.as_nanos();
    if total_nanos == 0 {
        return "0s".to_owned();
    }

    let mut out = String::new();
    if total_nanos < 1_000 {
        let _ = write!(out, "{total_nanos}ns");
        return out;
    }
    if total_nanos < 1_000_000 {
        push_fraction(&mut out, total_nanos / 1_000, total_nanos % 1_000, 3);
        out.push_str("µs");
        return out;
    }
    if total_nanos < 1_000_000_000 {
        push_fraction(&mut out, total_nanos / 1_000_000, total_nanos % 1_000_000, 6);
        out.push_str("ms");
        return out;
    }

    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    push_fraction(&mut out, u128::from(seconds), u128::from(d.subsec_nanos()), 9);
    out.push('s');
    out
}

/// `whole.frac`를 쓰되 소수부 끝의 0은 지웁니다.
fn push_fraction(out: &mut String, whole: u128, frac: u128, digits: usize) {
    let _ = write!(out, "{whole}");
    if frac == 0 {
        return;
    }
    let frac = format!("{frac:0digits$}");
    out.push('.');
    out.push_str(frac.trim_end_matches('0'));
}
