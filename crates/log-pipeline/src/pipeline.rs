//! 파이프라인 오케스트레이션 -- tail/파싱/전송의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](logtail_core::pipeline::Pipeline) trait을 구현하여
//! `logtail-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer -> read queue -> N parser workers -> write queue -> M sink workers -> InfluxDB
//!      |                          |
//!      +------ stat events -------+--> Monitor (counters, tps, GET /monitor)
//! ```
//!
//! # 종료 순서
//! `stop()`은 수집기만 취소합니다. 수집기가 끝나면 읽기 큐가 닫히고,
//! 파서가 큐를 비운 뒤 종료하면 쓰기 큐가 닫히고, 싱크가 큐를 비운 뒤 종료합니다.
//! 그 다음 모니터 태스크를 정지합니다. 이미 큐에 들어간 레코드는 정확히 한 번 전송됩니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use logtail_core::error::{LogtailError, PipelineError};
use logtail_core::pipeline::{DynMetricSink, HealthStatus, Pipeline, RecordParser};
use logtail_core::types::AccessRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collector::{FileTailer, RawLine, TailerOptions};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::monitor::{
    Monitor, MonitorServer, PipelineStats, StatEvent, StatReporter, StatSnapshot, stat_channel,
};
use crate::parser::{AccessLogParser, ParserOptions, run_parser_worker};
use crate::sink::{SinkFactory, influx_factory, run_sink_worker};

/// 이 비율 이상 찬 큐가 있으면 Degraded
const DEGRADED_QUEUE_UTILIZATION: f64 = 0.9;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 시작 시 워커에게 나눠줄 큐와 채널 끝점
///
/// `start()`에서 소비되며, 파이프라인은 송신측 복제본을 남기지 않습니다.
struct Channels {
    read_tx: flume::Sender<RawLine>,
    read_rx: flume::Receiver<RawLine>,
    write_tx: flume::Sender<AccessRecord>,
    write_rx: flume::Receiver<AccessRecord>,
    stats: StatReporter,
    stat_rx: flume::Receiver<StatEvent>,
    fatal_tx: mpsc::UnboundedSender<LogtailError>,
}

/// 로그 파이프라인 -- tail/파싱/전송의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use logtail_pipeline::LogPipelineBuilder;
/// use logtail_core::pipeline::Pipeline;
///
/// let mut pipeline = LogPipelineBuilder::new().config(config).build()?;
/// pipeline.start().await?;
/// if let Some(err) = pipeline.fatal_error().await {
///     // 워커 치명적 실패
/// }
/// pipeline.stop().await?;
/// ```
pub struct LogPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 공유 파서
    parser: Arc<dyn RecordParser>,
    /// 워커별 싱크 팩토리
    sink_factory: SinkFactory,
    /// 모니터
    monitor: Monitor,
    /// 시작 전까지 보관하는 채널
    channels: Option<Channels>,
    /// 치명적 에러 수신
    fatal_rx: mpsc::UnboundedReceiver<LogtailError>,
    /// 워커 치명적 실패 여부
    failed: Arc<AtomicBool>,
    /// 수집기 취소 토큰
    cancel: CancellationToken,
    /// 모니터 태스크 취소 토큰 (드레인 이후 취소)
    monitor_cancel: CancellationToken,
    /// 치명적 실패 시 drain 대기를 중단하는 토큰
    abort: CancellationToken,
    /// 수집기/파서/싱크 태스크 (이름, 핸들)
    workers: Vec<(String, JoinHandle<()>)>,
    /// 통계 이벤트 드레인 태스크
    event_drain: Option<JoinHandle<()>>,
    /// 샘플러와 HTTP 서버 태스크
    monitor_tasks: Vec<(String, JoinHandle<()>)>,
    /// 모니터 HTTP 서버 주소
    monitor_addr: Option<SocketAddr>,
}

impl LogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 모니터
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// 공유 카운터
    pub fn stats(&self) -> &Arc<PipelineStats> {
        self.monitor.stats()
    }

    /// 현재 스냅샷 (`GET /monitor`와 동일한 내용)
    pub fn snapshot(&self) -> StatSnapshot {
        self.monitor.snapshot()
    }

    /// 모니터 HTTP 서버가 실제로 바인드한 주소
    pub fn monitor_addr(&self) -> Option<SocketAddr> {
        self.monitor_addr
    }

    /// 워커의 첫 치명적 에러를 기다립니다.
    ///
    /// 모든 워커가 종료되어 더 이상 에러가 올 수 없으면 `None`을 반환합니다.
    /// 시작 전에는 반환하지 않습니다.
    pub async fn fatal_error(&mut self) -> Option<LogtailError> {
        self.fatal_rx.recv().await
    }

    /// 큐 사용률 중 큰 값 (0.0 ~ 1.0)
    pub fn queue_utilization(&self) -> f64 {
        let read = self.monitor.read_queue_len() as f64 / self.config.read_queue_capacity as f64;
        let write =
            self.monitor.write_queue_len() as f64 / self.config.write_queue_capacity as f64;
        read.max(write)
    }

    fn spawn_worker<F>(
        &mut self,
        name: String,
        fatal_tx: &mpsc::UnboundedSender<LogtailError>,
        fut: F,
    ) where
        F: Future<Output = Result<(), LogtailError>> + Send + 'static,
    {
        let fatal_tx = fatal_tx.clone();
        let failed = Arc::clone(&self.failed);
        let abort = self.abort.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = fut.await {
                error!(worker = %task_name, error = %e, "pipeline worker failed");
                failed.store(true, Ordering::SeqCst);
                abort.cancel();
                // 수신측이 없으면 이미 종료 중
                let _ = fatal_tx.send(e);
            }
        });
        self.workers.push((name, handle));
    }

    /// 워커 태스크가 끝나기를 기다립니다. 치명적 실패가 있으면 남은 태스크를 중단합니다.
    async fn join_workers(&mut self) {
        for (name, mut handle) in std::mem::take(&mut self.workers) {
            tokio::select! {
                res = &mut handle => {
                    if let Err(e) = res {
                        warn!(worker = %name, error = %e, "worker task ended abnormally");
                    }
                }
                _ = self.abort.cancelled() => {
                    warn!(worker = %name, "aborting worker after fatal error");
                    handle.abort();
                }
            }
        }
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), LogtailError> {
        match self.state {
            PipelineState::Running => return Err(PipelineError::AlreadyRunning.into()),
            PipelineState::Stopped => return Err(PipelineError::NotRestartable.into()),
            PipelineState::Initialized => {}
        }
        let Some(channels) = self.channels.as_ref() else {
            return Err(PipelineError::NotRestartable.into());
        };

        info!(path = %self.config.path, "starting log pipeline");

        // 1. 파일 열기 (끝으로 이동)
        let tailer = FileTailer::open(
            &self.config.path,
            TailerOptions {
                poll_interval: self.config.poll_interval(),
                max_line_length: self.config.max_line_length,
            },
            channels.stats.clone(),
        )
        .await
        .map_err(|e| PipelineError::InitFailed(e.to_string()))?;

        // 2. 워커별 싱크 생성
        let sinks = (0..self.config.sink_workers)
            .map(|_| (self.sink_factory)())
            .collect::<Result<Vec<Box<dyn DynMetricSink>>, _>>()?;

        // 3. 모니터 리스너 바인드
        let server = if self.config.monitor_enabled {
            Some(MonitorServer::bind(&self.config.monitor_bind).await?)
        } else {
            None
        };

        // 여기부터는 실패하지 않음
        let Some(channels) = self.channels.take() else {
            return Err(PipelineError::NotRestartable.into());
        };
        let Channels {
            read_tx,
            read_rx,
            write_tx,
            write_rx,
            stats,
            stat_rx,
            fatal_tx,
        } = channels;

        // 4. 모니터 태스크
        let monitor = self.monitor.clone();
        self.event_drain = Some(tokio::spawn(async move {
            monitor.run_event_drain(stat_rx).await;
        }));

        let monitor = self.monitor.clone();
        let interval = self.config.sample_interval();
        let cancel = self.monitor_cancel.clone();
        self.monitor_tasks.push((
            "sampler".to_owned(),
            tokio::spawn(async move { monitor.run_sampler(interval, cancel).await }),
        ));

        if let Some(server) = server {
            self.monitor_addr = Some(server.local_addr());
            let monitor = self.monitor.clone();
            let cancel = self.monitor_cancel.clone();
            self.monitor_tasks.push((
                "monitor-server".to_owned(),
                tokio::spawn(async move {
                    if let Err(e) = server.serve(monitor, cancel).await {
                        error!(error = %e, "monitor endpoint failed");
                    }
                }),
            ));
        }

        // 5. 싱크 워커
        for (id, sink) in sinks.into_iter().enumerate() {
            let input = write_rx.clone();
            let measurement = self.config.measurement.clone();
            let batch_size = self.config.batch_size;
            self.spawn_worker(
                format!("sink-{id}"),
                &fatal_tx,
                run_sink_worker(id, sink, input, measurement, batch_size),
            );
        }
        drop(write_rx);

        // 6. 파서 워커
        for id in 0..self.config.parser_workers {
            let parser = Arc::clone(&self.parser);
            let input = read_rx.clone();
            let output = write_tx.clone();
            let stats = stats.clone();
            self.spawn_worker(format!("parser-{id}"), &fatal_tx, async move {
                run_parser_worker(id, parser, input, output, stats).await;
                Ok(())
            });
        }
        drop(read_rx);
        drop(write_tx);
        drop(stats);

        // 7. 수집기
        let cancel = self.cancel.clone();
        self.spawn_worker("tailer".to_owned(), &fatal_tx, async move {
            tailer.run(read_tx, cancel).await.map_err(LogtailError::from)
        });
        drop(fatal_tx);

        self.state = PipelineState::Running;
        info!(
            parser_workers = self.config.parser_workers,
            sink_workers = self.config.sink_workers,
            monitor = ?self.monitor_addr,
            "log pipeline started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogtailError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline");

        // 1. 수집기 취소 후 파서/싱크 drain
        self.cancel.cancel();
        self.join_workers().await;

        // 2. 남은 통계 이벤트 반영
        if let Some(handle) = self.event_drain.take() {
            if self.abort.is_cancelled() {
                handle.abort();
            } else if let Err(e) = handle.await {
                warn!(error = %e, "stat drain task ended abnormally");
            }
        }

        // 3. 모니터 태스크 정지
        self.monitor_cancel.cancel();
        for (name, handle) in self.monitor_tasks.drain(..) {
            if let Err(e) = handle.await {
                warn!(task = %name, error = %e, "monitor task ended abnormally");
            }
        }

        self.state = PipelineState::Stopped;
        info!(
            handled = self.stats().handled_lines(),
            errors = self.stats().errors(),
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.failed.load(Ordering::SeqCst) {
                    return HealthStatus::Unhealthy("worker failed".to_owned());
                }
                let utilization = self.queue_utilization();
                if utilization >= DEGRADED_QUEUE_UTILIZATION {
                    HealthStatus::Degraded(format!(
                        "queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인을 구성하고 큐와 채널을 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    parser: Option<Arc<dyn RecordParser>>,
    sink_factory: Option<SinkFactory>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            parser: None,
            sink_factory: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 파서를 지정합니다.
    ///
    /// 지정하지 않으면 설정으로 [`AccessLogParser`]를 생성합니다.
    pub fn parser(mut self, parser: Arc<dyn RecordParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// 싱크 팩토리를 지정합니다.
    ///
    /// 지정하지 않으면 설정의 연결 문자열로 InfluxDB 싱크를 만듭니다.
    pub fn sink_factory(mut self, factory: SinkFactory) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        self.config.validate()?;

        let parser = match self.parser {
            Some(parser) => parser,
            None => Arc::new(AccessLogParser::new(ParserOptions {
                timezone: self.config.timezone()?,
                strict_numeric: self.config.strict_numeric,
                max_input_size: self.config.max_line_length,
            })?),
        };

        let sink_factory = match self.sink_factory {
            Some(factory) => factory,
            None => influx_factory(
                &self.config.dsn,
                Duration::from_secs(self.config.sink_timeout_secs),
            )?,
        };

        let (read_tx, read_rx) = flume::bounded(self.config.read_queue_capacity);
        let (write_tx, write_rx) = flume::bounded(self.config.write_queue_capacity);
        let (stats, stat_rx) = stat_channel(self.config.event_queue_capacity);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

        let monitor = Monitor::new(
            Arc::new(PipelineStats::new()),
            read_rx.clone(),
            write_rx.clone(),
        );

        Ok(LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            parser,
            sink_factory,
            monitor,
            channels: Some(Channels {
                read_tx,
                read_rx,
                write_tx,
                write_rx,
                stats,
                stat_rx,
                fatal_tx,
            }),
            fatal_rx,
            failed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            monitor_cancel: CancellationToken::new(),
            abort: CancellationToken::new(),
            workers: Vec::new(),
            event_drain: None,
            monitor_tasks: Vec::new(),
            monitor_addr: None,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;

    fn test_config(path: &std::path::Path) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .path(path.display().to_string())
            .poll_interval_ms(10)
            .monitor_enabled(false)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_creates_pipeline() {
        let pipeline = LogPipelineBuilder::new().build().unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert_eq!(pipeline.snapshot().handle_line, 0);
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        let result = LogPipelineBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pipeline_lifecycle_before_start() {
        let mut pipeline = LogPipelineBuilder::new().build().unwrap();

        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());
    }

    #[tokio::test]
    async fn start_fails_when_file_missing_and_can_retry() {
        let config = test_config(std::path::Path::new("/nonexistent/logtail/access.log"));
        let mut pipeline = LogPipelineBuilder::new().config(config).build().unwrap();

        assert!(matches!(
            pipeline.start().await,
            Err(LogtailError::Pipeline(PipelineError::InitFailed(_)))
        ));
        // 실패한 시작은 채널을 소비하지 않음
        assert_eq!(pipeline.state_name(), "initialized");
    }

    #[tokio::test]
    async fn start_stop_and_no_restart() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pipeline = LogPipelineBuilder::new()
            .config(test_config(file.path()))
            .build()
            .unwrap();

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.health_check().await.is_healthy());
        assert!(matches!(
            pipeline.start().await,
            Err(LogtailError::Pipeline(PipelineError::AlreadyRunning))
        ));

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(matches!(
            pipeline.start().await,
            Err(LogtailError::Pipeline(PipelineError::NotRestartable))
        ));
    }

    #[tokio::test]
    async fn fatal_error_channel_closes_after_clean_stop() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pipeline = LogPipelineBuilder::new()
            .config(test_config(file.path()))
            .build()
            .unwrap();

        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();
        assert!(pipeline.fatal_error().await.is_none());
    }

    #[tokio::test]
    async fn sink_factory_failure_fails_start() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pipeline = LogPipelineBuilder::new()
            .config(test_config(file.path()))
            .sink_factory(Arc::new(|| {
                Err(LogtailError::Pipeline(PipelineError::InitFailed(
                    "sink unavailable".to_owned(),
                )))
            }))
            .build()
            .unwrap();

        let err = pipeline.start().await.unwrap_err();
        assert!(err.to_string().contains("sink unavailable"));
        assert_eq!(pipeline.state_name(), "initialized");
    }
}
