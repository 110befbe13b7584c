//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogtailConfig`](logtail_core::config::LogtailConfig)를
//! 기반으로 파이프라인 런타임에 필요한 설정만 평탄화해서 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logtail_core::config::LogtailConfig;
//! use logtail_pipeline::config::PipelineConfig;
//!
//! let core_config = LogtailConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use chrono::FixedOffset;
use logtail_core::config::{LogtailConfig, parse_fixed_offset};
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;
use crate::sink::influx::InfluxDsn;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 감시할 로그 파일 경로
    pub path: String,
    /// EOF 대기 시간 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,

    /// 파서 워커 수
    pub parser_workers: usize,
    /// 타임스탬프 해석용 고정 오프셋 (예: "+08:00")
    pub timezone_offset: String,
    /// 숫자 필드 파싱 실패를 에러로 취급할지 여부
    pub strict_numeric: bool,

    /// InfluxDB 연결 문자열
    pub dsn: String,
    /// 싱크 워커 수
    pub sink_workers: usize,
    /// 요청당 최대 포인트 수
    pub batch_size: usize,
    /// 측정 이름
    pub measurement: String,
    /// 싱크 요청 타임아웃 (초)
    pub sink_timeout_secs: u64,

    /// 읽기 큐 용량
    pub read_queue_capacity: usize,
    /// 쓰기 큐 용량
    pub write_queue_capacity: usize,
    /// 모니터 이벤트 채널 용량
    pub event_queue_capacity: usize,

    /// 모니터 HTTP 서버 활성화 여부
    pub monitor_enabled: bool,
    /// 모니터 바인드 주소 (`host:port`)
    pub monitor_bind: String,
    /// 처리량 샘플링 주기 (초)
    pub sample_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&LogtailConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `LogtailConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &LogtailConfig) -> Self {
        Self {
            path: core.source.path.clone(),
            poll_interval_ms: core.source.poll_interval_ms,
            max_line_length: core.source.max_line_length,
            parser_workers: core.parser.workers,
            timezone_offset: core.parser.timezone_offset.clone(),
            strict_numeric: core.parser.strict_numeric,
            dsn: core.sink.dsn.clone(),
            sink_workers: core.sink.workers,
            batch_size: core.sink.batch_size,
            measurement: core.sink.measurement.clone(),
            sink_timeout_secs: core.sink.timeout_secs,
            read_queue_capacity: core.pipeline.read_queue_capacity,
            write_queue_capacity: core.pipeline.write_queue_capacity,
            event_queue_capacity: core.pipeline.event_queue_capacity,
            monitor_enabled: core.monitor.enabled,
            monitor_bind: format!("{}:{}", core.monitor.listen_addr, core.monitor.port),
            sample_interval_secs: core.monitor.sample_interval_secs,
        }
    }

    /// EOF 대기 시간
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 처리량 샘플링 주기
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// 타임스탬프 해석용 오프셋
    pub fn timezone(&self) -> Result<FixedOffset, LogPipelineError> {
        parse_fixed_offset(&self.timezone_offset).map_err(|reason| LogPipelineError::Config {
            field: "timezone_offset".to_owned(),
            reason,
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_WORKERS: usize = 64;
        const MAX_QUEUE_CAPACITY: usize = 1_000_000;
        const MAX_BATCH_SIZE: usize = 10_000;

        if self.path.is_empty() {
            return Err(config_err("path", "must not be empty"));
        }

        if self.poll_interval_ms == 0 {
            return Err(config_err("poll_interval_ms", "must be greater than 0"));
        }

        if self.max_line_length == 0 {
            return Err(config_err("max_line_length", "must be greater than 0"));
        }

        for (field, value) in [
            ("parser_workers", self.parser_workers),
            ("sink_workers", self.sink_workers),
        ] {
            if value == 0 || value > MAX_WORKERS {
                return Err(config_err(field, format!("must be 1-{MAX_WORKERS}")));
            }
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(config_err(
                "batch_size",
                format!("must be 1-{MAX_BATCH_SIZE}"),
            ));
        }

        for (field, value) in [
            ("read_queue_capacity", self.read_queue_capacity),
            ("write_queue_capacity", self.write_queue_capacity),
            ("event_queue_capacity", self.event_queue_capacity),
        ] {
            if value == 0 || value > MAX_QUEUE_CAPACITY {
                return Err(config_err(field, format!("must be 1-{MAX_QUEUE_CAPACITY}")));
            }
        }

        if self.measurement.is_empty() {
            return Err(config_err("measurement", "must not be empty"));
        }

        if self.sink_timeout_secs == 0 {
            return Err(config_err("sink_timeout_secs", "must be greater than 0"));
        }

        if self.monitor_enabled && self.sample_interval_secs == 0 {
            return Err(config_err("sample_interval_secs", "must be greater than 0"));
        }

        self.timezone()?;
        InfluxDsn::parse(&self.dsn)?;

        Ok(())
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
///
/// 3개 이상의 설정 필드가 있으므로 빌더 패턴을 사용합니다.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시할 파일 경로를 설정합니다.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// EOF 대기 시간(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 파서 워커 수를 설정합니다.
    pub fn parser_workers(mut self, n: usize) -> Self {
        self.config.parser_workers = n;
        self
    }

    /// 타임스탬프 오프셋을 설정합니다.
    pub fn timezone_offset(mut self, offset: impl Into<String>) -> Self {
        self.config.timezone_offset = offset.into();
        self
    }

    /// 엄격한 숫자 파싱 여부를 설정합니다.
    pub fn strict_numeric(mut self, strict: bool) -> Self {
        self.config.strict_numeric = strict;
        self
    }

    /// InfluxDB 연결 문자열을 설정합니다.
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.dsn = dsn.into();
        self
    }

    /// 싱크 워커 수를 설정합니다.
    pub fn sink_workers(mut self, n: usize) -> Self {
        self.config.sink_workers = n;
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 두 큐의 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.read_queue_capacity = capacity;
        self.config.write_queue_capacity = capacity;
        self
    }

    /// 모니터 HTTP 서버 활성화 여부를 설정합니다.
    pub fn monitor_enabled(mut self, enabled: bool) -> Self {
        self.config.monitor_enabled = enabled;
        self
    }

    /// 모니터 바인드 주소를 설정합니다.
    pub fn monitor_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.monitor_bind = bind.into();
        self
    }

    /// 처리량 샘플링 주기(초)를 설정합니다.
    pub fn sample_interval_secs(mut self, secs: u64) -> Self {
        self.config.sample_interval_secs = secs;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
