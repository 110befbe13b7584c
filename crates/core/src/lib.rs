//! logtail-core -- 공통 타입, trait, 에러, 설정
//!
//! 워크스페이스의 모든 크레이트가 의존하는 기반 크레이트입니다.
//! 파이프라인 구현은 `logtail-pipeline`, 실행 바이너리는 `logtail-daemon`에 있습니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogtailError, ParseError, PipelineError, SinkError};

// 설정
pub use config::LogtailConfig;

// 파이프라인 trait
pub use pipeline::{
    BoxFuture, DynMetricSink, DynPipeline, HealthStatus, MetricSink, Pipeline, RecordParser,
};

// 도메인 타입
pub use types::{AccessRecord, FieldValue, MetricPoint};
