//! # logtail-pipeline
//!
//! Nginx 액세스 로그를 tail하여 파싱하고 InfluxDB로 전송하는 파이프라인입니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 로그 파일 끝에서 새 라인 수집 (`tail -f` 방식)
//! - [`parser`]: 액세스 로그 파서 및 파서 워커
//! - [`sink`]: InfluxDB line protocol 인코딩 및 HTTP 전송
//! - [`monitor`]: 처리 카운터, 처리량 샘플링, `GET /monitor` 엔드포인트
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> read queue -> parser workers -> write queue -> sink workers
//!     |                          |                              |
//!  tail -f                 regex + chrono                 line protocol
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

pub mod collector;
pub mod monitor;
pub mod parser;
pub mod sink;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{AccessLogParser, ParserOptions};

// 수집기
pub use collector::{FileTailer, RawLine, TailerOptions};

// 싱크
pub use sink::{InfluxDsn, InfluxSink, Precision, SinkFactory};

// 모니터
pub use monitor::{Monitor, MonitorServer, PipelineStats, StatSnapshot};
