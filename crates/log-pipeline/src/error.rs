//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogtailError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logtail_core::error::{LogtailError, ParseError, PipelineError, SinkError};

/// 로그 파이프라인 도메인 에러
///
/// 파싱, 수집, 싱크 전송, 모니터 바인드 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 로그 파싱 실패 (레코드 단위, 복구 가능)
    #[error("parse error: {field}: {reason}")]
    Parse {
        /// 실패한 필드 (grammar, time, request, path, bytes 등)
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 수집기 에러 (파일 열기, 읽기 실패 등)
    #[error("collector error: {path}: {reason}")]
    Collector {
        /// 대상 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 싱크 에러 (연결 문자열, 전송 실패)
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 모니터 HTTP 서버 에러
    #[error("monitor error: {0}")]
    Monitor(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// 라인 전체가 문법에 맞지 않을 때 [`LogPipelineError::Parse`]의 필드명
pub const GRAMMAR_FIELD: &str = "grammar";

impl From<LogPipelineError> for LogtailError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse { field, reason } if field == GRAMMAR_FIELD => {
                LogtailError::Parse(ParseError::GrammarMismatch(reason))
            }
            LogPipelineError::Parse { field, reason } => {
                LogtailError::Parse(ParseError::InvalidField { field, reason })
            }
            LogPipelineError::Sink(e) => LogtailError::Sink(e),
            LogPipelineError::Io(e) => LogtailError::Io(e),
            // 실행 중 실패는 초기화 실패와 구분
            LogPipelineError::Collector { path, reason } => {
                LogtailError::Pipeline(PipelineError::WorkerFailed {
                    worker: "tailer".to_owned(),
                    reason: format!("{path}: {reason}"),
                })
            }
            LogPipelineError::Channel(reason) => {
                LogtailError::Pipeline(PipelineError::WorkerFailed {
                    worker: "queue".to_owned(),
                    reason,
                })
            }
            other => LogtailError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
