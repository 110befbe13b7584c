//! 에러 타입 -- 도메인별 에러 정의

/// logtail 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogtailError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 메트릭 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 정지된 파이프라인은 재시작할 수 없음
    #[error("pipeline cannot be restarted after stop")]
    NotRestartable,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 워커 태스크 치명적 실패
    #[error("worker '{worker}' failed: {reason}")]
    WorkerFailed { worker: String, reason: String },
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 문법 불일치
    #[error("line does not match grammar: {0}")]
    GrammarMismatch(String),

    /// 필드 파싱 실패
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 메트릭 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 연결 문자열 오류
    #[error("invalid sink dsn: {0}")]
    InvalidDsn(String),

    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쓰기 거부 (non-2xx 응답)
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_logtail_error() {
        let err: LogtailError = ConfigError::InvalidValue {
            field: "sink.workers".to_owned(),
            reason: "must be 1-64".to_owned(),
        }
        .into();
        assert!(matches!(err, LogtailError::Config(_)));
        assert!(err.to_string().contains("sink.workers"));
    }

    #[test]
    fn sink_rejected_display_includes_status() {
        let err = SinkError::Rejected {
            status: 401,
            body: "authorization failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("authorization failed"));
    }

    #[test]
    fn worker_failed_display() {
        let err = PipelineError::WorkerFailed {
            worker: "sink-2".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "worker 'sink-2' failed: connection refused"
        );
    }
}
