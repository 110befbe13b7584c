//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logtail_`
//! - 스테이지명: `tailer_`, `parser_`, `sink_`, `queue_`, `monitor_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logtail_core::metrics::PARSER_RECORDS_PARSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파서 형식 레이블 키
pub const LABEL_PARSER_FORMAT: &str = "format";

/// 싱크 이름 레이블 키
pub const LABEL_SINK: &str = "sink";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Tailer 메트릭 ────────────────────────────────────────────────

/// Tailer: 읽은 전체 라인 수 (counter)
pub const TAILER_LINES_READ_TOTAL: &str = "logtail_tailer_lines_read_total";

/// Tailer: 최대 길이 초과로 버린 라인 수 (counter)
pub const TAILER_LINES_DROPPED_TOTAL: &str = "logtail_tailer_lines_dropped_total";

/// Tailer: 로테이션/절단으로 파일을 다시 연 횟수 (counter)
pub const TAILER_REOPENS_TOTAL: &str = "logtail_tailer_reopens_total";

// ─── Parser 메트릭 ────────────────────────────────────────────────

/// Parser: 파싱 성공 레코드 수 (counter)
pub const PARSER_RECORDS_PARSED_TOTAL: &str = "logtail_parser_records_parsed_total";

/// Parser: 파싱 에러 수 (counter)
pub const PARSER_ERRORS_TOTAL: &str = "logtail_parser_errors_total";

// ─── Sink 메트릭 ──────────────────────────────────────────────────

/// Sink: 전송에 성공한 포인트 수 (counter)
pub const SINK_POINTS_WRITTEN_TOTAL: &str = "logtail_sink_points_written_total";

/// Sink: 실패한 쓰기 요청 수 (counter)
pub const SINK_WRITE_FAILURES_TOTAL: &str = "logtail_sink_write_failures_total";

/// Sink: 쓰기 요청 지연 시간 (histogram, 초)
pub const SINK_WRITE_DURATION_SECONDS: &str = "logtail_sink_write_duration_seconds";

// ─── Queue / Monitor 메트릭 ───────────────────────────────────────

/// Queue: 읽기 큐 적재량 (gauge)
pub const QUEUE_READ_DEPTH: &str = "logtail_queue_read_depth";

/// Queue: 쓰기 큐 적재량 (gauge)
pub const QUEUE_WRITE_DEPTH: &str = "logtail_queue_write_depth";

/// Monitor: 최근 샘플 구간의 초당 처리 라인 수 (gauge)
pub const MONITOR_LINES_PER_SECOND: &str = "logtail_monitor_lines_per_second";

// ─── Daemon 메트릭 ────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logtail_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "logtail_daemon_build_info";

// ─── 히스토그램 버킷 ──────────────────────────────────────────────

/// 싱크 쓰기 지연 버킷 (초)
///
/// 1ms ~ 10s 범위 (HTTP 왕복 포함)
pub const WRITE_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logtail-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Tailer
    describe_counter!(
        TAILER_LINES_READ_TOTAL,
        "Total number of lines read from the tailed file"
    );
    describe_counter!(
        TAILER_LINES_DROPPED_TOTAL,
        "Lines dropped because they exceeded the maximum line length"
    );
    describe_counter!(
        TAILER_REOPENS_TOTAL,
        "Times the tailed file was reopened after truncation or rotation"
    );

    // Parser
    describe_counter!(
        PARSER_RECORDS_PARSED_TOTAL,
        "Total number of lines successfully parsed into records"
    );
    describe_counter!(PARSER_ERRORS_TOTAL, "Total number of lines that failed to parse");

    // Sink
    describe_counter!(
        SINK_POINTS_WRITTEN_TOTAL,
        "Total number of points accepted by the metrics sink"
    );
    describe_counter!(
        SINK_WRITE_FAILURES_TOTAL,
        "Total number of failed sink write requests"
    );
    describe_histogram!(
        SINK_WRITE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Latency of sink write requests"
    );

    // Queue / Monitor
    describe_gauge!(QUEUE_READ_DEPTH, "Lines waiting in the read queue");
    describe_gauge!(QUEUE_WRITE_DEPTH, "Records waiting in the write queue");
    describe_gauge!(
        MONITOR_LINES_PER_SECOND,
        "Handled lines per second over the last sample window"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "logtail daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
