//! 로그 파싱 모듈 -- 원시 라인을 [`AccessRecord`]로 변환합니다.
//!
//! 파서는 core의 [`RecordParser`] trait을 구현합니다.
//! [`run_parser_worker`]는 읽기 큐에서 라인을 꺼내 파싱하고 쓰기 큐로 넘기는
//! 워커 루프입니다. 파이프라인이 워커 수만큼 스폰합니다.
//!
//! # 지원 형식
//! - Nginx 액세스 로그 ([`AccessLogParser`])

pub mod access;

pub use access::{AccessLogParser, ParserOptions};

use std::sync::Arc;

use logtail_core::metrics as m;
use logtail_core::pipeline::RecordParser;
use logtail_core::types::AccessRecord;
use tracing::{debug, trace, warn};

use crate::collector::RawLine;
use crate::monitor::StatReporter;

/// 파서 워커 루프
///
/// 입력 큐가 닫히고 비워지면 종료합니다. 파싱 실패는 에러 카운터를 올리고
/// 라인을 버린 뒤 계속합니다. 출력 큐가 닫혀 있으면 더 이상 넘길 곳이 없으므로
/// 종료합니다.
pub async fn run_parser_worker(
    id: usize,
    parser: Arc<dyn RecordParser>,
    input: flume::Receiver<RawLine>,
    output: flume::Sender<AccessRecord>,
    stats: StatReporter,
) {
    debug!(worker = id, format = parser.format_name(), "parser worker started");

    while let Ok(line) = input.recv_async().await {
        match parser.parse(&line) {
            Ok(record) => {
                metrics::counter!(
                    m::PARSER_RECORDS_PARSED_TOTAL,
                    m::LABEL_PARSER_FORMAT => parser.format_name().to_owned()
                )
                .increment(1);
                trace!(worker = id, record = %record, "line parsed");

                if output.send_async(record).await.is_err() {
                    warn!(worker = id, "record queue closed, parser worker exiting");
                    return;
                }
            }
            Err(e) => {
                stats.parse_error().await;
                metrics::counter!(
                    m::PARSER_ERRORS_TOTAL,
                    m::LABEL_PARSER_FORMAT => parser.format_name().to_owned()
                )
                .increment(1);
                warn!(
                    worker = id,
                    error = %e,
                    line = %String::from_utf8_lossy(&line),
                    "failed to parse line"
                );
            }
        }
    }

    debug!(worker = id, "raw line queue drained, parser worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{StatEvent, stat_channel};

    const VALID: &[u8] = br#"172.0.0.12 - - [04/Mar/2018:13:49:52 +0000] http "GET /foo?query=t HTTP/1.0" 200 2133 "-" "KeepAliveClient" "-" 1.005 1.854"#;

    #[tokio::test]
    async fn worker_forwards_records_and_counts_errors() {
        let parser: Arc<dyn RecordParser> =
            Arc::new(AccessLogParser::new(ParserOptions::default()).unwrap());
        let (in_tx, in_rx) = flume::bounded(8);
        let (out_tx, out_rx) = flume::bounded(8);
        let (stats, events) = stat_channel(8);

        in_tx.send_async(RawLine::from_static(VALID)).await.unwrap();
        in_tx
            .send_async(RawLine::from_static(b"not a log line"))
            .await
            .unwrap();
        drop(in_tx);

        run_parser_worker(0, parser, in_rx, out_tx, stats).await;

        let records: Vec<_> = out_rx.drain().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/foo");

        let events: Vec<_> = events.drain().collect();
        assert_eq!(events, vec![StatEvent::ParseError]);
    }

    #[tokio::test]
    async fn worker_exits_when_output_closed() {
        let parser: Arc<dyn RecordParser> =
            Arc::new(AccessLogParser::new(ParserOptions::default()).unwrap());
        let (in_tx, in_rx) = flume::bounded(8);
        let (out_tx, out_rx) = flume::bounded::<AccessRecord>(8);
        let (stats, _events) = stat_channel(8);
        drop(out_rx);

        in_tx.send_async(RawLine::from_static(VALID)).await.unwrap();
        // 입력 큐는 열린 채로 두어도 워커가 종료되어야 함
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_parser_worker(0, parser, in_rx, out_tx, stats),
        )
        .await
        .unwrap();
        drop(in_tx);
    }
}
