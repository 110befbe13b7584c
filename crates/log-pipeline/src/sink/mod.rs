//! 메트릭 싱크 모듈 -- 레코드를 포인트로 바꿔 외부 시계열 저장소로 전송합니다.
//!
//! 싱크는 core의 [`MetricSink`](logtail_core::pipeline::MetricSink) trait을 구현합니다.
//! 파이프라인은 [`SinkFactory`]로 워커마다 독립된 싱크(연결)를 만듭니다.
//!
//! # 지원 싱크
//! - InfluxDB 1.x HTTP ([`InfluxSink`])

pub mod influx;

pub use influx::{InfluxDsn, InfluxSink, Precision};

use std::sync::Arc;
use std::time::Duration;

use logtail_core::error::{LogtailError, PipelineError, SinkError};
use logtail_core::pipeline::DynMetricSink;
use logtail_core::types::AccessRecord;
use tracing::{debug, error};

/// 싱크 워커마다 호출되어 새 싱크를 만드는 팩토리
pub type SinkFactory =
    Arc<dyn Fn() -> Result<Box<dyn DynMetricSink>, LogtailError> + Send + Sync>;

/// InfluxDB 싱크 팩토리를 만듭니다.
///
/// 연결 문자열은 여기서 한 번 검증합니다.
pub fn influx_factory(dsn: &str, timeout: Duration) -> Result<SinkFactory, SinkError> {
    let dsn = InfluxDsn::parse(dsn)?;
    Ok(Arc::new(move || -> Result<Box<dyn DynMetricSink>, LogtailError> {
        let sink = InfluxSink::new(&dsn, timeout)?;
        Ok(Box::new(sink) as Box<dyn DynMetricSink>)
    }))
}

/// 싱크 워커 루프
///
/// 큐에서 레코드를 꺼내 포인트로 변환해 전송합니다. `batch_size`가 1보다 크면
/// 이미 큐에 있는 레코드만 기다리지 않고 함께 묶습니다.
/// 입력 큐가 닫히고 비워지면 `Ok(())`로 종료하며, 전송 실패는 재시도 없이
/// 워커의 치명적 에러로 반환합니다.
pub async fn run_sink_worker(
    id: usize,
    sink: Box<dyn DynMetricSink>,
    input: flume::Receiver<AccessRecord>,
    measurement: String,
    batch_size: usize,
) -> Result<(), LogtailError> {
    debug!(worker = id, sink = sink.name(), "sink worker started");
    let mut points = Vec::with_capacity(batch_size);

    while let Ok(record) = input.recv_async().await {
        points.clear();
        points.push(record.to_point(&measurement));
        while points.len() < batch_size {
            match input.try_recv() {
                Ok(record) => points.push(record.to_point(&measurement)),
                Err(_) => break,
            }
        }

        if let Err(e) = sink.write(&points).await {
            error!(worker = id, sink = sink.name(), error = %e, "sink write failed");
            return Err(PipelineError::WorkerFailed {
                worker: format!("sink-{id}"),
                reason: e.to_string(),
            }
            .into());
        }
    }

    debug!(worker = id, "record queue drained, sink worker exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{FixedOffset, TimeZone};
    use logtail_core::pipeline::MetricSink;
    use logtail_core::types::MetricPoint;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<Vec<MetricPoint>>>>,
        fail: bool,
    }

    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&self, points: &[MetricPoint]) -> Result<(), LogtailError> {
            if self.fail {
                return Err(SinkError::Connection("refused".to_owned()).into());
            }
            self.batches.lock().unwrap().push(points.to_vec());
            Ok(())
        }
    }

    fn record(path: &str) -> AccessRecord {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        AccessRecord {
            time: offset.with_ymd_and_hms(2018, 3, 4, 13, 49, 52).unwrap(),
            bytes_sent: 10,
            path: path.to_owned(),
            method: "GET".to_owned(),
            scheme: "http".to_owned(),
            status: "200".to_owned(),
            upstream_time: None,
            request_time: 0.1,
        }
    }

    #[test]
    fn influx_factory_rejects_bad_dsn() {
        assert!(influx_factory("nope", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn influx_factory_builds_independent_sinks() {
        let factory = influx_factory(
            "http://127.0.0.1:8086@u@p@db@s",
            Duration::from_secs(1),
        )
        .unwrap();
        let a = factory().unwrap();
        let b = factory().unwrap();
        assert_eq!(a.name(), "influxdb:db");
        assert_eq!(b.name(), "influxdb:db");
    }

    #[tokio::test]
    async fn worker_writes_one_point_per_request_by_default() {
        let sink = RecordingSink::default();
        let (tx, rx) = flume::bounded(8);
        tx.send_async(record("/a")).await.unwrap();
        tx.send_async(record("/b")).await.unwrap();
        drop(tx);

        run_sink_worker(0, Box::new(sink.clone()), rx, "nginx_log".to_owned(), 1)
            .await
            .unwrap();

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].tag("Path"), Some("/a"));
        assert_eq!(batches[1][0].measurement, "nginx_log");
    }

    #[tokio::test]
    async fn worker_coalesces_queued_records() {
        let sink = RecordingSink::default();
        let (tx, rx) = flume::bounded(8);
        for p in ["/a", "/b", "/c"] {
            tx.send_async(record(p)).await.unwrap();
        }
        drop(tx);

        run_sink_worker(0, Box::new(sink.clone()), rx, "nginx_log".to_owned(), 2)
            .await
            .unwrap();

        let batches = sink.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let (tx, rx) = flume::bounded(8);
        tx.send_async(record("/a")).await.unwrap();

        let err = run_sink_worker(3, Box::new(sink), rx, "nginx_log".to_owned(), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sink-3"));
        drop(tx);
    }
}
