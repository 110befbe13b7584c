//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 생성하는 [`AccessRecord`]와 싱크가 전송하는 [`MetricPoint`]를 정의합니다.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 기본 측정(measurement) 이름
pub const DEFAULT_MEASUREMENT: &str = "nginx_log";

/// 파싱된 액세스 로그 레코드
///
/// 문법에 완전히 일치한 원시 라인에서만 생성됩니다.
/// 파서에서 싱크로 소유권이 이동합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// 요청 시각 (고정 오프셋 기준)
    pub time: DateTime<FixedOffset>,
    /// 응답 바이트 수
    pub bytes_sent: u64,
    /// 요청 경로 (쿼리 스트링 제외)
    pub path: String,
    /// HTTP 메서드
    pub method: String,
    /// 스킴 (http, https)
    pub scheme: String,
    /// 상태 코드 (3자리)
    pub status: String,
    /// 업스트림 응답 시간 (초). `-`이면 None
    pub upstream_time: Option<f64>,
    /// 전체 요청 처리 시간 (초)
    pub request_time: f64,
}

impl AccessRecord {
    /// 레코드를 단일 메트릭 포인트로 변환합니다.
    ///
    /// 태그: Path, Method, Scheme, Status
    /// 필드: UpstreamTime (있을 때만), RequestTime, BytesSent
    pub fn to_point(&self, measurement: &str) -> MetricPoint {
        let mut fields = Vec::with_capacity(3);
        if let Some(upstream) = self.upstream_time {
            fields.push(("UpstreamTime".to_owned(), FieldValue::Float(upstream)));
        }
        fields.push(("RequestTime".to_owned(), FieldValue::Float(self.request_time)));
        // i64 범위를 넘으면 최댓값으로 고정
        let bytes_sent = i64::try_from(self.bytes_sent).unwrap_or(i64::MAX);
        fields.push(("BytesSent".to_owned(), FieldValue::Integer(bytes_sent)));

        MetricPoint {
            measurement: measurement.to_owned(),
            tags: vec![
                ("Path".to_owned(), self.path.clone()),
                ("Method".to_owned(), self.method.clone()),
                ("Scheme".to_owned(), self.scheme.clone()),
                ("Status".to_owned(), self.status.clone()),
            ],
            fields,
            time: self.time,
        }
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}B {:.3}s",
            self.time.to_rfc3339(),
            self.method,
            self.scheme,
            self.path,
            self.status,
            self.bytes_sent,
            self.request_time,
        )
    }
}

/// 메트릭 필드 값
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 부동소수점
    Float(f64),
    /// 정수
    Integer(i64),
}

/// 시계열 저장소로 전송되는 단일 포인트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// 측정 이름
    pub measurement: String,
    /// 태그 (순서 유지)
    pub tags: Vec<(String, String)>,
    /// 필드 (순서 유지, 최소 1개)
    pub fields: Vec<(String, FieldValue)>,
    /// 타임스탬프
    pub time: DateTime<FixedOffset>,
}

impl MetricPoint {
    /// 태그 값을 조회합니다.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 필드 값을 조회합니다.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}
