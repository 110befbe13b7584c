//! InfluxDB 1.x HTTP 싱크
//!
//! 연결 문자열 `addr@user@password@db@precision`으로 설정하며,
//! `POST {addr}/write?db=..&precision=..`에 line protocol 본문을 보냅니다.
//! 2xx 응답만 성공으로 취급합니다.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset};
use logtail_core::error::{LogtailError, SinkError};
use logtail_core::metrics as m;
use logtail_core::pipeline::MetricSink;
use logtail_core::types::{FieldValue, MetricPoint};
use tracing::{debug, warn};
use url::Url;

/// 타임스탬프 정밀도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 나노초 (`ns`)
    Nanoseconds,
    /// 마이크로초 (`u`)
    Microseconds,
    /// 밀리초 (`ms`)
    Milliseconds,
    /// 초 (`s`)
    Seconds,
    /// 분 (`m`)
    Minutes,
    /// 시 (`h`)
    Hours,
}

impl Precision {
    /// 쿼리 파라미터 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "u",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
        }
    }

    /// 시각을 이 정밀도의 에포크 값으로 변환합니다.
    pub fn timestamp(&self, time: &DateTime<FixedOffset>) -> i64 {
        match self {
            // 2262년 이후는 i64 나노초로 표현할 수 없음
            Self::Nanoseconds => time
                .timestamp_nanos_opt()
                .unwrap_or_else(|| time.timestamp_micros().saturating_mul(1_000)),
            Self::Microseconds => time.timestamp_micros(),
            Self::Milliseconds => time.timestamp_millis(),
            Self::Seconds => time.timestamp(),
            Self::Minutes => time.timestamp().div_euclid(60),
            Self::Hours => time.timestamp().div_euclid(3600),
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" => Ok(Self::Nanoseconds),
            "u" => Ok(Self::Microseconds),
            "ms" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            other => Err(SinkError::InvalidDsn(format!(
                "unknown precision '{other}' (expected ns, u, ms, s, m or h)"
            ))),
        }
    }
}

/// 파싱된 InfluxDB 연결 문자열
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxDsn {
    /// 서버 주소 (예: `http://127.0.0.1:8086`)
    pub addr: String,
    /// 사용자 이름 (비어 있으면 인증 없음)
    pub user: String,
    /// 비밀번호
    pub password: String,
    /// 데이터베이스 이름
    pub database: String,
    /// 타임스탬프 정밀도
    pub precision: Precision,
}

impl InfluxDsn {
    /// `addr@user@password@db@precision` 형식을 파싱합니다.
    pub fn parse(dsn: &str) -> Result<Self, SinkError> {
        let parts: Vec<&str> = dsn.split('@').collect();
        let [addr, user, password, database, precision] = parts.as_slice() else {
            return Err(SinkError::InvalidDsn(format!(
                "expected addr@user@password@db@precision, got {} part(s)",
                parts.len()
            )));
        };
        if addr.is_empty() {
            return Err(SinkError::InvalidDsn("address must not be empty".to_owned()));
        }
        if database.is_empty() {
            return Err(SinkError::InvalidDsn("database must not be empty".to_owned()));
        }

        Ok(Self {
            addr: (*addr).to_owned(),
            user: (*user).to_owned(),
            password: (*password).to_owned(),
            database: (*database).to_owned(),
            precision: precision.parse()?,
        })
    }

    /// 쓰기 엔드포인트 URL
    pub fn write_url(&self) -> Result<Url, SinkError> {
        let mut url = Url::parse(&format!("{}/write", self.addr.trim_end_matches('/')))
            .map_err(|e| SinkError::InvalidDsn(format!("invalid address '{}': {e}", self.addr)))?;
        url.query_pairs_mut()
            .append_pair("db", &self.database)
            .append_pair("precision", self.precision.as_str());
        Ok(url)
    }
}

/// InfluxDB HTTP 싱크
///
/// 워커마다 하나씩 생성하며 각자 `reqwest::Client`(연결 풀)를 가집니다.
pub struct InfluxSink {
    name: String,
    client: reqwest::Client,
    write_url: Url,
    user: String,
    password: String,
    precision: Precision,
}

impl InfluxSink {
    /// 연결 문자열과 요청 타임아웃으로 싱크를 생성합니다.
    pub fn new(dsn: &InfluxDsn, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Connection(format!("failed to build http client: {e}")))?;

        Ok(Self {
            name: format!("influxdb:{}", dsn.database),
            client,
            write_url: dsn.write_url()?,
            user: dsn.user.clone(),
            password: dsn.password.clone(),
            precision: dsn.precision,
        })
    }

    /// 연결 문자열 원문에서 싱크를 생성합니다.
    pub fn from_dsn(dsn: &str, timeout: Duration) -> Result<Self, SinkError> {
        Self::new(&InfluxDsn::parse(dsn)?, timeout)
    }

    /// 쓰기 요청 URL
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    async fn post(&self, body: String) -> Result<(), SinkError> {
        let mut request = self.client.post(self.write_url.clone()).body(body);
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl MetricSink for InfluxSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, points: &[MetricPoint]) -> Result<(), LogtailError> {
        let body = encode_points(points, self.precision);
        if body.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let result = self.post(body).await;
        metrics::histogram!(m::SINK_WRITE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::counter!(m::SINK_POINTS_WRITTEN_TOTAL, m::LABEL_SINK => "influxdb")
                    .increment(points.len() as u64);
                debug!(sink = %self.name, points = points.len(), "points written");
                Ok(())
            }
            Err(e) => {
                metrics::counter!(m::SINK_WRITE_FAILURES_TOTAL, m::LABEL_SINK => "influxdb")
                    .increment(1);
                Err(e.into())
            }
        }
    }
}

/// 포인트 목록을 line protocol 본문으로 인코딩합니다 (줄바꿈 구분).
pub fn encode_points(points: &[MetricPoint], precision: Precision) -> String {
    let mut body = String::new();
    for point in points {
        match encode_point(point, precision) {
            Some(line) => {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(&line);
            }
            None => warn!(
                measurement = %point.measurement,
                "point has no encodable fields, skipped"
            ),
        }
    }
    body
}

/// 포인트 하나를 line protocol 한 줄로 인코딩합니다.
///
/// 유한한 값의 필드가 하나도 없으면 `None`입니다.
pub fn encode_point(point: &MetricPoint, precision: Precision) -> Option<String> {
    let mut line = String::new();
    line.push_str(&escape(&point.measurement, &[',', ' ']));

    for (key, value) in &point.tags {
        // 빈 태그 값은 허용되지 않음
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let mut first = true;
    for (key, value) in &point.fields {
        let encoded = match value {
            FieldValue::Float(f) if f.is_finite() => format!("{f}"),
            FieldValue::Float(_) => continue,
            FieldValue::Integer(i) => format!("{i}i"),
        };
        line.push(if first { ' ' } else { ',' });
        first = false;
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&encoded);
    }
    if first {
        return None;
    }

    let _ = write!(line, " {}", precision.timestamp(&point.time));
    Some(line)
}

/// 지정된 문자와 백슬래시 앞에 `\`를 붙입니다.
///
/// 한 포인트가 여러 줄로 나뉘지 않도록 제어 문자는 `\n` 같은 텍스트로 바꿉니다.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => {
                if special.contains(&c) || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    out
}
