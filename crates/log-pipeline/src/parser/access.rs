//! Nginx 액세스 로그 파서
//!
//! 고정된 문법의 액세스 로그 라인 한 줄을 [`AccessRecord`]로 변환합니다.
//!
//! # 라인 형식
//! ```text
//! <client> <ident1> <ident2> [<dd/Mon/yyyy:HH:MM:SS +ZZZZ>] <scheme> "<METHOD> <target> <PROTO>" <status> <bytes> "<ref1>" "<ref2>" "<ref3>" <upstream> <request>
//! ```
//!
//! # 사용 예시
//! ```ignore
//! use logtail_pipeline::parser::{AccessLogParser, ParserOptions};
//! use logtail_core::pipeline::RecordParser;
//!
//! let parser = AccessLogParser::new(ParserOptions::default())?;
//! let record = parser.parse(br#"172.0.0.12 - - [04/Mar/2018:13:49:52 +0000] http "GET /foo?query=t HTTP/1.0" 200 2133 "-" "KeepAliveClient" "-" 1.005 1.854"#)?;
//! assert_eq!(record.path, "/foo");
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use logtail_core::error::LogtailError;
use logtail_core::pipeline::RecordParser;
use logtail_core::types::AccessRecord;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

use crate::error::{GRAMMAR_FIELD, LogPipelineError};

/// 액세스 로그 문법. 14개 그룹(전체 매치 포함)이 모두 잡혀야 합니다.
const ACCESS_LOG_PATTERN: &str = r#"([\d\.]+)\s+([^ \[]+)\s+([^ \[]+)\s+\[([^\]]+)\]\s+([a-z]+)\s+"([^"]+)"\s+(\d{3})\s+(\d+)\s+"([^"]+)"\s+"(.*?)"\s+"([\d\.-]+)"\s+([\d\.-]+)\s+([\d\.-]+)"#;

/// 타임스탬프의 벽시계 부분 형식
const TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";

/// 파서 옵션
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// 타임스탬프를 해석할 고정 오프셋
    pub timezone: FixedOffset,
    /// 숫자 필드 파싱 실패를 에러로 취급할지 여부
    pub strict_numeric: bool,
    /// 최대 허용 입력 크기 (바이트)
    pub max_input_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            // UTC+8
            timezone: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
            strict_numeric: false,
            max_input_size: 64 * 1024, // 64KB
        }
    }
}

/// Nginx 액세스 로그 파서
///
/// core의 [`RecordParser`] trait을 구현합니다. 상태가 없으므로
/// 여러 파서 워커가 `Arc`로 공유합니다.
pub struct AccessLogParser {
    regex: Regex,
    options: ParserOptions,
}

impl AccessLogParser {
    /// 파서를 생성합니다.
    pub fn new(options: ParserOptions) -> Result<Self, LogPipelineError> {
        Ok(Self {
            regex: Regex::new(ACCESS_LOG_PATTERN)?,
            options,
        })
    }

    /// 파서 옵션
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// 원시 라인을 파싱합니다.
    pub fn parse_line(&self, raw: &[u8]) -> Result<AccessRecord, LogPipelineError> {
        if raw.len() > self.options.max_input_size {
            return Err(parse_err(
                GRAMMAR_FIELD,
                format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.options.max_input_size
                ),
            ));
        }

        let line = String::from_utf8_lossy(raw);
        let caps = self
            .regex
            .captures(&line)
            .ok_or_else(|| parse_err(GRAMMAR_FIELD, format!("no match: {line}")))?;

        // 모든 그룹이 참여해야 함
        let mut fields = [""; 14];
        for (i, slot) in fields.iter_mut().enumerate() {
            *slot = caps
                .get(i)
                .map(|m| m.as_str())
                .ok_or_else(|| parse_err(GRAMMAR_FIELD, format!("missing group {i}: {line}")))?;
        }

        let time = self.parse_time(fields[4])?;

        let request: Vec<&str> = fields[6].split(' ').collect();
        let [method, target, _protocol] = request.as_slice() else {
            return Err(parse_err(
                "request",
                format!("expected 3 tokens, got {}: {}", request.len(), fields[6]),
            ));
        };
        let path = self.parse_path(target)?;

        let bytes_sent = self.parse_number("bytes_sent", fields[8], 0u64)?;
        let upstream_time = match fields[12] {
            "-" => None,
            value => Some(self.parse_number("upstream_time", value, 0.0f64)?),
        };
        let request_time = self.parse_number("request_time", fields[13], 0.0f64)?;

        Ok(AccessRecord {
            time,
            bytes_sent,
            path,
            method: (*method).to_owned(),
            scheme: fields[5].to_owned(),
            status: fields[7].to_owned(),
            upstream_time,
            request_time,
        })
    }

    /// `04/Mar/2018:13:49:52 +0000` 형식의 타임스탬프를 파싱합니다.
    ///
    /// 오프셋 부분은 형식만 검사하며, 벽시계 시각은 설정된 오프셋으로 해석합니다.
    fn parse_time(&self, value: &str) -> Result<DateTime<FixedOffset>, LogPipelineError> {
        let (wall, zone) = value
            .split_once(' ')
            .ok_or_else(|| parse_err("time", format!("missing zone suffix: {value}")))?;

        let zone_ok = zone.len() == 5
            && matches!(zone.as_bytes()[0], b'+' | b'-')
            && zone.as_bytes()[1..].iter().all(u8::is_ascii_digit);
        if !zone_ok {
            return Err(parse_err("time", format!("invalid zone suffix: {value}")));
        }

        let naive = NaiveDateTime::parse_from_str(wall, TIME_FORMAT)
            .map_err(|e| parse_err("time", format!("{e}: {value}")))?;

        self.options
            .timezone
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| parse_err("time", format!("ambiguous local time: {value}")))
    }

    /// 요청 대상에서 경로만 꺼냅니다 (쿼리 스트링 제외, 퍼센트 디코딩).
    ///
    /// 경로는 정규화하지 않습니다. `.`/`..` 세그먼트와 상대 경로는 그대로 남습니다.
    /// 디코딩 결과에 제어 문자가 있으면 에러입니다.
    fn parse_path(&self, target: &str) -> Result<String, LogPipelineError> {
        let raw = target_path(target);
        if let Some(bad) = invalid_escape(raw) {
            return Err(parse_err(
                "path",
                format!("invalid escape '{bad}' in {target}"),
            ));
        }

        let path = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|e| parse_err("path", format!("{e}: {target}")))?;
        if path.chars().any(char::is_control) {
            return Err(parse_err(
                "path",
                format!("control character in path: {target}"),
            ));
        }
        Ok(path.into_owned())
    }

    /// 숫자 필드를 파싱합니다.
    ///
    /// 관대 모드에서는 실패 시 `default`를 반환하고, 엄격 모드에서는 에러입니다.
    fn parse_number<T: std::str::FromStr>(
        &self,
        field: &str,
        value: &str,
        default: T,
    ) -> Result<T, LogPipelineError> {
        match value.parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) if self.options.strict_numeric => {
                Err(parse_err(field, format!("not a number: {value}")))
            }
            Err(_) => {
                debug!(field, value, "malformed number, using zero");
                Ok(default)
            }
        }
    }
}

impl RecordParser for AccessLogParser {
    fn format_name(&self) -> &str {
        "nginx_access"
    }

    fn parse(&self, raw: &[u8]) -> Result<AccessRecord, LogtailError> {
        self.parse_line(raw).map_err(LogtailError::from)
    }
}

fn parse_err(field: &str, reason: String) -> LogPipelineError {
    LogPipelineError::Parse {
        field: field.to_owned(),
        reason,
    }
}

/// 요청 대상에서 프래그먼트와 쿼리를 잘라낸 인코딩된 경로 부분
///
/// `scheme://authority/path` 형식이면 authority 이후만 남깁니다.
fn target_path(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let target = &target[..end];

    match target.split_once("://") {
        Some((scheme, rest)) if is_scheme(scheme) => rest.find('/').map_or("", |i| &rest[i..]),
        _ => target,
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `%` 뒤에 16진수 두 자리가 오지 않는 첫 위치를 찾습니다.
fn invalid_escape(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = bytes.len() >= i + 3
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                let end = (i + 3).min(bytes.len());
                return Some(s.get(i..end).unwrap_or("%"));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    const SAMPLE: &[u8] = br#"172.0.0.12 - - [04/Mar/2018:13:49:52 +0000] http "GET /foo?query=t HTTP/1.0" 200 2133 "-" "KeepAliveClient" "-" 1.005 1.854"#;

    fn parser() -> AccessLogParser {
        AccessLogParser::new(ParserOptions::default()).unwrap()
    }

    fn strict_parser() -> AccessLogParser {
        AccessLogParser::new(ParserOptions {
            strict_numeric: true,
            ..ParserOptions::default()
        })
        .unwrap()
    }

    fn line_with(request: &str, upstream: &str, request_time: &str) -> String {
        format!(
            r#"10.0.0.1 - - [04/Mar/2018:13:49:52 +0000] https "{request}" 404 512 "-" "curl/8.0" "-" {upstream} {request_time}"#
        )
    }

    #[test]
    fn format_name_is_nginx_access() {
        assert_eq!(parser().format_name(), "nginx_access");
    }

    #[test]
    fn parses_sample_line() {
        let record = parser().parse_line(SAMPLE).unwrap();

        assert_eq!(record.time.year(), 2018);
        assert_eq!(record.time.month(), 3);
        assert_eq!(record.time.day(), 4);
        assert_eq!(record.time.hour(), 13);
        assert_eq!(record.time.minute(), 49);
        assert_eq!(record.time.second(), 52);
        assert_eq!(record.time.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(record.time.to_rfc3339(), "2018-03-04T13:49:52+08:00");

        assert_eq!(record.bytes_sent, 2133);
        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/foo");
        assert_eq!(record.scheme, "http");
        assert_eq!(record.status, "200");
        assert_eq!(record.upstream_time, Some(1.005));
        assert_eq!(record.request_time, 1.854);
    }

    #[test]
    fn zone_suffix_does_not_shift_time() {
        let line = String::from_utf8_lossy(SAMPLE).replace("+0000", "-0500");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.time.to_rfc3339(), "2018-03-04T13:49:52+08:00");
    }

    #[test]
    fn configured_offset_is_used() {
        let parser = AccessLogParser::new(ParserOptions {
            timezone: FixedOffset::east_opt(0).unwrap(),
            ..ParserOptions::default()
        })
        .unwrap();
        let record = parser.parse_line(SAMPLE).unwrap();
        assert_eq!(record.time.to_rfc3339(), "2018-03-04T13:49:52+00:00");
    }

    #[test]
    fn grammar_mismatch_is_error() {
        let err = parser().parse_line(b"this is not an access log").unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == GRAMMAR_FIELD));
    }

    #[test]
    fn empty_line_is_error() {
        assert!(parser().parse_line(b"").is_err());
    }

    #[test]
    fn invalid_month_is_time_error() {
        let line = String::from_utf8_lossy(SAMPLE).replace("Mar", "Foo");
        let err = parser().parse_line(line.as_bytes()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == "time"));
    }

    #[test]
    fn missing_zone_suffix_is_time_error() {
        let line = String::from_utf8_lossy(SAMPLE).replace(" +0000", "");
        let err = parser().parse_line(line.as_bytes()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == "time"));
    }

    #[test]
    fn request_line_needs_three_tokens() {
        let line = line_with("GET /foo", "0.1", "0.2");
        let err = parser().parse_line(line.as_bytes()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == "request"));

        let line = line_with("GET /foo  HTTP/1.1", "0.1", "0.2");
        assert!(parser().parse_line(line.as_bytes()).is_err());
    }

    #[test]
    fn path_is_percent_decoded_without_query() {
        let line = line_with("POST /api/hello%20world?x=1&y=2 HTTP/1.1", "0.1", "0.2");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.path, "/api/hello world");
        assert_eq!(record.method, "POST");
        assert_eq!(record.scheme, "https");
        assert_eq!(record.status, "404");
    }

    #[test]
    fn absolute_target_keeps_only_path() {
        let line = line_with("GET http://example.com/a/b?c=d HTTP/1.1", "0.1", "0.2");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.path, "/a/b");
    }

    #[test]
    fn bad_escape_in_query_is_ignored() {
        let line = line_with("GET /foo?q=100%zz HTTP/1.1", "0.1", "0.2");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.path, "/foo");
    }

    #[test]
    fn dot_segments_and_relative_targets_are_kept() {
        let line = line_with("GET /a/../b HTTP/1.1", "0.1", "0.2");
        assert_eq!(parser().parse_line(line.as_bytes()).unwrap().path, "/a/../b");

        let line = line_with("GET foo#frag HTTP/1.1", "0.1", "0.2");
        assert_eq!(parser().parse_line(line.as_bytes()).unwrap().path, "foo");
    }

    #[test]
    fn encoded_control_character_is_path_error() {
        for request in ["GET /a%0Ab HTTP/1.1", "GET /a%0d%0aX:y HTTP/1.1", "GET /a%00 HTTP/1.1"] {
            let line = line_with(request, "0.1", "0.2");
            let err = parser().parse_line(line.as_bytes()).unwrap_err();
            assert!(
                matches!(err, LogPipelineError::Parse { ref field, .. } if field == "path"),
                "{request}: {err:?}"
            );
        }
    }

    #[test]
    fn target_path_strips_authority_and_query() {
        assert_eq!(target_path("http://example.com/a?b"), "/a");
        assert_eq!(target_path("https://example.com"), "");
        assert_eq!(target_path("/x://y"), "/x://y");
        assert_eq!(target_path("/p#f?q"), "/p");
    }

    #[test]
    fn bad_percent_escape_is_path_error() {
        let line = line_with("GET /bad%zz HTTP/1.1", "0.1", "0.2");
        let err = parser().parse_line(line.as_bytes()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == "path"));
    }

    #[test]
    fn dash_upstream_is_none() {
        let line = line_with("GET / HTTP/1.1", "-", "0.2");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.upstream_time, None);
        assert_eq!(record.request_time, 0.2);

        let record = strict_parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.upstream_time, None);
    }

    #[test]
    fn malformed_numbers_default_to_zero_when_lenient() {
        let line = line_with("GET / HTTP/1.1", "1.2.3", "0..5");
        let record = parser().parse_line(line.as_bytes()).unwrap();
        assert_eq!(record.upstream_time, Some(0.0));
        assert_eq!(record.request_time, 0.0);
    }

    #[test]
    fn malformed_numbers_are_errors_when_strict() {
        let line = line_with("GET / HTTP/1.1", "1.2.3", "0.5");
        let err = strict_parser().parse_line(line.as_bytes()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Parse { ref field, .. } if field == "upstream_time"));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let parser = AccessLogParser::new(ParserOptions {
            max_input_size: 16,
            ..ParserOptions::default()
        })
        .unwrap();
        assert!(parser.parse_line(SAMPLE).is_err());
    }

    #[test]
    fn record_parser_trait_maps_errors() {
        let parser = parser();
        let err = RecordParser::parse(&parser, b"garbage").unwrap_err();
        assert!(matches!(err, LogtailError::Parse(_)));
        assert!(RecordParser::parse(&parser, SAMPLE).is_ok());
    }

    #[test]
    fn invalid_escape_detection() {
        assert_eq!(invalid_escape("/ok%20path"), None);
        assert_eq!(invalid_escape("/bad%2"), Some("%2"));
        assert_eq!(invalid_escape("/bad%"), Some("%"));
        assert_eq!(invalid_escape("/bad%g1"), Some("%g1"));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
                let _ = parser().parse_line(&data);
            }

            #[test]
            fn generated_lines_keep_fields(
                path in "(/[a-z0-9_-]{1,8}){1,4}",
                query in "[a-z0-9=&]{0,20}",
                method in "(GET|POST|PUT|DELETE|HEAD)",
                status in 100u16..600,
                bytes in 0u64..10_000_000,
            ) {
                let line = format!(
                    r#"192.168.1.1 - - [04/Mar/2018:13:49:52 +0000] http "{method} {path}?{query} HTTP/1.1" {status} {bytes} "-" "agent" "-" 0.010 0.020"#
                );
                let record = parser().parse_line(line.as_bytes()).unwrap();
                prop_assert_eq!(record.path, path);
                prop_assert_eq!(record.method, method);
                prop_assert_eq!(record.status, status.to_string());
                prop_assert_eq!(record.bytes_sent, bytes);
            }
        }
    }
}
