#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logtail_core::types::DEFAULT_MEASUREMENT;
use logtail_pipeline::parser::{AccessLogParser, ParserOptions};
use logtail_pipeline::sink::influx::{Precision, encode_point};

/// 퍼저용 구조적 입력 -- 문법에 맞는 라인을 만들어 필드 파싱 경로를 집중 검사
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    method: String,
    target: String,
    scheme_lower: u8,
    status: u16,
    bytes: u64,
    upstream: String,
    request_time: String,
    zone: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(parser) = AccessLogParser::new(ParserOptions::default()) else {
        return;
    };

    let scheme = if input.scheme_lower % 2 == 0 { "http" } else { "https" };
    let line = format!(
        r#"10.0.0.1 - - [04/Mar/2018:13:49:52 {}] {} "{} {} HTTP/1.1" {:03} {} "-" "fuzz" "-" {} {}"#,
        input.zone,
        scheme,
        input.method,
        input.target,
        input.status % 1000,
        input.bytes,
        input.upstream,
        input.request_time,
    );

    // 파싱에 성공한 레코드는 line protocol로 인코딩할 수 있어야 함
    if let Ok(record) = parser.parse_line(line.as_bytes()) {
        let point = record.to_point(DEFAULT_MEASUREMENT);
        for precision in [Precision::Seconds, Precision::Nanoseconds] {
            let _ = encode_point(&point, precision);
        }
    }
});
