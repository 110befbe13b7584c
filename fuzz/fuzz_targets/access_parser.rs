#![no_main]

use libfuzzer_sys::fuzz_target;
use logtail_core::pipeline::RecordParser;
use logtail_pipeline::parser::{AccessLogParser, ParserOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = AccessLogParser::new(ParserOptions::default()) else {
        return;
    };

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let _ = parser.parse(data);
});
