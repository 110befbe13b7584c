//! 로그 수집 모듈 -- 증가하는 로그 파일의 끝에서 원시 라인을 수집합니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: 파일 감시 (`tail -f` 방식, EOF에서 폴링)
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 수집된 원시 라인을
//! 용량이 제한된 `flume::Sender<RawLine>` 큐를 통해 파서 워커로 전달합니다.
//! 큐가 가득 차면 수집기가 대기합니다 (backpressure).

pub mod file;

pub use file::{FileTailer, TailerOptions};

use std::ops::Deref;

use bytes::Bytes;

/// 파싱 전 원시 로그 라인
///
/// 줄바꿈 문자(`\n`, `\r\n`)는 제거된 상태입니다.
/// 수집기가 생성하고, 파서 워커 하나가 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(Bytes);

impl RawLine {
    /// 바이트 버퍼로 RawLine을 생성합니다.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// 정적 바이트로 RawLine을 생성합니다.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }

    /// 원시 바이트
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 내부 버퍼를 꺼냅니다.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for RawLine {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// 라인 끝의 `\n`과 그 앞의 `\r`을 제거합니다.
pub(crate) fn strip_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_line_creation() {
        let raw = RawLine::new(b"test log".to_vec());
        assert_eq!(raw.as_bytes(), b"test log");
        assert_eq!(raw.len(), 8);
    }

    #[test]
    fn strip_line_ending_handles_lf_and_crlf() {
        assert_eq!(strip_line_ending(b"abc\n".to_vec()), b"abc");
        assert_eq!(strip_line_ending(b"abc\r\n".to_vec()), b"abc");
        assert_eq!(strip_line_ending(b"abc".to_vec()), b"abc");
        assert_eq!(strip_line_ending(b"\n".to_vec()), b"");
    }

    #[test]
    fn strip_line_ending_keeps_inner_cr() {
        assert_eq!(strip_line_ending(b"a\rb\n".to_vec()), b"a\rb");
    }
}
