//! 파일 기반 로그 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 동작
//! - 시작 시 파일 끝으로 이동 (기존 내용은 재전송하지 않음)
//! - EOF에서 `poll_interval`만큼 대기 후 재시도
//! - 줄바꿈이 아직 쓰이지 않은 라인은 보관했다가 완성되면 전송
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등, Unix 전용)
//! - 파일 크기 축소 감지 (truncation)
//! - 새 파일을 처음부터 다시 열기

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logtail_core::metrics as m;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RawLine, strip_line_ending};
use crate::error::LogPipelineError;
use crate::monitor::StatReporter;

/// 파일 수집기 옵션
#[derive(Debug, Clone)]
pub struct TailerOptions {
    /// EOF에서 재시도 전 대기 시간
    pub poll_interval: Duration,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for TailerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 파일 기반 로그 수집기
///
/// [`FileTailer::open`]이 반환된 시점 이후에 추가된 라인만 수집합니다.
pub struct FileTailer {
    path: PathBuf,
    options: TailerOptions,
    reader: BufReader<File>,
    /// 현재 파일에서 읽은 바이트 위치
    offset: u64,
    /// 현재 열린 파일의 inode
    inode: Option<u64>,
    stats: StatReporter,
}

impl FileTailer {
    /// 파일을 열고 끝으로 이동합니다.
    ///
    /// 파일을 열 수 없으면 에러를 반환합니다.
    pub async fn open(
        path: impl AsRef<Path>,
        options: TailerOptions,
        stats: StatReporter,
    ) -> Result<Self, LogPipelineError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)
            .await
            .map_err(|e| collector_err(&path, format!("failed to open: {e}")))?;
        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| collector_err(&path, format!("failed to seek to end: {e}")))?;
        let inode = file_inode(&file).await;

        info!(path = %path.display(), offset, "tailer attached to end of file");

        Ok(Self {
            path,
            options,
            reader: BufReader::new(file),
            offset,
            inode,
            stats,
        })
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 취소되거나 치명적 I/O 에러가 발생할 때까지 라인을 수집합니다.
    ///
    /// 취소는 다음 라인을 읽기 전과 EOF 대기 중에만 확인합니다. 이미 읽은
    /// 라인의 전송은 끝까지 완료합니다. 취소되면 `Ok(())`를 반환하고,
    /// 송신측이 drop되어 큐가 닫힙니다.
    pub async fn run(
        mut self,
        out: flume::Sender<RawLine>,
        cancel: CancellationToken,
    ) -> Result<(), LogPipelineError> {
        let mut buf = Vec::with_capacity(1024);
        let mut oversized = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let n = self
                .reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| collector_err(&self.path, format!("read failed: {e}")))?;

            if n == 0 {
                if self.check_rotation().await? {
                    buf.clear();
                    oversized = false;
                    continue;
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.options.poll_interval) => continue,
                }
            }
            self.offset += n as u64;

            if buf.last() != Some(&b'\n') {
                // 아직 줄바꿈이 쓰이지 않음. 다음 읽기에서 이어 붙입니다.
                if buf.len() > self.options.max_line_length {
                    oversized = true;
                    buf.clear();
                }
                continue;
            }

            let line = strip_line_ending(std::mem::take(&mut buf));
            self.stats.line_handled().await;
            metrics::counter!(m::TAILER_LINES_READ_TOTAL).increment(1);

            if oversized || line.len() > self.options.max_line_length {
                oversized = false;
                self.stats.parse_error().await;
                metrics::counter!(m::TAILER_LINES_DROPPED_TOTAL).increment(1);
                warn!(
                    path = %self.path.display(),
                    max = self.options.max_line_length,
                    "line exceeds maximum length, dropped"
                );
                continue;
            }

            // 집계된 라인은 취소 중에도 반드시 큐에 넣습니다. 파서는 종료 시 큐를 비웁니다.
            if out.send_async(RawLine::new(line)).await.is_err() {
                return Err(LogPipelineError::Channel(
                    "raw line queue closed: no parser workers left".to_owned(),
                ));
            }
        }

        info!(path = %self.path.display(), offset = self.offset, "tailer stopped");
        Ok(())
    }

    /// 파일이 잘렸거나 교체되었으면 처음부터 다시 엽니다.
    ///
    /// 다시 열었으면 `true`를 반환합니다.
    async fn check_rotation(&mut self) -> Result<bool, LogPipelineError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) => {
                // 로테이션 도중 잠시 파일이 없을 수 있음
                debug!(path = %self.path.display(), error = %e, "metadata unavailable");
                return Ok(false);
            }
        };

        let truncated = metadata.len() < self.offset;
        let replaced = match (self.inode, metadata_inode(&metadata)) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        };
        if !truncated && !replaced {
            return Ok(false);
        }

        warn!(
            path = %self.path.display(),
            previous_offset = self.offset,
            current_size = metadata.len(),
            truncated,
            replaced,
            "file truncated or rotated, reopening from start"
        );

        let file = File::open(&self.path)
            .await
            .map_err(|e| collector_err(&self.path, format!("failed to reopen: {e}")))?;
        self.inode = file_inode(&file).await;
        self.reader = BufReader::new(file);
        self.offset = 0;
        metrics::counter!(m::TAILER_REOPENS_TOTAL).increment(1);
        Ok(true)
    }
}

fn collector_err(path: &Path, reason: String) -> LogPipelineError {
    LogPipelineError::Collector {
        path: path.display().to_string(),
        reason,
    }
}

async fn file_inode(file: &File) -> Option<u64> {
    file.metadata()
        .await
        .ok()
        .and_then(|meta| metadata_inode(&meta))
}

#[cfg(unix)]
fn metadata_inode(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn metadata_inode(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
