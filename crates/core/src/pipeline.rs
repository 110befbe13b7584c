//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: 시작/정지/헬스 체크 생명주기
//! - [`RecordParser`]: 원시 라인을 [`AccessRecord`]로 변환
//! - [`MetricSink`]: [`MetricPoint`]를 외부 시계열 저장소로 전송
//!
//! `Pipeline`과 `MetricSink`는 RPITIT를 사용하므로 `dyn`으로 쓸 수 없습니다.
//! 동적 디스패치가 필요한 곳에서는 [`DynPipeline`], [`DynMetricSink`]를 사용합니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::LogtailError;
use crate::types::{AccessRecord, MetricPoint};

/// `dyn` trait 메서드가 반환하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 생명주기를 가진 파이프라인 trait
pub trait Pipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogtailError>> + Send;

    /// 파이프라인을 정지합니다. 큐에 남은 데이터를 모두 처리한 뒤 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogtailError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
pub trait DynPipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogtailError>>;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogtailError>>;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogtailError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogtailError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 로그 라인 파서 trait
///
/// 순수 함수여야 합니다. 여러 파서 워커가 하나의 인스턴스를 공유합니다.
pub trait RecordParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 원시 바이트를 레코드로 파싱
    fn parse(&self, raw: &[u8]) -> Result<AccessRecord, LogtailError>;
}

/// 메트릭 싱크 trait
///
/// 싱크 워커마다 독립된 인스턴스(연결)를 가집니다.
pub trait MetricSink: Send + Sync {
    /// 싱크 이름 (로그용)
    fn name(&self) -> &str;

    /// 포인트 배치를 전송합니다. 실패는 호출한 워커에게 치명적입니다.
    fn write(&self, points: &[MetricPoint]) -> impl Future<Output = Result<(), LogtailError>> + Send;
}

/// dyn-compatible 메트릭 싱크 trait
pub trait DynMetricSink: Send + Sync {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 포인트 배치를 전송합니다.
    fn write<'a>(&'a self, points: &'a [MetricPoint]) -> BoxFuture<'a, Result<(), LogtailError>>;
}

impl<T: MetricSink> DynMetricSink for T {
    fn name(&self) -> &str {
        MetricSink::name(self)
    }

    fn write<'a>(&'a self, points: &'a [MetricPoint]) -> BoxFuture<'a, Result<(), LogtailError>> {
        Box::pin(MetricSink::write(self, points))
    }
}
