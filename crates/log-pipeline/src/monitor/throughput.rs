//! 처리량 윈도우 -- 최근 두 샘플로 초당 처리 라인 수를 계산합니다.

use std::collections::VecDeque;
use std::time::Duration;

/// 보관하는 샘플 수
const WINDOW_LEN: usize = 2;

/// 고정 주기로 찍은 누적 처리 라인 수의 롤링 윈도우
///
/// 샘플러 태스크 하나만 소유하고 갱신합니다.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    samples: VecDeque<u64>,
    interval: Duration,
}

impl ThroughputWindow {
    /// 샘플링 주기를 지정해 빈 윈도우를 생성합니다.
    pub fn new(interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_LEN),
            interval,
        }
    }

    /// 누적 처리 라인 수를 기록합니다. 가장 오래된 샘플은 밀려납니다.
    pub fn record(&mut self, total: u64) {
        if self.samples.len() == WINDOW_LEN {
            self.samples.pop_front();
        }
        self.samples.push_back(total);
    }

    /// 초당 처리 라인 수. 샘플이 두 개 미만이면 0입니다.
    pub fn tps(&self) -> f64 {
        let secs = self.interval.as_secs_f64();
        if self.samples.len() < WINDOW_LEN || secs <= 0.0 {
            return 0.0;
        }
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        newest.saturating_sub(*oldest) as f64 / secs
    }

    /// 보관 중인 샘플 수
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// 샘플이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tps_is_zero_until_two_samples() {
        let mut window = ThroughputWindow::new(Duration::from_secs(5));
        assert_eq!(window.tps(), 0.0);
        window.record(100);
        assert_eq!(window.tps(), 0.0);
    }

    #[test]
    fn tps_over_one_interval() {
        let mut window = ThroughputWindow::new(Duration::from_secs(5));
        window.record(100);
        window.record(150);
        assert_eq!(window.tps(), 10.0);
    }

    #[test]
    fn window_keeps_only_latest_two() {
        let mut window = ThroughputWindow::new(Duration::from_secs(5));
        window.record(0);
        window.record(100);
        window.record(110);
        assert_eq!(window.len(), 2);
        assert_eq!(window.tps(), 2.0);
    }

    #[test]
    fn idle_pipeline_reports_zero() {
        let mut window = ThroughputWindow::new(Duration::from_secs(5));
        window.record(42);
        window.record(42);
        assert_eq!(window.tps(), 0.0);
    }
}
