//! 타임프레임별 캔들 길이와 워밍업 봉 수.
//!
//! 백테스트 구간 시작 이전에 지표 계산에 필요한 최소 봉 수(워밍업)를
//! 타임프레임마다 관리합니다. 캐시 경계는
//! `start - duration(interval) × warmup_bars(interval)`로 계산됩니다.

use std::collections::HashMap;

use super::timeframe::Timeframe;
use crate::error::TraderError;

/// 기본 워밍업 봉 수.
///
/// - 15분봉 이하: 200
/// - 30분봉 ~ 2시간봉: 100
/// - 4시간봉 ~ 12시간봉: 50
/// - 일봉 이상: 30
pub const fn default_warmup_bars(timeframe: Timeframe) -> u32 {
    match timeframe {
        Timeframe::M1 | Timeframe::M3 | Timeframe::M5 | Timeframe::M15 => 200,
        Timeframe::M30 | Timeframe::H1 | Timeframe::H2 => 100,
        Timeframe::H4 | Timeframe::H6 | Timeframe::H8 | Timeframe::H12 => 50,
        Timeframe::D1 | Timeframe::D3 | Timeframe::W1 => 30,
    }
}

/// 간격 달력.
///
/// 고정된 타임프레임 집합에 대해 정확한 캔들 길이와 워밍업 봉 수를 제공합니다.
/// 워밍업은 설정으로 덮어쓸 수 있으며, 알 수 없는 라벨은 설정 에러입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalCalendar {
    overrides: HashMap<Timeframe, u32>,
}

impl IntervalCalendar {
    /// 기본 워밍업 값을 사용하는 달력을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 라벨별 워밍업 덮어쓰기를 적용한 달력을 생성합니다.
    ///
    /// # Errors
    ///
    /// 라벨 중 하나라도 지원하지 않는 타임프레임이면 `TraderError::Config`.
    pub fn with_overrides(overrides: &HashMap<String, u32>) -> Result<Self, TraderError> {
        let mut calendar = Self::new();
        for (label, bars) in overrides {
            let timeframe = calendar.resolve(label)?;
            calendar.overrides.insert(timeframe, *bars);
        }
        Ok(calendar)
    }

    /// 특정 타임프레임의 워밍업 봉 수를 설정합니다.
    pub fn with_warmup(mut self, timeframe: Timeframe, bars: u32) -> Self {
        self.overrides.insert(timeframe, bars);
        self
    }

    /// 라벨을 타임프레임으로 해석합니다.
    pub fn resolve(&self, label: &str) -> Result<Timeframe, TraderError> {
        label.parse()
    }

    /// 캔들 길이 (밀리초).
    pub fn duration_ms(&self, timeframe: Timeframe) -> i64 {
        timeframe.duration_ms()
    }

    /// 워밍업 봉 수.
    pub fn warmup_bars(&self, timeframe: Timeframe) -> u32 {
        self.overrides
            .get(&timeframe)
            .copied()
            .unwrap_or_else(|| default_warmup_bars(timeframe))
    }

    /// 워밍업 구간 길이 (밀리초).
    pub fn warmup_span_ms(&self, timeframe: Timeframe) -> i64 {
        timeframe.duration_ms() * i64::from(self.warmup_bars(timeframe))
    }

    /// 워밍업을 포함한 필요 시작 시각 (밀리초).
    pub fn required_start_ms(&self, timeframe: Timeframe, start_ms: i64) -> i64 {
        start_ms.saturating_sub(self.warmup_span_ms(timeframe))
    }
}
