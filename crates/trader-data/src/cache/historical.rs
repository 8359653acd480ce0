//! 캐시 기반 과거 캔들 제공자.
//!
//! CSV 캐시와 외부 데이터 소스를 통합하여 백테스트 구간의 캔들을 제공합니다.
//!
//! # 주요 기능
//!
//! - **워밍업 포함 구간**: `start - duration × warmup_bars`부터 `end`까지 보장
//! - **경계 기반 적중 판정**: 캐시의 최소/최대 시각이 구간을 감싸면 적중
//! - **병합 저장**: 새로 가져온 행이 우선하도록 병합 후 파일 전체를 덮어씀
//! - **갭 감지**: 적중 시 내부 누락 구간을 경고로만 기록
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (symbol, interval, start, end)
//!         │
//!         ▼
//! ┌────────────────────────┐
//! │ 1. 필요 구간 계산        │ ← start - duration × warmup
//! └───────────┬────────────┘
//!             │
//! ┌───────────▼────────────┐
//! │ 2. 캐시 파일 로드        │ ← 없거나 읽기 실패면 빈 테이블
//! └───────────┬────────────┘
//!             │
//!       ┌─────┴─────┐
//!       │ 경계 포함? │
//!       └─────┬─────┘
//!         YES │ NO
//!             │   │
//!             │   ▼
//!             │ ┌──────────────────────┐
//!             │ │ 3. 전체 구간 1회 조회  │
//!             │ │    정규화 → 병합 → 저장 │
//!             │ └──────────┬───────────┘
//!             │            │
//!             ▼            ▼
//!     ┌──────────────────────────┐
//!     │ 4. 필요 구간만 잘라 반환    │
//!     └──────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use trader_core::{
    HistoricalKlineRequest, HistoricalKlineSource, IntervalCalendar, KlineTable, SeriesFrames,
    SeriesKey, Timeframe,
};

use super::context::CacheContext;
use crate::error::{DataError, Result};
use crate::normalize::normalize_klines;
use crate::storage::{merge_klines, KlineCsvStore};

/// 캐시 기반 과거 캔들 제공자.
#[derive(Debug, Clone)]
pub struct CachedKlineProvider {
    store: KlineCsvStore,
    calendar: IntervalCalendar,
}

impl CachedKlineProvider {
    /// 컨텍스트로 제공자를 생성합니다.
    pub fn new(context: CacheContext) -> Self {
        Self {
            store: KlineCsvStore::new(context.cache_dir()),
            calendar: context.calendar().clone(),
        }
    }

    pub fn store(&self) -> &KlineCsvStore {
        &self.store
    }

    pub fn calendar(&self) -> &IntervalCalendar {
        &self.calendar
    }

    /// 워밍업을 포함한 `[start_ms, end_ms]` 구간의 캔들을 보장합니다.
    ///
    /// 캐시가 `[start_ms - duration × warmup, end_ms]`를 감싸면 데이터 소스를
    /// 호출하지 않습니다. 그렇지 않으면 전체 구간을 한 번 조회하여 캐시와
    /// 병합하고 저장합니다.
    ///
    /// # Errors
    ///
    /// - `DataError::DataSource`: 데이터 소스 실패 (변환 없이 전파, 재시도 없음)
    /// - `DataError::Configuration`: `start_ms > end_ms`
    ///
    /// 캐시 읽기/쓰기 실패는 경고만 남기고 결과에 영향을 주지 않습니다.
    #[instrument(skip(self, source), fields(interval = %interval))]
    pub fn ensure_cached_klines<S>(
        &self,
        source: &S,
        symbol: &str,
        interval: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<KlineTable>
    where
        S: HistoricalKlineSource + ?Sized,
    {
        if start_ms > end_ms {
            return Err(DataError::Configuration(format!(
                "잘못된 구간: start {} > end {}",
                start_ms, end_ms
            )));
        }

        let required_start = self.calendar.required_start_ms(interval, start_ms);
        let required_end = end_ms;

        let cached = self.load_cached(symbol, interval);

        if cached.covers(required_start, required_end) {
            let window = cached.window(required_start, required_end);
            debug!(
                required_start,
                required_end,
                rows = window.len(),
                "캐시 적중"
            );
            self.detect_and_warn_gaps(symbol, interval, &window);
            return Ok(window);
        }

        info!(
            cached_rows = cached.len(),
            cached_first = ?cached.first_open_time(),
            cached_last = ?cached.last_open_time(),
            required_start,
            required_end,
            "캐시 미스, 데이터 소스 조회"
        );

        let request = HistoricalKlineRequest::new(symbol, interval, required_start, required_end);
        let fresh = normalize_klines(source.fetch_historical(&request)?);
        let merged = merge_klines(&cached, &fresh);

        match self.store.write(symbol, interval, &merged) {
            Ok(()) => info!(
                fetched = fresh.len(),
                total = merged.len(),
                "캐시 갱신 완료"
            ),
            Err(e) => warn!(error = %e, "캐시 저장 실패, 조회 결과는 그대로 반환"),
        }

        Ok(merged.window(required_start, required_end))
    }

    /// 타임프레임 라벨로 [`Self::ensure_cached_klines`]를 호출합니다.
    ///
    /// # Errors
    ///
    /// 알 수 없는 라벨이면 `DataError::Configuration`.
    pub fn ensure_cached_klines_for_label<S>(
        &self,
        source: &S,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<KlineTable>
    where
        S: HistoricalKlineSource + ?Sized,
    {
        let interval = self.calendar.resolve(interval)?;
        self.ensure_cached_klines(source, symbol, interval, start_ms, end_ms)
    }

    /// 여러 시리즈를 같은 백테스트 구간으로 미리 적재합니다.
    ///
    /// 첫 번째 데이터 소스 실패에서 중단합니다.
    #[instrument(skip(self, source, series), fields(series = series.len()))]
    pub fn preload<S>(
        &self,
        source: &S,
        series: &[SeriesKey],
        start_ms: i64,
        end_ms: i64,
    ) -> Result<SeriesFrames>
    where
        S: HistoricalKlineSource + ?Sized,
    {
        let mut frames = SeriesFrames::with_capacity(series.len());
        for key in series {
            let table =
                self.ensure_cached_klines(source, &key.symbol, key.interval, start_ms, end_ms)?;
            debug!(series = %key, rows = table.len(), "시리즈 적재 완료");
            frames.insert(key.clone(), table);
        }

        info!(
            loaded = frames.len(),
            rows = frames.values().map(KlineTable::len).sum::<usize>(),
            "백테스트 데이터 적재 완료"
        );
        Ok(frames)
    }

    /// 캐시된 시리즈의 범위를 조회합니다. 데이터 소스는 호출하지 않습니다.
    ///
    /// 캐시 파일이 없거나 비어 있으면 `None`.
    pub fn coverage(&self, symbol: &str, interval: Timeframe) -> Result<Option<CacheCoverage>> {
        let table = match self.store.read(symbol, interval)? {
            Some(table) => table,
            None => return Ok(None),
        };

        let (first_open_ms, last_open_ms) =
            match (table.first_open_time(), table.last_open_time()) {
                (Some(first), Some(last)) => (first, last),
                _ => return Ok(None),
            };

        Ok(Some(CacheCoverage {
            key: SeriesKey::new(symbol, interval),
            first_open_ms,
            last_open_ms,
            rows: table.len(),
            gaps: table.find_gaps(interval).len(),
        }))
    }

    /// 특정 시리즈 캐시를 삭제합니다. 파일이 없었으면 `Ok(false)`.
    pub fn clear_cache(&self, symbol: &str, interval: Timeframe) -> Result<bool> {
        let removed = self.store.remove(symbol, interval)?;
        if removed {
            info!(symbol, interval = %interval, "캐시 삭제");
        }
        Ok(removed)
    }

    /// 캐시 로드. 없거나 읽을 수 없으면 빈 테이블.
    fn load_cached(&self, symbol: &str, interval: Timeframe) -> KlineTable {
        match self.store.read(symbol, interval) {
            Ok(Some(table)) => table,
            Ok(None) => {
                debug!("캐시 파일 없음");
                KlineTable::new()
            }
            Err(e) => {
                warn!(
                    path = %self.store.path_for(symbol, interval).display(),
                    error = %e,
                    "캐시 읽기 실패, 캐시 없음으로 처리"
                );
                KlineTable::new()
            }
        }
    }

    /// 데이터 갭 감지 및 경고.
    fn detect_and_warn_gaps(&self, symbol: &str, interval: Timeframe, table: &KlineTable) {
        let gaps = table.find_gaps(interval);
        if let Some(first) = gaps.first() {
            warn!(
                symbol,
                interval = %interval,
                gap_count = gaps.len(),
                first_gap_after = first.after_ms,
                first_gap_before = first.before_ms,
                "데이터 갭 감지 (거래 중단 구간일 수 있음)"
            );
        }
    }
}

/// 캐시된 시리즈 범위 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCoverage {
    pub key: SeriesKey,
    /// 가장 이른 캔들 시작 시각 (밀리초)
    pub first_open_ms: i64,
    /// 가장 늦은 캔들 시작 시각 (밀리초)
    pub last_open_ms: i64,
    /// 캔들 수
    pub rows: usize,
    /// 간격의 1.5배를 넘는 내부 갭 수
    pub gaps: usize,
}

impl CacheCoverage {
    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.first_open_ms)
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_open_ms)
    }
}
