//! 시점 기반 재생 클라이언트.
//!
//! 미리 적재된 시리즈를 메모리에 보관하고, 명시적으로 설정한 현재 시각까지의
//! 캔들만 거래소 어댑터와 같은 형태로 제공합니다. 현재 시각 이후의 행은
//! 어떤 조회에서도 반환되지 않습니다.
//!
//! # 예제
//!
//! ```ignore
//! use trader_exchange::ReplayClient;
//!
//! let frames = provider.preload(&source, &series, start_ms, end_ms)?;
//! let mut client = ReplayClient::new(frames);
//!
//! for ts in client.bar_times("BTCUSDT", Timeframe::M15, start_ms, end_ms) {
//!     client.set_current_timestamp(ts);
//!     let recent = client.get_klines(&KlineRequest::new("BTCUSDT", Timeframe::M15).with_limit(200))?;
//!     // 전략 평가
//! }
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use trader_core::{
    DataSourceError, FundingRate, FundingRateRequest, KlineRequest, KlineTable, MarketDataSource,
    OpenInterest, OpenInterestRequest, SeriesFrames, SeriesKey, Timeframe,
};

/// 재생 클라이언트 이름.
pub const REPLAY_SOURCE_NAME: &str = "replay";

/// 시점 기반 재생 클라이언트.
///
/// 적재된 시리즈는 생성 후 변경되지 않으며, 커서만 이동합니다.
/// 커서가 설정되지 않은 상태에서는 모든 캔들 조회가 빈 결과입니다.
#[derive(Debug, Clone, Default)]
pub struct ReplayClient {
    /// (심볼, 간격)별 정렬된 캔들
    series: SeriesFrames,
    /// 현재 시뮬레이션 시각 (밀리초)
    cursor: Option<i64>,
}

impl ReplayClient {
    /// 적재된 시리즈로 재생 클라이언트를 생성합니다.
    pub fn new(series: SeriesFrames) -> Self {
        info!(
            series = series.len(),
            rows = series.values().map(KlineTable::len).sum::<usize>(),
            "재생 데이터 로드"
        );
        Self {
            series,
            cursor: None,
        }
    }

    /// 현재 시각을 설정합니다. 과거로 되돌리는 것도 허용됩니다.
    pub fn set_current_timestamp(&mut self, timestamp_ms: i64) {
        self.cursor = Some(timestamp_ms);
    }

    /// 현재 시각을 `DateTime`으로 설정합니다.
    pub fn set_current_datetime(&mut self, time: DateTime<Utc>) {
        self.set_current_timestamp(time.timestamp_millis());
    }

    /// 커서를 해제하여 미설정 상태로 되돌립니다.
    pub fn clear_timestamp(&mut self) {
        self.cursor = None;
    }

    /// 현재 시각 (밀리초). 미설정이면 `None`.
    pub fn current_timestamp(&self) -> Option<i64> {
        self.cursor
    }

    /// 현재 시각. 미설정이면 `None`.
    pub fn current_datetime(&self) -> Option<DateTime<Utc>> {
        self.cursor.and_then(DateTime::from_timestamp_millis)
    }

    /// 현재 시각까지의 마지막 `limit`개 캔들.
    ///
    /// 알 수 없는 시리즈이거나 커서가 미설정이면 빈 테이블입니다.
    /// 결과는 오름차순이며 `limit`보다 적을 수 있고 채워 넣지 않습니다.
    pub fn klines(&self, symbol: &str, interval: Timeframe, limit: usize) -> KlineTable {
        let Some(cursor) = self.cursor else {
            return KlineTable::new();
        };
        let Some(table) = self.table(symbol, interval) else {
            return KlineTable::new();
        };

        let rows = table.rows();
        let end = rows.partition_point(|r| r.open_time_ms <= cursor);
        let start = end.saturating_sub(limit);
        KlineTable::from_sorted_rows(rows[start..end].to_vec())
    }

    /// 시리즈에 적재된 캔들 수.
    pub fn data_count(&self, symbol: &str, interval: Timeframe) -> usize {
        self.table(symbol, interval).map_or(0, KlineTable::len)
    }

    /// 적재된 시리즈 키 목록 (정렬됨).
    pub fn loaded_series(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 전체 시리즈의 (가장 이른, 가장 늦은) 캔들 시작 시각.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let first = self.series.values().filter_map(KlineTable::first_open_time).min()?;
        let last = self.series.values().filter_map(KlineTable::last_open_time).max()?;
        Some((first, last))
    }

    /// `[start_ms, end_ms]` 구간에 있는 시리즈의 캔들 시작 시각.
    ///
    /// 백테스트 드라이버가 커서를 한 봉씩 진행할 때 사용합니다.
    pub fn bar_times(&self, symbol: &str, interval: Timeframe, start_ms: i64, end_ms: i64) -> Vec<i64> {
        let Some(table) = self.table(symbol, interval) else {
            debug!(symbol, interval = %interval, "알 수 없는 시리즈");
            return Vec::new();
        };

        let mut times: Vec<i64> = table
            .window(start_ms, end_ms)
            .rows()
            .iter()
            .map(|r| r.open_time_ms)
            .collect();
        times.dedup();
        times
    }

    fn table(&self, symbol: &str, interval: Timeframe) -> Option<&KlineTable> {
        self.series.get(&SeriesKey::new(symbol, interval))
    }
}

impl MarketDataSource for ReplayClient {
    fn get_klines(&self, request: &KlineRequest) -> Result<KlineTable, DataSourceError> {
        Ok(self.klines(&request.symbol, request.interval, request.limit))
    }

    /// 재생 모드에서는 펀딩비를 제공하지 않습니다.
    fn get_funding_rate(
        &self,
        _request: &FundingRateRequest,
    ) -> Result<Vec<FundingRate>, DataSourceError> {
        Ok(Vec::new())
    }

    /// 재생 모드에서는 미결제약정을 제공하지 않습니다.
    fn get_open_interest(
        &self,
        _request: &OpenInterestRequest,
    ) -> Result<Vec<OpenInterest>, DataSourceError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        REPLAY_SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::KlineRow;

    fn row(ts: i64) -> KlineRow {
        KlineRow {
            open_time_ms: ts,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: ts as f64,
            volume: 1.0,
            close_time_ms: ts + 99,
            quote_volume: 1.0,
            trade_count: 1,
            taker_base_volume: 1.0,
            taker_quote_volume: 1.0,
        }
    }

    fn create_client(times: &[i64]) -> ReplayClient {
        let mut frames = SeriesFrames::new();
        frames.insert(
            SeriesKey::new("BTCUSDT", Timeframe::M15),
            KlineTable::from_rows(times.iter().copied().map(row).collect()),
        );
        ReplayClient::new(frames)
    }

    fn times(table: &KlineTable) -> Vec<i64> {
        table.rows().iter().map(|r| r.open_time_ms).collect()
    }

    #[test]
    fn test_trailing_rows_up_to_cursor() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(250);

        let table = client.klines("BTCUSDT", Timeframe::M15, 2);
        assert_eq!(times(&table), vec![100, 200]);
    }

    #[test]
    fn test_cursor_on_bar_is_inclusive() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(300);

        assert_eq!(times(&client.klines("BTCUSDT", Timeframe::M15, 2)), vec![200, 300]);
    }

    #[test]
    fn test_unset_cursor_is_empty() {
        let client = create_client(&[100, 200, 300]);

        assert!(client.klines("BTCUSDT", Timeframe::M15, 10).is_empty());
        assert!(client.current_datetime().is_none());
    }

    #[test]
    fn test_unknown_series_is_empty() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(1_000);

        assert!(client.klines("ETHUSDT", Timeframe::M15, 10).is_empty());
        assert!(client.klines("BTCUSDT", Timeframe::H1, 10).is_empty());
        assert_eq!(client.data_count("ETHUSDT", Timeframe::M15), 0);
    }

    #[test]
    fn test_duplicate_bars_keep_stored_order() {
        let mut revised = row(200);
        revised.open = 2.0;
        let mut frames = SeriesFrames::new();
        frames.insert(
            SeriesKey::new("BTCUSDT", Timeframe::M15),
            KlineTable::from_rows(vec![row(100), row(200), revised, row(300)]),
        );
        let mut client = ReplayClient::new(frames);
        client.set_current_timestamp(250);

        let table = client.klines("BTCUSDT", Timeframe::M15, 2);
        assert_eq!(times(&table), vec![200, 200]);
        assert_eq!(table.rows()[0].open, 1.0);
        assert_eq!(table.rows()[1].open, 2.0);
    }

    #[test]
    fn test_not_padded() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(150);

        assert_eq!(times(&client.klines("BTCUSDT", Timeframe::M15, 5)), vec![100]);
        assert!(client.klines("BTCUSDT", Timeframe::M15, 0).is_empty());

        client.set_current_timestamp(50);
        assert!(client.klines("BTCUSDT", Timeframe::M15, 5).is_empty());
    }

    #[test]
    fn test_backward_move_refilters() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(300);
        assert_eq!(client.klines("BTCUSDT", Timeframe::M15, 10).len(), 3);

        client.set_current_timestamp(200);
        assert_eq!(times(&client.klines("BTCUSDT", Timeframe::M15, 10)), vec![100, 200]);

        client.clear_timestamp();
        assert!(client.klines("BTCUSDT", Timeframe::M15, 10).is_empty());
    }

    #[test]
    fn test_current_datetime() {
        let mut client = create_client(&[]);
        client.set_current_timestamp(1_640_995_200_000);

        let now = client.current_datetime().unwrap();
        assert_eq!(now.to_rfc3339(), "2022-01-01T00:00:00+00:00");

        client.set_current_datetime(now + chrono::TimeDelta::minutes(15));
        assert_eq!(client.current_timestamp(), Some(1_640_996_100_000));
    }

    #[test]
    fn test_market_data_source_surface() {
        let mut client = create_client(&[100, 200, 300]);
        client.set_current_timestamp(300);

        let request = KlineRequest::new("BTCUSDT", Timeframe::M15).with_limit(1);
        assert_eq!(times(&client.get_klines(&request).unwrap()), vec![300]);

        let funding = client
            .get_funding_rate(&FundingRateRequest::new("BTCUSDT"))
            .unwrap();
        assert!(funding.is_empty());

        let oi = client
            .get_open_interest(&OpenInterestRequest::new("BTCUSDT", Timeframe::M5))
            .unwrap();
        assert!(oi.is_empty());

        assert_eq!(client.name(), REPLAY_SOURCE_NAME);
    }

    #[test]
    fn test_inspection_helpers() {
        let mut frames = SeriesFrames::new();
        frames.insert(
            SeriesKey::new("ETHUSDT", Timeframe::H1),
            KlineTable::from_rows(vec![row(50), row(400)]),
        );
        frames.insert(
            SeriesKey::new("BTCUSDT", Timeframe::M15),
            KlineTable::from_rows(vec![row(100), row(200), row(300)]),
        );
        let client = ReplayClient::new(frames);

        assert_eq!(client.data_count("BTCUSDT", Timeframe::M15), 3);
        assert_eq!(client.time_range(), Some((50, 400)));
        assert_eq!(
            client.loaded_series(),
            vec![
                SeriesKey::new("BTCUSDT", Timeframe::M15),
                SeriesKey::new("ETHUSDT", Timeframe::H1),
            ]
        );
        assert_eq!(client.bar_times("BTCUSDT", Timeframe::M15, 150, 300), vec![200, 300]);
        assert!(client.bar_times("XRPUSDT", Timeframe::M15, 0, 300).is_empty());
        assert!(ReplayClient::default().time_range().is_none());
    }
}
