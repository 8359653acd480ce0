//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 캔들 관련 타입을 정의합니다:
//! - `RawKline` - 데이터 소스가 반환하는 12필드 원시 캔들
//! - `KlineRow` - 정규화된 캔들 한 행
//! - `KlineTable` - 시간순 정렬이 보장된 캔들 테이블
//! - `FundingRate`, `OpenInterest` - 선물 보조 지표 레코드

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Timeframe;

// =============================================================================
// 원시 캔들
// =============================================================================

/// 원시 캔들 필드 값.
///
/// 거래소마다 가격을 문자열(`"46000.00"`) 또는 숫자로 보내므로 둘 다 허용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// 정수로 변환합니다. 소수는 버림, 유한하지 않은 값과 파싱 불가 문자열은 `None`.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) => Some(*v),
            RawValue::Float(v) => finite_to_i64(*v),
            RawValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(finite_to_i64))
            }
        }
    }

    /// 실수로 변환합니다. 파싱 불가 문자열은 `None`.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

fn finite_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

/// 데이터 소스가 반환하는 원시 캔들.
///
/// 바이낸스 klines 응답의 12개 위치를 그대로 따릅니다:
/// `[open_time, open, high, low, close, volume, close_time, quote_volume,
///   trades, taker_base, taker_quote, ignore]`.
/// JSON 배열에서 직접 역직렬화되며, 뒤쪽 필드가 빠진 짧은 행(OHLCV 6필드)은
/// 누락 필드를 `None`으로 채웁니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawKline {
    #[serde(default)]
    pub open_time: Option<RawValue>,
    #[serde(default)]
    pub open: Option<RawValue>,
    #[serde(default)]
    pub high: Option<RawValue>,
    #[serde(default)]
    pub low: Option<RawValue>,
    #[serde(default)]
    pub close: Option<RawValue>,
    #[serde(default)]
    pub volume: Option<RawValue>,
    #[serde(default)]
    pub close_time: Option<RawValue>,
    #[serde(default)]
    pub quote_volume: Option<RawValue>,
    #[serde(default)]
    pub trades: Option<RawValue>,
    #[serde(default)]
    pub taker_base: Option<RawValue>,
    #[serde(default)]
    pub taker_quote: Option<RawValue>,
    #[serde(default)]
    pub ignore: Option<RawValue>,
}

impl RawKline {
    /// OHLCV 6필드만 제공하는 거래소 응답에서 원시 캔들을 만듭니다.
    ///
    /// 제공되지 않는 필드는 비워 두어 정규화 단계의 기본값 규칙을 따르게 합니다.
    pub fn from_ohlcv(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time: Some(open_time.into()),
            open: Some(open.into()),
            high: Some(high.into()),
            low: Some(low.into()),
            close: Some(close.into()),
            volume: Some(volume.into()),
            ..Default::default()
        }
    }
}

impl From<&KlineRow> for RawKline {
    fn from(row: &KlineRow) -> Self {
        Self {
            open_time: Some(row.open_time_ms.into()),
            open: Some(row.open.into()),
            high: Some(row.high.into()),
            low: Some(row.low.into()),
            close: Some(row.close.into()),
            volume: Some(row.volume.into()),
            close_time: Some(row.close_time_ms.into()),
            quote_volume: Some(row.quote_volume.into()),
            trades: Some(row.trade_count.into()),
            taker_base: Some(row.taker_base_volume.into()),
            taker_quote: Some(row.taker_quote_volume.into()),
            ignore: None,
        }
    }
}

// =============================================================================
// 정규화된 캔들
// =============================================================================

/// 정규화된 캔들 한 행.
///
/// 직렬화 필드명은 캐시 파일의 컬럼명과 같습니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KlineRow {
    /// 캔들 시작 시각 (밀리초)
    #[serde(rename = "timestamp")]
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// 거래량 (기준 자산)
    pub volume: f64,
    /// 캔들 종료 시각 (밀리초)
    #[serde(rename = "close_time")]
    pub close_time_ms: i64,
    /// 거래대금 (호가 자산)
    pub quote_volume: f64,
    /// 체결 건수
    #[serde(rename = "trades")]
    pub trade_count: i64,
    /// 테이커 매수 거래량 (기준 자산)
    #[serde(rename = "taker_base")]
    pub taker_base_volume: f64,
    /// 테이커 매수 거래대금 (호가 자산)
    #[serde(rename = "taker_quote")]
    pub taker_quote_volume: f64,
}

impl KlineRow {
    /// 캔들 시작 시각.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time_ms)
    }

    /// 캔들 종료 시각.
    pub fn close_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.close_time_ms)
    }
}

/// 캔들 테이블 내부의 누락 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlineGap {
    /// 갭 직전 캔들 시작 시각
    pub after_ms: i64,
    /// 갭 직후 캔들 시작 시각
    pub before_ms: i64,
}

/// 시간순 정렬된 캔들 테이블.
///
/// `open_time_ms`는 항상 비내림차순입니다. 중복 타임스탬프 제거는
/// 병합 단계의 책임이므로 이 타입은 중복을 허용합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KlineTable {
    rows: Vec<KlineRow>,
}

impl KlineTable {
    /// 빈 테이블.
    pub fn new() -> Self {
        Self::default()
    }

    /// 행들을 시작 시각 기준으로 안정 정렬하여 테이블을 만듭니다.
    pub fn from_rows(mut rows: Vec<KlineRow>) -> Self {
        rows.sort_by_key(|r| r.open_time_ms);
        Self { rows }
    }

    /// 이미 시작 시각 오름차순인 행들로 테이블을 만듭니다. 다시 정렬하지 않습니다.
    pub fn from_sorted_rows(rows: Vec<KlineRow>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].open_time_ms <= w[1].open_time_ms));
        Self { rows }
    }

    pub fn rows(&self) -> &[KlineRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<KlineRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 가장 이른 시작 시각.
    pub fn first_open_time(&self) -> Option<i64> {
        self.rows.first().map(|r| r.open_time_ms)
    }

    /// 가장 늦은 시작 시각.
    pub fn last_open_time(&self) -> Option<i64> {
        self.rows.last().map(|r| r.open_time_ms)
    }

    /// 테이블 경계가 `[start_ms, end_ms]`를 감싸는지 확인합니다.
    ///
    /// 경계만 비교하므로 내부 갭은 감지하지 못합니다. 갭은 [`Self::find_gaps`]로 확인합니다.
    pub fn covers(&self, start_ms: i64, end_ms: i64) -> bool {
        match (self.first_open_time(), self.last_open_time()) {
            (Some(first), Some(last)) => first <= start_ms && last >= end_ms,
            _ => false,
        }
    }

    /// `[start_ms, end_ms]` 구간의 행만 남긴 테이블.
    pub fn window(&self, start_ms: i64, end_ms: i64) -> KlineTable {
        let lo = self.rows.partition_point(|r| r.open_time_ms < start_ms);
        let hi = self.rows.partition_point(|r| r.open_time_ms <= end_ms);
        let rows = if lo < hi {
            self.rows[lo..hi].to_vec()
        } else {
            Vec::new()
        };
        Self { rows }
    }

    /// 모든 타임스탬프가 유일한지 확인합니다.
    pub fn has_unique_timestamps(&self) -> bool {
        self.rows
            .windows(2)
            .all(|w| w[0].open_time_ms != w[1].open_time_ms)
    }

    /// 예상 간격의 1.5배를 초과하는 내부 갭을 찾습니다.
    pub fn find_gaps(&self, interval: Timeframe) -> Vec<KlineGap> {
        let expected = interval.duration_ms();
        let threshold = expected + expected / 2;

        self.rows
            .windows(2)
            .filter(|w| w[1].open_time_ms - w[0].open_time_ms > threshold)
            .map(|w| KlineGap {
                after_ms: w[0].open_time_ms,
                before_ms: w[1].open_time_ms,
            })
            .collect()
    }
}

impl From<Vec<KlineRow>> for KlineTable {
    fn from(rows: Vec<KlineRow>) -> Self {
        Self::from_rows(rows)
    }
}

// =============================================================================
// 시리즈 키
// =============================================================================

/// 캐시/재생 테이블 하나를 식별하는 (심볼, 간격) 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, interval: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.interval)
    }
}

/// 시리즈별로 미리 적재된 캔들 테이블.
pub type SeriesFrames = HashMap<SeriesKey, KlineTable>;

// =============================================================================
// 선물 보조 지표
// =============================================================================

/// 펀딩비 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRate {
    pub symbol: String,
    /// 펀딩비 (거래소 응답 그대로의 십진 문자열)
    pub funding_rate: String,
    /// 펀딩 시각 (밀리초)
    pub funding_time: i64,
}

/// 미결제약정 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInterest {
    pub symbol: String,
    pub sum_open_interest: String,
    pub sum_open_interest_value: String,
    /// 집계 시각 (밀리초)
    pub timestamp: i64,
}
