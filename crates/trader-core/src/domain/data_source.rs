//! 시장 데이터 소스 추상화.
//!
//! 캐시 계층이 원시 캔들을 가져오는 [`HistoricalKlineSource`]와
//! 실거래 어댑터와 재생 클라이언트가 함께 구현하는 [`MarketDataSource`]를 정의합니다.
//! 모든 호출은 동기식이며 타임아웃은 구현체의 책임입니다.

use thiserror::Error;

use super::market_data::{FundingRate, KlineTable, OpenInterest, RawKline};
use crate::types::Timeframe;

/// 바이낸스 klines 엔드포인트의 기본 조회 개수.
pub const DEFAULT_KLINE_LIMIT: usize = 500;

/// 펀딩비/미결제약정 조회의 기본 개수.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// =============================================================================
// 에러 타입
// =============================================================================

/// 데이터 소스 에러.
///
/// 캐시 계층은 이 에러를 변환하지 않고 그대로 전파하며 재시도하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimited(String),

    /// API 에러
    #[error("API 에러 ({code}): {message}")]
    Api { code: i32, message: String },

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

impl DataSourceError {
    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 재시도 정책은 호출자가 결정합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataSourceError::Network(_) | DataSourceError::RateLimited(_)
        )
    }
}

// =============================================================================
// 요청 타입
// =============================================================================

/// 기간 지정 과거 캔들 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalKlineRequest {
    pub symbol: String,
    pub interval: Timeframe,
    /// 시작 시각 (밀리초, 포함)
    pub start_ms: i64,
    /// 종료 시각 (밀리초, 포함)
    pub end_ms: i64,
}

impl HistoricalKlineRequest {
    pub fn new(symbol: impl Into<String>, interval: Timeframe, start_ms: i64, end_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start_ms,
            end_ms,
        }
    }
}

/// 최근 캔들 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRequest {
    pub symbol: String,
    pub interval: Timeframe,
    /// 최대 반환 개수
    pub limit: usize,
}

impl KlineRequest {
    pub fn new(symbol: impl Into<String>, interval: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            limit: DEFAULT_KLINE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// 펀딩비 이력 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingRateRequest {
    pub symbol: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub limit: usize,
}

impl FundingRateRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start_ms: None,
            end_ms: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_range(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.start_ms = Some(start_ms);
        self.end_ms = Some(end_ms);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// 미결제약정 이력 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInterestRequest {
    pub symbol: String,
    /// 집계 주기
    pub period: Timeframe,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub limit: usize,
}

impl OpenInterestRequest {
    pub fn new(symbol: impl Into<String>, period: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            start_ms: None,
            end_ms: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_range(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.start_ms = Some(start_ms);
        self.end_ms = Some(end_ms);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

// =============================================================================
// Traits
// =============================================================================

/// 과거 캔들 원시 데이터 제공자.
///
/// 캐시 오케스트레이터가 누락 구간을 채울 때 사용합니다.
///
/// # 구현 예시
///
/// ```ignore
/// impl HistoricalKlineSource for BinanceRest {
///     fn fetch_historical(
///         &self,
///         request: &HistoricalKlineRequest,
///     ) -> Result<Vec<RawKline>, DataSourceError> {
///         // 페이지 단위로 /api/v3/klines 호출 후 JSON 배열을 RawKline으로 역직렬화
///     }
/// }
/// ```
pub trait HistoricalKlineSource {
    /// `[start_ms, end_ms]` 구간의 원시 캔들을 조회합니다.
    ///
    /// # Errors
    ///
    /// 실패 시 부분 데이터를 반환하지 말고 에러를 반환해야 합니다.
    fn fetch_historical(
        &self,
        request: &HistoricalKlineRequest,
    ) -> Result<Vec<RawKline>, DataSourceError>;
}

/// 거래소 어댑터 형태의 시장 데이터 조회 인터페이스.
///
/// 실거래 어댑터와 백테스트용 재생 클라이언트가 같은 trait를 구현하므로
/// 전략 코드는 어느 쪽과 연결되었는지 알 필요가 없습니다.
pub trait MarketDataSource {
    /// 최근 캔들 조회 (시간 오름차순, 최대 `limit`개).
    fn get_klines(&self, request: &KlineRequest) -> Result<KlineTable, DataSourceError>;

    /// 펀딩비 이력 조회.
    fn get_funding_rate(
        &self,
        request: &FundingRateRequest,
    ) -> Result<Vec<FundingRate>, DataSourceError>;

    /// 미결제약정 이력 조회.
    fn get_open_interest(
        &self,
        request: &OpenInterestRequest,
    ) -> Result<Vec<OpenInterest>, DataSourceError>;

    /// 데이터 소스 이름 (로깅용).
    fn name(&self) -> &str;
}

// =============================================================================
// 테스트
// =============================================================================
