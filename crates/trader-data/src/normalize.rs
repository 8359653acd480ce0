//! 원시 캔들 정규화.
//!
//! 데이터 소스의 12필드 원시 행을 타입이 지정된 [`KlineTable`]로 변환합니다.
//!
//! - 타임스탬프가 없거나 파싱할 수 없는 행은 버립니다.
//! - `close_time`이 비어 있으면 행의 타임스탬프를 사용합니다.
//! - `trades`가 비어 있거나 파싱할 수 없으면 0입니다.
//! - 나머지 실수 필드는 비어 있거나 파싱할 수 없으면 NaN입니다.
//! - 결과는 타임스탬프 기준으로 안정 정렬되며 중복은 유지됩니다.
//!
//! 가격의 부호나 크기 같은 의미 검증은 하지 않습니다.

use trader_core::{KlineRow, KlineTable, RawKline, RawValue};

/// 원시 캔들 목록을 정규화합니다.
pub fn normalize_klines<I>(raw: I) -> KlineTable
where
    I: IntoIterator<Item = RawKline>,
{
    let rows: Vec<KlineRow> = raw.into_iter().filter_map(|r| normalize_row(&r)).collect();
    KlineTable::from_rows(rows)
}

/// 원시 캔들 한 행을 정규화합니다. 타임스탬프가 유효하지 않으면 `None`.
pub fn normalize_row(raw: &RawKline) -> Option<KlineRow> {
    let open_time_ms = raw.open_time.as_ref().and_then(RawValue::to_i64)?;

    Some(KlineRow {
        open_time_ms,
        open: float_or_nan(&raw.open),
        high: float_or_nan(&raw.high),
        low: float_or_nan(&raw.low),
        close: float_or_nan(&raw.close),
        volume: float_or_nan(&raw.volume),
        close_time_ms: raw
            .close_time
            .as_ref()
            .and_then(RawValue::to_i64)
            .unwrap_or(open_time_ms),
        quote_volume: float_or_nan(&raw.quote_volume),
        trade_count: raw.trades.as_ref().and_then(RawValue::to_i64).unwrap_or(0),
        taker_base_volume: float_or_nan(&raw.taker_base),
        taker_quote_volume: float_or_nan(&raw.taker_quote),
    })
}

fn float_or_nan(value: &Option<RawValue>) -> f64 {
    value.as_ref().and_then(RawValue::to_f64).unwrap_or(f64::NAN)
}
