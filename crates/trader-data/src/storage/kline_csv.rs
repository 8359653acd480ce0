//! CSV 캔들 캐시 저장소.
//!
//! (심볼, 간격)마다 `<SYMBOL>_<interval>.csv` 파일 하나에 현재 알고 있는
//! 전체 캔들 테이블을 저장합니다. 저장할 때마다 파일 전체를 덮어쓰며,
//! 임시 파일에 먼저 쓴 뒤 이름을 바꿔 중간 상태가 남지 않게 합니다.
//!
//! 단일 프로세스 단일 작성자를 가정하며 파일 잠금은 하지 않습니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use trader_data::KlineCsvStore;
//!
//! let store = KlineCsvStore::new("data/klines");
//! if let Some(table) = store.read("BTCUSDT", Timeframe::M15)? {
//!     println!("{} rows", table.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use trader_core::{KlineRow, KlineTable, RawKline, RawValue, Timeframe};

use crate::error::Result;
use crate::normalize::normalize_klines;

/// 캐시 파일 한 행.
///
/// 손상되었거나 다른 버전이 쓴 파일도 읽을 수 있도록 모든 컬럼을 문자열로
/// 받은 뒤 정규화 규칙을 그대로 적용합니다.
#[derive(Debug, Deserialize)]
struct CsvKlineRecord {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    high: Option<String>,
    #[serde(default)]
    low: Option<String>,
    #[serde(default)]
    close: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    close_time: Option<String>,
    #[serde(default)]
    quote_volume: Option<String>,
    #[serde(default)]
    trades: Option<String>,
    #[serde(default)]
    taker_base: Option<String>,
    #[serde(default)]
    taker_quote: Option<String>,
}

impl From<CsvKlineRecord> for RawKline {
    fn from(record: CsvKlineRecord) -> Self {
        fn text(value: Option<String>) -> Option<RawValue> {
            value.filter(|s| !s.trim().is_empty()).map(RawValue::Text)
        }

        RawKline {
            open_time: text(record.timestamp),
            open: text(record.open),
            high: text(record.high),
            low: text(record.low),
            close: text(record.close),
            volume: text(record.volume),
            close_time: text(record.close_time),
            quote_volume: text(record.quote_volume),
            trades: text(record.trades),
            taker_base: text(record.taker_base),
            taker_quote: text(record.taker_quote),
            ignore: None,
        }
    }
}

/// 캐시 파일명에 사용할 수 있도록 심볼을 인코딩합니다.
///
/// `[A-Za-z0-9._-]` 이외의 바이트는 `%XX`로 퍼센트 인코딩합니다 (`%` 자신 포함).
/// 서로 다른 심볼은 항상 서로 다른 이름이 됩니다.
pub fn encode_symbol(symbol: &str) -> String {
    let mut encoded = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// 캐시 파일명 (`<SYMBOL>_<interval>.csv`).
pub fn cache_file_name(symbol: &str, interval: Timeframe) -> String {
    format!("{}_{}.csv", encode_symbol(symbol), interval.as_label())
}

/// 디렉토리 기반 CSV 캔들 저장소.
#[derive(Debug, Clone)]
pub struct KlineCsvStore {
    root: PathBuf,
}

impl KlineCsvStore {
    /// 캐시 디렉토리를 지정하여 저장소를 생성합니다.
    ///
    /// 디렉토리는 첫 저장 시점에 생성됩니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 캐시 디렉토리.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 시리즈의 캐시 파일 경로.
    pub fn path_for(&self, symbol: &str, interval: Timeframe) -> PathBuf {
        self.root.join(cache_file_name(symbol, interval))
    }

    /// 캐시된 테이블을 읽습니다.
    ///
    /// 파일이 없으면 `Ok(None)`. 읽은 행은 정규화 규칙을 거쳐 정렬됩니다.
    pub fn read(&self, symbol: &str, interval: Timeframe) -> Result<Option<KlineTable>> {
        let path = self.path_for(symbol, interval);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(io::BufReader::new(file));
        let mut raw = Vec::new();
        for record in reader.deserialize::<CsvKlineRecord>() {
            raw.push(RawKline::from(record?));
        }

        let table = normalize_klines(raw);
        debug!(path = %path.display(), rows = table.len(), "캐시 파일 로드");
        Ok(Some(table))
    }

    /// 테이블 전체를 원자적으로 덮어씁니다.
    pub fn write(&self, symbol: &str, interval: Timeframe, table: &KlineTable) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let path = self.path_for(symbol, interval);
        let tmp_path = path.with_extension("csv.tmp");

        if let Err(e) = write_table(&tmp_path, table) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        debug!(path = %path.display(), rows = table.len(), "캐시 파일 저장");
        Ok(())
    }

    /// 시리즈의 캐시 파일을 삭제합니다. 파일이 없었으면 `Ok(false)`.
    pub fn remove(&self, symbol: &str, interval: Timeframe) -> Result<bool> {
        match fs::remove_file(self.path_for(symbol, interval)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_table(path: &Path, table: &KlineTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in table.rows() {
        writer.serialize(row)?;
    }
    // 빈 테이블도 헤더는 남긴다
    if table.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    writer.flush()?;
    Ok(())
}

/// 캐시 파일 헤더.
pub const CSV_HEADER: [&str; 11] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trades",
    "taker_base",
    "taker_quote",
];

/// 캐시된 테이블과 새로 가져온 테이블을 병합합니다.
///
/// 결과는 오름차순이며 타임스탬프당 정확히 한 행입니다.
/// 같은 타임스탬프가 양쪽에 있으면 새로 가져온 행이 우선합니다.
pub fn merge_klines(cached: &KlineTable, fresh: &KlineTable) -> KlineTable {
    let mut merged: BTreeMap<i64, KlineRow> = BTreeMap::new();
    for row in cached.rows().iter().chain(fresh.rows()) {
        merged.insert(row.open_time_ms, *row);
    }
    KlineTable::from_sorted_rows(merged.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: i64, close: f64) -> KlineRow {
        KlineRow {
            open_time_ms: ts,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            close_time_ms: ts + 59_999,
            quote_volume: 10.0 * close,
            trade_count: 7,
            taker_base_volume: 4.0,
            taker_quote_volume: 4.0 * close,
        }
    }

    #[test]
    fn test_cache_file_name() {
        assert_eq!(cache_file_name("BTCUSDT", Timeframe::M15), "BTCUSDT_15m.csv");
        assert_eq!(cache_file_name("BTC/USDT:USDT", Timeframe::H1), "BTC%2FUSDT%3AUSDT_1h.csv");
        assert_eq!(encode_symbol("a.b_c-d"), "a.b_c-d");
        assert_eq!(encode_symbol("50%"), "50%25");
    }

    #[test]
    fn test_distinct_symbols_get_distinct_paths() {
        let store = KlineCsvStore::new("cache");
        let symbols = ["BTC-USDT", "BTC/USDT", "BTC:USDT", "BTC%2FUSDT", "BTC USDT", "BTC\u{00e9}USDT"];

        let paths: std::collections::HashSet<PathBuf> = symbols
            .iter()
            .map(|s| store.path_for(s, Timeframe::M1))
            .collect();
        assert_eq!(paths.len(), symbols.len());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());
        // 대상 경로가 비어 있지 않은 디렉토리면 rename이 실패한다
        let path = store.path_for("BTCUSDT", Timeframe::M1);
        fs::create_dir_all(path.join("occupied")).unwrap();

        let result = store.write("BTCUSDT", Timeframe::M1, &KlineTable::from_rows(vec![row(0, 1.0)]));

        assert!(result.is_err());
        assert!(!path.with_extension("csv.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn test_read_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());

        assert!(store.read("BTCUSDT", Timeframe::M15).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path().join("nested"));
        let table = KlineTable::from_rows(vec![row(60_000, 101.5), row(0, 100.25)]);

        store.write("BTCUSDT", Timeframe::M1, &table).unwrap();
        let loaded = store.read("BTCUSDT", Timeframe::M1).unwrap().unwrap();

        assert_eq!(loaded, table);
        assert!(!store.path_for("BTCUSDT", Timeframe::M1).with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());
        store
            .write("ETHUSDT", Timeframe::H1, &KlineTable::from_rows(vec![row(0, 1.0)]))
            .unwrap();

        let contents = fs::read_to_string(store.path_for("ETHUSDT", Timeframe::H1)).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, CSV_HEADER.join(","));
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());

        store.write("BTCUSDT", Timeframe::D1, &KlineTable::new()).unwrap();
        let loaded = store.read("BTCUSDT", Timeframe::D1).unwrap().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_nan_survives_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());
        let mut nan_row = row(0, 1.0);
        nan_row.quote_volume = f64::NAN;

        store
            .write("BTCUSDT", Timeframe::M1, &KlineTable::from_rows(vec![nan_row]))
            .unwrap();
        let loaded = store.read("BTCUSDT", Timeframe::M1).unwrap().unwrap();

        assert!(loaded.rows()[0].quote_volume.is_nan());
        assert_eq!(loaded.rows()[0].close, 1.0);
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());

        store
            .write("BTCUSDT", Timeframe::M1, &KlineTable::from_rows(vec![row(0, 1.0), row(60_000, 2.0)]))
            .unwrap();
        store
            .write("BTCUSDT", Timeframe::M1, &KlineTable::from_rows(vec![row(120_000, 3.0)]))
            .unwrap();

        let loaded = store.read("BTCUSDT", Timeframe::M1).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.first_open_time(), Some(120_000));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());
        store
            .write("BTCUSDT", Timeframe::M1, &KlineTable::from_rows(vec![row(0, 1.0)]))
            .unwrap();

        assert!(store.remove("BTCUSDT", Timeframe::M1).unwrap());
        assert!(!store.remove("BTCUSDT", Timeframe::M1).unwrap());
        assert!(store.read("BTCUSDT", Timeframe::M1).unwrap().is_none());
    }

    #[test]
    fn test_read_tolerates_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = KlineCsvStore::new(dir.path());
        fs::write(
            store.path_for("BTCUSDT", Timeframe::M1),
            "timestamp,open,high,low,close,volume,close_time,quote_volume,trades,taker_base,taker_quote\n\
             60000,2,2,2,2,1,,2,,1,2\n\
             garbage,1,1,1,1,1,1,1,1,1,1\n\
             0,1,1,1,1,1,59999,1,3,1,1\n",
        )
        .unwrap();

        let loaded = store.read("BTCUSDT", Timeframe::M1).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.first_open_time(), Some(0));
        assert_eq!(loaded.rows()[1].close_time_ms, 60_000);
        assert_eq!(loaded.rows()[1].trade_count, 0);
    }

    #[test]
    fn test_merge_fresh_wins_and_dedups() {
        let cached = KlineTable::from_rows(vec![row(0, 1.0), row(60_000, 2.0)]);
        let fresh = KlineTable::from_rows(vec![row(60_000, 20.0), row(120_000, 3.0)]);

        let merged = merge_klines(&cached, &fresh);
        let times: Vec<i64> = merged.rows().iter().map(|r| r.open_time_ms).collect();
        assert_eq!(times, vec![0, 60_000, 120_000]);
        assert_eq!(merged.rows()[1].close, 20.0);
        assert!(merged.has_unique_timestamps());
    }

    #[test]
    fn test_merge_removes_duplicates_within_one_side() {
        let cached = KlineTable::from_rows(vec![row(0, 1.0), row(0, 1.5)]);
        let merged = merge_klines(&cached, &KlineTable::new());

        assert_eq!(merged.len(), 1);
    }
}
