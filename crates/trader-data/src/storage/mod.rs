//! 캔들 캐시 저장소.

pub mod kline_csv;

pub use kline_csv::{cache_file_name, encode_symbol, merge_klines, KlineCsvStore, CSV_HEADER};
