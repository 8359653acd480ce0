//! 캔들 데이터 도메인 모델.

mod data_source;
mod market_data;

pub use data_source::*;
pub use market_data::*;
