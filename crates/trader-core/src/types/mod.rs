//! 시계열 데이터 전반에서 사용되는 공통 타입.

mod calendar;
mod timeframe;

pub use calendar::*;
pub use timeframe::*;
