//! 백테스트용 캔들 데이터 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 원시 캔들 정규화
//! - (심볼, 간격)별 CSV 캐시 저장소와 병합
//! - 워밍업을 포함한 구간을 보장하는 캐시 오케스트레이터

pub mod cache;
pub mod error;
pub mod normalize;
pub mod storage;

pub use error::{DataError, Result};
pub use normalize::{normalize_klines, normalize_row};

pub use cache::{CacheContext, CacheCoverage, CachedKlineProvider};
pub use storage::{merge_klines, KlineCsvStore};
