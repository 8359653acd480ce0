//! 캐싱 레이어.
//!
//! - Context: 캐시 디렉토리와 간격 달력을 묶은 명시적 컨텍스트
//! - Historical: 워밍업 포함 구간을 보장하는 캔들 캐시 오케스트레이터

pub mod context;
pub mod historical;

pub use context::CacheContext;
pub use historical::{CacheCoverage, CachedKlineProvider};
