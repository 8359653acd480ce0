//! 캐시 컨텍스트.
//!
//! 전역 상태 대신 캐시 디렉토리와 간격 달력을 명시적으로 묶어 전달합니다.

use std::path::{Path, PathBuf};

use trader_core::{DataConfig, IntervalCalendar};

use crate::error::Result;

/// 캐시 디렉토리와 간격 달력.
#[derive(Debug, Clone)]
pub struct CacheContext {
    cache_dir: PathBuf,
    calendar: IntervalCalendar,
}

impl CacheContext {
    /// 새 컨텍스트를 생성합니다.
    pub fn new(cache_dir: impl Into<PathBuf>, calendar: IntervalCalendar) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            calendar,
        }
    }

    /// 데이터 설정에서 컨텍스트를 생성합니다.
    ///
    /// # Errors
    ///
    /// 워밍업 덮어쓰기에 알 수 없는 라벨이 있으면 `DataError::Configuration`.
    pub fn from_config(config: &DataConfig) -> Result<Self> {
        Ok(Self::new(config.cache_dir.clone(), config.calendar()?))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn calendar(&self) -> &IntervalCalendar {
        &self.calendar
    }
}
