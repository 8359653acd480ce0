//! 데이터 모듈 오류 타입.

use thiserror::Error;
use trader_core::{DataSourceError, TraderError};

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 설정 오류 (알 수 없는 타임프레임, 잘못된 워밍업 덮어쓰기)
    #[error("설정 오류: {0}")]
    Configuration(String),

    /// 외부 데이터 소스 오류 (변환 없이 전파)
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    /// 캐시 파일 입출력 오류
    #[error("캐시 입출력 오류: {0}")]
    CacheIo(String),

    /// 직렬화/역직렬화 오류
    #[error("직렬화 오류: {0}")]
    Serialization(String),
}

impl DataError {
    /// 데이터 소스 오류라면 원래 오류를 반환합니다.
    pub fn as_data_source(&self) -> Option<&DataSourceError> {
        match self {
            DataError::DataSource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::CacheIo(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            DataError::CacheIo(err.to_string())
        } else {
            DataError::Serialization(err.to_string())
        }
    }
}

impl From<TraderError> for DataError {
    fn from(err: TraderError) -> Self {
        match err {
            TraderError::Config(msg) => DataError::Configuration(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
