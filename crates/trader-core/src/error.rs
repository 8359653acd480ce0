//! 핵심 에러 타입.
//!
//! 이 모듈은 워크스페이스 전반에서 사용되는 공통 에러를 정의합니다.
//! 외부 데이터 소스 에러는 [`crate::DataSourceError`]를 참고하세요.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러 (알 수 없는 타임프레임 라벨 등)
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}
