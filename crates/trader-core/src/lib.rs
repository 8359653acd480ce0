//! # Trader Core
//!
//! 백테스트 데이터 계층의 핵심 타입과 계약을 제공합니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 타임프레임 및 워밍업 간격 달력
//! - 원시/정규화 캔들 및 캔들 테이블
//! - 데이터 소스 trait와 요청 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
