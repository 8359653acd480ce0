//! 거래소 표면 및 백테스트 재생.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 시뮬레이션 거래소: 현재 시각 이후의 데이터를 노출하지 않는 재생 클라이언트

pub mod simulated;

pub use simulated::{ReplayClient, REPLAY_SOURCE_NAME};
