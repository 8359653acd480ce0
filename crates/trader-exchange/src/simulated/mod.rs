//! 백테스팅을 위한 시뮬레이션 거래소 표면.
//!
//! 미리 적재된 캔들을 시점 기반으로 재생하여, 실거래 어댑터와 같은
//! [`trader_core::MarketDataSource`] 인터페이스로 제공합니다.

mod replay;

pub use replay::{ReplayClient, REPLAY_SOURCE_NAME};
