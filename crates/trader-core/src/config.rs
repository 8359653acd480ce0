//! 설정 관리.
//!
//! 기본값 → TOML 파일 → 환경 변수(`TRADER__` 접두사) 순서로 설정을 병합합니다.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [data]
//! cache_dir = "data/klines"
//!
//! [data.warmup_bars]
//! 15m = 300
//! 4h = 0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::TraderError;
use crate::types::IntervalCalendar;

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "TRADER";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 데이터 캐시 설정
    #[serde(default)]
    pub data: DataConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 데이터 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// 캔들 캐시 디렉토리
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// 타임프레임 라벨별 워밍업 봉 수 덮어쓰기
    #[serde(default)]
    pub warmup_bars: HashMap<String, u32>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/klines")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            warmup_bars: HashMap::new(),
        }
    }
}

impl DataConfig {
    /// 워밍업 덮어쓰기를 적용한 간격 달력을 생성합니다.
    ///
    /// # Errors
    ///
    /// 알 수 없는 타임프레임 라벨이 있으면 `TraderError::Config`.
    pub fn calendar(&self) -> Result<IntervalCalendar, TraderError> {
        IntervalCalendar::with_overrides(&self.warmup_bars)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        Self::build(
            path.as_ref(),
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, TraderError> {
        Self::load("config/default.toml")
    }

    fn build(path: &Path, env: config::Environment) -> Result<Self, TraderError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("data.cache_dir", "data/klines")?
            // 파일에서 로드
            .add_source(config::File::from(path))
            // 환경 변수로 오버라이드
            .add_source(env);

        let config: AppConfig = builder.build()?.try_deserialize()?;
        // 잘못된 워밍업 라벨은 로드 시점에 거부
        config.data.calendar()?;
        Ok(config)
    }
}
