//! 설정 관리 — sbomgate.toml 파싱 및 런타임 설정
//!
//! [`SbomgateConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//! 각 모듈은 자기 섹션만 읽어 사용합니다.
//!
//! # 사용 예시
//! ```
//! use sbomgate_core::config::SbomgateConfig;
//!
//! let config = SbomgateConfig::parse("[assess]\nmax_retries = 3").unwrap();
//! assert_eq!(config.assess.max_retries, 3);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SbomgateError};

// ─── 상한값 상수 ─────────────────────────────────────────────────────

const MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024; // 100 MiB
const MAX_VIOLATION_PATHS: usize = 100;
const MAX_RETRIES_LIMIT: u32 = 10;
const MAX_PLUGIN_TIMEOUT_SECS: u64 = 3600;
const MAX_POLL_INTERVAL_SECS: u64 = 3600;
const MIN_JOB_AGE_SECS: u64 = 60;
const MAX_JOB_AGE_SECS: u64 = 86_400;

// ─── SbomgateConfig ──────────────────────────────────────────────────

/// Sbomgate 통합 설정
///
/// `sbomgate.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbomgateConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 문서 검증/정규화 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 평가 오케스트레이션 설정
    #[serde(default)]
    pub assess: AssessConfig,
    /// 스캔 풀 설정
    #[serde(default)]
    pub scan: ScanPoolConfig,
}

impl SbomgateConfig {
    /// TOML 파일에서 설정을 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SbomgateError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SbomgateError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SbomgateError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱하고 검증합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SbomgateError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            SbomgateError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 모든 섹션의 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), SbomgateError> {
        self.ingest.validate()?;
        self.assess.validate()?;
        self.scan.validate()?;
        Ok(())
    }
}

// ─── GeneralConfig ───────────────────────────────────────────────────

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
        }
    }
}

// ─── IngestConfig ────────────────────────────────────────────────────

/// 문서 검증/정규화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 문서 최대 허용 크기 (바이트)
    pub max_document_bytes: usize,
    /// 검증 에러에 담을 위반 경로 최대 개수 (에러 페이로드 상한)
    pub max_violation_paths: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 10 * 1024 * 1024, // 10 MiB
            max_violation_paths: 20,
        }
    }
}

impl IngestConfig {
    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_document_bytes == 0 || self.max_document_bytes > MAX_DOCUMENT_BYTES {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_document_bytes".to_owned(),
                reason: format!("must be 1-{MAX_DOCUMENT_BYTES}"),
            });
        }
        if self.max_violation_paths == 0 || self.max_violation_paths > MAX_VIOLATION_PATHS {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_violation_paths".to_owned(),
                reason: format!("must be 1-{MAX_VIOLATION_PATHS}"),
            });
        }
        Ok(())
    }
}

// ─── AssessConfig ────────────────────────────────────────────────────

/// 평가 오케스트레이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessConfig {
    /// RetryLater 신호 허용 최대 횟수 (초과 시 터미널 error)
    pub max_retries: u32,
    /// 플러그인 실행 타임아웃 (초) — Runner가 소유하며 플러그인이 아님
    pub plugin_timeout_secs: u64,
    /// 아티팩트 임시 파일 작업 디렉토리 (비어 있으면 시스템 기본)
    pub work_dir: String,
}

impl Default for AssessConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            plugin_timeout_secs: 300,
            work_dir: String::new(),
        }
    }
}

impl AssessConfig {
    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "assess.max_retries".to_owned(),
                reason: format!("must be 0-{MAX_RETRIES_LIMIT}"),
            });
        }
        if self.plugin_timeout_secs == 0 || self.plugin_timeout_secs > MAX_PLUGIN_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "assess.plugin_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_PLUGIN_TIMEOUT_SECS}"),
            });
        }
        Ok(())
    }
}

// ─── ScanPoolConfig ──────────────────────────────────────────────────

/// 스캔 풀 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanPoolConfig {
    /// submitted/processing 잡 재확인 간격 (초)
    pub poll_interval_secs: u64,
    /// 잡 최대 수명 (초) — 초과 시 timeout 사유로 failed 처리
    pub max_job_age_secs: u64,
    /// 헬스체크 신선도 윈도우 (초) — 이보다 오래된 헬스체크는 무효
    pub health_freshness_secs: u64,
}

impl Default for ScanPoolConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_job_age_secs: 3600,
            health_freshness_secs: 300,
        }
    }
}

impl ScanPoolConfig {
    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "scan.poll_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            });
        }
        if self.max_job_age_secs < MIN_JOB_AGE_SECS || self.max_job_age_secs > MAX_JOB_AGE_SECS {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_job_age_secs".to_owned(),
                reason: format!("must be {MIN_JOB_AGE_SECS}-{MAX_JOB_AGE_SECS}"),
            });
        }
        if self.health_freshness_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scan.health_freshness_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
