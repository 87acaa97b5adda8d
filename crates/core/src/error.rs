//! 에러 타입 — 도메인별 에러 정의
//!
//! [`SbomgateError`]는 최상위 에러 타입이며, 각 도메인 에러는
//! `#[from]` 변환으로 `?` 연산자를 통해 자연스럽게 전파됩니다.
//!
//! # 에러 분류 (전파 정책)
//!
//! - **클라이언트 기인, 재시도 없음**: `ValidationError` — 업로드 흐름에
//!   구조화된 결과로 반환되며, 호출자가 타입으로 분기합니다.
//! - **일시적, 제한된 재시도**: 플러그인의 `RetryLater` 신호 (에러 아님,
//!   평가 결과 enum의 변형으로 표현).
//! - **일시적, 호출자 백오프**: `ScanError::NoCapacity`.
//! - **개별 단위 종결, 프로세스 비치명**: `AssessError::Timeout`,
//!   `ScanError::JobTimeout`, `AssessError::PluginPanic` — 해당 실행
//!   레코드에만 기록되며 형제 단위로 전파되지 않습니다.

use crate::types::SbomFormat;

/// Sbomgate 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SbomgateError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 문서 검증 에러
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 평가(assessment) 오케스트레이션 에러
    #[error("assess error: {0}")]
    Assess(#[from] AssessError),

    /// 스캔 디스패치 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 문서 검증 에러
///
/// 클라이언트 기인 에러이며 자동 재시도되지 않습니다.
/// 검증 실패는 해당 아티팩트의 다운스트림 처리(정규화, 평가, 스캔)를
/// 차단하지만 업로드된 아티팩트 자체는 삭제/변경하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// 지원하지 않는 (형식, 버전) 조합
    ///
    /// 암묵적 버전 승급/강등은 하지 않으며, 가장 가까운 지원 버전을
    /// `nearest`로 안내합니다.
    #[error("unsupported {format} version {version} (supported: {})", nearest.join(", "))]
    UnsupportedVersion {
        format: SbomFormat,
        version: String,
        nearest: Vec<String>,
    },

    /// 스키마 위반
    ///
    /// `violations`는 설정된 상한까지만 담기며, `total`은 전체 위반 수입니다.
    /// 부분 수용은 하지 않습니다.
    #[error("schema validation failed: {total} violation(s), first: {}", violations.first().map(String::as_str).unwrap_or("<none>"))]
    Schema {
        violations: Vec<String>,
        total: usize,
    },

    /// JSON 파싱 불가 등 형식 판별 이전 단계의 실패
    #[error("malformed document: {reason}")]
    Malformed { reason: String },

    /// 형식 판별 실패 (CycloneDX/SPDX 어느 쪽 표식도 없음)
    #[error("unrecognized document format: {reason}")]
    UnknownFormat { reason: String },

    /// 입력 크기 초과
    #[error("document too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 평가 오케스트레이션 에러
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    /// 등록되지 않은 플러그인 키
    #[error("unknown plugin: {key}")]
    UnknownPlugin { key: String },

    /// 플러그인 의존성 그래프에 순환 존재
    #[error("plugin dependency cycle involving: {plugins}")]
    DependencyCycle { plugins: String },

    /// 허용되지 않는 상태 전환 (터미널 레코드 수정 시도 포함)
    #[error("invalid run transition for {run_id}: {from} -> {to}")]
    InvalidTransition {
        run_id: String,
        from: String,
        to: String,
    },

    /// 재시도 한도 초과 (RetryLater가 터미널 error로 전환됨)
    #[error("retry limit exceeded for plugin {plugin} after {attempts} attempts")]
    RetryExhausted { plugin: String, attempts: u32 },

    /// 플러그인 패닉 (해당 실행만 격리 종결)
    #[error("plugin {plugin} panicked")]
    PluginPanic { plugin: String },

    /// 플러그인 실행 시간 초과
    #[error("plugin {plugin} timed out after {timeout_secs}s")]
    Timeout { plugin: String, timeout_secs: u64 },

    /// 플러그인 등록 중복
    #[error("plugin already registered: {key}")]
    AlreadyRegistered { key: String },
}

/// 스캔 디스패치 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 가용 백엔드 없음 — 일시적 조건이며 호출자가 백오프 후 재시도
    ///
    /// 용량 부족을 무료 티어로 우회하지 않습니다 (형식 불일치는
    /// 정합성 문제이지 용량 문제가 아님).
    #[error("no scanner backend has capacity")]
    NoCapacity,

    /// 백엔드가 처리할 수 없는 문서 형식
    #[error("backend tier {tier} cannot scan {format} documents")]
    UnsupportedFormat { tier: String, format: SbomFormat },

    /// 스캔 잡 시간 초과 (해당 잡만 failed 처리)
    #[error("scan job {job_id} exceeded max age ({age_secs}s)")]
    JobTimeout { job_id: String, age_secs: u64 },

    /// 백엔드 어댑터 에러 (업로드/폴링 실패)
    #[error("backend {name} error: {reason}")]
    Backend { name: String, reason: String },

    /// 존재하지 않는 잡
    #[error("scan job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// 허용되지 않는 잡 상태 전환
    #[error("invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    /// 백엔드 등록 중복
    #[error("backend already registered: {id}")]
    AlreadyRegistered { id: String },
}

/// 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 키에 해당하는 레코드 없음
    #[error("not found: {key}")]
    NotFound { key: String },

    /// 조건부 쓰기 충돌 (compare-and-set 실패)
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// 백엔드 저장소 오류
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_names_nearest() {
        let err = ValidationError::UnsupportedVersion {
            format: SbomFormat::CycloneDx,
            version: "1.2".to_owned(),
            nearest: vec!["1.4".to_owned(), "1.5".to_owned(), "1.6".to_owned()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cyclonedx"));
        assert!(msg.contains("1.2"));
        assert!(msg.contains("1.4, 1.5, 1.6"));
    }

    #[test]
    fn schema_error_reports_first_violation() {
        let err = ValidationError::Schema {
            violations: vec!["/components/0/name: expected string".to_owned()],
            total: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("7 violation(s)"));
        assert!(msg.contains("/components/0/name"));
    }

    #[test]
    fn domain_errors_convert_to_top_level() {
        let err: SbomgateError = ScanError::NoCapacity.into();
        assert!(matches!(err, SbomgateError::Scan(_)));
        assert!(err.to_string().contains("no scanner backend"));

        let err: SbomgateError = AssessError::RetryExhausted {
            plugin: "license-check".to_owned(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, SbomgateError::Assess(_)));
    }

    #[test]
    fn storage_conflict_display() {
        let err = StorageError::Conflict {
            reason: "run already claimed".to_owned(),
        };
        assert!(err.to_string().contains("run already claimed"));
    }
}
