#![doc = include_str!("../README.md")]

pub mod assessment;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scanjob;
pub mod store;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    AssessError, ConfigError, SbomgateError, ScanError, StorageError, ValidationError,
};

// 설정
pub use config::SbomgateConfig;

// 평가 실행
pub use assessment::{AssessmentRun, RunState};

// 스캔 잡
pub use scanjob::{RawFinding, RawScanResult, ScanJob, ScanJobState};

// 저장소 trait
pub use store::{ArtifactStore, AssessmentStore, InsertOutcome, MetadataStore, ScanJobStore};

// 도메인 타입
pub use types::{
    ArtifactRef, ComponentRecord, DependencyEdge, LicenseExpr, NormalizedMetadata, SbomFormat,
    Severity, SupplierInfo, VulnerabilityFinding,
};
