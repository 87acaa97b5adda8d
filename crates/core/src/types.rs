//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.
//! 아티팩트 참조, 정규화 메타데이터, 취약점 발견 항목 등
//! 오케스트레이션 계층이 주고받는 핵심 타입이 여기에 있습니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ─── Severity ────────────────────────────────────────────────────────

/// 심각도 레벨
///
/// 정규화된 취약점 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Unknown < Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 매핑 불가 (출처 데이터에 근거 없음)
    #[default]
    Unknown,
    /// 정보성
    Info,
    /// 낮음
    Low,
    /// 중간
    Medium,
    /// 높음
    High,
    /// 치명적
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" | "none" => Some(Self::Unknown),
            "info" | "informational" | "negligible" => Some(Self::Info),
            "low" | "minor" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" | "important" | "major" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// CVSS 점수에서 심각도를 추정합니다 (CVSS v3 qualitative scale).
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Info
        }
    }
}

// ─── SbomFormat ──────────────────────────────────────────────────────

/// SBOM 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SbomFormat {
    /// CycloneDX JSON
    CycloneDx,
    /// SPDX JSON (flat 또는 `@graph` 형태)
    Spdx,
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycloneDx => write!(f, "cyclonedx"),
            Self::Spdx => write!(f, "spdx"),
        }
    }
}

impl SbomFormat {
    /// 문자열에서 SBOM 형식을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cyclonedx" | "cdx" => Some(Self::CycloneDx),
            "spdx" => Some(Self::Spdx),
            _ => None,
        }
    }
}

// ─── ArtifactRef ─────────────────────────────────────────────────────

/// 저장된 아티팩트 참조
///
/// 업로드 시 한 번 생성되는 불변 바이트 스트림에 대한 포인터입니다.
/// 오케스트레이션 계층은 이 참조로 바이트를 읽기만 하며, 절대 수정하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// 아티팩트 고유 ID
    pub id: String,
    /// 콘텐츠 해시 (SHA-256, hex)
    pub content_hash: String,
    /// 오브젝트 스토리지 키
    pub storage_key: String,
    /// 바이트 크기
    pub size: usize,
}

impl ArtifactRef {
    /// 바이트 내용에서 콘텐츠 해시를 계산합니다.
    pub fn content_hash_of(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact:{} ({} bytes)", self.id, self.size)
    }
}

// ─── NormalizedMetadata ──────────────────────────────────────────────

/// 라이선스 표현식
///
/// 파싱에 성공한 SPDX 표현식은 `Spdx`, 실패한 문자열은 `Custom`으로
/// 불투명하게 보존됩니다. `Custom`은 잠정적 데이터이며, 소비하는 UI가
/// 사용자 확인 대상으로 표시해야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseExpr {
    /// 유효한 SPDX 라이선스 표현식
    Spdx(String),
    /// 파싱 불가 — 원문 그대로 보존된 커스텀 라이선스 토큰
    Custom(String),
}

impl LicenseExpr {
    /// 원문 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Spdx(s) | Self::Custom(s) => s,
        }
    }

    /// 커스텀(잠정) 라이선스 여부를 반환합니다.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for LicenseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spdx(s) => write!(f, "{s}"),
            Self::Custom(s) => write!(f, "custom:{s}"),
        }
    }
}

/// 공급자 정보
///
/// 공급자/연락처 필드는 선택적이며, 부재 시 빈 컬렉션으로 정규화됩니다
/// (null 센티넬 없음).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    /// 공급자 이름
    pub name: String,
    /// 연락처 목록 (이메일 등, 없으면 빈 목록)
    pub contacts: Vec<String>,
}

/// 정규화된 컴포넌트 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// 문서 내 참조 ID (CycloneDX `bom-ref`, SPDX `SPDXID`)
    pub bom_ref: String,
    /// 컴포넌트 이름
    pub name: String,
    /// 버전 문자열
    pub version: String,
    /// Package URL (있을 경우)
    pub purl: Option<String>,
    /// 라이선스 목록
    pub licenses: Vec<LicenseExpr>,
}

/// 의존성 간선 (컴포넌트 참조 ID 기준)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// 의존하는 쪽 참조 ID
    pub from_ref: String,
    /// 의존되는 쪽 참조 ID
    pub to_ref: String,
}

/// 정규화 메타데이터
///
/// 검증된 문서에서 추출한 형식 불문 공통 필드입니다.
/// 검증 성공 시 생성되며, 재검증 시 동일 결과로 덮어쓰기됩니다
/// (버전 관리 없음, 순수 함수의 출력).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMetadata {
    /// 루트 컴포넌트 이름
    pub name: String,
    /// 루트 컴포넌트 버전 문자열
    pub version: String,
    /// 공급자 목록 (없으면 빈 목록)
    pub suppliers: Vec<SupplierInfo>,
    /// 루트 컴포넌트 라이선스 목록
    pub licenses: Vec<LicenseExpr>,
    /// 전체 컴포넌트 목록
    pub components: Vec<ComponentRecord>,
    /// 의존성 간선 목록
    pub dependencies: Vec<DependencyEdge>,
}

impl NormalizedMetadata {
    /// 컴포넌트 수를 반환합니다.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// 참조 ID로 컴포넌트를 검색합니다.
    pub fn find_component(&self, bom_ref: &str) -> Option<&ComponentRecord> {
        self.components.iter().find(|c| c.bom_ref == bom_ref)
    }
}

impl fmt::Display for NormalizedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NormalizedMetadata({}@{}, {} components)",
            self.name,
            self.version,
            self.components.len(),
        )
    }
}

// ─── VulnerabilityFinding ────────────────────────────────────────────

/// 정규화된 취약점 발견 항목
///
/// 결과 정규화기가 완료된 ScanJob에서만 생성하며, 수동 편집되지 않습니다.
/// 백엔드 간 병합은 하지 않으므로 `source_backend`로 출처가 유지됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    /// 취약점 식별자 (CVE, GHSA 등)
    pub id: String,
    /// 동일 취약점의 다른 식별자들
    pub aliases: Vec<String>,
    /// 정규화된 심각도
    pub severity: Severity,
    /// 수치 점수 (CVSS, 있을 경우)
    pub score: Option<f64>,
    /// 영향받는 패키지 이름
    pub package: String,
    /// 영향받는 버전 문자열
    pub version: String,
    /// 패키지 생태계 (purl 타입 문자열)
    pub ecosystem: String,
    /// 출처 백엔드 이름
    pub source_backend: String,
    /// 참고 URL 목록
    pub references: Vec<String>,
}

impl fmt::Display for VulnerabilityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} in {}@{} (via {})",
            self.severity, self.id, self.package, self.version, self.source_backend,
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
