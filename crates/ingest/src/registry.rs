//! 스키마 레지스트리 — (형식, 버전)별 검증기 조회 테이블
//!
//! [`SchemaRegistry`]는 시작 시 한 번 구성되는 명시적 조회 테이블입니다.
//! 새 버전 지원은 항목 추가로만 이루어지며, 기존 항목은 수정하지 않습니다
//! (버전별 검증기의 독립성이 버전 간 회귀를 막습니다).
//!
//! 전역 상태가 아니라 참조로 전달되는 구조체이므로, 테스트는 가짜
//! 레지스트리를 주입할 수 있습니다.

use std::collections::HashMap;

use serde_json::Value;

use sbomgate_core::error::ValidationError;
use sbomgate_core::types::SbomFormat;

use crate::schema::{CycloneDxValidator, SpdxFlatValidator, SpdxGraphValidator};

// ─── ValidatedDocument ───────────────────────────────────────────────

/// 검증된 문서 — 특정 (형식, 버전)에 대한 파싱 결과
///
/// 영속화되지 않는 일시적 투영입니다. `root`는 원본 JSON 전체를 담으므로
/// 스키마가 정의하지 않은 필드도 불투명하게 보존되며, 해석되지는 않습니다.
#[derive(Debug, Clone)]
pub struct ValidatedDocument {
    /// 판별된 형식
    pub format: SbomFormat,
    /// 판별된 버전
    pub version: String,
    /// 원본 JSON 루트
    pub root: Value,
}

// ─── SchemaValidator trait ───────────────────────────────────────────

/// (형식, 버전) 하나를 담당하는 구조 검증기
///
/// 검증기는 순수 함수이며 부수 효과가 없습니다. 위반 발견 시 경로를
/// `max_paths`까지만 수집해 [`ValidationError::Schema`]로 반환합니다 —
/// 부분 수용은 하지 않습니다.
pub trait SchemaValidator: Send + Sync {
    /// 담당 형식
    fn format(&self) -> SbomFormat;

    /// 담당 버전 문자열 (예: `"1.5"`, `"2.3"`)
    fn version(&self) -> &str;

    /// 파싱된 JSON 루트를 검증하고 [`ValidatedDocument`]를 반환합니다.
    fn validate(&self, root: &Value, max_paths: usize)
    -> Result<ValidatedDocument, ValidationError>;
}

// ─── SchemaRegistry ──────────────────────────────────────────────────

/// 스키마 레지스트리
pub struct SchemaRegistry {
    validators: HashMap<(SbomFormat, String), Box<dyn SchemaValidator>>,
}

impl SchemaRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// 기본 제공 검증기가 모두 등록된 레지스트리를 생성합니다.
    ///
    /// - CycloneDX: 1.4, 1.5, 1.6
    /// - SPDX: 2.2, 2.3 (flat), 3.0 (`@graph`)
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        // 등록 실패는 중복 키에서만 발생하며, 아래 고정 목록에는 중복이 없음
        for version in ["1.4", "1.5", "1.6"] {
            let _ = registry.register(Box::new(CycloneDxValidator::new(version)));
        }
        for version in ["2.2", "2.3"] {
            let _ = registry.register(Box::new(SpdxFlatValidator::new(version)));
        }
        let _ = registry.register(Box::new(SpdxGraphValidator::new("3.0")));
        registry
    }

    /// 검증기를 등록합니다. 동일 (형식, 버전)이 이미 있으면 거부합니다.
    pub fn register(&mut self, validator: Box<dyn SchemaValidator>) -> Result<(), String> {
        let key = (validator.format(), validator.version().to_owned());
        if self.validators.contains_key(&key) {
            return Err(format!(
                "validator already registered: {} {}",
                key.0, key.1
            ));
        }
        self.validators.insert(key, validator);
        Ok(())
    }

    /// (형식, 버전)의 검증기를 조회합니다.
    ///
    /// 선언된 버전과 정확히 일치하는 항목만 반환합니다 — 암묵적 버전
    /// 승급/강등은 없습니다.
    pub fn get(&self, format: SbomFormat, version: &str) -> Option<&dyn SchemaValidator> {
        self.validators
            .get(&(format, version.to_owned()))
            .map(|v| v.as_ref())
    }

    /// 해당 형식의 지원 버전 목록을 정렬하여 반환합니다.
    pub fn supported_versions(&self, format: SbomFormat) -> Vec<String> {
        let mut versions: Vec<String> = self
            .validators
            .keys()
            .filter(|(f, _)| *f == format)
            .map(|(_, v)| v.clone())
            .collect();
        versions.sort();
        versions
    }

    /// 등록된 검증기 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.validators.len()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_all_versions() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.count(), 6);
        assert!(registry.get(SbomFormat::CycloneDx, "1.5").is_some());
        assert!(registry.get(SbomFormat::Spdx, "2.3").is_some());
        assert!(registry.get(SbomFormat::Spdx, "3.0").is_some());
    }

    #[test]
    fn lookup_is_exact_no_coercion() {
        let registry = SchemaRegistry::builtin();
        // 미지원 버전은 이웃 버전으로 대체되지 않음
        assert!(registry.get(SbomFormat::CycloneDx, "1.3").is_none());
        assert!(registry.get(SbomFormat::Spdx, "2.1").is_none());
        assert!(registry.get(SbomFormat::Spdx, "3.0.1").is_none());
    }

    #[test]
    fn supported_versions_sorted_per_format() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(
            registry.supported_versions(SbomFormat::CycloneDx),
            vec!["1.4", "1.5", "1.6"]
        );
        assert_eq!(
            registry.supported_versions(SbomFormat::Spdx),
            vec!["2.2", "2.3", "3.0"]
        );
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = SchemaRegistry::builtin();
        let err = registry
            .register(Box::new(CycloneDxValidator::new("1.5")))
            .unwrap_err();
        assert!(err.contains("already registered"));
    }

    #[test]
    fn empty_registry_supports_nothing() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.count(), 0);
        assert!(registry.supported_versions(SbomFormat::CycloneDx).is_empty());
    }
}
