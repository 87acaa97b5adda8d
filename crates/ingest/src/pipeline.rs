//! 수집 파이프라인 — 검증과 정규화의 조립
//!
//! 업로드 완료 후 큐 워커가 호출하는 진입점입니다. 아티팩트 바이트를
//! 읽어 검증하고, 성공 시 정규화 메타데이터를 저장합니다. 검증 실패는
//! 구조화된 [`ValidationError`]로 반환되며 아티팩트 자체는 건드리지
//! 않습니다.

use tracing::{debug, info, warn};

use sbomgate_core::config::IngestConfig;
use sbomgate_core::error::{SbomgateError, ValidationError};
use sbomgate_core::metrics::{
    INGEST_NORMALIZED_TOTAL, INGEST_VALIDATIONS_TOTAL, LABEL_FORMAT, LABEL_RESULT,
};
use sbomgate_core::store::{ArtifactStore, MetadataStore};
use sbomgate_core::types::{ArtifactRef, NormalizedMetadata};

use crate::detect;
use crate::normalize::normalize;
use crate::registry::{SchemaRegistry, ValidatedDocument};

/// 수집 파이프라인
///
/// 저장소는 제네릭 파라미터로 주입되므로 테스트에서 인메모리 구현을
/// 사용할 수 있습니다.
pub struct IngestPipeline<A, M> {
    registry: SchemaRegistry,
    config: IngestConfig,
    artifacts: A,
    metadata: M,
}

impl<A, M> IngestPipeline<A, M>
where
    A: ArtifactStore,
    M: MetadataStore,
{
    /// 기본 제공 레지스트리로 파이프라인을 생성합니다.
    pub fn new(config: IngestConfig, artifacts: A, metadata: M) -> Self {
        Self {
            registry: SchemaRegistry::builtin(),
            config,
            artifacts,
            metadata,
        }
    }

    /// 커스텀 레지스트리로 파이프라인을 생성합니다 (테스트용).
    pub fn with_registry(
        registry: SchemaRegistry,
        config: IngestConfig,
        artifacts: A,
        metadata: M,
    ) -> Self {
        Self {
            registry,
            config,
            artifacts,
            metadata,
        }
    }

    /// 아티팩트 저장소 참조를 반환합니다.
    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    /// 메타데이터 저장소 참조를 반환합니다.
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// 바이트를 검증합니다: 크기 상한 → JSON 파싱 → 형식 탐지 →
    /// 레지스트리 조회 → 구조 검증.
    ///
    /// 선언된 버전의 검증기가 없으면 [`ValidationError::UnsupportedVersion`]
    /// 으로 거부하고 지원 버전 목록을 안내합니다 — 이웃 버전의 검증기를
    /// 대신 실행하지 않습니다.
    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<ValidatedDocument, ValidationError> {
        let max = self.config.max_document_bytes;
        if bytes.len() > max {
            return Err(ValidationError::TooLarge {
                size: bytes.len(),
                max,
            });
        }

        let result = self.validate_parsed(bytes);
        match &result {
            Ok(doc) => {
                metrics::counter!(
                    INGEST_VALIDATIONS_TOTAL,
                    LABEL_FORMAT => doc.format.to_string(),
                    LABEL_RESULT => "success"
                )
                .increment(1);
                debug!(format = %doc.format, version = %doc.version, "document validated");
            }
            Err(e) => {
                metrics::counter!(
                    INGEST_VALIDATIONS_TOTAL,
                    LABEL_FORMAT => "unknown",
                    LABEL_RESULT => "failure"
                )
                .increment(1);
                warn!(error = %e, "document validation failed");
            }
        }
        result
    }

    fn validate_parsed(&self, bytes: &[u8]) -> Result<ValidatedDocument, ValidationError> {
        let root = detect::parse_json(bytes)?;
        let detected = detect::detect(&root)?;
        let Some(validator) = self.registry.get(detected.format, &detected.version) else {
            return Err(ValidationError::UnsupportedVersion {
                format: detected.format,
                version: detected.version,
                nearest: self.registry.supported_versions(detected.format),
            });
        };
        validator.validate(&root, self.config.max_violation_paths)
    }

    /// 아티팩트 하나를 수집합니다: 바이트 조회 → 검증 → 정규화 → 저장.
    ///
    /// 정규화는 순수 함수이므로 재수집 시 동일 아티팩트의 메타데이터를
    /// 멱등하게 덮어씁니다.
    pub async fn ingest(
        &self,
        artifact: &ArtifactRef,
    ) -> Result<NormalizedMetadata, SbomgateError> {
        let bytes = self.artifacts.get(&artifact.storage_key).await?;
        let document = self.validate_bytes(&bytes)?;
        let meta = normalize(&document);

        self.metadata.save(&artifact.id, meta.clone()).await?;
        metrics::counter!(
            INGEST_NORMALIZED_TOTAL,
            LABEL_FORMAT => document.format.to_string()
        )
        .increment(1);
        info!(
            artifact = %artifact.id,
            format = %document.format,
            version = %document.version,
            components = meta.component_count(),
            "artifact ingested",
        );
        Ok(meta)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
