//! 저장소 trait — 외부 협력자에 대한 좁은 인터페이스
//!
//! 오케스트레이션 계층이 의존하는 유일한 영속성 표면입니다.
//! 실제 배포에서는 오브젝트 스토리지와 데이터베이스 어댑터가 이 trait들을
//! 구현하고, 테스트에서는 [`memory`] 모듈의 인메모리 구현을 사용합니다.
//!
//! # 원자성 요구사항
//!
//! 여러 워커가 같은 pending 단위를 동시에 claim할 수 있으므로,
//! [`AssessmentStore::claim`]과 상태 전환은 compare-and-set 의미론을
//! 제공해야 합니다. 터미널 레코드 수정 시도는 항상
//! [`StorageError::Conflict`]로 거부됩니다.

pub mod memory;

use std::future::Future;

use crate::assessment::{AssessmentRun, RunState};
use crate::error::StorageError;
use crate::scanjob::{RawScanResult, ScanJob, ScanJobState};
use crate::types::NormalizedMetadata;

// ─── ArtifactStore ───────────────────────────────────────────────────

/// 아티팩트 바이트 저장소
///
/// 오케스트레이션 계층은 원본 바이트를 읽기만 하며, 절대 다시 쓰지 않습니다.
pub trait ArtifactStore: Send + Sync {
    /// 스토리지 키로 아티팩트 바이트를 가져옵니다.
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// 바이트를 저장하고 키를 반환합니다 (업로드 흐름 전용).
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;
}

// ─── MetadataStore ───────────────────────────────────────────────────

/// 정규화 메타데이터 저장소
pub trait MetadataStore: Send + Sync {
    /// 아티팩트의 정규화 메타데이터를 저장합니다.
    ///
    /// 재검증 시 동일 아티팩트에 대해 멱등하게 덮어씁니다 (버전 관리 없음).
    fn save(
        &self,
        artifact_id: &str,
        metadata: NormalizedMetadata,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// 아티팩트의 정규화 메타데이터를 조회합니다.
    fn load(
        &self,
        artifact_id: &str,
    ) -> impl Future<Output = Result<Option<NormalizedMetadata>, StorageError>> + Send;
}

// ─── AssessmentStore ─────────────────────────────────────────────────

/// [`AssessmentStore::insert_if_no_terminal`]의 결과
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// 새 pending 레코드가 생성됨
    Created(AssessmentRun),
    /// 동일 (artifact, plugin, config hash)의 레코드가 이미 존재함
    ///
    /// 터미널이면 멱등 재트리거로 간주하여 건너뛰고, 비터미널이면
    /// 중복 큐잉 대신 기존 레코드로 합류(coalesce)합니다.
    Existing(AssessmentRun),
}

/// 평가 실행 레코드 저장소
pub trait AssessmentStore: Send + Sync {
    /// 동일 config hash의 레코드가 없을 때만 새 pending 레코드를
    /// 원자적으로 삽입합니다.
    fn insert_if_no_terminal(
        &self,
        artifact_id: &str,
        plugin_key: &str,
        config_hash: &str,
    ) -> impl Future<Output = Result<InsertOutcome, StorageError>> + Send;

    /// `Pending → Running` compare-and-set. 경합에서 진 워커는 `false`를
    /// 받고 합류합니다.
    fn claim(&self, run_id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// 상태 전환을 기록합니다.
    ///
    /// 허용되지 않는 전환(터미널 레코드 수정 포함)은
    /// [`StorageError::Conflict`]로 거부됩니다.
    /// `Running → Pending` 전환은 재시도로 간주하여 `attempts`를 1
    /// 증가시킵니다.
    fn transition(
        &self,
        run_id: &str,
        to: RunState,
        detail: &str,
    ) -> impl Future<Output = Result<AssessmentRun, StorageError>> + Send;

    /// 실행 ID로 레코드를 조회합니다.
    fn get(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Option<AssessmentRun>, StorageError>> + Send;

    /// (artifact, plugin, config hash)의 최신 레코드를 조회합니다.
    fn find(
        &self,
        artifact_id: &str,
        plugin_key: &str,
        config_hash: &str,
    ) -> impl Future<Output = Result<Option<AssessmentRun>, StorageError>> + Send;

    /// 아티팩트의 전체 실행 이력을 생성순으로 반환합니다.
    fn history(
        &self,
        artifact_id: &str,
    ) -> impl Future<Output = Result<Vec<AssessmentRun>, StorageError>> + Send;
}

// ─── ScanJobStore ────────────────────────────────────────────────────

/// 스캔 잡 레코드 저장소
pub trait ScanJobStore: Send + Sync {
    /// 새 잡 레코드를 삽입합니다. 동일 ID가 이미 있으면 거부합니다.
    fn insert(&self, job: ScanJob) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// 잡 ID로 레코드를 조회합니다.
    fn get(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<Option<ScanJob>, StorageError>> + Send;

    /// `Queued → Submitted` 전환과 함께 백엔드 핸들을 기록합니다.
    fn mark_submitted(
        &self,
        job_id: &str,
        handle: &str,
    ) -> impl Future<Output = Result<ScanJob, StorageError>> + Send;

    /// `Submitted → Processing` 전환을 기록합니다.
    fn mark_processing(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<ScanJob, StorageError>> + Send;

    /// 잡을 완료 처리하고 원시 결과를 보관합니다.
    fn complete(
        &self,
        job_id: &str,
        raw: RawScanResult,
    ) -> impl Future<Output = Result<ScanJob, StorageError>> + Send;

    /// 잡을 실패 처리합니다 (백엔드 오류, 수명 초과).
    fn fail(
        &self,
        job_id: &str,
        reason: &str,
    ) -> impl Future<Output = Result<ScanJob, StorageError>> + Send;

    /// 잡을 새 잡으로 대체 처리합니다.
    ///
    /// 전환 직전의 상태를 함께 반환합니다. 호출자는 백엔드 슬롯 해제
    /// 여부를 이 상태로 판단해야 합니다 — 잡 목록 조회 시점의 스냅샷은
    /// 전환 시점에는 이미 낡았을 수 있습니다 (`Queued → Submitted`가
    /// 끼어드는 경합).
    fn supersede(
        &self,
        job_id: &str,
        reason: &str,
    ) -> impl Future<Output = Result<(ScanJob, ScanJobState), StorageError>> + Send;

    /// 아티팩트의 비터미널 잡을 모두 반환합니다.
    fn active_for_artifact(
        &self,
        artifact_id: &str,
    ) -> impl Future<Output = Result<Vec<ScanJob>, StorageError>> + Send;

    /// 폴링 대상(`Submitted`/`Processing`) 잡을 모두 반환합니다.
    fn pending_poll(&self) -> impl Future<Output = Result<Vec<ScanJob>, StorageError>> + Send;
}
