//! 인메모리 저장소 구현 — 테스트 및 단일 프로세스 배포용
//!
//! `tokio::sync::Mutex`로 직렬화된 인프로세스 구현입니다.
//! compare-and-set 의미론은 뮤텍스 임계 구역 안에서 상태를 검사한 뒤
//! 변경하는 방식으로 제공됩니다.

use std::collections::HashMap;
use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::assessment::{AssessmentRun, RunState};
use crate::error::StorageError;
use crate::scanjob::{RawScanResult, ScanJob, ScanJobState};
use crate::store::{ArtifactStore, AssessmentStore, InsertOutcome, MetadataStore, ScanJobStore};
use crate::types::NormalizedMetadata;

// ─── MemoryArtifactStore ─────────────────────────────────────────────

/// 인메모리 아티팩트 저장소
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.lock().await;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_owned(),
            })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let mut objects = self.objects.lock().await;
        objects.insert(key.to_owned(), bytes);
        Ok(key.to_owned())
    }
}

// ─── MemoryMetadataStore ─────────────────────────────────────────────

/// 인메모리 정규화 메타데이터 저장소
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<HashMap<String, NormalizedMetadata>>,
}

impl MemoryMetadataStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    async fn save(
        &self,
        artifact_id: &str,
        metadata: NormalizedMetadata,
    ) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        records.insert(artifact_id.to_owned(), metadata);
        Ok(())
    }

    async fn load(&self, artifact_id: &str) -> Result<Option<NormalizedMetadata>, StorageError> {
        let records = self.records.lock().await;
        Ok(records.get(artifact_id).cloned())
    }
}

// ─── MemoryAssessmentStore ───────────────────────────────────────────

/// 인메모리 평가 실행 저장소
#[derive(Default)]
pub struct MemoryAssessmentStore {
    runs: Mutex<Vec<AssessmentRun>>,
}

impl MemoryAssessmentStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssessmentStore for MemoryAssessmentStore {
    async fn insert_if_no_terminal(
        &self,
        artifact_id: &str,
        plugin_key: &str,
        config_hash: &str,
    ) -> Result<InsertOutcome, StorageError> {
        let mut runs = self.runs.lock().await;
        // 동일 키의 기존 레코드가 있으면 그쪽으로 합류 (최신 우선)
        if let Some(existing) = runs
            .iter()
            .rev()
            .find(|r| {
                r.artifact_id == artifact_id
                    && r.plugin_key == plugin_key
                    && r.config_hash == config_hash
            })
            .cloned()
        {
            return Ok(InsertOutcome::Existing(existing));
        }
        let run = AssessmentRun::new_pending(artifact_id, plugin_key, config_hash);
        runs.push(run.clone());
        Ok(InsertOutcome::Created(run))
    }

    async fn claim(&self, run_id: &str) -> Result<bool, StorageError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StorageError::NotFound {
                key: run_id.to_owned(),
            })?;
        if run.state != RunState::Pending {
            return Ok(false);
        }
        run.state = RunState::Running;
        run.updated_at = SystemTime::now();
        Ok(true)
    }

    async fn transition(
        &self,
        run_id: &str,
        to: RunState,
        detail: &str,
    ) -> Result<AssessmentRun, StorageError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StorageError::NotFound {
                key: run_id.to_owned(),
            })?;
        if !run.state.can_transition(to) {
            return Err(StorageError::Conflict {
                reason: format!("run {run_id}: {} -> {to} rejected", run.state),
            });
        }
        if run.state == RunState::Running && to == RunState::Pending {
            run.attempts += 1;
        }
        run.state = to;
        run.detail = detail.to_owned();
        run.updated_at = SystemTime::now();
        Ok(run.clone())
    }

    async fn get(&self, run_id: &str) -> Result<Option<AssessmentRun>, StorageError> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn find(
        &self,
        artifact_id: &str,
        plugin_key: &str,
        config_hash: &str,
    ) -> Result<Option<AssessmentRun>, StorageError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .rev()
            .find(|r| {
                r.artifact_id == artifact_id
                    && r.plugin_key == plugin_key
                    && r.config_hash == config_hash
            })
            .cloned())
    }

    async fn history(&self, artifact_id: &str) -> Result<Vec<AssessmentRun>, StorageError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .filter(|r| r.artifact_id == artifact_id)
            .cloned()
            .collect())
    }
}

// ─── MemoryScanJobStore ──────────────────────────────────────────────

/// 인메모리 스캔 잡 저장소
#[derive(Default)]
pub struct MemoryScanJobStore {
    jobs: Mutex<Vec<ScanJob>>,
}

impl MemoryScanJobStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, job_id: &str, to: ScanJobState, apply: F) -> Result<ScanJob, StorageError>
    where
        F: FnOnce(&mut ScanJob),
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StorageError::NotFound {
                key: job_id.to_owned(),
            })?;
        if !job.state.can_transition(to) {
            return Err(StorageError::Conflict {
                reason: format!("job {job_id}: {} -> {to} rejected", job.state),
            });
        }
        job.state = to;
        job.updated_at = SystemTime::now();
        apply(job);
        Ok(job.clone())
    }
}

impl ScanJobStore for MemoryScanJobStore {
    async fn insert(&self, job: ScanJob) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(StorageError::Conflict {
                reason: format!("job {} already exists", job.id),
            });
        }
        jobs.push(job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StorageError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn mark_submitted(&self, job_id: &str, handle: &str) -> Result<ScanJob, StorageError> {
        self.update(job_id, ScanJobState::Submitted, |job| {
            job.handle = Some(handle.to_owned());
        })
        .await
    }

    async fn mark_processing(&self, job_id: &str) -> Result<ScanJob, StorageError> {
        self.update(job_id, ScanJobState::Processing, |_| {}).await
    }

    async fn complete(&self, job_id: &str, raw: RawScanResult) -> Result<ScanJob, StorageError> {
        self.update(job_id, ScanJobState::Completed, |job| {
            job.raw_result = Some(raw);
        })
        .await
    }

    async fn fail(&self, job_id: &str, reason: &str) -> Result<ScanJob, StorageError> {
        self.update(job_id, ScanJobState::Failed, |job| {
            job.reason = Some(reason.to_owned());
        })
        .await
    }

    async fn supersede(
        &self,
        job_id: &str,
        reason: &str,
    ) -> Result<(ScanJob, ScanJobState), StorageError> {
        // 대체 직전 상태를 잠금 안에서 함께 포착해야 슬롯 해제 판단이
        // 전환과 원자적으로 묶입니다.
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StorageError::NotFound {
                key: job_id.to_owned(),
            })?;
        let replaced = job.state;
        if !replaced.can_transition(ScanJobState::Superseded) {
            return Err(StorageError::Conflict {
                reason: format!("job {job_id}: {replaced} -> superseded rejected"),
            });
        }
        job.state = ScanJobState::Superseded;
        job.reason = Some(reason.to_owned());
        job.updated_at = SystemTime::now();
        Ok((job.clone(), replaced))
    }

    async fn active_for_artifact(&self, artifact_id: &str) -> Result<Vec<ScanJob>, StorageError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .iter()
            .filter(|j| j.artifact_id == artifact_id && !j.is_terminal())
            .cloned()
            .collect())
    }

    async fn pending_poll(&self) -> Result<Vec<ScanJob>, StorageError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .iter()
            .filter(|j| j.state.holds_capacity())
            .cloned()
            .collect())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
