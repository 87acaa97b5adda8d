//! 스캔 디스패처 — 잡 수명주기와 용량 보존
//!
//! 디스패치는 같은 아티팩트의 활성 잡을 먼저 supersede한 뒤 백엔드를
//! 선택해 제출합니다. 백엔드 슬롯은 선택 시 점유되고, 잡의 터미널 전환
//! 성공에 정확히 한 번 결합되어 해제됩니다 — 전환이 거부되면 해제하지
//! 않습니다 (다른 워커가 이미 종결한 잡의 슬롯은 그 워커가 해제).

use tracing::{debug, info, warn};

use sbomgate_core::config::ScanPoolConfig;
use sbomgate_core::error::{SbomgateError, ScanError};
use sbomgate_core::metrics::{
    LABEL_BACKEND, SCAN_DISPATCHES_TOTAL, SCAN_FINDINGS_TOTAL, SCAN_IN_FLIGHT,
    SCAN_NO_CAPACITY_TOTAL,
};
use sbomgate_core::scanjob::{ScanJob, ScanJobState};
use sbomgate_core::store::ScanJobStore;
use sbomgate_core::types::{ArtifactRef, SbomFormat};

use crate::adapter::{PollStatus, ScannerAdapter};
use crate::backend::BackendTier;
use crate::pool::ScannerPool;

/// 스캔 디스패처
pub struct ScanDispatcher<J, Ad> {
    pool: ScannerPool,
    adapter: Ad,
    jobs: J,
    config: ScanPoolConfig,
}

impl<J, Ad> ScanDispatcher<J, Ad>
where
    J: ScanJobStore,
    Ad: ScannerAdapter,
{
    /// 디스패처를 생성합니다.
    pub fn new(pool: ScannerPool, adapter: Ad, jobs: J, config: ScanPoolConfig) -> Self {
        Self {
            pool,
            adapter,
            jobs,
            config,
        }
    }

    /// 백엔드 풀 참조를 반환합니다.
    pub fn pool(&self) -> &ScannerPool {
        &self.pool
    }

    /// 잡 저장소 참조를 반환합니다.
    pub fn jobs(&self) -> &J {
        &self.jobs
    }

    /// 아티팩트 하나를 스캔 디스패치합니다.
    ///
    /// 같은 아티팩트의 활성 잡은 새 잡으로 대체됩니다 — 재업로드된
    /// 문서에 대한 오래된 결과가 완료로 보고되는 것을 막습니다.
    /// 용량 부족은 [`ScanError::NoCapacity`]로 즉시 반환되며 다른
    /// 티어로 우회하지 않습니다.
    pub async fn dispatch(
        &self,
        artifact: &ArtifactRef,
        format: SbomFormat,
        tier: BackendTier,
    ) -> Result<ScanJob, SbomgateError> {
        self.supersede_active(&artifact.id).await?;

        let backend = match self.pool.select(tier, format, self.config.health_freshness_secs) {
            Ok(backend) => backend,
            Err(ScanError::NoCapacity) => {
                metrics::counter!(SCAN_NO_CAPACITY_TOTAL).increment(1);
                warn!(artifact = %artifact.id, tier = %tier, "no backend capacity");
                return Err(ScanError::NoCapacity.into());
            }
            Err(e) => return Err(e.into()),
        };

        let job = ScanJob::new_queued(&artifact.id, &backend.id);
        let job_id = job.id.clone();
        if let Err(e) = self.jobs.insert(job).await {
            backend.release();
            return Err(e.into());
        }

        match self.adapter.submit(&backend.id, artifact).await {
            Ok(handle) => {
                let submitted = match self.jobs.mark_submitted(&job_id, &handle).await {
                    Ok(job) => job,
                    Err(e) => {
                        backend.release();
                        return Err(e.into());
                    }
                };
                metrics::counter!(SCAN_DISPATCHES_TOTAL, LABEL_BACKEND => backend.id.clone())
                    .increment(1);
                self.update_in_flight_gauge(&backend.id);
                info!(
                    job = %job_id,
                    artifact = %artifact.id,
                    backend = %backend.id,
                    "scan job dispatched",
                );
                Ok(submitted)
            }
            Err(e) => {
                // 제출 실패 — 잡 종결과 함께 슬롯 반환
                backend.release();
                self.update_in_flight_gauge(&backend.id);
                let reason = format!("submit failed: {e}");
                if let Err(store_err) = self.jobs.fail(&job_id, &reason).await {
                    warn!(job = %job_id, error = %store_err, "failed to record submit failure");
                }
                Err(e.into())
            }
        }
    }

    /// submitted/processing 잡들을 한 바퀴 폴링합니다.
    ///
    /// 수명을 초과한 잡은 timeout 사유로 failed 처리됩니다. 폴링 자체의
    /// 일시적 실패는 잡 상태를 바꾸지 않습니다 — 다음 바퀴에 다시
    /// 시도합니다.
    pub async fn poll_pending(&self) -> Result<(), SbomgateError> {
        for job in self.jobs.pending_poll().await? {
            if let Err(e) = self.poll_job(&job).await {
                warn!(job = %job.id, error = %e, "job poll failed, will retry");
            }
        }
        Ok(())
    }

    async fn poll_job(&self, job: &ScanJob) -> Result<(), SbomgateError> {
        if job.age_secs() > self.config.max_job_age_secs {
            let reason = ScanError::JobTimeout {
                job_id: job.id.clone(),
                age_secs: job.age_secs(),
            }
            .to_string();
            if self.jobs.fail(&job.id, &reason).await.is_ok() {
                self.release_slot(&job.backend_id);
                info!(job = %job.id, "scan job timed out");
            }
            return Ok(());
        }

        let Some(handle) = job.handle.as_deref() else {
            // submitted 잡에 핸들이 없으면 복구 불가
            if self.jobs.fail(&job.id, "missing backend handle").await.is_ok() {
                self.release_slot(&job.backend_id);
            }
            return Ok(());
        };

        match self.adapter.poll(&job.backend_id, handle).await? {
            PollStatus::Pending => {}
            PollStatus::Processing => {
                if job.state == ScanJobState::Submitted {
                    // 전환 거부는 다른 워커의 선행 종결 — 무시
                    let _ = self.jobs.mark_processing(&job.id).await;
                }
            }
            PollStatus::Completed(raw) => {
                let finding_count = raw.findings.len();
                if self.jobs.complete(&job.id, raw).await.is_ok() {
                    self.release_slot(&job.backend_id);
                    metrics::counter!(
                        SCAN_FINDINGS_TOTAL,
                        LABEL_BACKEND => job.backend_id.clone()
                    )
                    .increment(finding_count as u64);
                    info!(job = %job.id, findings = finding_count, "scan job completed");
                }
            }
            PollStatus::Failed(reason) => {
                if self.jobs.fail(&job.id, &reason).await.is_ok() {
                    self.release_slot(&job.backend_id);
                    info!(job = %job.id, reason = %reason, "scan job failed at backend");
                }
            }
        }
        Ok(())
    }

    async fn supersede_active(&self, artifact_id: &str) -> Result<(), SbomgateError> {
        for stale in self.jobs.active_for_artifact(artifact_id).await? {
            match self
                .jobs
                .supersede(&stale.id, "replaced by newer dispatch")
                .await
            {
                // 슬롯 해제는 조회 시점 스냅샷이 아니라 전환이 실제로
                // 대체한 상태로 판단 — queued로 보이던 잡이 대체 직전에
                // 제출되었을 수 있음
                Ok((_, replaced)) => {
                    if replaced.holds_capacity() {
                        self.release_slot(&stale.backend_id);
                    }
                    debug!(job = %stale.id, artifact = %artifact_id, "stale job superseded");
                }
                // 경합으로 이미 종결된 잡 — 종결한 쪽이 슬롯을 해제함
                Err(e) => debug!(job = %stale.id, error = %e, "supersede skipped"),
            }
        }
        Ok(())
    }

    fn release_slot(&self, backend_id: &str) {
        if let Some(backend) = self.pool.get(backend_id) {
            backend.release();
        }
        self.update_in_flight_gauge(backend_id);
    }

    fn update_in_flight_gauge(&self, backend_id: &str) {
        if let Some(backend) = self.pool.get(backend_id) {
            metrics::gauge!(SCAN_IN_FLIGHT, LABEL_BACKEND => backend.id.clone())
                .set(f64::from(backend.in_flight()));
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, SystemTime};

    use sbomgate_core::scanjob::{RawFinding, RawScanResult};
    use sbomgate_core::store::memory::MemoryScanJobStore;

    use crate::backend::ScannerBackend;

    #[derive(Default)]
    struct MockAdapter {
        submit_counter: AtomicU32,
        fail_submit: bool,
        poll_script: Mutex<VecDeque<PollStatus>>,
    }

    impl MockAdapter {
        fn scripted(polls: Vec<PollStatus>) -> Self {
            Self {
                poll_script: Mutex::new(polls.into()),
                ..Self::default()
            }
        }

        fn failing_submit() -> Self {
            Self {
                fail_submit: true,
                ..Self::default()
            }
        }
    }

    impl ScannerAdapter for MockAdapter {
        async fn submit(
            &self,
            backend_id: &str,
            _artifact: &ArtifactRef,
        ) -> Result<String, ScanError> {
            if self.fail_submit {
                return Err(ScanError::Backend {
                    name: backend_id.to_owned(),
                    reason: "connection refused".to_owned(),
                });
            }
            let n = self.submit_counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("h-{n}"))
        }

        async fn poll(&self, _backend_id: &str, _handle: &str) -> Result<PollStatus, ScanError> {
            let mut script = self.poll_script.lock().unwrap();
            Ok(script.pop_front().unwrap_or(PollStatus::Pending))
        }
    }

    fn artifact(id: &str) -> ArtifactRef {
        ArtifactRef {
            id: id.to_owned(),
            content_hash: "deadbeef".to_owned(),
            storage_key: format!("sbom/{id}.json"),
            size: 64,
        }
    }

    fn pool_with(backends: Vec<ScannerBackend>) -> ScannerPool {
        let mut pool = ScannerPool::new();
        for b in backends {
            b.record_healthy();
            pool.register(b).unwrap();
        }
        pool
    }

    fn dispatcher(
        pool: ScannerPool,
        adapter: MockAdapter,
    ) -> ScanDispatcher<MemoryScanJobStore, MockAdapter> {
        ScanDispatcher::new(
            pool,
            adapter,
            MemoryScanJobStore::new(),
            ScanPoolConfig::default(),
        )
    }

    fn raw_result(backend: &str, count: usize) -> RawScanResult {
        RawScanResult {
            backend_name: backend.to_owned(),
            findings: (0..count)
                .map(|i| RawFinding {
                    id: format!("CVE-2026-{i:04}"),
                    aliases: vec![],
                    severity_label: Some("high".to_owned()),
                    score: None,
                    package: "pkg".to_owned(),
                    version: "1.0".to_owned(),
                    ecosystem: "cargo".to_owned(),
                    references: vec![],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn dispatch_then_complete_conserves_capacity() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            2,
        )]);
        let adapter = MockAdapter::scripted(vec![
            PollStatus::Processing,
            PollStatus::Completed(raw_result("dedicated-one", 3)),
        ]);
        let d = dispatcher(pool, adapter);

        let job = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();
        assert_eq!(job.state, ScanJobState::Submitted);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);

        // processing 전환
        d.poll_pending().await.unwrap();
        let job = d.jobs().get(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, ScanJobState::Processing);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);

        // 완료 — 슬롯 반환
        d.poll_pending().await.unwrap();
        let job = d.jobs().get(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, ScanJobState::Completed);
        assert_eq!(job.raw_result.as_ref().unwrap().findings.len(), 3);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 0);
    }

    #[tokio::test]
    async fn redispatch_supersedes_and_releases_previous_slot() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            1, // 슬롯 1개 — 대체 시 해제가 없으면 두 번째 디스패치가 불가능
        )]);
        let d = dispatcher(pool, MockAdapter::default());

        let first = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();
        let second = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();

        let first = d.jobs().get(&first.id).await.unwrap().unwrap();
        assert_eq!(first.state, ScanJobState::Superseded);
        assert_eq!(second.state, ScanJobState::Submitted);
        // 활성 잡은 1개, 슬롯도 1개 점유
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);
        assert_eq!(d.jobs().pending_poll().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_capacity_fails_fast_without_fallback() {
        let pool = pool_with(vec![
            ScannerBackend::new("ded-1", "dedicated-one", BackendTier::Dedicated, 10, 1),
            ScannerBackend::new("free-1", "free-one", BackendTier::Free, 0, 10),
        ]);
        let d = dispatcher(pool, MockAdapter::default());

        d.dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();
        let err = d
            .dispatch(&artifact("art-2"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SbomgateError::Scan(ScanError::NoCapacity)
        ));
        // free 백엔드로 우회하지 않음
        assert_eq!(d.pool().get("free-1").unwrap().in_flight(), 0);
        // art-2의 잡 레코드도 만들어지지 않음
        assert!(d.jobs().active_for_artifact("art-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_failure_fails_job_and_releases_slot() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            1,
        )]);
        let d = dispatcher(pool, MockAdapter::failing_submit());

        let err = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap_err();
        assert!(matches!(err, SbomgateError::Scan(ScanError::Backend { .. })));
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 0);

        let jobs = d.jobs().active_for_artifact("art-1").await.unwrap();
        assert!(jobs.is_empty(), "failed job must be terminal");
    }

    #[tokio::test]
    async fn overaged_job_failed_with_timeout_reason() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            1,
        )]);
        let d = dispatcher(pool, MockAdapter::default());

        // 수명을 초과한 submitted 잡을 직접 구성
        let mut job = ScanJob::new_queued("art-1", "ded-1");
        job.created_at = SystemTime::now() - Duration::from_secs(7200);
        let job_id = job.id.clone();
        d.jobs().insert(job).await.unwrap();
        d.jobs().mark_submitted(&job_id, "h-old").await.unwrap();
        assert!(d.pool().get("ded-1").unwrap().try_acquire());

        d.poll_pending().await.unwrap();

        let job = d.jobs().get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, ScanJobState::Failed);
        assert!(job.reason.as_ref().unwrap().contains("exceeded max age"));
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 0);
    }

    /// 조회는 내부 저장소에 위임하되, 첫 목록 조회 직후 queued 잡을
    /// submitted로 승격시키고 낡은 스냅샷을 그대로 돌려주는 저장소.
    /// 다른 디스패치 워커가 목록 조회와 대체 사이에 제출을 끝내는
    /// 인터리빙을 재현합니다.
    struct StaleListingStore {
        inner: MemoryScanJobStore,
        promoted: std::sync::atomic::AtomicBool,
    }

    impl StaleListingStore {
        fn new() -> Self {
            Self {
                inner: MemoryScanJobStore::new(),
                promoted: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl sbomgate_core::store::ScanJobStore for StaleListingStore {
        async fn insert(&self, job: ScanJob) -> Result<(), sbomgate_core::error::StorageError> {
            self.inner.insert(job).await
        }

        async fn get(
            &self,
            job_id: &str,
        ) -> Result<Option<ScanJob>, sbomgate_core::error::StorageError> {
            self.inner.get(job_id).await
        }

        async fn mark_submitted(
            &self,
            job_id: &str,
            handle: &str,
        ) -> Result<ScanJob, sbomgate_core::error::StorageError> {
            self.inner.mark_submitted(job_id, handle).await
        }

        async fn mark_processing(
            &self,
            job_id: &str,
        ) -> Result<ScanJob, sbomgate_core::error::StorageError> {
            self.inner.mark_processing(job_id).await
        }

        async fn complete(
            &self,
            job_id: &str,
            raw: RawScanResult,
        ) -> Result<ScanJob, sbomgate_core::error::StorageError> {
            self.inner.complete(job_id, raw).await
        }

        async fn fail(
            &self,
            job_id: &str,
            reason: &str,
        ) -> Result<ScanJob, sbomgate_core::error::StorageError> {
            self.inner.fail(job_id, reason).await
        }

        async fn supersede(
            &self,
            job_id: &str,
            reason: &str,
        ) -> Result<(ScanJob, sbomgate_core::scanjob::ScanJobState), sbomgate_core::error::StorageError>
        {
            self.inner.supersede(job_id, reason).await
        }

        async fn active_for_artifact(
            &self,
            artifact_id: &str,
        ) -> Result<Vec<ScanJob>, sbomgate_core::error::StorageError> {
            let snapshot = self.inner.active_for_artifact(artifact_id).await?;
            if !self.promoted.swap(true, Ordering::SeqCst)
                && let Some(queued) = snapshot.iter().find(|j| j.state == ScanJobState::Queued)
            {
                // 경쟁 워커가 제출을 끝냄 — 호출자는 여전히 queued로 봄
                self.inner.mark_submitted(&queued.id, "h-race").await?;
            }
            Ok(snapshot)
        }

        async fn pending_poll(&self) -> Result<Vec<ScanJob>, sbomgate_core::error::StorageError> {
            self.inner.pending_poll().await
        }
    }

    #[tokio::test]
    async fn supersede_after_concurrent_submit_still_releases_slot() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            2,
        )]);
        let d = ScanDispatcher::new(
            pool,
            MockAdapter::default(),
            StaleListingStore::new(),
            ScanPoolConfig::default(),
        );

        // 경쟁 워커의 잡: 슬롯을 쥔 채 queued (제출은 목록 조회 직후 완료됨)
        let racing = ScanJob::new_queued("art-1", "ded-1");
        let racing_id = racing.id.clone();
        d.jobs().insert(racing).await.unwrap();
        assert!(d.pool().get("ded-1").unwrap().try_acquire());

        let job = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();

        let racing = d.jobs().get(&racing_id).await.unwrap().unwrap();
        assert_eq!(racing.state, ScanJobState::Superseded);
        assert_eq!(job.state, ScanJobState::Submitted);
        // 용량 보존: in_flight == 용량 점유 상태의 잡 수 (새 잡 1개)
        assert_eq!(d.jobs().pending_poll().await.unwrap().len(), 1);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);
    }

    #[tokio::test]
    async fn concurrent_dispatches_conserve_capacity() {
        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            2,
        )]);
        let d = std::sync::Arc::new(ScanDispatcher::new(
            pool,
            MockAdapter::default(),
            MemoryScanJobStore::new(),
            ScanPoolConfig::default(),
        ));

        let a = tokio::spawn({
            let d = d.clone();
            async move {
                d.dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
                    .await
            }
        });
        let b = tokio::spawn({
            let d = d.clone();
            async move {
                d.dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
                    .await
            }
        });
        let (a, b) = tokio::join!(a, b);
        // 한쪽은 상대 워커의 대체에 밀려 실패할 수 있지만, 최소 한쪽은 성공
        let results = [a.unwrap(), b.unwrap()];
        assert!(results.iter().any(|r| r.is_ok()));

        // 어떤 인터리빙이든 in_flight는 용량 점유 잡 수와 일치해야 함
        let holding = d.jobs().pending_poll().await.unwrap().len();
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), holding as u32);

        // 다음 디스패치가 남은 활성 잡을 모두 대체하면 정확히 1개만 남음
        d.dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();
        assert_eq!(d.jobs().pending_poll().await.unwrap().len(), 1);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);
    }

    #[tokio::test]
    async fn transient_poll_error_keeps_job_active() {
        struct ErrAdapter;
        impl ScannerAdapter for ErrAdapter {
            async fn submit(
                &self,
                _backend_id: &str,
                _artifact: &ArtifactRef,
            ) -> Result<String, ScanError> {
                Ok("h-1".to_owned())
            }
            async fn poll(
                &self,
                backend_id: &str,
                _handle: &str,
            ) -> Result<PollStatus, ScanError> {
                Err(ScanError::Backend {
                    name: backend_id.to_owned(),
                    reason: "timeout".to_owned(),
                })
            }
        }

        let pool = pool_with(vec![ScannerBackend::new(
            "ded-1",
            "dedicated-one",
            BackendTier::Dedicated,
            10,
            1,
        )]);
        let d = ScanDispatcher::new(
            pool,
            ErrAdapter,
            MemoryScanJobStore::new(),
            ScanPoolConfig::default(),
        );

        let job = d
            .dispatch(&artifact("art-1"), SbomFormat::CycloneDx, BackendTier::Dedicated)
            .await
            .unwrap();
        d.poll_pending().await.unwrap();

        // 일시적 폴링 실패는 잡을 종결하지 않음
        let job = d.jobs().get(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, ScanJobState::Submitted);
        assert_eq!(d.pool().get("ded-1").unwrap().in_flight(), 1);
    }
}
