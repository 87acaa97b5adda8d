//! 평가 오케스트레이터 — 트리거, 의존성 게이트, 재시도 정책
//!
//! 아티팩트 하나에 대해 등록된 플러그인들을 의존성 순서로 실행합니다.
//! 실행 레코드는 (artifact, plugin, config hash)별로 멱등하게 생성되며,
//! 터미널 레코드는 재트리거에도 다시 실행되지 않습니다. 설정이나
//! 플러그인 버전이 바뀌면 hash가 달라져 새 레코드가 생깁니다.
//!
//! 여러 워커가 같은 cycle을 동시에 돌 수 있습니다 — pending 레코드의
//! claim(compare-and-set)이 단일 실행을 보장합니다.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use sbomgate_core::config::AssessConfig;
use sbomgate_core::error::{AssessError, SbomgateError};
use sbomgate_core::metrics::{ASSESS_RETRIES_TOTAL, ASSESS_RUNS_TOTAL, LABEL_PLUGIN, LABEL_STATE};
use sbomgate_core::store::{ArtifactStore, AssessmentStore, InsertOutcome, MetadataStore};
use sbomgate_core::types::ArtifactRef;
use sbomgate_core::{AssessmentRun, RunState};

use crate::plugin::{AssessOutcome, AssessmentPlugin, PluginRegistry};
use crate::runner::PluginRunner;

/// 플러그인 실행의 config hash를 계산합니다.
///
/// 플러그인 키, 구현 버전, 설정 JSON을 함께 해시합니다 — 어느 하나가
/// 바뀌면 기존 터미널 레코드를 덮지 않고 새 실행이 생깁니다.
pub fn config_hash(plugin: &Arc<dyn AssessmentPlugin>) -> String {
    let descriptor = plugin.descriptor();
    let mut hasher = Sha256::new();
    hasher.update(descriptor.key.as_bytes());
    hasher.update(b"\n");
    hasher.update(descriptor.version.as_bytes());
    hasher.update(b"\n");
    hasher.update(plugin.config().to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// 평가 오케스트레이터
pub struct AssessOrchestrator<S, A, M> {
    registry: PluginRegistry,
    runner: PluginRunner<A>,
    config: AssessConfig,
    runs: S,
    metadata: M,
}

impl<S, A, M> AssessOrchestrator<S, A, M>
where
    S: AssessmentStore,
    A: ArtifactStore,
    M: MetadataStore,
{
    /// 오케스트레이터를 생성합니다.
    pub fn new(registry: PluginRegistry, config: AssessConfig, artifacts: A, runs: S, metadata: M) -> Self {
        Self {
            registry,
            runner: PluginRunner::new(config.clone(), artifacts),
            config,
            runs,
            metadata,
        }
    }

    /// 실행 레코드 저장소 참조를 반환합니다.
    pub fn runs(&self) -> &S {
        &self.runs
    }

    /// 아티팩트에 대해 모든 플러그인의 실행 레코드를 트리거합니다.
    ///
    /// 레코드 생성만 하며 실행하지 않습니다. 동일 hash의 레코드가 이미
    /// 있으면 (터미널이든 아니든) 그 레코드로 합류합니다.
    pub async fn trigger(&self, artifact_id: &str) -> Result<Vec<AssessmentRun>, SbomgateError> {
        let order = self.registry.topo_order()?;
        let mut runs = Vec::with_capacity(order.len());
        for key in &order {
            let plugin = self.plugin(key)?;
            let hash = config_hash(plugin);
            let outcome = self
                .runs
                .insert_if_no_terminal(artifact_id, key, &hash)
                .await?;
            match outcome {
                InsertOutcome::Created(run) => {
                    debug!(artifact = artifact_id, plugin = %key, "assessment run created");
                    runs.push(run);
                }
                InsertOutcome::Existing(run) => {
                    debug!(artifact = artifact_id, plugin = %key, state = %run.state, "assessment run coalesced");
                    runs.push(run);
                }
            }
        }
        Ok(runs)
    }

    /// pending 실행들을 의존성 순서로 한 바퀴 처리합니다.
    ///
    /// 플러그인 하나의 실패는 그 실행 레코드에만 기록되고 나머지 처리는
    /// 계속됩니다. 의존성이 아직 비터미널이면 해당 실행은 pending으로
    /// 남아 다음 cycle을 기다립니다.
    pub async fn run_cycle(&self, artifact: &ArtifactRef) -> Result<(), SbomgateError> {
        let order = self.registry.topo_order()?;
        for key in &order {
            if let Err(e) = self.process_plugin(artifact, key).await {
                warn!(artifact = %artifact.id, plugin = %key, error = %e, "plugin processing failed");
            }
        }
        Ok(())
    }

    async fn process_plugin(
        &self,
        artifact: &ArtifactRef,
        key: &str,
    ) -> Result<(), SbomgateError> {
        let plugin = self.plugin(key)?;
        let hash = config_hash(plugin);
        let Some(run) = self.runs.find(&artifact.id, key, &hash).await? else {
            return Ok(()); // 트리거되지 않음
        };
        if run.is_terminal() {
            return Ok(());
        }

        // 의존성 게이트: 모든 의존성이 터미널 pass여야 실행
        for dep_key in &plugin.descriptor().depends_on {
            let dep_plugin = self.plugin(dep_key)?;
            let dep_hash = config_hash(dep_plugin);
            let dep_run = self.runs.find(&artifact.id, dep_key, &dep_hash).await?;
            match dep_run {
                Some(dep) if dep.state == RunState::Pass => {}
                Some(dep) if dep.is_terminal() => {
                    // 의존성이 fail/error로 종결 — 이 실행도 터미널 error
                    if self.runs.claim(&run.id).await? {
                        let detail =
                            format!("dependency {dep_key} finished {} without passing", dep.state);
                        self.finish(&run, RunState::Error, &detail).await?;
                    }
                    return Ok(());
                }
                _ => {
                    debug!(plugin = %key, dependency = %dep_key, "dependency not terminal, holding");
                    return Ok(());
                }
            }
        }

        if !self.runs.claim(&run.id).await? {
            return Ok(()); // 다른 워커가 실행 중
        }

        let Some(metadata) = self.metadata.load(&artifact.id).await? else {
            self.finish(&run, RunState::Error, "normalized metadata missing")
                .await?;
            return Ok(());
        };

        let outcome = self.runner.run(plugin.clone(), artifact, metadata).await;
        match outcome {
            AssessOutcome::Pass { summary } => {
                self.finish(&run, RunState::Pass, &summary).await?;
            }
            AssessOutcome::Fail { reason } => {
                self.finish(&run, RunState::Fail, &reason).await?;
            }
            AssessOutcome::Error { reason } => {
                self.finish(&run, RunState::Error, &reason).await?;
            }
            AssessOutcome::RetryLater { reason } => {
                if run.attempts >= self.config.max_retries {
                    let detail = AssessError::RetryExhausted {
                        plugin: key.to_owned(),
                        attempts: run.attempts,
                    }
                    .to_string();
                    self.finish(&run, RunState::Error, &detail).await?;
                } else {
                    metrics::counter!(ASSESS_RETRIES_TOTAL, LABEL_PLUGIN => key.to_owned())
                        .increment(1);
                    info!(plugin = %key, attempts = run.attempts + 1, reason = %reason, "run requeued");
                    self.runs
                        .transition(&run.id, RunState::Pending, &reason)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn finish(
        &self,
        run: &AssessmentRun,
        state: RunState,
        detail: &str,
    ) -> Result<(), SbomgateError> {
        self.runs.transition(&run.id, state, detail).await?;
        metrics::counter!(
            ASSESS_RUNS_TOTAL,
            LABEL_PLUGIN => run.plugin_key.clone(),
            LABEL_STATE => state.to_string()
        )
        .increment(1);
        info!(
            run = %run.id,
            plugin = %run.plugin_key,
            state = %state,
            "assessment run finished",
        );
        Ok(())
    }

    fn plugin(&self, key: &str) -> Result<&Arc<dyn AssessmentPlugin>, AssessError> {
        self.registry.get(key).ok_or_else(|| AssessError::UnknownPlugin {
            key: key.to_owned(),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
