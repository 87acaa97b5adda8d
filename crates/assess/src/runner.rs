//! 플러그인 러너 — 단일 실행의 격리 수행
//!
//! 아티팩트 바이트를 임시 파일로 준비하고, 플러그인을 별도 태스크에서
//! 타임아웃과 함께 실행합니다. 플러그인의 패닉과 타임아웃은 해당 실행의
//! [`AssessOutcome::Error`]로 흡수되며 프로세스나 형제 실행으로 번지지
//! 않습니다.
//!
//! 타임아웃은 러너가 소유합니다 — 플러그인은 자신의 수명을 관리하지
//! 않습니다.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use sbomgate_core::config::AssessConfig;
use sbomgate_core::error::AssessError;
use sbomgate_core::store::ArtifactStore;
use sbomgate_core::types::{ArtifactRef, NormalizedMetadata};

use crate::plugin::{AssessContext, AssessOutcome, AssessmentPlugin};

/// 플러그인 러너
pub struct PluginRunner<A> {
    config: AssessConfig,
    artifacts: A,
}

impl<A> PluginRunner<A>
where
    A: ArtifactStore,
{
    /// 러너를 생성합니다.
    pub fn new(config: AssessConfig, artifacts: A) -> Self {
        Self { config, artifacts }
    }

    /// 아티팩트 저장소 참조를 반환합니다.
    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    /// 플러그인 하나를 실행합니다.
    ///
    /// 인프라 실패(바이트 조회, 임시 파일 준비)와 플러그인 이상 종결
    /// (패닉, 타임아웃)은 모두 [`AssessOutcome::Error`]로 반환됩니다 —
    /// 이 함수는 에러를 던지지 않습니다.
    pub async fn run(
        &self,
        plugin: Arc<dyn AssessmentPlugin>,
        artifact: &ArtifactRef,
        metadata: NormalizedMetadata,
    ) -> AssessOutcome {
        let plugin_key = plugin.descriptor().key.clone();

        let bytes = match self.artifacts.get(&artifact.storage_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AssessOutcome::Error {
                    reason: format!("artifact fetch failed: {e}"),
                };
            }
        };

        // 임시 파일은 러너가 소유 — 실행 종료 시 RAII로 제거
        let temp = match self.write_temp(&bytes) {
            Ok(temp) => temp,
            Err(e) => {
                return AssessOutcome::Error {
                    reason: format!("temp file setup failed: {e}"),
                };
            }
        };

        let ctx = AssessContext {
            artifact: artifact.clone(),
            metadata,
            artifact_path: temp.path().to_path_buf(),
        };
        debug!(plugin = %plugin_key, artifact = %artifact.id, "plugin run started");

        let mut handle = tokio::spawn(async move { plugin.assess(ctx).await });
        let timeout = Duration::from_secs(self.config.plugin_timeout_secs);
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) if join_err.is_panic() => {
                warn!(plugin = %plugin_key, "plugin panicked");
                AssessOutcome::Error {
                    reason: AssessError::PluginPanic {
                        plugin: plugin_key,
                    }
                    .to_string(),
                }
            }
            Ok(Err(join_err)) => AssessOutcome::Error {
                reason: format!("plugin task aborted: {join_err}"),
            },
            Err(_) => {
                handle.abort();
                warn!(plugin = %plugin_key, timeout_secs = self.config.plugin_timeout_secs, "plugin timed out");
                AssessOutcome::Error {
                    reason: AssessError::Timeout {
                        plugin: plugin_key,
                        timeout_secs: self.config.plugin_timeout_secs,
                    }
                    .to_string(),
                }
            }
        }
    }

    fn write_temp(&self, bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sbomgate-").suffix(".json");
        let mut temp = if self.config.work_dir.is_empty() {
            builder.tempfile()?
        } else {
            builder.tempfile_in(&self.config.work_dir)?
        };
        temp.write_all(bytes)?;
        temp.flush()?;
        Ok(temp)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
