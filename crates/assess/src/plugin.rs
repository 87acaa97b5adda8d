//! 평가 플러그인 trait 및 레지스트리
//!
//! 플러그인은 검증된 아티팩트 하나를 받아 통과/불통과 판정을 내리는
//! 단위입니다. 플러그인은 자신의 실행 레코드를 알지 못하며, 재시도
//! 여부는 [`AssessOutcome::RetryLater`] 신호로만 표현합니다 — 재시도
//! 정책(한도, 큐잉)은 오케스트레이터가 소유합니다.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use sbomgate_core::error::AssessError;
use sbomgate_core::types::{ArtifactRef, NormalizedMetadata};

/// dyn 플러그인용 박스 퓨처 별칭
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// ─── PluginDescriptor ────────────────────────────────────────────────

/// 플러그인 식별 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// 고유 키 (예: `"license-check"`)
    pub key: String,
    /// 사람이 읽는 이름
    pub name: String,
    /// 플러그인 구현 버전 — config hash에 포함되어 구현 변경 시 재평가 유발
    pub version: String,
    /// 먼저 통과해야 하는 플러그인 키 목록
    pub depends_on: Vec<String>,
}

// ─── AssessOutcome ───────────────────────────────────────────────────

/// 평가 실행 결과
///
/// `RetryLater`는 에러가 아니라 일시적 조건의 신호입니다 (외부 데이터
/// 소스 미준비 등). 한도 초과 시 오케스트레이터가 터미널 error로
/// 전환합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessOutcome {
    /// 평가 통과
    Pass { summary: String },
    /// 평가 불통과 (정책 위반 등 — 플러그인의 정상적 판정)
    Fail { reason: String },
    /// 실행 오류 (플러그인이 판정을 내릴 수 없음)
    Error { reason: String },
    /// 일시적 조건 — 나중에 다시 시도
    RetryLater { reason: String },
}

// ─── AssessContext ───────────────────────────────────────────────────

/// 플러그인에 전달되는 실행 컨텍스트
///
/// 아티팩트 바이트는 `artifact_path`의 임시 파일로 제공되며, 파일
/// 수명은 러너가 소유합니다 — 플러그인은 실행 중에만 읽을 수 있습니다.
#[derive(Debug, Clone)]
pub struct AssessContext {
    /// 대상 아티팩트 참조
    pub artifact: ArtifactRef,
    /// 정규화 메타데이터
    pub metadata: NormalizedMetadata,
    /// 아티팩트 바이트가 준비된 임시 파일 경로
    pub artifact_path: PathBuf,
}

// ─── AssessmentPlugin trait ──────────────────────────────────────────

/// 평가 플러그인
///
/// 레지스트리에 `Arc<dyn AssessmentPlugin>`으로 담기므로 퓨처는
/// 박스 형태로 반환합니다.
pub trait AssessmentPlugin: Send + Sync {
    /// 플러그인 식별 정보를 반환합니다.
    fn descriptor(&self) -> &PluginDescriptor;

    /// 플러그인 설정의 JSON 표현을 반환합니다.
    ///
    /// 이 값은 descriptor 버전과 함께 config hash에 들어가며, 변경 시
    /// 기존 터미널 레코드를 덮지 않고 새 실행을 만듭니다.
    fn config(&self) -> Value {
        Value::Null
    }

    /// 아티팩트 하나를 평가합니다.
    fn assess(&self, ctx: AssessContext) -> BoxFuture<AssessOutcome>;
}

// ─── PluginRegistry ──────────────────────────────────────────────────

/// 플러그인 레지스트리
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn AssessmentPlugin>>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인을 등록합니다. 동일 키가 이미 있으면 거부합니다.
    pub fn register(&mut self, plugin: Arc<dyn AssessmentPlugin>) -> Result<(), AssessError> {
        let key = plugin.descriptor().key.clone();
        if self.plugins.contains_key(&key) {
            return Err(AssessError::AlreadyRegistered { key });
        }
        self.plugins.insert(key, plugin);
        Ok(())
    }

    /// 키로 플러그인을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&Arc<dyn AssessmentPlugin>> {
        self.plugins.get(key)
    }

    /// 등록된 플러그인 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 의존성 그래프의 위상 정렬 순서로 플러그인 키를 반환합니다.
    ///
    /// 의존성이 먼저 나옵니다. 미등록 키 참조는
    /// [`AssessError::UnknownPlugin`], 순환은
    /// [`AssessError::DependencyCycle`]로 거부됩니다.
    pub fn topo_order(&self) -> Result<Vec<String>, AssessError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for (key, plugin) in &self.plugins {
            in_degree.entry(key.as_str()).or_insert(0);
            for dep in &plugin.descriptor().depends_on {
                if !self.plugins.contains_key(dep) {
                    return Err(AssessError::UnknownPlugin { key: dep.clone() });
                }
                *in_degree.entry(key.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(key);
            }
        }

        // Kahn: 결정적 순서를 위해 min-heap으로 후보를 꺼냄
        let mut ready: BinaryHeap<Reverse<&str>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| Reverse(*k))
            .collect();

        let mut order = Vec::with_capacity(self.plugins.len());
        while let Some(Reverse(key)) = ready.pop() {
            order.push(key.to_owned());
            for dependent in dependents.get(key).into_iter().flatten() {
                let degree = in_degree
                    .get_mut(dependent)
                    .ok_or_else(|| AssessError::UnknownPlugin {
                        key: (*dependent).to_owned(),
                    })?;
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(*dependent));
                }
            }
        }

        if order.len() != self.plugins.len() {
            let mut remaining: Vec<&str> = self
                .plugins
                .keys()
                .map(String::as_str)
                .filter(|k| !order.iter().any(|o| o == k))
                .collect();
            remaining.sort_unstable();
            return Err(AssessError::DependencyCycle {
                plugins: remaining.join(", "),
            });
        }
        Ok(order)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
