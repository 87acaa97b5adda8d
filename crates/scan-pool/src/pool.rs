//! 백엔드 풀 — 등록과 선택
//!
//! 선택 알고리즘은 결정적입니다: 헬스 신선도 필터 → 용량 필터 →
//! (priority, in_flight) 최소 우선. 남는 후보가 없으면
//! [`ScanError::NoCapacity`]로 즉시 실패합니다 — 용량 부족을 다른
//! 티어로 우회하지 않으며, 백오프는 호출자의 몫입니다.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use sbomgate_core::error::ScanError;
use sbomgate_core::types::SbomFormat;

use crate::backend::{BackendTier, ScannerBackend};

/// 스캐너 백엔드 풀
#[derive(Default)]
pub struct ScannerPool {
    backends: HashMap<String, Arc<ScannerBackend>>,
}

impl ScannerPool {
    /// 빈 풀을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 백엔드를 등록합니다. 동일 ID가 이미 있으면 거부합니다.
    pub fn register(&mut self, backend: ScannerBackend) -> Result<(), ScanError> {
        if self.backends.contains_key(&backend.id) {
            return Err(ScanError::AlreadyRegistered {
                id: backend.id.clone(),
            });
        }
        self.backends.insert(backend.id.clone(), Arc::new(backend));
        Ok(())
    }

    /// ID로 백엔드를 조회합니다.
    pub fn get(&self, id: &str) -> Option<&Arc<ScannerBackend>> {
        self.backends.get(id)
    }

    /// 등록된 백엔드 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.backends.len()
    }

    /// 티어 내에서 백엔드를 선택하고 슬롯을 점유합니다.
    ///
    /// 반환된 백엔드는 이미 슬롯 하나를 점유한 상태입니다 — 호출자는
    /// 잡의 터미널 전환 시 정확히 한 번 [`ScannerBackend::release`]를
    /// 호출해야 합니다.
    ///
    /// 형식 불일치(dedicated 티어에 SPDX 요청)는 용량과 무관한 정합성
    /// 오류이므로 [`ScanError::UnsupportedFormat`]으로 구분됩니다.
    pub fn select(
        &self,
        tier: BackendTier,
        format: SbomFormat,
        health_freshness_secs: u64,
    ) -> Result<Arc<ScannerBackend>, ScanError> {
        if !tier.supports(format) {
            return Err(ScanError::UnsupportedFormat {
                tier: tier.to_string(),
                format,
            });
        }

        let mut candidates: Vec<&Arc<ScannerBackend>> = self
            .backends
            .values()
            .filter(|b| b.tier == tier)
            .filter(|b| b.is_healthy(health_freshness_secs))
            .collect();
        // (priority, in_flight, id) — id는 동률 시 결정성 확보용
        candidates.sort_by_key(|b| (b.priority, b.in_flight(), b.id.clone()));

        for backend in candidates {
            if backend.try_acquire() {
                debug!(
                    backend = %backend.id,
                    tier = %tier,
                    in_flight = backend.in_flight(),
                    "backend selected",
                );
                return Ok(Arc::clone(backend));
            }
        }
        Err(ScanError::NoCapacity)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
