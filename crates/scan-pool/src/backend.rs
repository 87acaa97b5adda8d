//! 스캐너 백엔드 — 용량 카운터와 헬스 상태
//!
//! [`ScannerBackend`]는 외부 스캐너 서비스 하나를 나타냅니다. in-flight
//! 카운터는 compare-and-set으로 `max_concurrent`를 넘지 않게 유지되며,
//! 불변식은 다음과 같습니다: 카운터 값 == 이 백엔드에서 submitted/
//! processing 상태인 잡 수. 슬롯 해제는 잡의 터미널 전환 성공에 정확히
//! 한 번 결합됩니다 (해제 책임은 디스패처에 있음).

use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use sbomgate_core::types::SbomFormat;

// ─── BackendTier ─────────────────────────────────────────────────────

/// 백엔드 티어
///
/// 티어는 정합성 경계입니다 — dedicated 요청을 용량 부족 때문에 free로
/// 몰래 돌려보내지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendTier {
    /// 공용 무료 스캐너 (모든 형식 수용)
    Free,
    /// 전용 스캐너 (CycloneDX 전용)
    Dedicated,
}

impl fmt::Display for BackendTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Dedicated => write!(f, "dedicated"),
        }
    }
}

impl BackendTier {
    /// 이 티어가 해당 문서 형식을 처리할 수 있는지 반환합니다.
    pub fn supports(&self, format: SbomFormat) -> bool {
        match self {
            Self::Free => true,
            Self::Dedicated => format == SbomFormat::CycloneDx,
        }
    }
}

// ─── ScannerBackend ──────────────────────────────────────────────────

/// 스캐너 백엔드
pub struct ScannerBackend {
    /// 백엔드 고유 ID
    pub id: String,
    /// 사람이 읽는 이름 (발견 항목 출처 표기에 사용)
    pub name: String,
    /// 티어
    pub tier: BackendTier,
    /// 선택 우선순위 (낮을수록 선호)
    pub priority: u32,
    /// 동시 실행 상한
    pub max_concurrent: u32,
    in_flight: AtomicU32,
    last_healthy_at: RwLock<Option<SystemTime>>,
}

impl ScannerBackend {
    /// 새 백엔드를 생성합니다. 초기 헬스 상태는 unknown (선택 불가)입니다.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tier: BackendTier,
        priority: u32,
        max_concurrent: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tier,
            priority,
            max_concurrent,
            in_flight: AtomicU32::new(0),
            last_healthy_at: RwLock::new(None),
        }
    }

    /// 헬스체크 성공을 기록합니다.
    pub fn record_healthy(&self) {
        self.record_healthy_at(SystemTime::now());
    }

    /// 지정 시각의 헬스체크 성공을 기록합니다 (테스트용).
    pub fn record_healthy_at(&self, at: SystemTime) {
        if let Ok(mut guard) = self.last_healthy_at.write() {
            *guard = Some(at);
        }
    }

    /// 신선도 윈도우 내의 헬스체크가 있는지 반환합니다.
    ///
    /// 오래된 성공 기록은 건강의 증거가 아닙니다 — 윈도우를 벗어나면
    /// 후보에서 제외됩니다.
    pub fn is_healthy(&self, freshness_secs: u64) -> bool {
        let guard = match self.last_healthy_at.read() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        match *guard {
            Some(at) => at
                .elapsed()
                .map(|elapsed| elapsed <= Duration::from_secs(freshness_secs))
                .unwrap_or(false),
            None => false,
        }
    }

    /// 현재 in-flight 잡 수를 반환합니다.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 빈 슬롯이 있는지 반환합니다.
    pub fn has_capacity(&self) -> bool {
        self.in_flight() < self.max_concurrent
    }

    /// 슬롯 하나를 점유 시도합니다. 상한 도달 시 `false`.
    pub fn try_acquire(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < self.max_concurrent).then_some(current + 1)
            })
            .is_ok()
    }

    /// 슬롯 하나를 해제합니다.
    ///
    /// 호출자는 점유한 잡당 정확히 한 번만 호출해야 합니다. 카운터가
    /// 이미 0이면 그대로 둡니다 (이중 해제로 음수가 되지 않음).
    pub fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
    }
}

impl fmt::Debug for ScannerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerBackend")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("priority", &self.priority)
            .field("in_flight", &self.in_flight())
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(max: u32) -> ScannerBackend {
        ScannerBackend::new("b-1", "backend-one", BackendTier::Dedicated, 10, max)
    }

    #[test]
    fn tier_format_support() {
        assert!(BackendTier::Free.supports(SbomFormat::CycloneDx));
        assert!(BackendTier::Free.supports(SbomFormat::Spdx));
        assert!(BackendTier::Dedicated.supports(SbomFormat::CycloneDx));
        assert!(!BackendTier::Dedicated.supports(SbomFormat::Spdx));
    }

    #[test]
    fn acquire_bounded_by_max_concurrent() {
        let b = backend(2);
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(!b.try_acquire());
        assert_eq!(b.in_flight(), 2);

        b.release();
        assert!(b.try_acquire());
        assert_eq!(b.in_flight(), 2);
    }

    #[test]
    fn release_never_goes_negative() {
        let b = backend(1);
        b.release();
        assert_eq!(b.in_flight(), 0);
        assert!(b.try_acquire());
        b.release();
        b.release();
        assert_eq!(b.in_flight(), 0);
    }

    #[test]
    fn health_requires_fresh_check() {
        let b = backend(1);
        assert!(!b.is_healthy(300));

        b.record_healthy();
        assert!(b.is_healthy(300));

        // 윈도우를 벗어난 오래된 기록
        b.record_healthy_at(SystemTime::now() - Duration::from_secs(600));
        assert!(!b.is_healthy(300));
    }
}
