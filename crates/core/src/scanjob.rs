//! 스캔 잡 레코드 — 아티팩트 1건의 백엔드 디스패치 이력
//!
//! [`ScanJob`]은 하나의 아티팩트를 하나의 스캐너 백엔드로 보낸 단일
//! 디스패치를 기록합니다. 완료 시 백엔드의 원시 응답을 함께 보관하며,
//! 같은 아티팩트에 대한 새 잡이 먼저 생성되면 기존 잡은 `Superseded`
//! 터미널 상태로 대체됩니다.
//!
//! # 상태 전환
//! ```text
//! Queued → Submitted → Processing → {Completed | Failed}
//!    └──────┴──────────────┴── Superseded (새 잡으로 대체)
//! ```

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::Severity;

// ─── ScanJobState ────────────────────────────────────────────────────

/// 스캔 잡 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanJobState {
    /// 생성됨, 백엔드 제출 전
    Queued,
    /// 백엔드에 제출됨 (용량 점유 시작)
    Submitted,
    /// 백엔드가 처리 중
    Processing,
    /// 완료, 원시 결과 보관 (터미널)
    Completed,
    /// 실패 — 백엔드 오류 또는 수명 초과 (터미널)
    Failed,
    /// 새 잡으로 대체됨 (터미널)
    Superseded,
}

impl ScanJobState {
    /// 터미널 상태 여부를 반환합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Superseded)
    }

    /// 백엔드 용량을 점유 중인 상태 여부를 반환합니다.
    ///
    /// in-flight 카운터 불변식: 카운터 값은 이 상태에 있는 잡 수와 같습니다.
    pub fn holds_capacity(&self) -> bool {
        matches!(self, Self::Submitted | Self::Processing)
    }

    /// `self`에서 `to`로의 전환이 허용되는지 반환합니다.
    pub fn can_transition(&self, to: ScanJobState) -> bool {
        match (self, to) {
            (Self::Queued, Self::Submitted | Self::Failed | Self::Superseded) => true,
            (Self::Submitted, Self::Processing | Self::Completed | Self::Failed) => true,
            (Self::Submitted, Self::Superseded) => true,
            (Self::Processing, Self::Completed | Self::Failed | Self::Superseded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScanJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Submitted => write!(f, "submitted"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

// ─── 원시 스캔 결과 ──────────────────────────────────────────────────

/// 백엔드별 원시 발견 항목
///
/// 백엔드 고유 심각도 어휘를 그대로 담습니다. 정규화는 결과 정규화기가
/// 수행하며, 이 타입은 변환 없이 보존됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    /// 백엔드가 보고한 취약점 식별자
    pub id: String,
    /// 별칭 식별자 목록
    #[serde(default)]
    pub aliases: Vec<String>,
    /// 백엔드 고유 심각도 레이블 (있을 경우)
    pub severity_label: Option<String>,
    /// CVSS 점수 (있을 경우)
    pub score: Option<f64>,
    /// 영향받는 패키지 이름
    pub package: String,
    /// 영향받는 버전
    pub version: String,
    /// 패키지 생태계
    pub ecosystem: String,
    /// 참고 URL 목록
    #[serde(default)]
    pub references: Vec<String>,
}

/// 백엔드 원시 스캔 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScanResult {
    /// 응답한 백엔드 이름
    pub backend_name: String,
    /// 원시 발견 항목 목록
    pub findings: Vec<RawFinding>,
}

/// 결과 정규화를 위한 백엔드 심각도 레이블 → 정규 심각도 매핑 항목
pub type SeverityMapping = (String, Severity);

// ─── ScanJob ─────────────────────────────────────────────────────────

/// 스캔 잡 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    /// 잡 고유 ID
    pub id: String,
    /// 대상 아티팩트 ID
    pub artifact_id: String,
    /// 디스패치된 백엔드 ID
    pub backend_id: String,
    /// 현재 상태
    pub state: ScanJobState,
    /// 어댑터가 반환한 백엔드 잡 핸들 (제출 후 설정)
    pub handle: Option<String>,
    /// 완료 시 원시 결과
    pub raw_result: Option<RawScanResult>,
    /// 실패/대체 사유
    pub reason: Option<String>,
    /// 생성 시각
    pub created_at: SystemTime,
    /// 마지막 상태 변경 시각
    pub updated_at: SystemTime,
}

impl ScanJob {
    /// 새 queued 잡을 생성합니다.
    pub fn new_queued(artifact_id: &str, backend_id: &str) -> Self {
        let now = SystemTime::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            artifact_id: artifact_id.to_owned(),
            backend_id: backend_id.to_owned(),
            state: ScanJobState::Queued,
            handle: None,
            raw_result: None,
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 잡 생성 이후 경과 시간 (초)을 반환합니다.
    pub fn age_secs(&self) -> u64 {
        self.created_at
            .elapsed()
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// 터미널 상태 여부를 반환합니다.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanJob({} artifact={} backend={} {})",
            self.id, self.artifact_id, self.backend_id, self.state,
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
