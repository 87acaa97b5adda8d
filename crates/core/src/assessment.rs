//! 평가 실행 레코드 — (artifact, plugin, config hash)별 실행 이력
//!
//! [`AssessmentRun`]은 하나의 평가 실행을 나타내는 불변 지향 레코드입니다.
//! 터미널 상태에 도달한 레코드는 수정되지 않으며, 설정 변경은 새 config
//! hash 아래 새 레코드를 만들어 이력을 보존합니다.
//!
//! # 상태 전환
//! ```text
//! Pending → Running → {Pass | Fail | Error}
//!              └─ RetryLater → Pending (max_retries 한도 내)
//! ```

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ─── RunState ────────────────────────────────────────────────────────

/// 평가 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// 생성됨, 실행 대기 (의존성 미충족 시에도 이 상태로 유지)
    Pending,
    /// 실행 중 (claim 성공한 단일 워커만 진입)
    Running,
    /// 평가 통과 (터미널)
    Pass,
    /// 평가 불통과 (터미널)
    Fail,
    /// 실행 오류 (터미널 — 패닉, 타임아웃, 재시도 소진 포함)
    Error,
}

impl RunState {
    /// 터미널 상태 여부를 반환합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Error)
    }

    /// `self`에서 `to`로의 전환이 허용되는지 반환합니다.
    ///
    /// 터미널 상태에서의 전환은 어떤 경우에도 허용되지 않습니다.
    /// `Running → Pending`은 RetryLater 신호에만 사용됩니다.
    pub fn can_transition(&self, to: RunState) -> bool {
        match (self, to) {
            (Self::Pending, Self::Running) => true,
            (Self::Running, Self::Pass | Self::Fail | Self::Error) => true,
            (Self::Running, Self::Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ─── AssessmentRun ───────────────────────────────────────────────────

/// 평가 실행 레코드
///
/// (artifact, plugin key, config hash) 조합당 하나의 실행을 기록합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRun {
    /// 실행 고유 ID
    pub id: String,
    /// 대상 아티팩트 ID
    pub artifact_id: String,
    /// 플러그인 키
    pub plugin_key: String,
    /// 실행 시점의 플러그인 설정 해시
    pub config_hash: String,
    /// 현재 상태
    pub state: RunState,
    /// RetryLater로 인한 재시도 횟수
    pub attempts: u32,
    /// 결과/사유 설명
    pub detail: String,
    /// 생성 시각
    pub created_at: SystemTime,
    /// 마지막 상태 변경 시각
    pub updated_at: SystemTime,
}

impl AssessmentRun {
    /// 새 pending 레코드를 생성합니다.
    pub fn new_pending(artifact_id: &str, plugin_key: &str, config_hash: &str) -> Self {
        let now = SystemTime::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            artifact_id: artifact_id.to_owned(),
            plugin_key: plugin_key.to_owned(),
            config_hash: config_hash.to_owned(),
            state: RunState::Pending,
            attempts: 0,
            detail: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 터미널 상태 여부를 반환합니다.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for AssessmentRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AssessmentRun({}/{} [{}] {})",
            self.artifact_id, self.plugin_key, self.config_hash, self.state,
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
