//! 버전별 구조 검증기
//!
//! 각 (형식, 버전)마다 독립된 검증기를 둡니다. 버전 간 구조가 비슷해도
//! 공유 구현을 두지 않아, 한 버전의 수정이 다른 버전으로 번지지 않습니다.
//!
//! 검증은 `serde_json::Value` 위의 구조 검사이며, 위반은 JSON 포인터
//! 형식 경로로 수집됩니다.

mod cyclonedx;
mod spdx;

pub use cyclonedx::CycloneDxValidator;
pub use spdx::{SpdxFlatValidator, SpdxGraphValidator};

use sbomgate_core::error::ValidationError;

/// 위반 경로 수집기
///
/// 경로는 `max` 개까지만 보관하고 전체 개수는 계속 셉니다 —
/// 에러 페이로드가 무한정 커지는 것을 막습니다.
pub(crate) struct Violations {
    paths: Vec<String>,
    total: usize,
    max: usize,
}

impl Violations {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            paths: Vec::new(),
            total: 0,
            max,
        }
    }

    /// 위반 경로 하나를 기록합니다.
    pub(crate) fn push(&mut self, path: impl Into<String>) {
        self.total += 1;
        if self.paths.len() < self.max {
            self.paths.push(path.into());
        }
    }

    /// 위반이 하나라도 있으면 [`ValidationError::Schema`]를 반환합니다.
    pub(crate) fn into_result(self) -> Result<(), ValidationError> {
        if self.total == 0 {
            Ok(())
        } else {
            Err(ValidationError::Schema {
                violations: self.paths,
                total: self.total,
            })
        }
    }
}
