//! 스캐너 어댑터 trait — 외부 스캐너 서비스와의 경계
//!
//! 제출과 폴링만 담당하는 좁은 인터페이스입니다. 실제 배포에서는 백엔드
//! API 클라이언트가 구현하고, 테스트에서는 모의 구현을 주입합니다.

use std::future::Future;

use sbomgate_core::error::ScanError;
use sbomgate_core::scanjob::RawScanResult;
use sbomgate_core::types::ArtifactRef;

/// 폴링 결과
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// 백엔드 큐에서 대기 중
    Pending,
    /// 백엔드가 처리 중
    Processing,
    /// 완료 — 원시 결과 포함
    Completed(RawScanResult),
    /// 백엔드 측 실패
    Failed(String),
}

/// 스캐너 백엔드 어댑터
pub trait ScannerAdapter: Send + Sync {
    /// 아티팩트를 백엔드에 제출하고 백엔드 잡 핸들을 반환합니다.
    fn submit(
        &self,
        backend_id: &str,
        artifact: &ArtifactRef,
    ) -> impl Future<Output = Result<String, ScanError>> + Send;

    /// 제출된 잡의 상태를 조회합니다.
    fn poll(
        &self,
        backend_id: &str,
        handle: &str,
    ) -> impl Future<Output = Result<PollStatus, ScanError>> + Send;
}
