//! 메트릭 상수 — 메트릭 이름과 레이블 키의 중앙 정의
//!
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sbomgate_`
//! - 모듈명: `ingest_`, `assess_`, `scan_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ──────────────────────────────────────────────────

/// 문서 형식 레이블 키 (cyclonedx, spdx)
pub const LABEL_FORMAT: &str = "format";

/// 실행/잡 상태 레이블 키
pub const LABEL_STATE: &str = "state";

/// 플러그인 키 레이블
pub const LABEL_PLUGIN: &str = "plugin";

/// 백엔드 이름 레이블 키
pub const LABEL_BACKEND: &str = "backend";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Ingest 메트릭 ───────────────────────────────────────────────────

/// Ingest: 검증 시도 수 (counter, label: format, result)
pub const INGEST_VALIDATIONS_TOTAL: &str = "sbomgate_ingest_validations_total";

/// Ingest: 정규화 완료 수 (counter, label: format)
pub const INGEST_NORMALIZED_TOTAL: &str = "sbomgate_ingest_normalized_total";

// ─── Assess 메트릭 ───────────────────────────────────────────────────

/// Assess: 상태별 실행 전환 수 (counter, label: plugin, state)
pub const ASSESS_RUNS_TOTAL: &str = "sbomgate_assess_runs_total";

/// Assess: RetryLater 재시도 수 (counter, label: plugin)
pub const ASSESS_RETRIES_TOTAL: &str = "sbomgate_assess_retries_total";

// ─── Scan 메트릭 ─────────────────────────────────────────────────────

/// Scan: 디스패치 수 (counter, label: backend)
pub const SCAN_DISPATCHES_TOTAL: &str = "sbomgate_scan_dispatches_total";

/// Scan: 용량 부족 거부 수 (counter)
pub const SCAN_NO_CAPACITY_TOTAL: &str = "sbomgate_scan_no_capacity_total";

/// Scan: 백엔드별 in-flight 잡 수 (gauge, label: backend)
pub const SCAN_IN_FLIGHT: &str = "sbomgate_scan_in_flight";

/// Scan: 정규화된 발견 항목 수 (counter, label: backend)
pub const SCAN_FINDINGS_TOTAL: &str = "sbomgate_scan_findings_total";
