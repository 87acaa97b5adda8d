//! 스캔 결과 정규화 — 백엔드 어휘를 정규 심각도로 매핑
//!
//! 완료된 잡의 원시 결과에서 [`VulnerabilityFinding`]을 생성합니다.
//! 백엔드마다 심각도 어휘가 다르므로 백엔드별 매핑 테이블을 두고,
//! 테이블에 없는 레이블은 다음 규칙으로 처리합니다:
//!
//! - CVSS 점수가 있으면 점수에서 유도하되 **medium 아래로 내리지 않음**
//!   — 매핑 공백이 심각도를 조용히 낮추는 쪽으로 작동해서는 안 됩니다.
//! - 점수도 없으면 `unknown` — 근거 없는 심각도를 지어내지 않습니다.
//!
//! 백엔드 간 병합은 하지 않습니다. 같은 취약점이 두 백엔드에서 오면
//! 두 항목이 각자의 출처를 달고 남습니다.

use std::collections::HashMap;

use tracing::debug;

use sbomgate_core::error::ScanError;
use sbomgate_core::scanjob::{RawFinding, RawScanResult, ScanJob, ScanJobState};
use sbomgate_core::types::{Severity, VulnerabilityFinding};

/// 결과 정규화기
pub struct ResultNormalizer {
    /// 백엔드 이름 → (소문자 레이블 → 심각도)
    tables: HashMap<String, HashMap<String, Severity>>,
}

impl ResultNormalizer {
    /// 빈 정규화기를 생성합니다.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// 흔한 백엔드들의 매핑이 미리 등록된 정규화기를 생성합니다.
    pub fn builtin() -> Self {
        let mut normalizer = Self::new();
        // OSV 계열: 표준 어휘에 가깝지만 "moderate"를 사용
        normalizer.register(
            "osv-free",
            &[
                ("critical", Severity::Critical),
                ("high", Severity::High),
                ("moderate", Severity::Medium),
                ("medium", Severity::Medium),
                ("low", Severity::Low),
            ],
        );
        // grype 계열: negligible 레벨이 추가로 있음
        normalizer.register(
            "grype",
            &[
                ("critical", Severity::Critical),
                ("high", Severity::High),
                ("medium", Severity::Medium),
                ("low", Severity::Low),
                ("negligible", Severity::Info),
            ],
        );
        normalizer
    }

    /// 백엔드의 심각도 매핑 테이블을 등록합니다.
    ///
    /// 같은 백엔드를 다시 등록하면 테이블을 교체합니다.
    pub fn register(&mut self, backend_name: &str, mappings: &[(&str, Severity)]) {
        let table = mappings
            .iter()
            .map(|(label, severity)| (label.to_lowercase(), *severity))
            .collect();
        self.tables.insert(backend_name.to_owned(), table);
    }

    /// 완료된 잡에서 정규화된 발견 항목을 생성합니다.
    ///
    /// 완료 상태가 아닌 잡은 거부합니다 — 정규화는 완료된 잡에서만
    /// 일어나며 결과는 수동 편집되지 않습니다.
    pub fn normalize_job(&self, job: &ScanJob) -> Result<Vec<VulnerabilityFinding>, ScanError> {
        if job.state != ScanJobState::Completed {
            return Err(ScanError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.state.to_string(),
                to: "normalized".to_owned(),
            });
        }
        let Some(raw) = job.raw_result.as_ref() else {
            return Err(ScanError::Backend {
                name: job.backend_id.clone(),
                reason: "completed job without raw result".to_owned(),
            });
        };
        Ok(self.normalize_result(raw))
    }

    /// 원시 결과를 정규화합니다 (순수 함수).
    pub fn normalize_result(&self, raw: &RawScanResult) -> Vec<VulnerabilityFinding> {
        raw.findings
            .iter()
            .map(|finding| VulnerabilityFinding {
                id: finding.id.clone(),
                aliases: finding.aliases.clone(),
                severity: self.severity_of(&raw.backend_name, finding),
                score: finding.score,
                package: finding.package.clone(),
                version: finding.version.clone(),
                ecosystem: finding.ecosystem.clone(),
                source_backend: raw.backend_name.clone(),
                references: finding.references.clone(),
            })
            .collect()
    }

    fn severity_of(&self, backend_name: &str, finding: &RawFinding) -> Severity {
        if let Some(label) = finding.severity_label.as_deref() {
            let lower = label.to_lowercase();
            if let Some(severity) = self
                .tables
                .get(backend_name)
                .and_then(|table| table.get(&lower))
            {
                return *severity;
            }
            // 테이블 밖 레이블이라도 표준 어휘면 그대로 인정
            if let Some(severity) = Severity::from_str_loose(&lower) {
                return severity;
            }
            debug!(backend = backend_name, label = %label, "unmapped severity label");
        }
        match finding.score {
            // 매핑 공백이 위험을 과소평가하지 않도록 하한 적용
            Some(score) => Severity::from_score(score).max(Severity::Medium),
            None => Severity::Unknown,
        }
    }
}

impl Default for ResultNormalizer {
    fn default() -> Self {
        Self::builtin()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(label: Option<&str>, score: Option<f64>) -> RawFinding {
        RawFinding {
            id: "CVE-2026-0001".to_owned(),
            aliases: vec!["GHSA-xxxx".to_owned()],
            severity_label: label.map(str::to_owned),
            score,
            package: "serde".to_owned(),
            version: "1.0.0".to_owned(),
            ecosystem: "cargo".to_owned(),
            references: vec!["https://example.com/advisory".to_owned()],
        }
    }

    fn result_of(backend: &str, findings: Vec<RawFinding>) -> RawScanResult {
        RawScanResult {
            backend_name: backend.to_owned(),
            findings,
        }
    }

    #[test]
    fn mapped_label_wins() {
        let n = ResultNormalizer::builtin();
        let out = n.normalize_result(&result_of(
            "osv-free",
            vec![finding(Some("Moderate"), Some(9.8))],
        ));
        // 레이블 매핑이 점수보다 우선
        assert_eq!(out[0].severity, Severity::Medium);
        assert_eq!(out[0].score, Some(9.8));
    }

    #[test]
    fn unmapped_label_with_score_floors_at_medium() {
        let n = ResultNormalizer::builtin();
        // 낮은 점수라도 매핑 공백은 medium 아래로 내려가지 않음
        let out = n.normalize_result(&result_of(
            "osv-free",
            vec![finding(Some("P4-worrying"), Some(2.0))],
        ));
        assert_eq!(out[0].severity, Severity::Medium);

        // 높은 점수는 그대로 반영
        let out = n.normalize_result(&result_of(
            "osv-free",
            vec![finding(Some("P1-dire"), Some(9.5))],
        ));
        assert_eq!(out[0].severity, Severity::Critical);
    }

    #[test]
    fn unmapped_label_without_score_is_unknown() {
        let n = ResultNormalizer::builtin();
        let out = n.normalize_result(&result_of(
            "osv-free",
            vec![finding(Some("weird-vocab"), None)],
        ));
        assert_eq!(out[0].severity, Severity::Unknown);
    }

    #[test]
    fn unknown_backend_falls_back_to_standard_vocab() {
        let n = ResultNormalizer::builtin();
        let out = n.normalize_result(&result_of(
            "brand-new-scanner",
            vec![finding(Some("HIGH"), None)],
        ));
        assert_eq!(out[0].severity, Severity::High);
    }

    #[test]
    fn backend_specific_vocab_respected() {
        let n = ResultNormalizer::builtin();
        let out = n.normalize_result(&result_of(
            "grype",
            vec![finding(Some("negligible"), None)],
        ));
        assert_eq!(out[0].severity, Severity::Info);
    }

    #[test]
    fn attribution_preserved_no_merging() {
        let n = ResultNormalizer::builtin();
        let a = n.normalize_result(&result_of("osv-free", vec![finding(Some("high"), None)]));
        let b = n.normalize_result(&result_of("grype", vec![finding(Some("high"), None)]));
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].source_backend, "osv-free");
        assert_eq!(b[0].source_backend, "grype");
    }

    #[test]
    fn only_completed_jobs_normalize() {
        let n = ResultNormalizer::builtin();
        let job = ScanJob::new_queued("art-1", "backend-a");
        assert!(matches!(
            n.normalize_job(&job),
            Err(ScanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn completed_job_yields_findings() {
        let n = ResultNormalizer::builtin();
        let mut job = ScanJob::new_queued("art-1", "backend-a");
        job.state = ScanJobState::Completed;
        job.raw_result = Some(result_of("osv-free", vec![finding(Some("critical"), None)]));
        let out = n.normalize_job(&job).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Critical);
    }
}
