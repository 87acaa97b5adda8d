//! SPDX JSON 구조 검증
//!
//! SPDX는 두 가지 루트 형태를 갖습니다:
//!
//! - **flat**: 2.x 계열. `spdxVersion`이 최상위에 있고 `packages`,
//!   `relationships` 배열이 평평하게 나열됩니다.
//! - **graph**: 3.x 계열 (JSON-LD). 루트에 `@graph` 배열이 있고 문서,
//!   패키지, 관계가 모두 그래프 요소입니다.
//!
//! 두 형태는 별개 검증기로 등록됩니다.

use serde_json::Value;

use sbomgate_core::error::ValidationError;
use sbomgate_core::types::SbomFormat;

use super::Violations;
use crate::registry::{SchemaValidator, ValidatedDocument};

// ─── SpdxFlatValidator ───────────────────────────────────────────────

/// SPDX 2.x flat 구조 검증기
pub struct SpdxFlatValidator {
    version: String,
}

impl SpdxFlatValidator {
    /// 지정 버전의 검증기를 생성합니다.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn check_packages(packages: &Value, v: &mut Violations) {
        let Some(list) = packages.as_array() else {
            v.push("/packages: expected array");
            return;
        };
        for (i, package) in list.iter().enumerate() {
            let Some(obj) = package.as_object() else {
                v.push(format!("/packages/{i}: expected object"));
                continue;
            };
            if !obj.get("name").is_some_and(Value::is_string) {
                v.push(format!("/packages/{i}/name: expected string"));
            }
            if !obj.get("SPDXID").is_some_and(Value::is_string) {
                v.push(format!("/packages/{i}/SPDXID: expected string"));
            }
            if let Some(version) = obj.get("versionInfo")
                && !version.is_string()
            {
                v.push(format!("/packages/{i}/versionInfo: expected string"));
            }
        }
    }

    fn check_relationships(relationships: &Value, v: &mut Violations) {
        let Some(list) = relationships.as_array() else {
            v.push("/relationships: expected array");
            return;
        };
        for (i, rel) in list.iter().enumerate() {
            let Some(obj) = rel.as_object() else {
                v.push(format!("/relationships/{i}: expected object"));
                continue;
            };
            for field in ["spdxElementId", "relationshipType", "relatedSpdxElement"] {
                if !obj.get(field).is_some_and(Value::is_string) {
                    v.push(format!("/relationships/{i}/{field}: expected string"));
                }
            }
        }
    }
}

impl SchemaValidator for SpdxFlatValidator {
    fn format(&self) -> SbomFormat {
        SbomFormat::Spdx
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn validate(
        &self,
        root: &Value,
        max_paths: usize,
    ) -> Result<ValidatedDocument, ValidationError> {
        let mut v = Violations::new(max_paths);

        let Some(obj) = root.as_object() else {
            return Err(ValidationError::Malformed {
                reason: "root is not a JSON object".to_owned(),
            });
        };

        let expected = format!("SPDX-{}", self.version);
        match obj.get("spdxVersion").and_then(Value::as_str) {
            Some(found) if found == expected => {}
            Some(found) => v.push(format!(
                "/spdxVersion: expected \"{expected}\", found \"{found}\""
            )),
            None => v.push("/spdxVersion: expected string"),
        }
        if !obj.get("SPDXID").is_some_and(Value::is_string) {
            v.push("/SPDXID: expected string");
        }
        if !obj.get("name").is_some_and(Value::is_string) {
            v.push("/name: expected string");
        }
        if !obj
            .get("creationInfo")
            .and_then(Value::as_object)
            .is_some_and(|info| info.get("created").is_some_and(Value::is_string))
        {
            v.push("/creationInfo/created: expected string");
        }
        if let Some(packages) = obj.get("packages") {
            Self::check_packages(packages, &mut v);
        }
        if let Some(relationships) = obj.get("relationships") {
            Self::check_relationships(relationships, &mut v);
        }

        v.into_result()?;
        Ok(ValidatedDocument {
            format: SbomFormat::Spdx,
            version: self.version.clone(),
            root: root.clone(),
        })
    }
}

// ─── SpdxGraphValidator ──────────────────────────────────────────────

/// SPDX 3.x `@graph` 구조 검증기
pub struct SpdxGraphValidator {
    version: String,
}

impl SpdxGraphValidator {
    /// 지정 버전의 검증기를 생성합니다.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl SchemaValidator for SpdxGraphValidator {
    fn format(&self) -> SbomFormat {
        SbomFormat::Spdx
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn validate(
        &self,
        root: &Value,
        max_paths: usize,
    ) -> Result<ValidatedDocument, ValidationError> {
        let mut v = Violations::new(max_paths);

        let Some(obj) = root.as_object() else {
            return Err(ValidationError::Malformed {
                reason: "root is not a JSON object".to_owned(),
            });
        };

        let Some(graph) = obj.get("@graph").and_then(Value::as_array) else {
            return Err(ValidationError::Malformed {
                reason: "missing @graph array".to_owned(),
            });
        };

        for (i, element) in graph.iter().enumerate() {
            let Some(el) = element.as_object() else {
                v.push(format!("/@graph/{i}: expected object"));
                continue;
            };
            let element_type = el.get("type").and_then(Value::as_str);
            if element_type.is_none() {
                v.push(format!("/@graph/{i}/type: expected string"));
                continue;
            }
            if !el.get("spdxId").is_some_and(Value::is_string) {
                v.push(format!("/@graph/{i}/spdxId: expected string"));
            }
            // 패키지 요소는 이름이 필수
            if element_type == Some("software_Package")
                && !el.get("name").is_some_and(Value::is_string)
            {
                v.push(format!("/@graph/{i}/name: expected string"));
            }
            // 관계 요소는 from/to/relationshipType 필수
            if element_type == Some("Relationship") {
                if !el.get("from").is_some_and(Value::is_string) {
                    v.push(format!("/@graph/{i}/from: expected string"));
                }
                if !el.get("to").is_some_and(Value::is_array) {
                    v.push(format!("/@graph/{i}/to: expected array"));
                }
                if !el.get("relationshipType").is_some_and(Value::is_string) {
                    v.push(format!("/@graph/{i}/relationshipType: expected string"));
                }
            }
        }

        v.into_result()?;
        Ok(ValidatedDocument {
            format: SbomFormat::Spdx,
            version: self.version.clone(),
            root: root.clone(),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_minimal_valid() {
        let doc = json!({
            "spdxVersion": "SPDX-2.3",
            "SPDXID": "SPDXRef-DOCUMENT",
            "name": "example",
            "creationInfo": {"created": "2026-01-01T00:00:00Z", "creators": ["Tool: x"]}
        });
        let validated = SpdxFlatValidator::new("2.3").validate(&doc, 20).unwrap();
        assert_eq!(validated.version, "2.3");
    }

    #[test]
    fn flat_version_mismatch_rejected() {
        let doc = json!({
            "spdxVersion": "SPDX-2.2",
            "SPDXID": "SPDXRef-DOCUMENT",
            "name": "example",
            "creationInfo": {"created": "2026-01-01T00:00:00Z"}
        });
        assert!(SpdxFlatValidator::new("2.3").validate(&doc, 20).is_err());
    }

    #[test]
    fn flat_package_without_spdxid_reported() {
        let doc = json!({
            "spdxVersion": "SPDX-2.3",
            "SPDXID": "SPDXRef-DOCUMENT",
            "name": "example",
            "creationInfo": {"created": "2026-01-01T00:00:00Z"},
            "packages": [{"name": "pkg-without-id"}]
        });
        let err = SpdxFlatValidator::new("2.3").validate(&doc, 20).unwrap_err();
        match err {
            ValidationError::Schema { violations, .. } => {
                assert!(violations.iter().any(|p| p.contains("/packages/0/SPDXID")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flat_relationship_fields_required() {
        let doc = json!({
            "spdxVersion": "SPDX-2.3",
            "SPDXID": "SPDXRef-DOCUMENT",
            "name": "example",
            "creationInfo": {"created": "2026-01-01T00:00:00Z"},
            "relationships": [{"spdxElementId": "SPDXRef-DOCUMENT"}]
        });
        let err = SpdxFlatValidator::new("2.3").validate(&doc, 20).unwrap_err();
        match err {
            ValidationError::Schema { total, .. } => assert_eq!(total, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn graph_minimal_valid() {
        let doc = json!({
            "@context": "https://spdx.org/rdf/3.0.1/spdx-context.jsonld",
            "@graph": [
                {
                    "type": "software_Package",
                    "spdxId": "SPDXRef-Package-a",
                    "name": "a",
                    "software_packageVersion": "1.0.0"
                }
            ]
        });
        let validated = SpdxGraphValidator::new("3.0").validate(&doc, 20).unwrap();
        assert_eq!(validated.format, SbomFormat::Spdx);
    }

    #[test]
    fn graph_missing_graph_array_is_malformed() {
        let doc = json!({"@context": "https://spdx.org/rdf/3.0/"});
        let err = SpdxGraphValidator::new("3.0").validate(&doc, 20).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }));
    }

    #[test]
    fn graph_package_without_name_reported() {
        let doc = json!({
            "@graph": [
                {"type": "software_Package", "spdxId": "SPDXRef-Package-x"}
            ]
        });
        let err = SpdxGraphValidator::new("3.0").validate(&doc, 20).unwrap_err();
        match err {
            ValidationError::Schema { violations, .. } => {
                assert!(violations.iter().any(|p| p.contains("/@graph/0/name")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn graph_relationship_shape_checked() {
        let doc = json!({
            "@graph": [
                {"type": "Relationship", "spdxId": "rel-1", "from": "a", "to": "b", "relationshipType": "dependsOn"}
            ]
        });
        // to는 배열이어야 함
        let err = SpdxGraphValidator::new("3.0").validate(&doc, 20).unwrap_err();
        match err {
            ValidationError::Schema { violations, .. } => {
                assert!(violations.iter().any(|p| p.contains("/@graph/0/to")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
