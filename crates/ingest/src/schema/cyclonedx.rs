//! CycloneDX JSON 구조 검증
//!
//! 버전 1.4 / 1.5 / 1.6은 이 검증기의 독립 인스턴스로 등록됩니다.
//! 세 버전이 검사하는 필수 구조는 같지만, 레지스트리 항목은 버전마다
//! 별개입니다 (선언 버전과 다른 검증기는 절대 실행되지 않음).

use serde_json::Value;

use sbomgate_core::error::ValidationError;
use sbomgate_core::types::SbomFormat;

use super::Violations;
use crate::registry::{SchemaValidator, ValidatedDocument};

/// CycloneDX 구조 검증기
pub struct CycloneDxValidator {
    version: String,
}

impl CycloneDxValidator {
    /// 지정 버전의 검증기를 생성합니다.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn check_components(components: &Value, v: &mut Violations) {
        let Some(list) = components.as_array() else {
            v.push("/components: expected array");
            return;
        };
        for (i, component) in list.iter().enumerate() {
            let Some(obj) = component.as_object() else {
                v.push(format!("/components/{i}: expected object"));
                continue;
            };
            if !obj.get("type").is_some_and(Value::is_string) {
                v.push(format!("/components/{i}/type: expected string"));
            }
            if !obj.get("name").is_some_and(Value::is_string) {
                v.push(format!("/components/{i}/name: expected string"));
            }
            if let Some(version) = obj.get("version")
                && !version.is_string()
            {
                v.push(format!("/components/{i}/version: expected string"));
            }
            if let Some(licenses) = obj.get("licenses")
                && !licenses.is_array()
            {
                v.push(format!("/components/{i}/licenses: expected array"));
            }
        }
    }

    fn check_dependencies(dependencies: &Value, v: &mut Violations) {
        let Some(list) = dependencies.as_array() else {
            v.push("/dependencies: expected array");
            return;
        };
        for (i, dep) in list.iter().enumerate() {
            let Some(obj) = dep.as_object() else {
                v.push(format!("/dependencies/{i}: expected object"));
                continue;
            };
            // `ref`는 bom-ref 문자열이다. 중첩 객체로 취급하는 스키마
            // 번역은 1.5 문서를 거부하게 되므로 여기서 명시적으로 막는다.
            if !obj.get("ref").is_some_and(Value::is_string) {
                v.push(format!("/dependencies/{i}/ref: expected string"));
            }
            if let Some(depends_on) = obj.get("dependsOn") {
                match depends_on.as_array() {
                    Some(targets) => {
                        for (j, target) in targets.iter().enumerate() {
                            if !target.is_string() {
                                v.push(format!(
                                    "/dependencies/{i}/dependsOn/{j}: expected string"
                                ));
                            }
                        }
                    }
                    None => v.push(format!("/dependencies/{i}/dependsOn: expected array")),
                }
            }
        }
    }
}

impl SchemaValidator for CycloneDxValidator {
    fn format(&self) -> SbomFormat {
        SbomFormat::CycloneDx
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

        if obj.get("bomFormat").and_then(Value::as_str) != Some("CycloneDX") {
            v.push("/bomFormat: expected \"CycloneDX\"");
        }
        match obj.get("specVersion").and_then(Value::as_str) {
            Some(spec) if spec == self.version => {}
            Some(spec) => v.push(format!(
                "/specVersion: expected \"{}\", found \"{spec}\"",
                self.version
            )),
            None => v.push("/specVersion: expected string"),
        }
        if let Some(doc_version) = obj.get("version")
            && !doc_version.is_u64()
        {
            v.push("/version: expected positive integer");
        }
        if let Some(metadata) = obj.get("metadata") {
            if let Some(meta_obj) = metadata.as_object() {
                if let Some(component) = meta_obj.get("component")
                    && !component
                        .as_object()
                        .is_some_and(|c| c.get("name").is_some_and(Value::is_string))
                {
                    v.push("/metadata/component/name: expected string");
                }
            } else {
                v.push("/metadata: expected object");
            }
        }
        if let Some(components) = obj.get("components") {
            Self::check_components(components, &mut v);
        }
        if let Some(dependencies) = obj.get("dependencies") {
            Self::check_dependencies(dependencies, &mut v);
        }

        v.into_result()?;
        Ok(ValidatedDocument {
            format: SbomFormat::CycloneDx,
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

    fn validate(doc: Value) -> Result<ValidatedDocument, ValidationError> {
        CycloneDxValidator::new("1.5").validate(&doc, 20)
    }

    #[test]
    fn minimal_valid_document() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "version": 1
        });
        let validated = validate(doc).unwrap();
        assert_eq!(validated.format, SbomFormat::CycloneDx);
        assert_eq!(validated.version, "1.5");
    }

    #[test]
    fn dependencies_ref_string_accepted() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "version": 1,
            "components": [
                {"type": "library", "name": "serde", "version": "1.0.204", "bom-ref": "pkg-serde"}
            ],
            "dependencies": [
                {"ref": "pkg-serde", "dependsOn": []}
            ]
        });
        assert!(validate(doc).is_ok());
    }

    #[test]
    fn dependencies_ref_object_rejected() {
        // ref를 중첩 객체로 만든 잘못된 스키마 해석은 거부되어야 함
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "version": 1,
            "dependencies": [
                {"ref": {"value": "pkg-serde"}}
            ]
        });
        let err = validate(doc).unwrap_err();
        match err {
            ValidationError::Schema { violations, .. } => {
                assert!(violations.iter().any(|p| p.contains("/dependencies/0/ref")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn spec_version_mismatch_is_violation() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.4",
            "version": 1
        });
        assert!(validate(doc).is_err());
    }

    #[test]
    fn component_missing_name_reported_with_path() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "version": 1,
            "components": [
                {"type": "library", "name": "ok"},
                {"type": "library"}
            ]
        });
        let err = validate(doc).unwrap_err();
        match err {
            ValidationError::Schema { violations, total } => {
                assert_eq!(total, 1);
                assert_eq!(violations, vec!["/components/1/name: expected string"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_preserved_in_root() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "version": 1,
            "x-vendor-extension": {"opaque": true}
        });
        let validated = validate(doc).unwrap();
        assert!(validated.root.get("x-vendor-extension").is_some());
    }

    #[test]
    fn non_object_root_is_malformed() {
        let err = validate(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }));
    }
}
