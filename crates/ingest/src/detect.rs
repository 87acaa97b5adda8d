//! 형식 탐지 — 구조 스니핑으로 (형식, 버전) 판별
//!
//! 파일 확장자나 MIME 타입은 신뢰하지 않고, 파싱된 JSON의 최상위 구조만
//! 봅니다. 탐지는 문서를 해석하지 않습니다 — 판별 마커만 읽고, 실제
//! 구조 검사는 레지스트리의 검증기가 수행합니다.

use serde_json::Value;

use sbomgate_core::error::ValidationError;
use sbomgate_core::types::SbomFormat;

/// 탐지 결과 — 문서가 선언한 (형식, 버전)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFormat {
    pub format: SbomFormat,
    pub version: String,
}

/// 바이트를 JSON으로 파싱합니다.
///
/// 파싱 실패는 [`ValidationError::Malformed`]로 보고합니다.
pub fn parse_json(bytes: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed {
        reason: format!("invalid JSON: {e}"),
    })
}

/// 파싱된 JSON 루트에서 (형식, 버전)을 판별합니다.
///
/// 판별 마커 우선순위:
///
/// 1. `bomFormat == "CycloneDX"` → CycloneDX, 버전은 `specVersion`
/// 2. `spdxVersion == "SPDX-x.y"` → SPDX flat, 버전은 `x.y`
/// 3. `@graph` 배열 존재 → SPDX 3.x (JSON-LD), 버전은 컨텍스트에서 추출
///
/// 마커가 모순되거나 (예: CycloneDX 선언에 `specVersion` 없음) 형식
/// 자체를 알 수 없으면 에러입니다. 탐지는 버전을 지어내지 않습니다.
pub fn detect(root: &Value) -> Result<DetectedFormat, ValidationError> {
    let Some(obj) = root.as_object() else {
        return Err(ValidationError::Malformed {
            reason: "root is not a JSON object".to_owned(),
        });
    };

    if obj.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX") {
        let Some(version) = obj.get("specVersion").and_then(Value::as_str) else {
            return Err(ValidationError::Malformed {
                reason: "CycloneDX document without specVersion".to_owned(),
            });
        };
        return Ok(DetectedFormat {
            format: SbomFormat::CycloneDx,
            version: version.to_owned(),
        });
    }

    if let Some(declared) = obj.get("spdxVersion").and_then(Value::as_str) {
        let Some(version) = declared.strip_prefix("SPDX-") else {
            return Err(ValidationError::Malformed {
                reason: format!("unrecognized spdxVersion value: \"{declared}\""),
            });
        };
        return Ok(DetectedFormat {
            format: SbomFormat::Spdx,
            version: version.to_owned(),
        });
    }

    if obj.get("@graph").is_some_and(Value::is_array) {
        let Some(version) = graph_spec_version(obj) else {
            return Err(ValidationError::Malformed {
                reason: "@graph document without a recognizable SPDX 3.x context".to_owned(),
            });
        };
        return Ok(DetectedFormat {
            format: SbomFormat::Spdx,
            version,
        });
    }

    Err(ValidationError::UnknownFormat {
        reason: "no CycloneDX/SPDX marker at document root".to_owned(),
    })
}

/// `@graph` 문서에서 SPDX 3.x 버전을 추출합니다.
///
/// `@context` URL의 `rdf/3.y[.z]` 조각을 우선 사용하고, 없으면 그래프의
/// `CreationInfo` 요소가 선언한 `specVersion`을 봅니다. 패치 버전은
/// minor까지로 절단합니다 (레지스트리 키는 `"3.0"` 형태).
fn graph_spec_version(obj: &serde_json::Map<String, Value>) -> Option<String> {
    if let Some(context) = obj.get("@context").and_then(Value::as_str)
        && let Some(rest) = context.split("spdx.org/rdf/").nth(1)
        && rest.starts_with("3.")
    {
        let version: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        return Some(truncate_to_minor(&version));
    }
    let graph = obj.get("@graph")?.as_array()?;
    for element in graph {
        if element.get("type").and_then(Value::as_str) == Some("CreationInfo")
            && let Some(spec) = element.get("specVersion").and_then(Value::as_str)
        {
            return Some(truncate_to_minor(spec));
        }
    }
    None
}

fn truncate_to_minor(version: &str) -> String {
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{major}.{minor}"),
        _ => version.to_owned(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
