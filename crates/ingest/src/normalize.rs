//! 메타데이터 정규화 — 형식 불문 공통 필드 추출
//!
//! 검증된 문서에서 [`NormalizedMetadata`]를 추출합니다. 순수 함수이며,
//! 같은 문서에 대해 항상 같은 출력을 냅니다 (재검증 시 덮어쓰기 안전).
//!
//! 동등한 내용의 CycloneDX / SPDX flat / SPDX `@graph` 문서는 동일한
//! 메타데이터로 수렴해야 합니다. 형식별 추출기는 그 계약 아래 작성되며,
//! 형식 고유 필드는 버리지 않고 원본 아티팩트에 남습니다 (정규화는
//! 투영이지 변환이 아님).

use serde_json::Value;

use sbomgate_core::types::{
    ComponentRecord, DependencyEdge, LicenseExpr, NormalizedMetadata, SbomFormat, SupplierInfo,
};

use crate::license::parse_license;
use crate::registry::ValidatedDocument;

/// 검증된 문서에서 정규화 메타데이터를 추출합니다.
pub fn normalize(doc: &ValidatedDocument) -> NormalizedMetadata {
    match doc.format {
        SbomFormat::CycloneDx => normalize_cyclonedx(&doc.root),
        SbomFormat::Spdx => {
            if doc.root.get("@graph").is_some() {
                normalize_spdx_graph(&doc.root)
            } else {
                normalize_spdx_flat(&doc.root)
            }
        }
    }
}

fn str_field(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn opt_str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

// ─── CycloneDX ───────────────────────────────────────────────────────

fn normalize_cyclonedx(root: &Value) -> NormalizedMetadata {
    let mut meta = NormalizedMetadata::default();

    if let Some(component) = root.pointer("/metadata/component") {
        meta.name = str_field(component, "name");
        meta.version = str_field(component, "version");
        meta.licenses = cdx_licenses(component.get("licenses"));
        if let Some(supplier) = component.get("supplier") {
            meta.suppliers.push(cdx_supplier(supplier));
        }
    }

    if let Some(components) = root.get("components").and_then(Value::as_array) {
        for component in components {
            let name = str_field(component, "name");
            // bom-ref가 없으면 purl, 그것도 없으면 이름으로 참조 ID 대체
            let bom_ref = opt_str_field(component, "bom-ref")
                .or_else(|| opt_str_field(component, "purl"))
                .unwrap_or_else(|| name.clone());
            meta.components.push(ComponentRecord {
                bom_ref,
                name,
                version: str_field(component, "version"),
                purl: opt_str_field(component, "purl"),
                licenses: cdx_licenses(component.get("licenses")),
            });
        }
    }

    if let Some(dependencies) = root.get("dependencies").and_then(Value::as_array) {
        for dep in dependencies {
            let Some(from_ref) = dep.get("ref").and_then(Value::as_str) else {
                continue;
            };
            let Some(targets) = dep.get("dependsOn").and_then(Value::as_array) else {
                continue;
            };
            for target in targets.iter().filter_map(Value::as_str) {
                meta.dependencies.push(DependencyEdge {
                    from_ref: from_ref.to_owned(),
                    to_ref: target.to_owned(),
                });
            }
        }
    }

    meta
}

/// CycloneDX `licenses` 배열: `{license: {id|name}}` 또는 `{expression}` 항목.
fn cdx_licenses(licenses: Option<&Value>) -> Vec<LicenseExpr> {
    let Some(list) = licenses.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in list {
        if let Some(expr) = entry.get("expression").and_then(Value::as_str) {
            out.push(parse_license(expr));
        } else if let Some(license) = entry.get("license") {
            if let Some(id) = license.get("id").and_then(Value::as_str) {
                out.push(parse_license(id));
            } else if let Some(name) = license.get("name").and_then(Value::as_str) {
                // `name`은 SPDX 식별자가 아닌 자유 텍스트 — 원문 보존
                out.push(LicenseExpr::Custom(name.to_owned()));
            }
        }
    }
    out
}

fn cdx_supplier(supplier: &Value) -> SupplierInfo {
    let contacts = supplier
        .get("contact")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|c| c.get("email").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    SupplierInfo {
        name: str_field(supplier, "name"),
        contacts,
    }
}

// ─── SPDX flat (2.x) ─────────────────────────────────────────────────

fn normalize_spdx_flat(root: &Value) -> NormalizedMetadata {
    let mut meta = NormalizedMetadata::default();
    let packages = root.get("packages").and_then(Value::as_array);
    let relationships = root.get("relationships").and_then(Value::as_array);

    if let Some(list) = packages {
        for package in list {
            meta.components.push(ComponentRecord {
                bom_ref: str_field(package, "SPDXID"),
                name: str_field(package, "name"),
                version: str_field(package, "versionInfo"),
                purl: spdx_purl(package),
                licenses: spdx_flat_licenses(package),
            });
        }
    }

    // 루트 컴포넌트: documentDescribes 우선, 없으면 DESCRIBES 관계
    let root_id = root
        .get("documentDescribes")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            relationships?.iter().find_map(|rel| {
                (rel.get("relationshipType").and_then(Value::as_str) == Some("DESCRIBES"))
                    .then(|| opt_str_field(rel, "relatedSpdxElement"))
                    .flatten()
            })
        });

    if let Some(root_id) = root_id
        && let Some(root_pkg) = packages
            .and_then(|list| list.iter().find(|p| str_field(p, "SPDXID") == root_id))
    {
        meta.name = str_field(root_pkg, "name");
        meta.version = str_field(root_pkg, "versionInfo");
        meta.licenses = spdx_flat_licenses(root_pkg);
        if let Some(supplier) = spdx_flat_supplier(root_pkg) {
            meta.suppliers.push(supplier);
        }
    } else {
        // 루트 패키지 없음 — 문서 이름으로 대체
        meta.name = str_field(root, "name");
    }

    if let Some(list) = relationships {
        for rel in list {
            let rel_type = rel.get("relationshipType").and_then(Value::as_str);
            let Some(from) = rel.get("spdxElementId").and_then(Value::as_str) else {
                continue;
            };
            let Some(to) = rel.get("relatedSpdxElement").and_then(Value::as_str) else {
                continue;
            };
            // DEPENDENCY_OF는 방향이 반대
            match rel_type {
                Some("DEPENDS_ON") => meta.dependencies.push(DependencyEdge {
                    from_ref: from.to_owned(),
                    to_ref: to.to_owned(),
                }),
                Some("DEPENDENCY_OF") => meta.dependencies.push(DependencyEdge {
                    from_ref: to.to_owned(),
                    to_ref: from.to_owned(),
                }),
                _ => {}
            }
        }
    }

    meta
}

/// `externalRefs`에서 purl 로케이터를 찾습니다.
fn spdx_purl(package: &Value) -> Option<String> {
    package
        .get("externalRefs")
        .and_then(Value::as_array)?
        .iter()
        .find(|r| r.get("referenceType").and_then(Value::as_str) == Some("purl"))
        .and_then(|r| opt_str_field(r, "referenceLocator"))
}

/// `licenseDeclared` 우선, 없으면 `licenseConcluded`.
/// `NOASSERTION`/`NONE` 센티넬은 라이선스가 아니므로 버립니다.
fn spdx_flat_licenses(package: &Value) -> Vec<LicenseExpr> {
    ["licenseDeclared", "licenseConcluded"]
        .iter()
        .find_map(|key| package.get(*key).and_then(Value::as_str))
        .filter(|s| *s != "NOASSERTION" && *s != "NONE")
        .map(|s| vec![parse_license(s)])
        .unwrap_or_default()
}

/// SPDX 2.x supplier 문자열: `"Organization: Acme"` / `"Person: Kim"`.
fn spdx_flat_supplier(package: &Value) -> Option<SupplierInfo> {
    let raw = package.get("supplier").and_then(Value::as_str)?;
    if raw == "NOASSERTION" {
        return None;
    }
    let name = raw
        .split_once(':')
        .map(|(_, rest)| rest.trim())
        .unwrap_or(raw)
        .to_owned();
    Some(SupplierInfo {
        name,
        contacts: Vec::new(),
    })
}

// ─── SPDX @graph (3.x) ───────────────────────────────────────────────

fn normalize_spdx_graph(root: &Value) -> NormalizedMetadata {
    let mut meta = NormalizedMetadata::default();
    let Some(graph) = root.get("@graph").and_then(Value::as_array) else {
        return meta;
    };

    let find_element = |id: &str| {
        graph
            .iter()
            .find(|el| str_field(el, "spdxId") == id || str_field(el, "@id") == id)
    };

    // 라이선스 정보는 관계 요소로 표현됨 — 패키지별로 역인덱스 구성
    let declared_license = |package_id: &str| -> Vec<LicenseExpr> {
        graph
            .iter()
            .filter(|el| {
                str_field(el, "type") == "Relationship"
                    && str_field(el, "relationshipType") == "hasDeclaredLicense"
                    && str_field(el, "from") == package_id
            })
            .flat_map(|rel| rel.get("to").and_then(Value::as_array).into_iter().flatten())
            .filter_map(Value::as_str)
            .filter_map(find_element)
            .filter_map(|lic| opt_str_field(lic, "simplelicensing_licenseExpression"))
            .map(|expr| parse_license(&expr))
            .collect()
    };

    for element in graph {
        if str_field(element, "type") != "software_Package" {
            continue;
        }
        let spdx_id = str_field(element, "spdxId");
        meta.components.push(ComponentRecord {
            bom_ref: spdx_id.clone(),
            name: str_field(element, "name"),
            version: str_field(element, "software_packageVersion"),
            purl: opt_str_field(element, "software_packageUrl"),
            licenses: declared_license(&spdx_id),
        });
    }

    // 루트: SpdxDocument.rootElement 우선, 없으면 describes 관계
    let root_id = graph
        .iter()
        .find(|el| str_field(el, "type") == "SpdxDocument")
        .and_then(|doc| doc.get("rootElement"))
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            graph.iter().find_map(|el| {
                (str_field(el, "type") == "Relationship"
                    && str_field(el, "relationshipType") == "describes")
                    .then(|| el.get("to").and_then(Value::as_array))
                    .flatten()
                    .and_then(|ids| ids.first())
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
        });

    if let Some(root_id) = root_id
        && let Some(root_pkg) = find_element(&root_id)
    {
        meta.name = str_field(root_pkg, "name");
        meta.version = str_field(root_pkg, "software_packageVersion");
        meta.licenses = declared_license(&root_id);
        if let Some(agent_id) = root_pkg.get("suppliedBy").and_then(Value::as_str)
            && let Some(agent) = find_element(agent_id)
        {
            meta.suppliers.push(SupplierInfo {
                name: str_field(agent, "name"),
                contacts: Vec::new(),
            });
        }
    }

    for element in graph {
        if str_field(element, "type") != "Relationship"
            || str_field(element, "relationshipType") != "dependsOn"
        {
            continue;
        }
        let from = str_field(element, "from");
        if from.is_empty() {
            continue;
        }
        if let Some(targets) = element.get("to").and_then(Value::as_array) {
            for target in targets.iter().filter_map(Value::as_str) {
                meta.dependencies.push(DependencyEdge {
                    from_ref: from.clone(),
                    to_ref: target.to_owned(),
                });
            }
        }
    }

    meta
}

// ─── Tests ───────────────────────────────────────────────────────────
