//! OPTIMADE 스키마 모듈
//!
//! 엔트리 타입별 기본 속성 목록과, 사용자 정의 속성을 합친
//! 엔트리 정보(info) 객체 생성을 담당합니다.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::config::PropertyDefinition;

/// 출력 헤더에 기록되는 OPTIMADE API 버전
pub const OPTIMADE_API_VERSION: &str = "1.2.0";

/// 엔트리 정보의 속성 하나
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyInfo {
    pub description: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub title: Option<String>,
}

/// 엔트리 정보 객체 (`/info/<entry_type>` 응답과 같은 모양)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub formats: Vec<String>,
    pub description: String,
    pub properties: IndexMap<String, PropertyInfo>,
    pub output_fields_by_format: IndexMap<String, Vec<String>>,
}

/// (이름, 설명, 타입, 단위)
type DefaultProperty = (&'static str, &'static str, &'static str, Option<&'static str>);

const COMMON_PROPERTIES: &[DefaultProperty] = &[
    ("id", "An entry's ID as defined in section Definition of Terms.", "string", None),
    ("type", "The name of the type of an entry.", "string", None),
    ("immutable_id", "The entry's immutable ID (e.g., an UUID).", "string", None),
    ("last_modified", "Date and time representing when the entry was last modified.", "timestamp", None),
];

const STRUCTURE_PROPERTIES: &[DefaultProperty] = &[
    ("elements", "The chemical symbols of the different elements present in the structure.", "list", None),
    ("nelements", "Number of different elements in the structure as an integer.", "integer", None),
    ("elements_ratios", "Relative proportions of different elements in the structure.", "list", None),
    ("chemical_formula_descriptive", "The chemical formula for a structure as a string in a form chosen by the API implementation.", "string", None),
    ("chemical_formula_reduced", "The reduced chemical formula for a structure as a string with element symbols and integer chemical proportion numbers.", "string", None),
    ("chemical_formula_hill", "The chemical formula for a structure in Hill form with element symbols followed by integer chemical proportion numbers.", "string", None),
    ("chemical_formula_anonymous", "The anonymous formula is the chemical_formula_reduced, but where the elements are instead first ordered by their chemical proportion number, and then, in order left to right, replaced by anonymized element names.", "string", None),
    ("dimension_types", "List of three integers describing the periodicity of the boundaries of the unit cell.", "list", None),
    ("nperiodic_dimensions", "An integer specifying the number of periodic dimensions in the structure.", "integer", None),
    ("lattice_vectors", "The three lattice vectors in Cartesian coordinates, in ångström (Å).", "list", Some("Å")),
    ("cartesian_site_positions", "Cartesian positions of each site in the structure.", "list", Some("Å")),
    ("nsites", "An integer specifying the length of the cartesian_site_positions property.", "integer", None),
    ("species", "A list describing the species of the sites of this structure.", "list", None),
    ("species_at_sites", "Name of the species at each site.", "list", None),
    ("assemblies", "A description of groups of sites that are statistically correlated.", "list", None),
    ("structure_features", "A list of strings that flag which special features are used by the structure.", "list", None),
];

const REFERENCE_PROPERTIES: &[DefaultProperty] = &[
    ("authors", "List of person objects containing the authors of the reference.", "list", None),
    ("editors", "List of person objects containing the editors of the reference.", "list", None),
    ("doi", "The digital object identifier of the reference.", "string", None),
    ("url", "The URL of the reference.", "string", None),
    ("address", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("annote", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("booktitle", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("chapter", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("crossref", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("edition", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("howpublished", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("institution", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("journal", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("key", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("month", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("note", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("number", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("organization", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("pages", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("publisher", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("school", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("series", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("title", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("bib_type", "Type of the reference, corresponding to the type property in the BiBTeX specification.", "string", None),
    ("volume", "Meaning of property matches the BiBTeX specification.", "string", None),
    ("year", "Meaning of property matches the BiBTeX specification.", "string", None),
];

/// 엔트리 타입의 기본 속성 (사용자 정의 타입이면 비어 있음)
pub fn default_properties(entry_type: &str) -> IndexMap<String, PropertyInfo> {
    let specific = match entry_type {
        "structures" => STRUCTURE_PROPERTIES,
        "references" => REFERENCE_PROPERTIES,
        _ => return IndexMap::new(),
    };

    COMMON_PROPERTIES
        .iter()
        .chain(specific)
        .map(|(name, description, property_type, unit)| {
            (
                name.to_string(),
                PropertyInfo {
                    description: Some(description.to_string()),
                    unit: unit.map(str::to_string),
                    property_type: Some(property_type.to_string()),
                    title: None,
                },
            )
        })
        .collect()
}

/// API에 노출되는 속성 이름 (이미 접두사가 있으면 그대로)
pub fn prefixed_name(name: &str, provider_prefix: &str) -> String {
    if name.starts_with(&format!("_{provider_prefix}")) {
        name.to_string()
    } else {
        format!("_{provider_prefix}_{name}")
    }
}

/// 사용자 정의 속성과 기본 속성을 합쳐 엔트리 정보 생성
///
/// 사용자 정의 속성이 먼저 오고, 기본 속성이 같은 이름을 덮어씁니다.
pub fn construct_entry_type_info(
    entry_type: &str,
    properties: &[PropertyDefinition],
    provider_prefix: &str,
) -> EntryInfo {
    let mut infos: IndexMap<String, PropertyInfo> = properties
        .iter()
        .map(|p| {
            (
                prefixed_name(&p.name, provider_prefix),
                PropertyInfo {
                    description: p.description.clone(),
                    unit: p.unit.clone(),
                    property_type: p.property_type.map(|t| t.to_string()),
                    title: p.title.clone(),
                },
            )
        })
        .collect();
    infos.extend(default_properties(entry_type));

    let fields = infos.keys().cloned().collect();
    EntryInfo {
        formats: vec!["json".to_string()],
        description: entry_type.to_string(),
        properties: infos,
        output_fields_by_format: IndexMap::from([("json".to_string(), fields)]),
    }
}

/// 출력 첫 줄의 헤더 객체
pub fn header() -> Value {
    serde_json::json!({"x-optimade": {"meta": {"api_version": OPTIMADE_API_VERSION}}})
}
