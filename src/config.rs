//! 아카이브 설정(`optimade.yaml`) 모듈
//!
//! 아카이브 안에서 데이터가 어디에 있는지, 어떤 엔트리 타입으로 변환할지,
//! 어떤 속성을 제공할지를 기술하는 설정 파일의 타입과 검증을 담당합니다.
//! 모든 검증은 파일 입출력 이전, 로드 시점에 한 번만 수행됩니다.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{OptimakeError, Result};

/// 아카이브 루트에 위치하는 설정 파일 이름
pub const CONFIG_FILE_NAME: &str = "optimade.yaml";

/// 지원하는 설정 파일 버전
pub const SUPPORTED_CONFIG_VERSIONS: &[&str] = &["0.1.0"];

/// 기본으로 지원되는 OPTIMADE 엔트리 타입 (그 외는 `_` 접두사 필요)
pub const STANDARD_ENTRY_TYPES: &[&str] = &["structures", "references"];

/// 속성 값 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Float,
    String,
    Integer,
    Boolean,
    Timestamp,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Float => "float",
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API로 제공할 속성의 간단한 정의
///
/// `name`은 API 필드 이름이며, 실제 API에서는 제공자 접두사가 붙어서 제공됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "type", default)]
    pub property_type: Option<PropertyType>,
    /// 정식 정의를 가리키는 URI
    #[serde(default)]
    pub maps_to: Option<String>,
    /// 속성 파일에서 이 속성 대신 찾아볼 컬럼 이름들
    #[serde(default)]
    pub aliases: Option<Vec<String>>,
}

impl PropertyDefinition {
    /// 이름만 가진 속성 정의 생성
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            unit: None,
            property_type: None,
            maps_to: None,
            aliases: None,
        }
    }

    /// 타입 설정
    pub fn with_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = Some(property_type);
        self
    }

    /// 별칭 설정
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn aliases(&self) -> &[String] {
        self.aliases.as_deref().unwrap_or_default()
    }
}

/// 압축 파일(또는 직접 경로)과 그 안에서 찾을 패턴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsedFiles {
    /// 압축 해제할 아카이브 또는 파일 경로 (아카이브 루트 기준)
    pub file: String,
    /// 압축 해제 후 아카이브 루트 기준으로 평가할 glob/정확한 경로 목록
    #[serde(default)]
    pub matches: Option<Vec<String>>,
}

impl ParsedFiles {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            matches: None,
        }
    }

    pub fn with_matches(mut self, matches: Vec<String>) -> Self {
        self.matches = Some(matches);
        self
    }

    /// 비어 있지 않은 패턴 목록이 있는지 확인
    pub fn has_matches(&self) -> bool {
        self.matches.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// 프로비넌스 데이터베이스(AiiDA 등)에서 엔트리를 가져오는 대체 소스 기술자
///
/// 내용은 등록된 [`crate::registry::AlternateSource`] 플러그인만 해석합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvenanceSource {
    #[serde(default)]
    pub aiida_file: Option<String>,
    #[serde(default)]
    pub aiida_profile: Option<String>,
    #[serde(default)]
    pub aiida_group: Option<String>,
}

/// 엔트리 데이터 위치: 파일 패턴 목록 또는 대체 소스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPaths {
    Files(Vec<ParsedFiles>),
    Provenance(ProvenanceSource),
}

impl Default for EntryPaths {
    fn default() -> Self {
        EntryPaths::Files(Vec::new())
    }
}

/// 엔트리 타입 하나에 대한 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    pub entry_type: String,
    pub entry_paths: EntryPaths,
    #[serde(default)]
    pub property_paths: Vec<ParsedFiles>,
    #[serde(default)]
    pub property_definitions: Vec<PropertyDefinition>,
}

/// 이미 완성된 JSONL 파일 하나로 API를 기술하는 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonlConfig {
    /// JSONL 파일을 담고 있는 압축 파일 (없으면 아카이브에 직접 존재)
    #[serde(default)]
    pub file: Option<String>,
    pub jsonl_path: String,
}

/// 엔트리 설정 목록 또는 단일 JSONL 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entries {
    Structured(Vec<EntryConfig>),
    Jsonl(JsonlConfig),
}

/// `optimade.yaml` 루트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub config_version: String,
    pub database_description: String,
    pub entries: Entries,
}

impl Config {
    /// 파일에서 설정 로드
    ///
    /// # Arguments
    /// * `path` - `optimade.yaml` 경로
    ///
    /// # Returns
    /// 검증된 `Config` 또는 에러
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| OptimakeError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&data)
    }

    /// YAML 문자열에서 설정 로드
    pub fn from_yaml(data: &str) -> Result<Self> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(data).map_err(|e| OptimakeError::ConfigInvalid {
                reason: e.to_string(),
            })?;

        // 버전은 구조 검증보다 먼저 확인
        check_config_version(&raw)?;

        let config: Config =
            serde_yaml::from_value(raw).map_err(|e| OptimakeError::ConfigInvalid {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 구조적 역직렬화 이후의 필드 수준 검증
    pub fn validate(&self) -> Result<()> {
        let Entries::Structured(entries) = &self.entries else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        for entry in entries {
            if !is_valid_entry_type(&entry.entry_type) {
                return Err(invalid(format!(
                    "OPTIMADE entry type must be either 'structures', 'references', or contain a custom prefix, not {:?}",
                    entry.entry_type
                )));
            }
            if !seen.insert(entry.entry_type.as_str()) {
                return Err(invalid(format!(
                    "Each entry type must be listed only once in the config file (found {:?} twice)",
                    entry.entry_type
                )));
            }

            for property in &entry.property_definitions {
                if !is_valid_identifier(&property.name) {
                    return Err(invalid(format!(
                        "Property name {:?} must match ^[a-z_][a-z_0-9]*$",
                        property.name
                    )));
                }
            }

            if let EntryPaths::Provenance(source) = &entry.entry_paths {
                match (&source.aiida_file, &source.aiida_profile) {
                    (None, None) => {
                        return Err(invalid(
                            "Either 'aiida_file' or 'aiida_profile' must be defined.".to_string(),
                        ))
                    }
                    (Some(_), Some(_)) => {
                        return Err(invalid(
                            "Both 'aiida_file' and 'aiida_profile' cannot be defined at the same time."
                                .to_string(),
                        ))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// 구조화된 엔트리 설정 목록 (JSONL 설정이면 빈 슬라이스)
    pub fn entry_configs(&self) -> &[EntryConfig] {
        match &self.entries {
            Entries::Structured(entries) => entries,
            Entries::Jsonl(_) => &[],
        }
    }
}

fn invalid(reason: String) -> OptimakeError {
    OptimakeError::ConfigInvalid { reason }
}

fn check_config_version(raw: &serde_yaml::Value) -> Result<()> {
    let found = raw.get("config_version").and_then(|v| match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    match found {
        Some(ref v) if SUPPORTED_CONFIG_VERSIONS.contains(&v.as_str()) => Ok(()),
        found => Err(OptimakeError::UnsupportedConfigVersion {
            found,
            supported: SUPPORTED_CONFIG_VERSIONS,
        }),
    }
}

/// 허용되는 엔트리 타입인지 확인
pub fn is_valid_entry_type(entry_type: &str) -> bool {
    STANDARD_ENTRY_TYPES.contains(&entry_type) || entry_type.starts_with('_')
}

/// `^[a-z_][a-z_0-9]*$` 식별자 문법 확인
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
