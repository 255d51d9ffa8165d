//! 파서/컨버터 레지스트리 모듈
//!
//! 엔트리 타입별로 순서가 정해진 파서·컨버터 목록과, 확장자별 속성 파서 목록을 보관합니다.
//! 디스패치는 항상 "먼저 성공한 것이 이긴다" 규칙을 따르며, 모두 실패하면
//! 각 후보의 실패 사유를 모은 에러를 반환합니다.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::config::{EntryConfig, PropertyDefinition, ProvenanceSource};
use crate::entries::Entry;
use crate::error::{Failure, OptimakeError, Result};
use crate::parsers::{CsvPropertyParser, JsonRecordParser, OptimadeRecordConverter};
use crate::properties::PropertyTable;

/// 파서가 만들어 내는 중간 레코드
pub type Record = Value;

/// 파서 한 번의 결과: 레코드 하나 또는 여러 개
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    One(Record),
    Many(Vec<Record>),
}

impl Parsed {
    /// 비어 있는 결과인지 확인 (비어 있으면 다음 파서를 시도)
    pub fn is_empty(&self) -> bool {
        match self {
            Parsed::One(record) => is_empty_record(record),
            Parsed::Many(records) => records.is_empty(),
        }
    }
}

fn is_empty_record(record: &Record) -> bool {
    match record {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// 매핑 이외의 결과를 내는 컨버터가 구현하는 어댑터
///
/// 변환된 엔트리를 `entry()`로 노출합니다.
pub trait EntryAdapter {
    fn entry(&self) -> Map<String, Value>;
}

/// 컨버터 결과
pub enum Converted {
    /// `id`, `type`, `attributes` 키를 가진 매핑
    Mapping(Map<String, Value>),
    /// 엔트리를 노출하는 어댑터 객체
    Adapter(Box<dyn EntryAdapter>),
}

impl Converted {
    /// 매핑으로 정규화
    pub fn into_mapping(self) -> Map<String, Value> {
        match self {
            Converted::Mapping(map) => map,
            Converted::Adapter(adapter) => adapter.entry(),
        }
    }
}

/// 파일 하나를 중간 레코드로 읽는 파서
pub trait EntryParser: Send + Sync {
    fn name(&self) -> &str;
    fn parse(&self, path: &Path) -> anyhow::Result<Parsed>;
}

/// 중간 레코드를 OPTIMADE 엔트리로 변환하는 컨버터
pub trait EntryConverter: Send + Sync {
    fn name(&self) -> &str;
    fn convert(
        &self,
        record: &Record,
        properties: &[PropertyDefinition],
        provider_prefix: &str,
    ) -> anyhow::Result<Converted>;
}

/// 보조 속성 파일(CSV 등)을 ID → 속성 테이블로 읽는 파서
pub trait PropertyParser: Send + Sync {
    fn name(&self) -> &str;
    fn parse(&self, path: &Path, properties: &[PropertyDefinition]) -> anyhow::Result<PropertyTable>;
}

/// 파일 대신 프로비넌스 데이터베이스 등에서 엔트리를 직접 만드는 소스
pub trait AlternateSource: Send + Sync {
    fn name(&self) -> &str;
    fn construct_entries(
        &self,
        archive_root: &Path,
        source: &ProvenanceSource,
        entry_config: &EntryConfig,
        provider_prefix: &str,
    ) -> anyhow::Result<Vec<Entry>>;
}

/// 엔트리 타입 → 파서/컨버터, 확장자 → 속성 파서 레지스트리
#[derive(Clone, Default)]
pub struct ParserRegistry {
    entry_parsers: IndexMap<String, Vec<Arc<dyn EntryParser>>>,
    converters: IndexMap<String, Vec<Arc<dyn EntryConverter>>>,
    property_parsers: IndexMap<String, Vec<Arc<dyn PropertyParser>>>,
    alternate_source: Option<Arc<dyn AlternateSource>>,
}

impl ParserRegistry {
    /// 아무것도 등록되지 않은 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 JSON 파서/컨버터와 CSV 속성 파서가 등록된 레지스트리
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for entry_type in crate::config::STANDARD_ENTRY_TYPES {
            registry.register_parser(entry_type, JsonRecordParser::new());
            registry.register_converter(entry_type, OptimadeRecordConverter::new(*entry_type));
        }
        registry.register_property_parser("csv", CsvPropertyParser);
        registry
    }

    /// 엔트리 타입에 파서 추가 (등록 순서가 우선순위)
    pub fn register_parser(&mut self, entry_type: &str, parser: impl EntryParser + 'static) {
        self.entry_parsers
            .entry(entry_type.to_string())
            .or_default()
            .push(Arc::new(parser));
    }

    /// 엔트리 타입에 컨버터 추가 (등록 순서가 우선순위)
    pub fn register_converter(
        &mut self,
        entry_type: &str,
        converter: impl EntryConverter + 'static,
    ) {
        self.converters
            .entry(entry_type.to_string())
            .or_default()
            .push(Arc::new(converter));
    }

    /// 확장자(점 제외, 예: `csv`)에 속성 파서 추가
    pub fn register_property_parser(
        &mut self,
        extension: &str,
        parser: impl PropertyParser + 'static,
    ) {
        self.property_parsers
            .entry(normalize_extension(extension))
            .or_default()
            .push(Arc::new(parser));
    }

    /// 대체 엔트리 소스 설정
    pub fn set_alternate_source(&mut self, source: impl AlternateSource + 'static) {
        self.alternate_source = Some(Arc::new(source));
    }

    pub fn parsers(&self, entry_type: &str) -> &[Arc<dyn EntryParser>] {
        self.entry_parsers
            .get(entry_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn converters(&self, entry_type: &str) -> &[Arc<dyn EntryConverter>] {
        self.converters
            .get(entry_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn property_parsers(&self, extension: &str) -> &[Arc<dyn PropertyParser>] {
        self.property_parsers
            .get(&normalize_extension(extension))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn alternate_source(&self) -> Option<&Arc<dyn AlternateSource>> {
        self.alternate_source.as_ref()
    }

    /// 엔트리 타입에 파서와 컨버터가 모두 있는지 확인
    pub fn ensure_supported(&self, entry_type: &str) -> Result<()> {
        if self.parsers(entry_type).is_empty() {
            return Err(OptimakeError::UnsupportedEntryType {
                entry_type: entry_type.to_string(),
                stage: "Parsing",
            });
        }
        if self.converters(entry_type).is_empty() {
            return Err(OptimakeError::UnsupportedEntryType {
                entry_type: entry_type.to_string(),
                stage: "Converting",
            });
        }
        Ok(())
    }

    /// 등록된 파서를 순서대로 시도하여 처음으로 비어 있지 않은 결과를 반환
    pub fn try_parse(&self, entry_type: &str, path: &Path) -> Result<Parsed> {
        let mut failures = Vec::new();
        for parser in self.parsers(entry_type) {
            match parser.parse(path) {
                Ok(parsed) if !parsed.is_empty() => return Ok(parsed),
                Ok(_) => failures.push(Failure::new(parser.name(), "no entries parsed")),
                Err(e) => failures.push(Failure::new(parser.name(), format!("{e:#}"))),
            }
        }
        Err(OptimakeError::ParsersExhausted {
            path: path.to_path_buf(),
            failures,
        })
    }

    /// 등록된 컨버터를 순서대로 시도하여 처음 성공한 엔트리를 반환
    ///
    /// 결과가 엔트리 형태로 정규화되지 않으면 해당 컨버터의 실패로 취급합니다.
    pub fn try_convert(
        &self,
        entry_type: &str,
        record: &Record,
        record_id: &str,
        properties: &[PropertyDefinition],
        provider_prefix: &str,
    ) -> Result<Entry> {
        let mut failures = Vec::new();
        for converter in self.converters(entry_type) {
            let converted = converter
                .convert(record, properties, provider_prefix)
                .and_then(|c| Entry::from_mapping(c.into_mapping()));
            match converted {
                Ok(entry) => return Ok(entry),
                Err(e) => failures.push(Failure::new(converter.name(), format!("{e:#}"))),
            }
        }
        Err(OptimakeError::ConvertersExhausted {
            entry_id: record_id.to_string(),
            failures,
        })
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    struct Failing(&'static str);

    impl EntryParser for Failing {
        fn name(&self) -> &str {
            self.0
        }
        fn parse(&self, _path: &Path) -> anyhow::Result<Parsed> {
            anyhow::bail!("cannot read this format")
        }
    }

    struct Empty;

    impl EntryParser for Empty {
        fn name(&self) -> &str {
            "empty"
        }
        fn parse(&self, _path: &Path) -> anyhow::Result<Parsed> {
            Ok(Parsed::Many(Vec::new()))
        }
    }

    struct Fixed(Value);

    impl EntryParser for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn parse(&self, _path: &Path) -> anyhow::Result<Parsed> {
            Ok(Parsed::One(self.0.clone()))
        }
    }

    struct AdapterConverter;

    struct StructureAdapter(String);

    impl EntryAdapter for StructureAdapter {
        fn entry(&self) -> Map<String, Value> {
            let Value::Object(map) = json!({
                "id": self.0,
                "type": "structures",
                "attributes": {"nsites": 2}
            }) else {
                unreachable!()
            };
            map
        }
    }

    impl EntryConverter for AdapterConverter {
        fn name(&self) -> &str {
            "adapter"
        }
        fn convert(
            &self,
            record: &Record,
            _properties: &[PropertyDefinition],
            _provider_prefix: &str,
        ) -> anyhow::Result<Converted> {
            let name = record["name"].as_str().unwrap_or_default().to_string();
            Ok(Converted::Adapter(Box::new(StructureAdapter(name))))
        }
    }

    #[test]
    fn test_first_success_wins() {
        let mut registry = ParserRegistry::new();
        registry.register_parser("structures", Failing("broken"));
        registry.register_parser("structures", Empty);
        registry.register_parser("structures", Fixed(json!({"a": 1})));
        registry.register_parser("structures", Fixed(json!({"b": 2})));

        let parsed = registry
            .try_parse("structures", Path::new("1.cif"))
            .unwrap();
        assert_eq!(parsed, Parsed::One(json!({"a": 1})));
    }

    #[test]
    fn test_exhausted_parsers_report_each_failure() {
        let mut registry = ParserRegistry::new();
        registry.register_parser("structures", Failing("cif"));
        registry.register_parser("structures", Empty);

        let err = registry
            .try_parse("structures", Path::new("1.cif"))
            .unwrap_err();
        match err {
            OptimakeError::ParsersExhausted { path, failures } => {
                assert_eq!(path, PathBuf::from("1.cif"));
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].name, "cif");
                assert!(failures[0].reason.contains("cannot read this format"));
                assert_eq!(failures[1].reason, "no entries parsed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_adapter_conversion() {
        let mut registry = ParserRegistry::new();
        registry.register_converter("structures", AdapterConverter);

        let entry = registry
            .try_convert("structures", &json!({"name": "NaCl"}), "x/1", &[], "test")
            .unwrap();
        assert_eq!(entry.id.as_deref(), Some("NaCl"));
        assert_eq!(entry.entry_type, "structures");
        assert_eq!(entry.attributes["nsites"], json!(2));
    }

    #[test]
    fn test_ensure_supported() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.ensure_supported("structures").is_ok());
        assert!(registry.ensure_supported("references").is_ok());

        let err = registry.ensure_supported("_custom").unwrap_err();
        assert!(err.to_string().contains("Parsing type _custom is not supported"));
    }

    #[test]
    fn test_property_parser_extension_normalized() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.property_parsers(".CSV").len(), 1);
        assert_eq!(registry.property_parsers("csv").len(), 1);
        assert!(registry.property_parsers("xlsx").is_empty());
    }
}
