//! 내장 파서 모듈
//!
//! 외부 도메인 라이브러리 없이 사용할 수 있는 기본 플러그인들입니다.
//!
//! - [`JsonRecordParser`] : JSON 파일 → 중간 레코드
//! - [`OptimadeRecordConverter`] : 중간 레코드 → OPTIMADE 엔트리 매핑
//! - [`CsvPropertyParser`] : CSV 속성 테이블 → ID별 속성

use memmap2::Mmap;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context};

use crate::config::PropertyDefinition;
use crate::properties::PropertyTable;
use crate::registry::{Converted, EntryConverter, EntryParser, Parsed, PropertyParser, Record};

/// 레코드에서 엔트리 ID로 사용할 수 있는 키 (우선순위 순)
const ID_KEYS: &[&str] = &["id", "mat_id", "task_id"];

/// JSON 파일 파서
///
/// - 최상위 배열 → 원소 하나하나가 레코드
/// - `attributes` 키를 가진 객체 → 레코드 하나
/// - 그 외 객체 → 배열 값을 가진 모든 키의 원소들
#[derive(Debug, Clone)]
pub struct JsonRecordParser {
    /// 대용량 파일 임계값 (이상이면 메모리 매핑 사용)
    pub mmap_threshold: u64,
}

impl JsonRecordParser {
    pub fn new() -> Self {
        Self {
            mmap_threshold: 10 * 1024 * 1024, // 10MB
        }
    }

    fn read(&self, path: &Path) -> anyhow::Result<Value> {
        let file_size = std::fs::metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();

        if file_size >= self.mmap_threshold {
            // 대용량 파일: 메모리 매핑 사용
            parse_with_mmap(path)
        } else {
            parse_with_reader(path)
        }
    }
}

impl Default for JsonRecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser for JsonRecordParser {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, path: &Path) -> anyhow::Result<Parsed> {
        let json = self.read(path)?;
        Ok(split_records(json))
    }
}

/// 버퍼 리더를 사용한 JSON 파싱
fn parse_with_reader(path: &Path) -> anyhow::Result<Value> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// 메모리 매핑을 사용한 JSON 파싱 (대용량 파일용)
fn parse_with_mmap(path: &Path) -> anyhow::Result<Value> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;

    // SAFETY: 변환 중에는 아카이브 루트를 독점적으로 사용한다고 가정
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("memory map failed for {}", path.display()))?;

    serde_json::from_slice(&mmap).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn split_records(json: Value) -> Parsed {
    match json {
        Value::Array(items) => Parsed::Many(items),
        Value::Object(map) if map.contains_key("attributes") => Parsed::One(Value::Object(map)),
        Value::Object(map) => Parsed::Many(
            map.into_iter()
                .filter_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .flatten()
                .collect(),
        ),
        other => Parsed::One(other),
    }
}

/// 레코드 매핑을 OPTIMADE 엔트리로 변환하는 기본 컨버터
///
/// 레코드가 `attributes`를 가지면 그대로 사용하고, 아니면 ID 키를 제외한
/// 최상위 필드를 속성으로 취급합니다. 속성 정의의 별칭은 레코드의 `data`
/// 객체(없으면 속성 자체)에서 찾아 제공자 접두사를 붙여 기록합니다.
#[derive(Debug, Clone)]
pub struct OptimadeRecordConverter {
    entry_type: String,
}

impl OptimadeRecordConverter {
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
        }
    }
}

impl EntryConverter for OptimadeRecordConverter {
    fn name(&self) -> &str {
        "optimade-record"
    }

    fn convert(
        &self,
        record: &Record,
        properties: &[PropertyDefinition],
        provider_prefix: &str,
    ) -> anyhow::Result<Converted> {
        let Some(object) = record.as_object() else {
            bail!("expected a JSON object record, found {}", type_name(record));
        };
        let data = object.get("data").and_then(Value::as_object);

        let mut attributes = match object.get("attributes") {
            Some(Value::Object(attributes)) => attributes.clone(),
            Some(other) => bail!("`attributes` must be an object, found {}", type_name(other)),
            None => object
                .iter()
                .filter(|(k, _)| !ID_KEYS.contains(&k.as_str()) && !matches!(k.as_str(), "type" | "data"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        let id = find_id(object).or_else(|| data.and_then(find_id));

        for property in properties {
            let source = data.unwrap_or(&attributes);
            let value = property
                .aliases()
                .iter()
                .chain(std::iter::once(&property.name))
                .find_map(|key| source.get(key).filter(|v| !v.is_null()))
                .cloned();
            if let Some(value) = value {
                attributes.insert(format!("_{}_{}", provider_prefix, property.name), value);
            }
        }

        let mut entry = Map::new();
        entry.insert("id".to_string(), id.map(Value::String).unwrap_or(Value::Null));
        entry.insert("type".to_string(), Value::String(self.entry_type.clone()));
        entry.insert("attributes".to_string(), Value::Object(attributes));
        Ok(Converted::Mapping(entry))
    }
}

fn find_id(object: &Map<String, Value>) -> Option<String> {
    ID_KEYS.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// CSV 속성 파일 파서
///
/// `id` 컬럼(없으면 이름에 "id"가 들어간 첫 컬럼)을 ID로 사용하고,
/// 속성 별칭 컬럼이 있으면 그 값을 정식 속성 이름으로 복사합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPropertyParser;

impl PropertyParser for CsvPropertyParser {
    fn name(&self) -> &str {
        "csv"
    }

    fn parse(&self, path: &Path, properties: &[PropertyDefinition]) -> anyhow::Result<PropertyTable> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("cannot read header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let id_index = id_column(&headers).with_context(|| {
            format!(
                "CSV file {} must have a column containing 'id': not just {:?}",
                path.display(),
                headers
            )
        })?;

        // 속성 이름 → 값을 가져올 컬럼 (첫 번째로 존재하는 별칭)
        let alias_columns: Vec<(&str, usize)> = properties
            .iter()
            .filter_map(|p| {
                p.aliases()
                    .iter()
                    .find_map(|alias| headers.iter().position(|h| h == alias))
                    .map(|index| (p.name.as_str(), index))
            })
            .collect();

        let mut table = PropertyTable::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("{}: bad row {}", path.display(), line + 2))?;

            let Some(id) = record.get(id_index).map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };

            let mut row = Map::new();
            for (index, (header, cell)) in headers.iter().zip(record.iter()).enumerate() {
                if index == id_index && header == "id" {
                    continue;
                }
                row.insert(header.clone(), infer_cell(cell));
            }
            for (name, index) in &alias_columns {
                let cell = record.get(*index).unwrap_or_default();
                row.insert(name.to_string(), infer_cell(cell));
            }

            table.entry(id.to_string()).or_default().extend(row);
        }

        Ok(table)
    }
}

/// ID 컬럼 위치: 정확히 `id`, 없으면 이름에 "id"가 들어간 첫 컬럼
fn id_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|h| h == "id").or_else(|| {
        headers
            .iter()
            .position(|h| h.to_ascii_lowercase().contains("id"))
    })
}

/// CSV 셀 값의 타입 추론: 빈 값 → null, 정수 → 실수 → 불리언 → 문자열 순
fn infer_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match cell {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}
