//! 속성 병합 모듈
//!
//! 보조 속성 파일(CSV 등)을 엔트리와 독립적으로 읽어 ID → 속성 테이블을 만든 뒤,
//! 엔트리 ID(불변 ID, 파일 이름 기반 ID, 짧은 ID)로 맞춰 선언된 타입으로 변환하여
//! 제공자 접두사가 붙은 속성으로 병합합니다.
//!
//! 행/필드 불일치는 경고로만 남기고, 타입 변환 실패는 치명적 에러입니다.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use crate::config::{PropertyDefinition, PropertyType};
use crate::diagnostics::{Diagnostics, Warning};
use crate::entries::EntryMap;
use crate::error::{Failure, OptimakeError, Result};
use crate::ids::basename;
use crate::pattern::MatchesByFile;
use crate::registry::ParserRegistry;
use crate::stats::{create_progress_bar, Statistics};

/// 외부 ID → (속성 이름 → 원시 값)
pub type PropertyTable = IndexMap<String, Map<String, Value>>;

/// 일치한 속성 파일을 모두 읽어 하나의 테이블로 합침
///
/// 파일마다 확장자에 등록된 속성 파서를 순서대로 시도하며, 같은 ID의 행은
/// 나중 파일의 값으로 갱신됩니다.
///
/// # Errors
/// - 확장자에 등록된 파서가 없으면 `NoPropertyParser`
/// - 한 파일에 대해 모든 파서가 실패하면 `PropertyParsersExhausted`
/// - 파일은 있었지만 합친 테이블이 비어 있으면 `NoPropertiesParsed`
pub fn parse_property_files(
    matches_by_file: &MatchesByFile,
    property_definitions: &[PropertyDefinition],
    registry: &ParserRegistry,
    show_progress: bool,
    stats: &Statistics,
) -> Result<PropertyTable> {
    let paths: Vec<_> = matches_by_file.values().flatten().collect();
    if paths.is_empty() {
        return Ok(PropertyTable::new());
    }

    let mut table = PropertyTable::new();
    let mut failures = Vec::new();
    let pb = create_progress_bar(paths.len(), "Parsing property files", show_progress);

    for path in paths {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let parsers = registry.property_parsers(&extension);
        if parsers.is_empty() {
            return Err(OptimakeError::NoPropertyParser {
                path: path.clone(),
                extension,
            });
        }

        let mut file_failures = Vec::new();
        let mut parsed = None;
        for parser in parsers {
            match parser.parse(path, property_definitions) {
                Ok(rows) => {
                    parsed = Some(rows);
                    break;
                }
                Err(e) => file_failures.push(Failure::new(parser.name(), format!("{e:#}"))),
            }
        }

        let Some(rows) = parsed else {
            return Err(OptimakeError::PropertyParsersExhausted {
                path: path.clone(),
                failures: file_failures,
            });
        };

        debug!(path = %path.display(), rows = rows.len(), "parsed property file");
        stats.increment_property_files(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0));
        stats.add_property_rows(rows.len());
        for (id, row) in rows {
            table.entry(id).or_default().extend(row);
        }
        failures.extend(file_failures);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if table.is_empty() {
        return Err(OptimakeError::NoPropertiesParsed { failures });
    }
    Ok(table)
}

/// 속성 테이블을 엔트리에 병합하고 선언/실제 속성 불일치를 검사
///
/// 각 엔트리는 불변 ID(없으면 짧은 ID의 마지막 구간에서 확장자를 뗀 값)로 먼저,
/// 그 다음 짧은 ID로 속성 행을 찾습니다. 행이 없으면 경고 후 건너뜁니다.
/// 테이블에 나타난 모든 필드 중 선언된 것만 `_<prefix>_<name>`으로 기록되며,
/// 해당 엔트리에 값이 없으면 null이 기록됩니다.
pub fn assign_and_validate_properties(
    entries: &mut EntryMap,
    table: &PropertyTable,
    property_definitions: &[PropertyDefinition],
    provider_prefix: &str,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let prefix = format!("_{provider_prefix}_");

    // 컨버터가 이미 기록한 제공자 속성도 관측된 것으로 취급
    let existing_fields: BTreeSet<String> = entries
        .values()
        .flat_map(|entry| entry.attributes.keys())
        .filter_map(|key| key.strip_prefix(&prefix))
        .map(str::to_string)
        .collect();

    let parsed_fields: IndexSet<&str> = table
        .values()
        .flat_map(|row| row.keys())
        .map(String::as_str)
        .collect();

    let immutable_ids: HashSet<String> = entries.values().filter_map(|e| e.immutable_id()).collect();
    for id in table.keys() {
        if !entries.contains_key(id) && !immutable_ids.contains(id) {
            diagnostics.warn(Warning::UnmatchedPropertyRow { id: id.clone() });
        }
    }

    let definitions: HashMap<&str, &PropertyDefinition> = property_definitions
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    let mut assigned = 0usize;
    for (id, entry) in entries.iter_mut() {
        let property_entry_id = entry
            .immutable_id()
            .unwrap_or_else(|| file_stem_id(id).to_string());

        let by_property_id = table.get(&property_entry_id);
        let by_id = table.get(id);
        if by_property_id.is_none() && by_id.is_none() {
            diagnostics.warn(Warning::MissingPropertyRow {
                entry_id: id.clone(),
                property_entry_id,
            });
            continue;
        }

        for field in &parsed_fields {
            let Some(definition) = definitions.get(field) else {
                continue;
            };
            let value = [by_property_id, by_id]
                .into_iter()
                .flatten()
                .find_map(|row| row.get(*field).filter(|v| !v.is_null()))
                .cloned()
                .unwrap_or(Value::Null);

            let value = match definition.property_type {
                Some(target) if !value.is_null() => {
                    coerce_value(&value, target).ok_or_else(|| OptimakeError::TypeCoercion {
                        entry_id: id.clone(),
                        property: field.to_string(),
                        target: target.to_string(),
                        value: value.to_string(),
                    })?
                }
                _ => value,
            };

            entry.attributes.insert(format!("{prefix}{field}"), value);
        }
        assigned += 1;
    }
    info!(assigned, rows = table.len(), "assigned properties");

    let expected: BTreeSet<String> = property_definitions.iter().map(|p| p.name.clone()).collect();
    let observed: BTreeSet<String> = existing_fields
        .into_iter()
        .chain(parsed_fields.iter().map(|f| f.to_string()))
        .collect();

    if expected != observed {
        diagnostics.warn(Warning::PropertyFieldMismatch {
            undeclared: observed.difference(&expected).cloned().collect(),
            missing: expected.difference(&observed).cloned().collect(),
        });
    }

    Ok(())
}

/// 짧은 ID의 마지막 구간에서 첫 `.` 이전 부분 (예: `set1/1.cif` → `1`)
fn file_stem_id(id: &str) -> &str {
    let name = basename(id);
    name.split('.').next().unwrap_or(name)
}

/// 선언된 속성 타입으로 값 변환
///
/// 변환할 수 없으면 `None`을 반환합니다. `timestamp`는 값을 그대로 둡니다.
pub fn coerce_value(value: &Value, target: PropertyType) -> Option<Value> {
    match target {
        PropertyType::Float => {
            let f = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                Value::Bool(b) => f64::from(u8::from(*b)),
                _ => return None,
            };
            Number::from_f64(f).map(Value::Number)
        }
        PropertyType::Integer => {
            let i = match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => i,
                    None => {
                        let f = n.as_f64()?;
                        if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
                            return None;
                        }
                        f.trunc() as i64
                    }
                },
                Value::String(s) => s.trim().parse::<i64>().ok()?,
                Value::Bool(b) => i64::from(*b),
                _ => return None,
            };
            Some(Value::from(i))
        }
        PropertyType::String => Some(match value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }),
        PropertyType::Boolean => {
            let b = match value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64()? != 0.0,
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    _ => return None,
                },
                _ => return None,
            };
            Some(Value::Bool(b))
        }
        PropertyType::Timestamp => Some(value.clone()),
    }
}
