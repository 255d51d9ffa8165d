//! 엔트리 생성 모듈
//!
//! 엔트리 타입 하나의 설정을 받아 파일 매칭 → 파싱 → ID 생성 → 변환 →
//! ID 할당 → 속성 병합까지 수행하여 ID 순서가 유지된 엔트리 맵을 만듭니다.

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{EntryConfig, EntryPaths, ParsedFiles};
use crate::convert::ConvertOptions;
use crate::diagnostics::Diagnostics;
use crate::error::{OptimakeError, Result};
use crate::ids::derive_unique_ids;
use crate::pattern::{resolve_matches, MatchesByFile};
use crate::properties::{assign_and_validate_properties, parse_property_files};
use crate::registry::{ParserRegistry, Parsed, Record};
use crate::stats::{create_progress_bar, Statistics};

/// 엔트리 ID → 엔트리 (삽입 순서 유지)
pub type EntryMap = IndexMap<String, Entry>;

/// OPTIMADE 엔트리 하나
///
/// 변환 직후에는 `id`가 비어 있을 수 있으며, ID 할당 이후에는 항상 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// `relationships` 등 그 외 최상위 필드
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    /// 컨버터가 만든 매핑을 엔트리로 정규화
    ///
    /// `type`은 문자열이어야 하고, `attributes`는 없거나 객체여야 합니다.
    /// 빈 문자열 `id`는 ID가 없는 것으로 취급합니다.
    pub fn from_mapping(mut mapping: Map<String, Value>) -> anyhow::Result<Self> {
        let id = match mapping.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => bail!("entry `id` must be a string, found {other}"),
        };
        let entry_type = match mapping.remove("type") {
            Some(Value::String(s)) => s,
            Some(other) => bail!("entry `type` must be a string, found {other}"),
            None => return Err(anyhow!("converted entry has no `type`")),
        };
        let attributes = match mapping.remove("attributes") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(attributes)) => attributes,
            Some(other) => bail!("entry `attributes` must be an object, found {other}"),
        };

        Ok(Self {
            id,
            entry_type,
            attributes,
            extra: mapping,
        })
    }

    /// 할당된 ID (없으면 빈 문자열)
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// 속성에 기록된 불변 ID
    pub fn immutable_id(&self) -> Option<String> {
        match self.attributes.get("immutable_id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// 엔트리 타입 하나에 대한 엔트리 생성 (파일 또는 대체 소스) 및 속성 병합
///
/// # Arguments
/// * `archive_root` - 압축 해제가 끝난 아카이브 루트
/// * `entry_config` - 엔트리 타입 설정
/// * `registry` - 파서/컨버터 레지스트리
/// * `options` - 제공자 접두사, limit, 진행률 표시 여부
/// * `stats` - 통계 수집기
/// * `diagnostics` - 속성 병합 경고 누적기
///
/// # Returns
/// ID → 엔트리 맵
pub fn construct_entries(
    archive_root: &Path,
    entry_config: &EntryConfig,
    registry: &ParserRegistry,
    options: &ConvertOptions,
    stats: &Statistics,
    diagnostics: &mut Diagnostics,
) -> Result<EntryMap> {
    let mut entries = match &entry_config.entry_paths {
        EntryPaths::Files(paths) => {
            construct_entries_from_files(archive_root, entry_config, paths, registry, options, stats)?
        }
        EntryPaths::Provenance(source) => {
            let Some(alternate) = registry.alternate_source() else {
                return Err(OptimakeError::UnsupportedEntrySource {
                    entry_type: entry_config.entry_type.clone(),
                });
            };
            info!(source = alternate.name(), entry_type = %entry_config.entry_type, "constructing entries from alternate source");
            let constructed = alternate
                .construct_entries(archive_root, source, entry_config, &options.provider_prefix)
                .map_err(|e| OptimakeError::EntrySource {
                    name: alternate.name().to_string(),
                    entry_type: entry_config.entry_type.clone(),
                    reason: format!("{e:#}"),
                })?;
            index_entries(constructed)?
        }
    };

    if entry_config.property_paths.is_empty() {
        return Ok(entries);
    }

    let property_matches = resolve_matches(archive_root, &entry_config.property_paths)?;
    let table = parse_property_files(
        &property_matches,
        &entry_config.property_definitions,
        registry,
        options.show_progress,
        stats,
    )?;
    assign_and_validate_properties(
        &mut entries,
        &table,
        &entry_config.property_definitions,
        &options.provider_prefix,
        diagnostics,
    )?;

    Ok(entries)
}

/// 선언된 파일들로부터 엔트리 생성
///
/// 원시 ID는 `"<file>/<아카이브 내 경로>"` (컨테이너에 파일이 하나면 `"<file>"`)이고,
/// 파서가 목록을 반환하면 각 요소에 `"/<index>"`가 붙습니다.
pub fn construct_entries_from_files(
    archive_root: &Path,
    entry_config: &EntryConfig,
    paths: &[ParsedFiles],
    registry: &ParserRegistry,
    options: &ConvertOptions,
    stats: &Statistics,
) -> Result<EntryMap> {
    let entry_type = entry_config.entry_type.as_str();
    registry.ensure_supported(entry_type)?;

    let matches_by_file = resolve_matches(archive_root, paths)?;
    let (records, raw_ids) = parse_entries(archive_root, &matches_by_file, entry_type, registry, options, stats)?;
    let unique_ids = derive_unique_ids(&raw_ids);

    let timestamp = chrono::Utc::now().to_rfc3339();
    let pb = create_progress_bar(
        records.len(),
        format!("Constructing OPTIMADE {entry_type} entries"),
        options.show_progress,
    );

    let mut entries = EntryMap::with_capacity(records.len());
    for ((raw_id, unique_id), record) in raw_ids.iter().zip(&unique_ids).zip(&records) {
        let mut entry = registry.try_convert(
            entry_type,
            record,
            raw_id,
            &entry_config.property_definitions,
            &options.provider_prefix,
        )?;
        pb.inc(1);

        let id = match entry.id.clone() {
            // 데이터에 이미 ID가 박혀 있으면 불변 ID로도 사용
            Some(id) => {
                entry
                    .attributes
                    .insert("immutable_id".to_string(), Value::String(id.clone()));
                id
            }
            None => {
                entry.id = Some(unique_id.clone());
                unique_id.clone()
            }
        };

        if entries.contains_key(&id) {
            return Err(OptimakeError::DuplicateEntryId { id });
        }

        if entry.immutable_id().is_none() {
            entry
                .attributes
                .insert("immutable_id".to_string(), Value::String(raw_id.clone()));
        }
        entry
            .attributes
            .insert("last_modified".to_string(), Value::String(timestamp.clone()));

        entries.insert(id, entry);
    }
    pb.finish_and_clear();

    info!(entry_type, count = entries.len(), "constructed entries");
    Ok(entries)
}

/// 일치한 파일을 중간 레코드로 파싱하고 경로 기반 원시 ID 생성
fn parse_entries(
    archive_root: &Path,
    matches_by_file: &MatchesByFile,
    entry_type: &str,
    registry: &ParserRegistry,
    options: &ConvertOptions,
    stats: &Statistics,
) -> Result<(Vec<Record>, Vec<String>)> {
    let mut records = Vec::new();
    let mut raw_ids = Vec::new();

    for (archive_file, paths) in matches_by_file {
        stats.add_files_matched(paths.len());
        // limit 0은 제한 없음
        let take = match options.limit {
            Some(limit) if limit > 0 => limit.min(paths.len()),
            _ => paths.len(),
        };
        let pb = create_progress_bar(take, format!("Parsing {entry_type} files"), options.show_progress);

        for path in &paths[..take] {
            let id_root = if paths.len() > 1 {
                format!("{archive_file}/{}", path_in_archive(archive_root, path))
            } else {
                archive_file.clone()
            };
            debug!(path = %path.display(), id = %id_root, "parsing");

            let count = match registry.try_parse(entry_type, path)? {
                Parsed::One(record) => {
                    records.push(record);
                    raw_ids.push(id_root);
                    1
                }
                Parsed::Many(many) => {
                    raw_ids.extend((0..many.len()).map(|i| format!("{id_root}/{i}")));
                    let count = many.len();
                    records.extend(many);
                    count
                }
            };
            stats.add_records_parsed(count);
            stats.increment_files_parsed(file_size(path));
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    check_duplicate_raw_ids(&raw_ids)?;
    Ok((records, raw_ids))
}

/// 원시 ID 중복 검사 (같은 `file`이 여러 번 선언되면 발생)
fn check_duplicate_raw_ids(raw_ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(raw_ids.len());
    let duplicates: Vec<String> = raw_ids
        .iter()
        .filter(|id| !seen.insert(id.as_str()))
        .cloned()
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(OptimakeError::DuplicateRawIds { ids: duplicates })
    }
}

/// 대체 소스가 만든 엔트리 목록을 ID 맵으로 변환
fn index_entries(constructed: Vec<Entry>) -> Result<EntryMap> {
    let mut entries = EntryMap::with_capacity(constructed.len());
    for entry in constructed {
        let id = entry.id().to_string();
        if entries.contains_key(&id) {
            return Err(OptimakeError::DuplicateEntryId { id });
        }
        entries.insert(id, entry);
    }
    Ok(entries)
}

/// 아카이브 루트 기준 상대 경로 (`/` 구분자)
fn path_in_archive(archive_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(archive_root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
