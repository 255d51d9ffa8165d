//! OPTIMADE JSONL 출력 모듈
//!
//! 헤더 한 줄, 엔트리 타입별 정보 한 줄씩, 그리고 엔트리 한 줄씩을 순서대로 기록합니다.

use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::config::PropertyDefinition;
use crate::entries::Entry;
use crate::error::{OptimakeError, Result};
use crate::schema::{construct_entry_type_info, header};

/// 기본 출력 파일 이름
pub const OUTPUT_FILE_NAME: &str = "optimade.jsonl";

/// 출력에서 제외되는 도구 내부 속성 접두사
pub const INTERNAL_ATTRIBUTE_PREFIX: &str = "_ase";

/// 엔트리를 OPTIMADE JSONL 파일로 기록
///
/// # Arguments
/// * `entries` - 엔트리 타입 → 엔트리 목록 (기록 순서)
/// * `property_definitions` - 엔트리 타입 → 사용자 정의 속성 (정보 줄 순서)
/// * `provider_prefix` - 제공자 접두사
/// * `path` - 출력 파일 경로
/// * `overwrite` - 기존 파일 덮어쓰기 허용 여부
///
/// # Returns
/// 기록한 바이트 수
pub fn write_optimade_jsonl(
    entries: &IndexMap<String, Vec<Entry>>,
    property_definitions: &IndexMap<String, Vec<PropertyDefinition>>,
    provider_prefix: &str,
    path: &Path,
    overwrite: bool,
) -> Result<u64> {
    if path.exists() && !overwrite {
        return Err(OptimakeError::OutputExists {
            path: path.to_path_buf(),
        });
    }

    let file = File::create(path).map_err(|e| OptimakeError::io(path, e))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    let count = write_lines(&mut writer, entries, property_definitions, provider_prefix)
        .map_err(|e| OptimakeError::io(path, e))?;

    let bytes = writer.finish().map_err(|e| OptimakeError::io(path, e))?;
    info!(path = %path.display(), entries = count, bytes, "wrote OPTIMADE JSONL");
    Ok(bytes)
}

fn write_lines<W: Write>(
    writer: &mut JsonlWriter<W>,
    entries: &IndexMap<String, Vec<Entry>>,
    property_definitions: &IndexMap<String, Vec<PropertyDefinition>>,
    provider_prefix: &str,
) -> std::io::Result<usize> {
    writer.write_line(&header())?;

    for (entry_type, properties) in property_definitions {
        let info = construct_entry_type_info(entry_type, properties, provider_prefix);
        writer.write_line(&info)?;
    }

    let mut count = 0;
    for entry in entries.values().flatten() {
        writer.write_line(&public_entry(entry))?;
        count += 1;
    }
    Ok(count)
}

/// 내부 속성을 제거한 엔트리 사본
fn public_entry(entry: &Entry) -> Entry {
    let mut public = entry.clone();
    public
        .attributes
        .retain(|key, _| !key.starts_with(INTERNAL_ATTRIBUTE_PREFIX));
    public
}

/// 한 줄에 JSON 객체 하나씩 기록하며 바이트 수를 세는 writer
struct JsonlWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> JsonlWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> std::io::Result<()> {
        let line = serde_json::to_string(value)?;
        writeln!(self.inner, "{line}")?;
        self.bytes += line.len() as u64 + 1; // +1 for newline
        Ok(())
    }

    fn finish(mut self) -> std::io::Result<u64> {
        self.inner.flush()?;
        Ok(self.bytes)
    }
}
