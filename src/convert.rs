//! 아카이브 변환 모듈
//!
//! `optimade.yaml` 설정을 읽어 압축 해제 → 엔트리 생성 → JSONL 기록까지
//! 전체 파이프라인을 한 번 실행합니다.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, Entries, EntryPaths, JsonlConfig, CONFIG_FILE_NAME};
use crate::diagnostics::Diagnostics;
use crate::entries::{construct_entries, Entry};
use crate::error::{OptimakeError, Result};
use crate::inflate::inflate_archive;
use crate::registry::ParserRegistry;
use crate::stats::Statistics;
use crate::writer::{write_optimade_jsonl, OUTPUT_FILE_NAME};

/// 제공자 접두사 기본값
pub const DEFAULT_PROVIDER_PREFIX: &str = "optimake";

/// 변환 옵션
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// 출력 경로 (None이면 `<archive>/optimade.jsonl`)
    pub jsonl_path: Option<PathBuf>,
    /// 소스 파일(컨테이너)별 최대 파싱 파일 수
    pub limit: Option<usize>,
    /// 기존 출력 파일 덮어쓰기 허용
    pub overwrite: bool,
    /// 사용자 정의 속성에 붙는 제공자 접두사
    pub provider_prefix: String,
    /// 진행률 바 표시
    pub show_progress: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            limit: None,
            overwrite: false,
            provider_prefix: DEFAULT_PROVIDER_PREFIX.to_string(),
            show_progress: false,
        }
    }
}

impl ConvertOptions {
    /// 기본 옵션 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 출력 경로 설정
    pub fn with_jsonl_path(mut self, jsonl_path: Option<PathBuf>) -> Self {
        self.jsonl_path = jsonl_path;
        self
    }

    /// 파싱 개수 제한 설정
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// 덮어쓰기 설정
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// 제공자 접두사 설정
    pub fn with_provider_prefix(mut self, provider_prefix: impl Into<String>) -> Self {
        self.provider_prefix = provider_prefix.into();
        self
    }

    /// 진행률 표시 설정
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 실제 출력 경로
    pub fn output_path(&self, archive_root: &Path) -> PathBuf {
        self.jsonl_path
            .clone()
            .unwrap_or_else(|| archive_root.join(OUTPUT_FILE_NAME))
    }
}

/// 변환 결과
#[derive(Debug)]
pub struct Conversion {
    /// 생성된 (또는 연결된) JSONL 경로
    pub jsonl_path: PathBuf,
    /// 치명적이지 않은 경고
    pub diagnostics: Diagnostics,
    /// 변환 통계
    pub statistics: Statistics,
}

/// 아카이브 루트의 `optimade.yaml` 로드
pub fn load_config(archive_root: &Path) -> Result<Config> {
    Config::from_file(archive_root.join(CONFIG_FILE_NAME))
}

/// 아카이브를 OPTIMADE JSONL로 변환
///
/// # Arguments
/// * `archive_root` - `optimade.yaml`이 있는 아카이브 폴더
/// * `options` - 변환 옵션
/// * `registry` - 파서/컨버터 레지스트리
///
/// # Returns
/// 출력 경로와 경고, 통계를 담은 `Conversion`
pub fn convert_archive(
    archive_root: &Path,
    options: &ConvertOptions,
    registry: &ParserRegistry,
) -> Result<Conversion> {
    let config = load_config(archive_root)?;
    convert_with_config(archive_root, &config, options, registry)
}

/// 이미 로드된 설정으로 변환
pub fn convert_with_config(
    archive_root: &Path,
    config: &Config,
    options: &ConvertOptions,
    registry: &ParserRegistry,
) -> Result<Conversion> {
    let jsonl_path = options.output_path(archive_root);

    if let Entries::Jsonl(jsonl) = &config.entries {
        return link_jsonl(archive_root, jsonl, jsonl_path, options.overwrite);
    }

    // 무거운 작업 전에 덮어쓰기 여부 확인
    if jsonl_path.exists() && !options.overwrite {
        return Err(OptimakeError::OutputExists { path: jsonl_path });
    }

    for path in decompress_paths(config) {
        inflate_archive(archive_root, &path)?;
    }

    let mut statistics = Statistics::new();
    let mut diagnostics = Diagnostics::new();
    let mut entries: IndexMap<String, Vec<Entry>> = IndexMap::new();
    let mut property_definitions = IndexMap::new();

    for entry_config in config.entry_configs() {
        info!(entry_type = %entry_config.entry_type, "constructing entries");
        let constructed = construct_entries(
            archive_root,
            entry_config,
            registry,
            options,
            &statistics,
            &mut diagnostics,
        )?;
        statistics.record_entries(&entry_config.entry_type, constructed.len());
        entries
            .entry(entry_config.entry_type.clone())
            .or_default()
            .extend(constructed.into_values());
        property_definitions
            .entry(entry_config.entry_type.clone())
            .or_insert_with(Vec::new)
            .extend(entry_config.property_definitions.iter().cloned());
    }

    let bytes = write_optimade_jsonl(
        &entries,
        &property_definitions,
        &options.provider_prefix,
        &jsonl_path,
        options.overwrite,
    )?;
    statistics.add_bytes_written(bytes);
    statistics.set_warning_count(diagnostics.len());

    Ok(Conversion {
        jsonl_path,
        diagnostics,
        statistics,
    })
}

/// 압축 해제할 경로 (패턴을 가진 `file`만 컨테이너로 취급, 중복 제거)
///
/// 아카이브 루트 기준 상대 경로를 반환합니다.
fn decompress_paths(config: &Config) -> BTreeSet<PathBuf> {
    let mut paths = BTreeSet::new();
    for entry_config in config.entry_configs() {
        if let EntryPaths::Files(files) = &entry_config.entry_paths {
            paths.extend(
                files
                    .iter()
                    .filter(|f| f.has_matches())
                    .map(|f| PathBuf::from(&f.file)),
            );
        }
        paths.extend(
            entry_config
                .property_paths
                .iter()
                .filter(|f| f.has_matches())
                .map(|f| PathBuf::from(&f.file)),
        );
    }
    paths
}

/// 완성된 JSONL을 가진 아카이브: 필요하면 압축을 풀고 출력 경로에 연결
fn link_jsonl(
    archive_root: &Path,
    jsonl: &JsonlConfig,
    jsonl_path: PathBuf,
    overwrite: bool,
) -> Result<Conversion> {
    let source = archive_root.join(&jsonl.jsonl_path);

    // 압축 해제 전에 충돌 확인 (깨진 심볼릭 링크도 기존 파일로 취급)
    if collides(&source, &jsonl_path) && !overwrite {
        return Err(OptimakeError::OutputExists { path: jsonl_path });
    }

    if let Some(file) = &jsonl.file {
        inflate_archive(archive_root, Path::new(file))?;
    }

    if !source.exists() {
        return Err(OptimakeError::MissingFiles {
            paths: vec![source],
        });
    }

    let statistics = Statistics::new();
    statistics.add_files_matched(1);

    if same_location(&source, &jsonl_path) {
        return Ok(Conversion {
            jsonl_path: source,
            diagnostics: Diagnostics::new(),
            statistics,
        });
    }

    if collides(&source, &jsonl_path) {
        if !overwrite {
            return Err(OptimakeError::OutputExists { path: jsonl_path });
        }
        std::fs::remove_file(&jsonl_path).map_err(|e| OptimakeError::io(&jsonl_path, e))?;
    }
    link_or_copy(&source, &jsonl_path)?;
    info!(source = %source.display(), target = %jsonl_path.display(), "linked existing JSONL");

    Ok(Conversion {
        jsonl_path,
        diagnostics: Diagnostics::new(),
        statistics,
    })
}

/// 출력 경로에 소스가 아닌 다른 파일이 이미 있는지
fn collides(source: &Path, output: &Path) -> bool {
    output.symlink_metadata().is_ok() && !same_location(source, output)
}

/// 두 경로가 같은 위치를 가리키는지 (부모 폴더만 정규화, 마지막 심볼릭 링크는 따라가지 않음)
fn same_location(a: &Path, b: &Path) -> bool {
    match (resolve_location(a), resolve_location(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// 부모 폴더를 정규화한 경로 (파일은 아직 없어도 됨)
fn resolve_location(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|parent| parent.join(name))
}

#[cfg(unix)]
fn link_or_copy(source: &Path, target: &Path) -> Result<()> {
    let source = source
        .canonicalize()
        .map_err(|e| OptimakeError::io(source, e))?;
    std::os::unix::fs::symlink(&source, target).map_err(|e| OptimakeError::io(target, e))
}

#[cfg(not(unix))]
fn link_or_copy(source: &Path, target: &Path) -> Result<()> {
    std::fs::copy(source, target)
        .map(|_| ())
        .map_err(|e| OptimakeError::io(target, e))
}
