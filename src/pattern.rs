//! 경로 패턴 매칭 모듈
//!
//! 설정에 선언된 `ParsedFiles` 목록을 압축 해제된 아카이브 트리에 대해 평가하여
//! 소스 파일(컨테이너) 이름별 실제 파일 경로 목록으로 변환합니다.

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ParsedFiles;
use crate::error::{OptimakeError, Result};

/// 소스 파일 이름(설정의 `file`) → 일치한 경로 목록 (선언 순서 유지)
pub type MatchesByFile = IndexMap<String, Vec<PathBuf>>;

/// 와일드카드 패턴인지 확인
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// 선언된 모든 패턴을 실제 경로로 확장
///
/// 와일드카드 패턴은 아카이브 루트 기준으로 확장하고 사전순으로 정렬합니다.
/// 정확한 경로는 존재 여부와 상관없이 그대로 추가되며, 존재 확인은
/// [`check_missing`]에서 한 번에 수행합니다.
///
/// # Errors
/// 와일드카드 패턴이 아무 파일과도 일치하지 않으면 `NoWildcardMatches`
pub fn collect_matches(archive_root: &Path, paths: &[ParsedFiles]) -> Result<MatchesByFile> {
    let mut matches_by_file = MatchesByFile::new();

    for parsed in paths {
        let found = matches_by_file.entry(parsed.file.clone()).or_default();
        let patterns = parsed.matches.as_deref().unwrap_or_default();

        for pattern in patterns {
            if is_wildcard(pattern) {
                let expanded = expand_wildcard(archive_root, pattern)?;
                if expanded.is_empty() {
                    return Err(OptimakeError::NoWildcardMatches {
                        pattern: pattern.clone(),
                    });
                }
                debug!(pattern = %pattern, count = expanded.len(), "expanded wildcard");
                found.extend(expanded);
            } else {
                found.push(archive_root.join(pattern));
            }
        }

        if patterns.is_empty() {
            found.push(archive_root.join(&parsed.file));
        }
    }

    Ok(matches_by_file)
}

/// 일치한 경로 중 존재하지 않는 것을 모두 모아 한 번에 보고
pub fn check_missing(matches_by_file: &MatchesByFile) -> Result<()> {
    let missing: Vec<PathBuf> = matches_by_file
        .values()
        .flatten()
        .filter(|path| !path.exists())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OptimakeError::MissingFiles { paths: missing })
    }
}

/// [`collect_matches`] 후 [`check_missing`] 수행
pub fn resolve_matches(archive_root: &Path, paths: &[ParsedFiles]) -> Result<MatchesByFile> {
    let matches_by_file = collect_matches(archive_root, paths)?;
    check_missing(&matches_by_file)?;
    Ok(matches_by_file)
}

fn expand_wildcard(archive_root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    // 루트 경로 자체에 포함된 메타 문자는 리터럴로 취급
    let root = Pattern::escape(&archive_root.to_string_lossy());
    let full_pattern = format!("{}/{}", root.trim_end_matches('/'), pattern);

    let entries = glob::glob_with(&full_pattern, MatchOptions::new()).map_err(|_| {
        OptimakeError::InvalidPattern {
            pattern: pattern.to_string(),
        }
    })?;

    let mut expanded = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| OptimakeError::io(e.path().to_path_buf(), e.error()))?;
        expanded.push(path);
    }
    expanded.sort();
    Ok(expanded)
}
