//! 에러 타입 정의 모듈
//!
//! 변환 파이프라인에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! 모든 에러는 치명적이며, 재시도 없이 호출자에게 그대로 전달됩니다.
//! (속성 불일치처럼 치명적이지 않은 문제는 [`crate::diagnostics`] 참고)

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 플러그인 하나가 실패한 이유
///
/// 파서/컨버터가 모두 실패했을 때 진단을 위해 에러 메시지에 그대로 포함됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// 플러그인 이름
    pub name: String,
    /// 실패 사유
    pub reason: String,
}

impl Failure {
    pub fn new(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// 에러 분류
///
/// CLI나 서버가 종료 코드 / HTTP 에러로 변환할 때 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 설정 파일 버전/스키마 오류
    Config,
    /// 선언된 경로나 패턴을 찾을 수 없음
    MissingFile,
    /// 등록된 모든 파서/컨버터가 실패
    Exhausted,
    /// 엔트리 ID 중복
    Duplicate,
    /// 속성 값 타입 변환 실패
    Coercion,
    /// 출력 파일이 이미 존재
    OutputCollision,
    /// 그 외 입출력 실패
    Io,
}

/// optimake에서 발생할 수 있는 에러 타입
#[derive(Error, Debug)]
pub enum OptimakeError {
    /// 지원하지 않는 (또는 누락된) config_version
    #[error("Unsupported config version {}: expected one of {supported:?}", display_version(.found))]
    UnsupportedConfigVersion {
        found: Option<String>,
        supported: &'static [&'static str],
    },

    /// 설정 파일 읽기 실패
    #[error("Could not read config file ({path}): {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// 설정 스키마 검증 실패
    #[error("Invalid config: {reason}")]
    ConfigInvalid { reason: String },

    /// 압축 해제할 아카이브가 없음
    #[error("Could not find archive at {path}")]
    ArchiveNotFound { path: PathBuf },

    /// 압축 해제 실패
    #[error("Could not inflate archive ({path}): {reason}")]
    Inflate { path: PathBuf, reason: String },

    /// 유효하지 않은 패턴
    #[error("Invalid pattern: {pattern}")]
    InvalidPattern { pattern: String },

    /// 와일드카드 패턴과 일치하는 파일이 하나도 없음
    #[error("Could not find any files matching wildcard {pattern:?}")]
    NoWildcardMatches { pattern: String },

    /// 존재하지 않는 파일 목록 (한 번에 모두 보고)
    #[error("Could not find the following files: [{}]", join_paths(.paths))]
    MissingFiles { paths: Vec<PathBuf> },

    /// 해당 엔트리 타입에 등록된 파서 또는 컨버터가 없음
    #[error("{stage} type {entry_type} is not supported")]
    UnsupportedEntryType {
        entry_type: String,
        stage: &'static str,
    },

    /// 대체 엔트리 소스(프로비넌스 DB 등)를 처리할 플러그인이 없음
    #[error("No alternate entry source registered for {entry_type}")]
    UnsupportedEntrySource { entry_type: String },

    /// 대체 엔트리 소스 실행 실패
    #[error("Alternate entry source {name} failed for {entry_type}: {reason}")]
    EntrySource {
        name: String,
        entry_type: String,
        reason: String,
    },

    /// 등록된 모든 파서가 파일을 읽지 못함
    #[error("None of the provided parsers [{}] could parse {}. Errors: {}", join_names(.failures), .path.display(), join_failures(.failures))]
    ParsersExhausted { path: PathBuf, failures: Vec<Failure> },

    /// 등록된 모든 컨버터가 레코드를 변환하지 못함
    #[error("Could not convert entry {entry_id} with any of the provided converters [{}]. Errors: {}", join_names(.failures), join_failures(.failures))]
    ConvertersExhausted {
        entry_id: String,
        failures: Vec<Failure>,
    },

    /// 확장자에 맞는 속성 파서가 없음
    #[error("No property parser registered for {extension:?} files ({})", .path.display())]
    NoPropertyParser { path: PathBuf, extension: String },

    /// 등록된 모든 속성 파서가 파일을 읽지 못함
    #[error("Could not parse properties file {} with any of the provided parsers [{}]. Errors: {}", .path.display(), join_names(.failures), join_failures(.failures))]
    PropertyParsersExhausted { path: PathBuf, failures: Vec<Failure> },

    /// 속성 파일이 선언되었지만 아무 속성도 읽지 못함
    #[error("Could not parse properties files with any of the provided parsers. Errors: {}", join_failures(.failures))]
    NoPropertiesParsed { failures: Vec<Failure> },

    /// 파일 경로에서 만든 원시 ID가 중복됨
    #[error("Duplicate entry IDs found even when generated directly from file paths: {ids:?}")]
    DuplicateRawIds { ids: Vec<String> },

    /// 최종 엔트리 ID 중복
    #[error("Duplicate entry ID found: {id}")]
    DuplicateEntryId { id: String },

    /// 속성 값 타입 변환 실패
    #[error("Could not cast value {value} for property {property:?} to type {target:?} for entry {entry_id:?}")]
    TypeCoercion {
        entry_id: String,
        property: String,
        target: String,
        value: String,
    },

    /// 출력 파일이 이미 존재 (overwrite 미지정)
    #[error("Not overwriting existing file at {}", .path.display())]
    OutputExists { path: PathBuf },

    /// 파일 입출력 실패
    #[error("I/O error ({}): {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

impl OptimakeError {
    /// 경로와 함께 입출력 에러 생성
    pub fn io(path: impl AsRef<Path>, err: impl fmt::Display) -> Self {
        OptimakeError::Io {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// 에러 분류 반환
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimakeError::UnsupportedConfigVersion { .. }
            | OptimakeError::ConfigRead { .. }
            | OptimakeError::ConfigInvalid { .. }
            | OptimakeError::InvalidPattern { .. }
            | OptimakeError::UnsupportedEntryType { .. }
            | OptimakeError::UnsupportedEntrySource { .. }
            | OptimakeError::NoPropertyParser { .. } => ErrorKind::Config,
            OptimakeError::ArchiveNotFound { .. }
            | OptimakeError::NoWildcardMatches { .. }
            | OptimakeError::MissingFiles { .. } => ErrorKind::MissingFile,
            OptimakeError::ParsersExhausted { .. }
            | OptimakeError::ConvertersExhausted { .. }
            | OptimakeError::PropertyParsersExhausted { .. }
            | OptimakeError::NoPropertiesParsed { .. }
            | OptimakeError::EntrySource { .. } => ErrorKind::Exhausted,
            OptimakeError::DuplicateRawIds { .. } | OptimakeError::DuplicateEntryId { .. } => {
                ErrorKind::Duplicate
            }
            OptimakeError::TypeCoercion { .. } => ErrorKind::Coercion,
            OptimakeError::OutputExists { .. } => ErrorKind::OutputCollision,
            OptimakeError::Inflate { .. } | OptimakeError::Io { .. } => ErrorKind::Io,
        }
    }
}

fn display_version(found: &Option<String>) -> String {
    match found {
        Some(v) => format!("{v:?}"),
        None => "(missing)".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_names(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// optimake 결과 타입 별칭
pub type Result<T> = std::result::Result<T, OptimakeError>;
