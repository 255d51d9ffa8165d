//! optimake - OPTIMADE ARCHIVE CONVERTER
//!
//! 설정 파일(`optimade.yaml`)이 딸린 원시 데이터 아카이브를 하나의
//! OPTIMADE JSONL 파일로 변환하는 라이브러리 및 CLI 도구입니다.
//!
//! # 파이프라인
//!
//! 설정 로드 → 압축 해제 → 경로 매칭 → 파서/컨버터 디스패치 → ID 생성 →
//! 속성 병합 → JSONL 기록
//!
//! # 주요 기능
//!
//! - 📦 **압축 해제**: zip / tar(.gz, .bz2) / 단일 gz, bz2 파일
//! - 🔍 **패턴 매칭**: glob 패턴과 정확한 경로로 엔트리 파일 선택
//! - 🔌 **플러그인 파서**: 엔트리 타입별 파서/컨버터를 순서대로 시도
//! - 🏷️ **읽기 쉬운 ID**: 파일 경로의 공통 부분을 제거한 짧은 ID
//! - 🧾 **속성 병합**: CSV 속성 테이블을 ID로 맞춰 타입 변환 후 병합
//! - ⚠️ **경고 수집**: 누락/불일치는 치명적 에러 대신 경고로 반환
//!
//! # 예제
//!
//! ```no_run
//! use optimake::{convert_archive, ConvertOptions, ParserRegistry};
//! use std::path::Path;
//!
//! let conversion = convert_archive(
//!     Path::new("./archive"),
//!     &ConvertOptions::new().with_provider_prefix("odbx"),
//!     &ParserRegistry::with_defaults(),
//! )?;
//! println!("{}", conversion.jsonl_path.display());
//! # Ok::<(), optimake::OptimakeError>(())
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod entries;
pub mod error;
pub mod ids;
pub mod inflate;
pub mod logger;
pub mod parsers;
pub mod pattern;
pub mod properties;
pub mod registry;
pub mod schema;
pub mod stats;
pub mod writer;

// Re-exports for convenient access
pub use cli::Args;
pub use config::{Config, EntryConfig, ParsedFiles, PropertyDefinition, PropertyType};
pub use convert::{convert_archive, Conversion, ConvertOptions};
pub use diagnostics::{Diagnostics, Warning};
pub use entries::Entry;
pub use error::{ErrorKind, OptimakeError, Result};
pub use ids::derive_unique_ids;
pub use registry::{
    AlternateSource, Converted, EntryAdapter, EntryConverter, EntryParser, Parsed, ParserRegistry,
    PropertyParser,
};
pub use stats::{format_bytes, Statistics};
