//! 아카이브 압축 해제 모듈
//!
//! 설정에서 참조한 압축 파일을 원본 옆에 그대로 풀어 놓습니다.
//!
//! - `.zip` : 부모 폴더에 전체 추출
//! - 접미사에 `.tar`가 포함된 파일 : 압축 방식(gzip/bzip2/없음)을 자동 감지하여 전체 추출
//! - 단일 `.gz` / `.bz2` : 고정 크기 청크로 스트리밍 해제, 압축 접미사를 뗀 이름으로 저장
//!
//! 이미 풀려 있는지 확인하지 않습니다. 건너뛰기 판단은 호출자의 몫입니다.

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{OptimakeError, Result};

/// 단일 파일 압축 해제 시 한 번에 읽는 크기 (10MB)
pub const CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// 압축 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    Gzip,
    Bzip2,
    /// 압축 파일이 아님 (그대로 둠)
    Plain,
}

impl ArchiveFormat {
    /// 파일 이름의 접미사로 형식 판단
    pub fn from_path(path: &Path) -> Self {
        let suffixes = suffixes(path);
        match suffixes.last().map(String::as_str) {
            Some("zip") => ArchiveFormat::Zip,
            _ if suffixes.iter().any(|s| s == "tar") => ArchiveFormat::Tar,
            Some("gz") => ArchiveFormat::Gzip,
            Some("bz2") => ArchiveFormat::Bzip2,
            _ => ArchiveFormat::Plain,
        }
    }
}

/// tar 스트림의 압축 방식 (매직 바이트로 감지)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarCompression {
    Gzip,
    Bzip2,
    None,
}

impl TarCompression {
    fn sniff(header: &[u8]) -> Self {
        if header.starts_with(&[0x1f, 0x8b]) {
            TarCompression::Gzip
        } else if header.starts_with(b"BZh") {
            TarCompression::Bzip2
        } else {
            TarCompression::None
        }
    }
}

/// 아카이브 안의 압축 파일 하나를 제자리에서 해제
///
/// # Arguments
/// * `archive_root` - 아카이브 루트 폴더
/// * `data_path` - 루트 기준 상대 경로 (또는 절대 경로)
///
/// # Returns
/// 해제된 파일 형식
pub fn inflate_archive(archive_root: &Path, data_path: &Path) -> Result<ArchiveFormat> {
    let real_path = archive_root.join(data_path);
    if !real_path.exists() {
        return Err(OptimakeError::ArchiveNotFound { path: real_path });
    }

    let format = ArchiveFormat::from_path(&real_path);
    let parent = real_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| archive_root.to_path_buf());

    match format {
        ArchiveFormat::Zip => extract_zip(&real_path, &parent)?,
        ArchiveFormat::Tar => extract_tar(&real_path, &parent)?,
        ArchiveFormat::Gzip => {
            let reader = MultiGzDecoder::new(open(&real_path)?);
            decompress_single(&real_path, reader)?;
        }
        ArchiveFormat::Bzip2 => {
            let reader = MultiBzDecoder::new(open(&real_path)?);
            decompress_single(&real_path, reader)?;
        }
        ArchiveFormat::Plain => {
            debug!(path = %real_path.display(), "not a compressed file, leaving as is");
            return Ok(format);
        }
    }

    info!(path = %real_path.display(), ?format, "inflated archive");
    Ok(format)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| OptimakeError::io(path, e))
}

fn inflate_error(path: &Path, reason: impl std::fmt::Display) -> OptimakeError {
    OptimakeError::Inflate {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_zip(path: &Path, target: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(open(path)?).map_err(|e| inflate_error(path, e))?;
    archive.extract(target).map_err(|e| inflate_error(path, e))
}

fn extract_tar(path: &Path, target: &Path) -> Result<()> {
    let mut reader = BufReader::new(open(path)?);
    let compression = TarCompression::sniff(reader.fill_buf().map_err(|e| inflate_error(path, e))?);
    debug!(path = %path.display(), ?compression, "extracting tar archive");

    let result = match compression {
        TarCompression::Gzip => tar::Archive::new(MultiGzDecoder::new(reader)).unpack(target),
        TarCompression::Bzip2 => tar::Archive::new(MultiBzDecoder::new(reader)).unpack(target),
        TarCompression::None => tar::Archive::new(reader).unpack(target),
    };
    result.map_err(|e| inflate_error(path, e))
}

/// 압축된 단일 파일을 청크 단위로 읽어서 접미사를 뗀 경로에 저장
fn decompress_single<R: Read>(path: &Path, mut reader: R) -> Result<PathBuf> {
    let output_path = path.with_extension("");
    let mut output =
        File::create(&output_path).map_err(|e| OptimakeError::io(&output_path, e))?;

    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).map_err(|e| inflate_error(path, e))?;
        if n == 0 {
            break;
        }
        output
            .write_all(&chunk[..n])
            .map_err(|e| OptimakeError::io(&output_path, e))?;
    }
    output.flush().map_err(|e| OptimakeError::io(&output_path, e))?;

    Ok(output_path)
}

/// 파일 이름의 접미사 목록 (예: `data.tar.gz` → `["tar", "gz"]`)
fn suffixes(path: &Path) -> Vec<String> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    name.trim_start_matches('.')
        .split('.')
        .skip(1)
        .map(|s| s.to_ascii_lowercase())
        .collect()
}
