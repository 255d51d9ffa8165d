//! CLI 인자 파싱 모듈
//!
//! clap을 사용한 명령줄 인자 정의 및 파싱을 담당합니다.

use clap::Parser;
use std::path::PathBuf;

use crate::convert::{ConvertOptions, DEFAULT_PROVIDER_PREFIX};

/// optimake CLI 인자 구조체
#[derive(Parser, Debug)]
#[command(
    name = "optimake",
    version,
    about = "OPTIMAKE - 원시 데이터 아카이브를 OPTIMADE JSONL로 변환하는 CLI 도구",
    long_about = r#"
OPTIMAKE
========

아카이브 루트의 optimade.yaml 설정을 읽어
압축 파일을 풀고, 엔트리와 속성 파일을 파싱하여
하나의 OPTIMADE JSONL 파일로 기록합니다.

특징:
  • zip / tar / gz / bz2 압축 자동 해제
  • glob 패턴으로 엔트리 파일 선택
  • CSV 속성 테이블 병합 및 타입 변환
  • 기존 출력 파일 보호 (--overwrite 필요)

예제:
  optimake ./archive
  optimake ./archive --jsonl-path out.jsonl --overwrite
  optimake ./archive --limit 10 --verbose
  optimake ./archive --check-config
"#
)]
pub struct Args {
    /// optimade.yaml이 있는 아카이브 폴더 경로
    pub path: PathBuf,

    /// 생성될 JSONL 파일 경로 (기본값: <PATH>/optimade.jsonl)
    #[arg(long)]
    pub jsonl_path: Option<PathBuf>,

    /// 소스 파일별 최대 파싱 파일 수 (테스트용)
    #[arg(long)]
    pub limit: Option<usize>,

    /// 기존 출력 파일 덮어쓰기
    #[arg(long)]
    pub overwrite: bool,

    /// 사용자 정의 속성에 붙는 제공자 접두사
    #[arg(long, env = "OPTIMAKE_PROVIDER_PREFIX", default_value = DEFAULT_PROVIDER_PREFIX)]
    pub provider_prefix: String,

    /// 설정 파일 검증만 수행 (변환 없음)
    #[arg(long)]
    pub check_config: bool,

    /// 진행률 바 숨기기
    #[arg(long)]
    pub no_progress: bool,

    /// 상세 출력 모드
    #[arg(short, long)]
    pub verbose: bool,

    /// 경고 로그 파일 경로
    #[arg(long)]
    pub warnings_log: Option<PathBuf>,
}

impl Args {
    /// 변환 옵션으로 변환
    pub fn to_options(&self) -> ConvertOptions {
        ConvertOptions::new()
            .with_jsonl_path(self.jsonl_path.clone())
            .with_limit(self.limit)
            .with_overwrite(self.overwrite)
            .with_provider_prefix(self.provider_prefix.clone())
            .with_progress(!self.no_progress)
    }
}
