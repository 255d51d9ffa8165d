//! 로깅 설정 모듈
//!
//! 바이너리에서 tracing 구독자를 설치합니다. 로그는 stderr로 출력되어
//! stdout의 요약 출력과 섞이지 않습니다.

use tracing_subscriber::{prelude::*, EnvFilter};

/// stderr 로거 설치
///
/// `RUST_LOG`가 설정되어 있으면 그대로 사용하고, 없으면 `info`
/// (`verbose`면 `debug`) 수준을 사용합니다. 이미 설치되어 있으면 무시합니다.
pub fn setup_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(get_env_filter(default_env_filter(verbose))),
        )
        .try_init();
}

/// `RUST_LOG` 환경 변수에 따른 필터, 없으면 기본값
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "optimake=debug,info" } else { "info" })
}
