//! optimake - OPTIMADE ARCHIVE CONVERTER
//!
//! 메인 엔트리포인트

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use optimake::{
    cli::Args,
    config::Entries,
    convert::{convert_with_config, load_config},
    diagnostics::Warning,
    logger::setup_logger,
    registry::ParserRegistry,
};

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose);

    // 입력 폴더 확인
    validate_input(&args)?;

    // 헤더 출력
    print_header(&args);

    let config = load_config(&args.path)
        .with_context(|| format!("설정 파일을 읽을 수 없습니다: {:?}", args.path))?;

    if args.check_config {
        print_config(&config);
        return Ok(());
    }

    println!("\n{}", "⚡ 변환 중...".bright_cyan());

    let registry = ParserRegistry::with_defaults();
    let conversion = convert_with_config(&args.path, &config, &args.to_options(), &registry)
        .context("변환 실패")?;

    // 경고 출력
    print_warnings(conversion.diagnostics.warnings(), args.verbose);

    // 경고 로그 파일 작성
    if let Some(ref log_path) = args.warnings_log {
        write_warnings_log(log_path, conversion.diagnostics.warnings())?;
    }

    // 통계 출력
    conversion.statistics.print_summary();

    println!(
        "\n{} 저장 완료: {:?}\n",
        "✅".bright_green(),
        conversion.jsonl_path
    );

    Ok(())
}

/// 입력 경로 유효성 검사
fn validate_input(args: &Args) -> Result<()> {
    if !args.path.exists() {
        anyhow::bail!("아카이브 폴더가 존재하지 않습니다: {:?}", args.path);
    }

    if !args.path.is_dir() {
        anyhow::bail!("아카이브 경로가 폴더가 아닙니다: {:?}", args.path);
    }

    Ok(())
}

/// 헤더 출력
fn print_header(args: &Args) {
    println!("\n{}", "═".repeat(50).bright_blue());
    println!(
        "{}",
        " 🚀 OPTIMADE ARCHIVE CONVERTER".bright_white().bold()
    );
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 아카이브: {:?}", "📂".bright_cyan(), args.path);

    if !args.check_config {
        let output = args.to_options().output_path(&args.path);
        println!("  {} 출력 파일: {:?}", "📄".bright_green(), output);
        println!(
            "  {} 제공자 접두사: {}",
            "🏷️".bright_yellow(),
            args.provider_prefix
        );
    }

    if let Some(limit) = args.limit {
        println!("  {} 파싱 제한: {}", "📏".bright_white(), limit);
    }

    if args.overwrite {
        println!(
            "  {} {}",
            "⚠️".bright_yellow(),
            "덮어쓰기 모드".yellow()
        );
    }

    if args.check_config {
        println!("  {} {}", "🔍".bright_cyan(), "설정 검사 모드".cyan());
    }

    println!("{}", "═".repeat(50).bright_blue());
}

/// 설정 요약 출력
fn print_config(config: &optimake::config::Config) {
    println!("\n{}", "📋 설정 요약:".bright_cyan());
    println!("  {} 버전: {}", "•".cyan(), config.config_version);
    println!("  {} 설명: {}", "•".cyan(), config.database_description);

    match &config.entries {
        Entries::Jsonl(jsonl) => {
            println!("  {} JSONL: {}", "•".cyan(), jsonl.jsonl_path);
        }
        Entries::Structured(entries) => {
            for entry in entries {
                println!(
                    "  {} {} (속성 {}개, 속성 파일 {}개)",
                    "•".cyan(),
                    entry.entry_type.bright_white(),
                    entry.property_definitions.len(),
                    entry.property_paths.len()
                );
            }
        }
    }

    println!("\n{} 설정 파일이 유효합니다!\n", "✅".bright_green());
}

/// 경고 목록 출력
fn print_warnings(warnings: &[Warning], verbose: bool) {
    if warnings.is_empty() {
        return;
    }

    println!("\n{}", "⚠️ 경고:".bright_yellow());
    for warning in warnings {
        let text = warning.to_string();
        let first_line = text.lines().next().unwrap_or_default();
        println!("  {} {}", "•".yellow(), first_line);
        if verbose {
            for line in text.lines().skip(1) {
                println!("    {}", line.dimmed());
            }
        }
    }
}

/// 경고 로그 파일 작성
fn write_warnings_log(log_path: &Path, warnings: &[Warning]) -> Result<()> {
    let mut log_file = File::create(log_path)
        .with_context(|| format!("경고 로그 파일을 만들 수 없습니다: {:?}", log_path))?;

    writeln!(log_file, "optimake 경고 로그")?;
    writeln!(log_file, "생성 시간: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(log_file, "총 경고 수: {}", warnings.len())?;
    writeln!(log_file, "{}", "=".repeat(50))?;

    for warning in warnings {
        writeln!(log_file, "\n{}", warning)?;
    }

    println!("\n{} 경고 로그 저장: {:?}", "📝".bright_cyan(), log_path);

    Ok(())
}
