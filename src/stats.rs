//! 통계 및 유틸리티 모듈
//!
//! 변환 통계 수집 및 포맷팅, 진행률 바 생성을 담당합니다.

use colored::Colorize;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// 변환 통계 구조체
#[derive(Debug, Default)]
pub struct Statistics {
    /// 패턴과 일치한 엔트리 파일 수
    pub files_matched: AtomicUsize,
    /// 실제로 파싱한 엔트리 파일 수 (limit 적용 후)
    pub files_parsed: AtomicUsize,
    /// 파서가 만들어 낸 중간 레코드 수
    pub records_parsed: AtomicUsize,
    /// 파싱한 속성 파일 수
    pub property_files: AtomicUsize,
    /// 속성 테이블 행 수
    pub property_rows: AtomicUsize,
    /// 읽은 총 바이트
    pub total_bytes_read: AtomicU64,
    /// 쓴 총 바이트
    pub total_bytes_written: AtomicU64,
    /// 엔트리 타입별 생성된 엔트리 수 (설정 순서)
    entries_by_type: IndexMap<String, usize>,
    /// 경고 수
    warning_count: usize,
    /// 처리 시작 시간
    start_time: Option<Instant>,
}

impl Statistics {
    /// 새 통계 인스턴스 생성
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// 일치한 파일 수 추가
    pub fn add_files_matched(&self, count: usize) {
        self.files_matched.fetch_add(count, Ordering::Relaxed);
    }

    /// 파싱한 파일 하나 기록
    pub fn increment_files_parsed(&self, bytes: u64) {
        self.files_parsed.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// 중간 레코드 수 추가
    pub fn add_records_parsed(&self, count: usize) {
        self.records_parsed.fetch_add(count, Ordering::Relaxed);
    }

    /// 속성 파일 하나 기록
    pub fn increment_property_files(&self, bytes: u64) {
        self.property_files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// 속성 행 수 추가
    pub fn add_property_rows(&self, count: usize) {
        self.property_rows.fetch_add(count, Ordering::Relaxed);
    }

    /// 쓴 바이트 추가
    pub fn add_bytes_written(&self, bytes: u64) {
        self.total_bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// 엔트리 타입별 생성 수 기록
    pub fn record_entries(&mut self, entry_type: &str, count: usize) {
        *self.entries_by_type.entry(entry_type.to_string()).or_default() += count;
    }

    /// 경고 수 설정
    pub fn set_warning_count(&mut self, count: usize) {
        self.warning_count = count;
    }

    pub fn get_files_matched(&self) -> usize {
        self.files_matched.load(Ordering::Relaxed)
    }

    pub fn get_files_parsed(&self) -> usize {
        self.files_parsed.load(Ordering::Relaxed)
    }

    pub fn get_records_parsed(&self) -> usize {
        self.records_parsed.load(Ordering::Relaxed)
    }

    pub fn get_property_files(&self) -> usize {
        self.property_files.load(Ordering::Relaxed)
    }

    pub fn get_bytes_written(&self) -> u64 {
        self.total_bytes_written.load(Ordering::Relaxed)
    }

    pub fn entries_by_type(&self) -> &IndexMap<String, usize> {
        &self.entries_by_type
    }

    /// 전체 엔트리 수
    pub fn total_entries(&self) -> usize {
        self.entries_by_type.values().sum()
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// 경과 시간 반환
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// 변환 통계 요약 출력
    pub fn print_summary(&self) {
        let bytes_read = self.total_bytes_read.load(Ordering::Relaxed);
        let bytes_written = self.get_bytes_written();

        println!("\n{}", "═".repeat(50).bright_blue());
        println!("{}", " 📊 변환 통계".bright_white().bold());
        println!("{}", "═".repeat(50).bright_blue());

        println!(
            "  {} 일치한 파일:  {}",
            "📁".bright_cyan(),
            self.get_files_matched()
        );
        println!(
            "  {} 파싱한 파일:  {}",
            "📄".bright_cyan(),
            self.get_files_parsed()
        );
        println!(
            "  {} 레코드:       {}",
            "🧩".bright_cyan(),
            self.get_records_parsed()
        );
        println!(
            "  {} 속성 파일:    {} ({} 행)",
            "🧾".bright_cyan(),
            self.get_property_files(),
            self.property_rows.load(Ordering::Relaxed)
        );

        for (entry_type, count) in &self.entries_by_type {
            println!(
                "  {} {:<13} {}",
                "✅".bright_green(),
                format!("{entry_type}:"),
                count.to_string().green()
            );
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            println!(
                "  {} 경고:         {}",
                "⚠️".bright_yellow(),
                warnings.to_string().yellow()
            );
        } else {
            println!("  {} 경고:         {}", "✅".bright_green(), "0".green());
        }

        println!(
            "  {} 입력 용량:    {}",
            "📥".bright_yellow(),
            format_bytes(bytes_read)
        );
        println!(
            "  {} 출력 용량:    {}",
            "📤".bright_magenta(),
            format_bytes(bytes_written)
        );
        println!(
            "  {} 처리 시간:    {}",
            "⏱️".bright_cyan(),
            format_duration(self.elapsed())
        );

        println!("{}", "═".repeat(50).bright_blue());
    }
}

/// 진행률 바 생성
///
/// `visible`이 false면 아무것도 그리지 않는 숨은 바를 반환합니다.
pub fn create_progress_bar(total: usize, message: impl Into<String>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    pb.set_message(message.into());
    pb
}

/// 바이트를 읽기 쉬운 형식으로 변환
///
/// # Arguments
/// * `bytes` - 바이트 수
///
/// # Returns
/// 형식화된 문자열 (예: "1.25 MB")
///
/// # Examples
/// ```
/// use optimake::stats::format_bytes;
///
/// assert_eq!(format_bytes(500), "500 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1048576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 경과 시간을 읽기 쉬운 형식으로 변환
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}시간 {}분", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}분 {}초", mins, remaining_secs)
    } else if secs > 0 {
        format!("{}.{:03}초", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
