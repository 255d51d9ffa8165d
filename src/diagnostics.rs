//! 변환 진단(경고) 모듈
//!
//! 데이터셋을 사용할 수는 있지만 일부가 불완전한 경우의 경고를 모읍니다.
//! 경고는 출력을 막지 않으며, 로그와 함께 호출자에게 그대로 반환됩니다.

use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// 치명적이지 않은 변환 경고
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// 엔트리에 대응하는 속성 행이 없음 (엔트리는 유지, 속성만 생략)
    MissingPropertyRow {
        entry_id: String,
        property_entry_id: String,
    },
    /// 속성 테이블의 ID가 어떤 엔트리와도 일치하지 않음
    UnmatchedPropertyRow { id: String },
    /// 선언된 속성과 실제로 읽은 속성이 다름
    PropertyFieldMismatch {
        /// 데이터에는 있지만 선언되지 않은 필드 (API에서 제외됨)
        undeclared: BTreeSet<String>,
        /// 선언되었지만 데이터에 없는 필드
        missing: BTreeSet<String>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingPropertyRow {
                entry_id,
                property_entry_id,
            } => write!(
                f,
                "Could not find entry {entry_id:?} (or fully-qualified {property_entry_id:?}) in parsed properties"
            ),
            Warning::UnmatchedPropertyRow { id } => {
                write!(f, "Could not find entry {id:?} in OPTIMADE entries")
            }
            Warning::PropertyFieldMismatch {
                undeclared,
                missing,
            } => {
                write!(
                    f,
                    "Mismatch between parsed property fields (A) and those defined in config (B)."
                )?;
                if !undeclared.is_empty() {
                    write!(
                        f,
                        "\n(A - B) = {undeclared:?} (will be omitted from API; if intended this can be ignored)."
                    )?;
                }
                if !missing.is_empty() {
                    write!(
                        f,
                        "\n(B - A) = {missing:?} (configured, but missing; check for typos or missing aliases)"
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// 경고 누적기
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 경고 기록 (로그에도 출력)
    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// 누락된 속성 행 경고 수
    pub fn missing_property_rows(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::MissingPropertyRow { .. }))
            .count()
    }
}
