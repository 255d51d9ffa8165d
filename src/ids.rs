//! 엔트리 ID 생성 모듈
//!
//! 파일 경로에서 만든 원시 ID 목록을 사람이 읽기 쉬운 짧은 ID 목록으로 줄입니다.
//! 모든 ID에 공통인 경로 구간(앞/뒤)과 공통 확장자만 제거하므로
//! 입력과 같은 길이, 같은 순서가 유지됩니다.

/// 경로 구분자
const SEPARATOR: char = '/';

/// 원시 ID 목록에서 짧은 ID 목록 생성
///
/// 1. ID가 하나면 확장자를 뗀 파일 이름만 반환
/// 2. 모든 ID에서 같은 위치의 경로 구간이 동일하면 앞에서부터 제거, 뒤에서도 반복
/// 3. 남은 ID가 모두 같은 확장자로 끝나는 동안 확장자 제거
///
/// # Examples
/// ```
/// use optimake::ids::derive_unique_ids;
///
/// let ids = derive_unique_ids(&[
///     "data/structures/1.cif".to_string(),
///     "data/structures/2.cif".to_string(),
/// ]);
/// assert_eq!(ids, ["1", "2"]);
/// ```
pub fn derive_unique_ids(entry_ids: &[String]) -> Vec<String> {
    if let [single] = entry_ids {
        return vec![split_ext(basename(single)).0.to_string()];
    }
    if entry_ids.is_empty() {
        return Vec::new();
    }

    let ids = strip_common_segments(entry_ids, false);
    let ids = strip_common_segments(&ids, true);
    strip_common_extensions(ids)
}

fn strip_common_segments(ids: &[String], from_back: bool) -> Vec<String> {
    let split: Vec<Vec<&str>> = ids
        .iter()
        .map(|id| {
            let mut segments: Vec<&str> = id.split(SEPARATOR).collect();
            if from_back {
                segments.reverse();
            }
            segments
        })
        .collect();

    let mut index = 0;
    while let Some(element) = split[0].get(index) {
        if split.iter().all(|segments| segments.get(index) == Some(element)) {
            index += 1;
        } else {
            break;
        }
    }

    split
        .into_iter()
        .map(|segments| {
            let mut rest: Vec<&str> = segments.into_iter().skip(index).collect();
            if from_back {
                rest.reverse();
            }
            rest.join("/")
        })
        .collect()
}

fn strip_common_extensions(mut ids: Vec<String>) -> Vec<String> {
    loop {
        let ext = split_ext(&ids[0]).1;
        if ext.is_empty() || !ids.iter().all(|id| split_ext(id).1 == ext) {
            return ids;
        }
        ids = ids
            .iter()
            .map(|id| split_ext(id).0.to_string())
            .collect();
    }
}

/// 마지막 경로 구간
pub fn basename(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// `(확장자를 뗀 경로, 확장자)`로 분리
///
/// 확장자는 마지막 경로 구간의 마지막 `.`부터이며, 선행 `.`만 있는 이름
/// (예: `.hidden`)은 확장자가 없는 것으로 봅니다.
pub fn split_ext(path: &str) -> (&str, &str) {
    let name_start = path.rfind(SEPARATOR).map(|i| i + 1).unwrap_or(0);
    let name = &path[name_start..];
    let leading_dots = name.len() - name.trim_start_matches('.').len();

    match name.rfind('.') {
        Some(dot) if dot > leading_dots => {
            let split_at = name_start + dot;
            (&path[..split_at], &path[split_at..])
        }
        _ => (path, ""),
    }
}
