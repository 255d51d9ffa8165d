//! 통합 테스트 모듈
//!
//! optimake의 전체 변환 파이프라인을 임시 아카이브로 테스트합니다.

#![allow(dead_code)]

use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use optimake::{convert_archive, ConvertOptions, OptimakeError, ParserRegistry};

/// 테스트용 파일 생성 헬퍼 (중간 폴더 포함)
fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// 아카이브 루트에 optimade.yaml 작성
fn write_config(dir: &Path, yaml: &str) {
    create_file(dir, "optimade.yaml", yaml);
}

fn structure_json(nsites: usize) -> String {
    format!(r#"{{"attributes": {{"nsites": {nsites}, "elements": ["Na", "Cl"], "_ase_tags": [0, 1]}}}}"#)
}

/// 출력 JSONL을 줄 단위 JSON으로 읽기
fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// 엔트리 줄만 (헤더와 정보 줄 제외)
fn entry_lines(lines: &[Value]) -> Vec<&Value> {
    lines
        .iter()
        .filter(|l| l.get("attributes").is_some())
        .collect()
}

fn options() -> ConvertOptions {
    ConvertOptions::new().with_provider_prefix("test")
}

/// 폴더에 구조 파일과 속성 CSV가 있는 아카이브
fn setup_plain_archive() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for i in 1..=3 {
        create_file(
            temp_dir.path(),
            &format!("data/structures/{i}.json"),
            &structure_json(i),
        );
    }
    create_file(
        temp_dir.path(),
        "data/properties.csv",
        "my_id,my_id_energy_col\n1,-1.5\n2,-2.5\n3,-3.5\n",
    );
    write_config(
        temp_dir.path(),
        r#"
config_version: 0.1.0
database_description: Plain test archive
entries:
  - entry_type: structures
    entry_paths:
      - file: data
        matches:
          - data/structures/*.json
    property_paths:
      - file: data/properties.csv
    property_definitions:
      - name: energy
        title: Total energy
        unit: eV
        type: float
        aliases: [my_id_energy_col]
"#,
    );
    temp_dir
}

/// zip 아카이브 생성
fn create_zip(dir: &Path, name: &str, files: &[(&str, String)]) {
    let file = File::create(dir.join(name)).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (path, content) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// tar.gz 아카이브 생성
fn create_tar_gz(dir: &Path, name: &str, files: &[(&str, String)]) {
    let file = File::create(dir.join(name)).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, *path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

mod conversion_tests {
    use super::*;

    #[test]
    fn test_plain_archive() {
        let temp_dir = setup_plain_archive();
        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults()).unwrap();

        assert_eq!(conversion.jsonl_path, temp_dir.path().join("optimade.jsonl"));
        let lines = read_lines(&conversion.jsonl_path);

        // 헤더
        assert_eq!(
            lines[0]["x-optimade"]["meta"]["api_version"],
            optimake::schema::OPTIMADE_API_VERSION
        );

        // 정보 줄
        assert_eq!(lines[1]["description"], "structures");
        assert_eq!(lines[1]["properties"]["_test_energy"]["unit"], "eV");
        assert_eq!(lines[1]["properties"]["_test_energy"]["type"], "float");
        assert!(lines[1]["output_fields_by_format"]["json"]
            .as_array()
            .unwrap()
            .contains(&Value::from("nsites")));

        // 엔트리
        let entries = entry_lines(&lines);
        assert_eq!(entries.len(), 3);
        let ids: Vec<&str> = entries.iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(entries[0]["type"], "structures");
        assert_eq!(entries[0]["attributes"]["_test_energy"], -1.5);
        assert_eq!(entries[2]["attributes"]["_test_energy"], -3.5);
        assert!(entries[0]["attributes"].get("_ase_tags").is_none());
        assert!(entries[0]["attributes"]["last_modified"].is_string());
        assert_eq!(
            entries[0]["attributes"]["immutable_id"],
            "data/data/structures/1.json"
        );

        assert_eq!(conversion.statistics.entries_by_type()["structures"], 3);
        assert_eq!(conversion.statistics.get_property_files(), 1);
        assert_eq!(conversion.statistics.get_records_parsed(), 3);
        assert_eq!(
            conversion.statistics.warning_count(),
            conversion.diagnostics.len()
        );
    }

    #[test]
    fn test_alias_columns_reported_as_undeclared() {
        let temp_dir = setup_plain_archive();
        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults()).unwrap();

        let mismatch = conversion
            .diagnostics
            .warnings()
            .iter()
            .find_map(|w| match w {
                optimake::Warning::PropertyFieldMismatch {
                    undeclared,
                    missing,
                } => Some((undeclared.clone(), missing.clone())),
                _ => None,
            })
            .expect("mismatch warning");
        assert!(mismatch.0.contains("my_id"));
        assert!(mismatch.0.contains("my_id_energy_col"));
        assert!(mismatch.1.is_empty());
        assert_eq!(conversion.diagnostics.missing_property_rows(), 0);
    }

    #[test]
    fn test_zip_archive() {
        let temp_dir = TempDir::new().unwrap();
        create_zip(
            temp_dir.path(),
            "bundle.zip",
            &[
                ("data/set1/sample.json", structure_json(1)),
                ("data/set2/sample.json", structure_json(2)),
            ],
        );
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Zip archive
entries:
  - entry_type: structures
    entry_paths:
      - file: bundle.zip
        matches:
          - data/set1/*.json
          - data/set2/*.json
"#,
        );

        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults()).unwrap();
        let lines = read_lines(&conversion.jsonl_path);
        let entries = entry_lines(&lines);

        // 같은 파일 이름이라도 폴더가 다르면 ID가 구분됨
        let ids: Vec<&str> = entries.iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["set1", "set2"]);
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn test_tar_gz_archive() {
        let temp_dir = TempDir::new().unwrap();
        create_tar_gz(
            temp_dir.path(),
            "data.tar.gz",
            &[
                ("data/structures/1.json", structure_json(1)),
                ("data/structures/2.json", structure_json(2)),
                ("data/props.csv", "id,band_gap\n1,0.5\n2,1.5\n".to_string()),
            ],
        );
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Tarball
entries:
  - entry_type: structures
    entry_paths:
      - file: data.tar.gz
        matches: ["data/structures/*.json"]
    property_paths:
      - file: data.tar.gz
        matches: ["data/props.csv"]
    property_definitions:
      - name: band_gap
        type: float
"#,
        );

        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults()).unwrap();
        let lines = read_lines(&conversion.jsonl_path);
        let entries = entry_lines(&lines);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["id"], "2");
        assert_eq!(entries[1]["attributes"]["_test_band_gap"], 1.5);
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn test_single_gz_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = File::create(temp_dir.path().join("structures.json.gz")).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let records = format!("[{}, {}]", structure_json(1), structure_json(2));
        encoder.write_all(records.as_bytes()).unwrap();
        encoder.finish().unwrap();
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Gzip file
entries:
  - entry_type: structures
    entry_paths:
      - file: structures.json.gz
        matches: ["structures.json"]
"#,
        );

        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults()).unwrap();
        assert!(temp_dir.path().join("structures.json").exists());

        let lines = read_lines(&conversion.jsonl_path);
        let entries = entry_lines(&lines);
        let ids: Vec<&str> = entries.iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["0", "1"]);
        assert_eq!(entries[1]["attributes"]["nsites"], 2);
    }

    #[test]
    fn test_relative_archive_root() {
        let temp_dir = tempfile::Builder::new()
            .prefix("archive")
            .tempdir_in(".")
            .unwrap();
        for i in 1..=2 {
            create_file(temp_dir.path(), &format!("s/{i}.json"), &structure_json(i));
        }
        write_config(
            temp_dir.path(),
            "config_version: 0.1.0\ndatabase_description: x\nentries:\n  - entry_type: structures\n    entry_paths:\n      - file: s\n        matches: [\"s/*.json\"]\n",
        );

        // 현재 폴더 기준 상대 경로로 변환
        let relative = Path::new(temp_dir.path().file_name().unwrap());
        let conversion =
            convert_archive(relative, &options(), &ParserRegistry::with_defaults()).unwrap();

        assert_eq!(conversion.jsonl_path, relative.join("optimade.jsonl"));
        let lines = read_lines(&conversion.jsonl_path);
        let ids: Vec<&str> = entry_lines(&lines)
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn test_zero_limit_parses_everything() {
        let temp_dir = setup_plain_archive();
        let conversion = convert_archive(
            temp_dir.path(),
            &options().with_limit(Some(0)),
            &ParserRegistry::with_defaults(),
        )
        .unwrap();

        let lines = read_lines(&conversion.jsonl_path);
        assert_eq!(entry_lines(&lines).len(), 3);
    }

    #[test]
    fn test_limit() {
        let temp_dir = setup_plain_archive();
        let conversion = convert_archive(
            temp_dir.path(),
            &options().with_limit(Some(2)),
            &ParserRegistry::with_defaults(),
        )
        .unwrap();

        let lines = read_lines(&conversion.jsonl_path);
        assert_eq!(entry_lines(&lines).len(), 2);
        // 세 번째 행은 대응하는 엔트리가 없음
        assert!(conversion
            .diagnostics
            .warnings()
            .contains(&optimake::Warning::UnmatchedPropertyRow { id: "3".to_string() }));
    }

    #[test]
    fn test_custom_output_path() {
        let temp_dir = setup_plain_archive();
        let output = temp_dir.path().join("out/custom.jsonl");
        fs::create_dir_all(output.parent().unwrap()).unwrap();

        let conversion = convert_archive(
            temp_dir.path(),
            &options().with_jsonl_path(Some(output.clone())),
            &ParserRegistry::with_defaults(),
        )
        .unwrap();
        assert_eq!(conversion.jsonl_path, output);
        assert!(output.exists());
        assert!(!temp_dir.path().join("optimade.jsonl").exists());
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_no_clobber_leaves_output_unchanged() {
        let temp_dir = setup_plain_archive();
        let registry = ParserRegistry::with_defaults();

        let conversion = convert_archive(temp_dir.path(), &options(), &registry).unwrap();
        let first = fs::read(&conversion.jsonl_path).unwrap();

        let err = convert_archive(temp_dir.path(), &options(), &registry).unwrap_err();
        assert!(err.to_string().contains("Not overwriting existing file"));
        assert_eq!(fs::read(&conversion.jsonl_path).unwrap(), first);
    }

    #[test]
    fn test_missing_files_reported_together() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Missing files
entries:
  - entry_type: structures
    entry_paths:
      - file: data/structures/1.cif
      - file: data/structures/2.cif
      - file: data/structures/3.cif
"#,
        );

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults())
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, OptimakeError::MissingFiles { ref paths } if paths.len() == 3));
        for i in 1..=3 {
            assert!(msg.contains(&format!("data/structures/{i}.cif")));
        }
        assert!(!temp_dir.path().join("optimade.jsonl").exists());
    }

    #[test]
    fn test_duplicate_raw_ids() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "sample.json", &structure_json(1));
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Duplicates
entries:
  - entry_type: structures
    entry_paths:
      - file: sample.json
      - file: sample.json
"#,
        );

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults())
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate entry ID"));
    }

    #[test]
    fn test_unsupported_config_version() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            temp_dir.path(),
            "config_version: 0.0.1\ndatabase_description: x\nentries: []\n",
        );

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults())
            .unwrap_err();
        assert_eq!(err.kind(), optimake::ErrorKind::Config);
    }

    #[test]
    fn test_type_coercion_failure() {
        let temp_dir = setup_plain_archive();
        create_file(
            temp_dir.path(),
            "data/properties.csv",
            "my_id,my_id_energy_col\n1,low\n2,-2.5\n3,-3.5\n",
        );

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults())
            .unwrap_err();
        assert_eq!(err.kind(), optimake::ErrorKind::Coercion);
        assert!(err.to_string().contains("energy"));
    }
}

mod jsonl_tests {
    use super::*;

    fn setup_jsonl_archive() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        create_tar_gz(
            temp_dir.path(),
            "db.tar.gz",
            &[(
                "db/optimade.jsonl",
                "{\"x-optimade\": {\"meta\": {\"api_version\": \"1.1.0\"}}}\n".to_string(),
            )],
        );
        write_config(
            temp_dir.path(),
            "config_version: 0.1.0\ndatabase_description: x\nentries:\n  file: db.tar.gz\n  jsonl_path: db/optimade.jsonl\n",
        );
        temp_dir
    }

    #[test]
    fn test_jsonl_passthrough() {
        let temp_dir = setup_jsonl_archive();
        let conversion =
            convert_archive(temp_dir.path(), &options(), &ParserRegistry::new()).unwrap();

        assert_eq!(conversion.jsonl_path, temp_dir.path().join("optimade.jsonl"));
        let lines = read_lines(&conversion.jsonl_path);
        assert_eq!(lines[0]["x-optimade"]["meta"]["api_version"], "1.1.0");
    }

    #[test]
    fn test_jsonl_passthrough_no_clobber() {
        let temp_dir = setup_jsonl_archive();
        create_file(temp_dir.path(), "optimade.jsonl", "old");

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), optimake::ErrorKind::OutputCollision);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("optimade.jsonl")).unwrap(),
            "old"
        );

        convert_archive(
            temp_dir.path(),
            &options().with_overwrite(true),
            &ParserRegistry::new(),
        )
        .unwrap();
        let lines = read_lines(&temp_dir.path().join("optimade.jsonl"));
        assert!(lines[0].get("x-optimade").is_some());
    }
}

mod plugin_tests {
    use super::*;
    use optimake::config::{EntryConfig, ProvenanceSource};
    use optimake::registry::Record;
    use optimake::{
        AlternateSource, Converted, Entry, EntryAdapter, EntryConverter, EntryParser, Parsed,
        PropertyDefinition,
    };
    use serde_json::{json, Map};

    /// 한 줄에 `이름 값` 형식의 텍스트 파서
    struct KeyValueParser;

    impl EntryParser for KeyValueParser {
        fn name(&self) -> &str {
            "key-value"
        }

        fn parse(&self, path: &Path) -> anyhow::Result<Parsed> {
            let text = fs::read_to_string(path)?;
            let mut record = Map::new();
            for line in text.lines() {
                let (key, value) = line
                    .split_once(' ')
                    .ok_or_else(|| anyhow::anyhow!("malformed line {line:?}"))?;
                record.insert(key.to_string(), Value::from(value));
            }
            Ok(Parsed::One(Value::Object(record)))
        }
    }

    struct ThingAdapter(Map<String, Value>);

    impl EntryAdapter for ThingAdapter {
        fn entry(&self) -> Map<String, Value> {
            let mut entry = Map::new();
            entry.insert("id".to_string(), Value::Null);
            entry.insert("type".to_string(), Value::from("_things"));
            entry.insert("attributes".to_string(), Value::Object(self.0.clone()));
            entry
        }
    }

    struct ThingConverter;

    impl EntryConverter for ThingConverter {
        fn name(&self) -> &str {
            "thing"
        }

        fn convert(
            &self,
            record: &Record,
            _properties: &[PropertyDefinition],
            _provider_prefix: &str,
        ) -> anyhow::Result<Converted> {
            let attributes = record
                .as_object()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("not an object"))?;
            Ok(Converted::Adapter(Box::new(ThingAdapter(attributes))))
        }
    }

    #[test]
    fn test_custom_entry_type_plugins() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "things/a.txt", "colour red\nshape round");
        create_file(temp_dir.path(), "things/b.txt", "colour blue\nshape square");
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Things
entries:
  - entry_type: _things
    entry_paths:
      - file: things
        matches: ["things/*.txt"]
"#,
        );

        let mut registry = ParserRegistry::with_defaults();
        registry.register_parser("_things", KeyValueParser);
        registry.register_converter("_things", ThingConverter);

        let conversion = convert_archive(temp_dir.path(), &options(), &registry).unwrap();
        let lines = read_lines(&conversion.jsonl_path);

        assert_eq!(lines[1]["description"], "_things");
        let entries = entry_lines(&lines);
        assert_eq!(entries[0]["id"], "a");
        assert_eq!(entries[0]["type"], "_things");
        assert_eq!(entries[1]["attributes"]["shape"], "square");
    }

    #[test]
    fn test_unregistered_entry_type() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "a.txt", "x y");
        write_config(
            temp_dir.path(),
            "config_version: 0.1.0\ndatabase_description: x\nentries:\n  - entry_type: _things\n    entry_paths: [{file: a.txt}]\n",
        );

        let err = convert_archive(temp_dir.path(), &options(), &ParserRegistry::with_defaults())
            .unwrap_err();
        assert!(err.to_string().contains("Parsing type _things is not supported"));
    }

    /// 프로비넌스 그룹 이름으로 엔트리를 만드는 소스
    struct GroupSource;

    impl AlternateSource for GroupSource {
        fn name(&self) -> &str {
            "group"
        }

        fn construct_entries(
            &self,
            _archive_root: &Path,
            source: &ProvenanceSource,
            entry_config: &EntryConfig,
            provider_prefix: &str,
        ) -> anyhow::Result<Vec<Entry>> {
            let group = source
                .aiida_group
                .clone()
                .ok_or_else(|| anyhow::anyhow!("group required"))?;
            (1..=2)
                .map(|i| {
                    let mut attributes = Map::new();
                    attributes.insert("immutable_id".to_string(), json!(format!("uuid-{i}")));
                    attributes.insert(format!("_{provider_prefix}_group"), json!(group));
                    Ok(Entry {
                        id: Some(format!("{group}-{i}")),
                        entry_type: entry_config.entry_type.clone(),
                        attributes,
                        extra: Map::new(),
                    })
                })
                .collect()
        }
    }

    #[test]
    fn test_alternate_source_with_properties() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "props.csv", "id,energy\nuuid-1,1\nuuid-2,2\n");
        write_config(
            temp_dir.path(),
            r#"
config_version: 0.1.0
database_description: Provenance
entries:
  - entry_type: structures
    entry_paths:
      aiida_file: export.aiida
      aiida_group: relaxed
    property_paths:
      - file: props.csv
    property_definitions:
      - name: energy
        type: integer
      - name: group
"#,
        );

        let mut registry = ParserRegistry::with_defaults();
        registry.set_alternate_source(GroupSource);

        let conversion = convert_archive(temp_dir.path(), &options(), &registry).unwrap();
        let lines = read_lines(&conversion.jsonl_path);
        let entries = entry_lines(&lines);

        assert_eq!(entries[0]["id"], "relaxed-1");
        assert_eq!(entries[1]["attributes"]["_test_energy"], 2);
        assert_eq!(entries[1]["attributes"]["_test_group"], "relaxed");
        assert!(conversion.diagnostics.is_empty());
    }
}
