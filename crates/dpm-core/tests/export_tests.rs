use dpm_core::{
    Datapack, EditMethod, Error, ExportSettings, Modifier, NoProgress, PackStore, Progress,
    ScalarValue, find_pack_files,
};
use serde_json::json;
use std::collections::HashMap;
use std::io::{Read, Write as _};

fn pack_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn mcmeta(id: &str) -> String {
    format!(
        r#"{{"pack":{{"id":"{}","name":"{}","description":"test pack"}}}}"#,
        id, id
    )
}

fn unzip_text(data: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

const DPCONFIG: &str = r#"{
  "meta": {"ver": 2, "tab": "Worldgen", "id": "base-config"},
  "widgets": [
    {"type": "title", "text": "Surface"},
    {"type": "slider", "text": "Surface level", "method": "surface_level",
     "value": {"type": "int", "default": 0, "range": [0, 64]}},
    {"type": "switch", "text": "Decoration", "method": "decorate",
     "value": {"default": true}},
    {"type": "hologram", "text": "from the future"}
  ],
  "methods": {
    "surface_level": {
      "transformer": "$input",
      "accessors": [
        {"method": "set", "file_path": ".json",
         "value_path": "surface_builder/config/value"},
        {"method": "set", "value_path": "dropped: no file_path"}
      ]
    },
    "decorate": {
      "transformer": "$input",
      "accessors": [
        {"method": "set", "file_path": "./data/base/settings.json",
         "value_path": "decorate"}
      ]
    }
  }
}"#;

const BIOME: &str = r#"{"surface_builder":{"config":{"value":0}}}"#;
const SETTINGS: &str = r#"{"decorate":true}"#;

fn configured_pack() -> Datapack {
    let meta = mcmeta("base");
    Datapack::from_bytes(
        "base.zip",
        &pack_bytes(&[
            ("pack.mcmeta", meta.as_str()),
            ("dpconfig.json", DPCONFIG),
            ("data/base/worldgen/biome/plains.json", BIOME),
            ("data/base/worldgen/biome/desert.json", BIOME),
            ("data/base/settings.json", SETTINGS),
        ]),
    )
    .unwrap()
}

#[test]
fn end_to_end_slider_export() {
    let pack = configured_pack();
    let config = pack.config.as_ref().unwrap();
    assert_eq!(config.meta.tab, "Worldgen");
    // The unknown widget type was skipped, the other three were kept.
    assert_eq!(config.widgets.len(), 3);
    // The accessor without a file_path was dropped.
    assert_eq!(config.methods["surface_level"].accessors.len(), 1);

    let mut inputs = HashMap::new();
    inputs.insert("surface_level".to_string(), ScalarValue::Number(10.0));
    let active = config.active_inputs(&inputs);

    let mut modifier = Modifier::new();
    modifier.plan_changes(&pack, &active, &HashMap::new());
    assert_eq!(modifier.queue().len(), 1);

    let mut store = PackStore::new();
    store.add(pack);
    let outputs = modifier
        .export(&store, &ExportSettings::default(), &mut NoProgress)
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].file_name, "Modded copy of base.zip");

    // Every matching biome file was updated...
    for biome in [
        "data/base/worldgen/biome/plains.json",
        "data/base/worldgen/biome/desert.json",
    ] {
        let parsed: serde_json::Value =
            serde_json::from_str(&unzip_text(&outputs[0].data, biome)).unwrap();
        assert_eq!(parsed, json!({"surface_builder": {"config": {"value": 10}}}));
    }
    // ...files without the pointer were carried through untouched, and the
    // whole original listing is present.
    assert_eq!(unzip_text(&outputs[0].data, "data/base/settings.json"), SETTINGS);
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(outputs[0].data.clone())).unwrap();
    assert_eq!(archive.len(), 5);
    assert!(archive.by_name("pack.mcmeta").is_ok());
}

#[test]
fn default_valued_input_plans_nothing() {
    let pack = configured_pack();
    let config = pack.config.as_ref().unwrap();

    let mut inputs = HashMap::new();
    inputs.insert("surface_level".to_string(), ScalarValue::Number(0.0));
    inputs.insert("decorate".to_string(), ScalarValue::Bool(true));
    let active = config.active_inputs(&inputs);
    assert!(active.is_empty());

    let mut modifier = Modifier::new();
    modifier.plan_changes(&pack, &active, &HashMap::new());
    assert!(modifier.queue().is_empty());
}

#[test]
fn switch_input_sets_boolean() {
    let pack = configured_pack();
    let config = pack.config.as_ref().unwrap();

    let mut inputs = HashMap::new();
    inputs.insert("decorate".to_string(), ScalarValue::Bool(false));
    let active = config.active_inputs(&inputs);

    let mut modifier = Modifier::new();
    modifier.plan_changes(&pack, &active, &HashMap::new());

    let mut store = PackStore::new();
    store.add(pack);
    let settings = ExportSettings {
        modified_only: true,
        ..ExportSettings::default()
    };
    let outputs = modifier.export(&store, &settings, &mut NoProgress).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&unzip_text(&outputs[0].data, "data/base/settings.json")).unwrap();
    assert_eq!(parsed, json!({"decorate": false}));
}

#[test]
fn combine_packs_merges_with_last_write_wins() {
    let meta1 = mcmeta("first");
    let meta2 = mcmeta("second");
    let p1 = Datapack::from_bytes(
        "first.zip",
        &pack_bytes(&[
            ("pack.mcmeta", meta1.as_str()),
            ("data/shared.json", r#"{"v":0}"#),
        ]),
    )
    .unwrap();
    let p2 = Datapack::from_bytes(
        "second.zip",
        &pack_bytes(&[
            ("pack.mcmeta", meta2.as_str()),
            ("data/shared.json", r#"{"v":0}"#),
        ]),
    )
    .unwrap();
    let mut store = PackStore::new();
    store.add(p1);
    store.add(p2);

    let mut modifier = Modifier::new();
    modifier.queue_change(
        "first",
        "./data/shared.json",
        "v",
        ScalarValue::Number(1.0),
        EditMethod::Set,
    );
    modifier.queue_change(
        "second",
        "./data/shared.json",
        "v",
        ScalarValue::Number(2.0),
        EditMethod::Set,
    );

    let settings = ExportSettings {
        modified_only: true,
        combine_packs: true,
        ..ExportSettings::default()
    };
    let outputs = modifier.export(&store, &settings, &mut NoProgress).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].file_name, "Combined Pack.zip");

    // The colliding path resolves to the later pack's content.
    let parsed: serde_json::Value =
        serde_json::from_str(&unzip_text(&outputs[0].data, "data/shared.json")).unwrap();
    assert_eq!(parsed, json!({"v": 2}));
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(outputs[0].data.clone())).unwrap();
    assert_eq!(archive.len(), 1);
}

#[test]
fn compression_level_zero_stores_entries() {
    let meta = mcmeta("base");
    let pack = Datapack::from_bytes(
        "base.zip",
        &pack_bytes(&[
            ("pack.mcmeta", meta.as_str()),
            ("data/values.json", r#"{"a":1}"#),
        ]),
    )
    .unwrap();
    let mut store = PackStore::new();
    store.add(pack);

    for (level, expected) in [
        (0u32, zip::CompressionMethod::Stored),
        (9u32, zip::CompressionMethod::Deflated),
    ] {
        let mut modifier = Modifier::new();
        modifier.queue_change(
            "base",
            "./data/values.json",
            "a",
            ScalarValue::Number(2.0),
            EditMethod::Set,
        );
        let settings = ExportSettings {
            compression_level: level,
            modified_only: true,
            ..ExportSettings::default()
        };
        let outputs = modifier.export(&store, &settings, &mut NoProgress).unwrap();
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(outputs[0].data.clone())).unwrap();
        let entry = archive.by_name("data/values.json").unwrap();
        assert_eq!(entry.compression(), expected);
    }
}

struct RecordingProgress {
    steps: Vec<(usize, usize)>,
}

impl Progress for RecordingProgress {
    fn on_step(&mut self, done: usize, total: usize) {
        self.steps.push((done, total));
    }
}

#[test]
fn progress_counter_is_monotonic() {
    let pack = configured_pack();
    let config = pack.config.as_ref().unwrap();

    let mut inputs = HashMap::new();
    inputs.insert("surface_level".to_string(), ScalarValue::Number(10.0));
    let active = config.active_inputs(&inputs);

    let mut modifier = Modifier::new();
    modifier.plan_changes(&pack, &active, &HashMap::new());
    let mut store = PackStore::new();
    store.add(pack);

    let mut progress = RecordingProgress { steps: Vec::new() };
    modifier
        .export(&store, &ExportSettings::default(), &mut progress)
        .unwrap();

    assert!(!progress.steps.is_empty());
    for pair in progress.steps.windows(2) {
        assert!(pair[1].0 >= pair[0].0, "done went backwards: {:?}", pair);
        assert!(pair[1].1 >= pair[0].1, "total shrank: {:?}", pair);
    }
    let (done, total) = *progress.steps.last().unwrap();
    // 1 change + 5 passthrough-planned files
    assert_eq!(total, 6);
    assert_eq!(done, total);
}

#[test]
fn unsupported_config_version_is_rejected() {
    let meta = mcmeta("base");
    let bytes = pack_bytes(&[
        ("pack.mcmeta", meta.as_str()),
        ("dpconfig.json", r#"{"meta":{"ver":3,"tab":"X"},"widgets":[],"methods":{}}"#),
    ]);
    let err = Datapack::from_bytes("base.zip", &bytes).unwrap_err();
    assert!(matches!(err, Error::BadConfig { .. }));
}

#[test]
fn packs_load_from_disk_and_are_discoverable() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("packs");
    std::fs::create_dir_all(&nested).unwrap();
    let meta = mcmeta("base");
    let path = nested.join("base.zip");
    std::fs::write(
        &path,
        pack_bytes(&[
            ("pack.mcmeta", meta.as_str()),
            ("data/values.json", r#"{"a":1}"#),
        ]),
    )
    .unwrap();
    std::fs::write(nested.join("notes.txt"), "not a pack").unwrap();

    let found = find_pack_files(dir.path());
    assert_eq!(found, vec![path.clone()]);

    let pack = Datapack::load_path(&path).unwrap();
    assert_eq!(pack.id, "base");
    assert_eq!(pack.file_name, "base.zip");
    assert!(pack.contains("data/values.json"));
}
