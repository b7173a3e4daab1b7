use super::*;
use crate::corpus::Passage;
use crate::index::{DistanceMetric, FORMAT_VERSION};
use tempfile::TempDir;

fn document_id(name: &str) -> DocumentId {
    DocumentId::new(name).expect("valid id")
}

fn sample_index(name: &str, count: u32) -> VectorIndex {
    let mut index = VectorIndex::new(document_id(name), "ollama:test", DistanceMetric::Cosine);
    for ordinal in 0..count {
        index
            .insert(
                Passage {
                    text: format!("passage {ordinal}"),
                    source_document_id: document_id(name),
                    ordinal: ordinal * 2,
                    token_count: 2,
                },
                vec![ordinal as f32, 1.0, 0.5],
            )
            .expect("should insert");
    }
    index
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path().join("indexes"));
    let index = sample_index("report", 3);

    let path = store.save(&index).expect("should save");
    assert_eq!(path, store.path_for(index.document_id()));
    assert!(path.ends_with("report.index.json"));

    let loaded = store.load(index.document_id()).expect("should load");
    assert_eq!(loaded, index);
}

#[test]
fn save_leaves_no_temporary_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());

    store.save(&sample_index("report", 2)).expect("should save");
    store.save(&sample_index("report", 4)).expect("should overwrite");

    let names: Vec<String> = fs::read_dir(temp_dir.path())
        .expect("should read dir")
        .map(|entry| {
            entry
                .expect("should read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(names, vec!["report.index.json".to_string()]);
    assert_eq!(
        store.load(&document_id("report")).expect("should load").len(),
        4
    );
}

#[test]
fn missing_index_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    assert!(matches!(
        store.load(&document_id("absent")),
        Err(IndexError::NotFound(_))
    ));
}

#[test]
fn unknown_version_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    let index = sample_index("report", 1);
    let path = store.save(&index).expect("should save");

    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("should read")).expect("valid json");
    json["header"]["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
    fs::write(&path, json.to_string()).expect("should write");

    assert!(matches!(
        store.load(index.document_id()),
        Err(IndexError::UnsupportedVersion(_))
    ));
}

#[test]
fn mismatched_document_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    let path = store.save(&sample_index("first", 1)).expect("should save");
    fs::rename(&path, store.path_for(&document_id("second"))).expect("should rename");

    assert!(matches!(
        store.load(&document_id("second")),
        Err(IndexError::DocumentMismatch { .. })
    ));
}

#[test]
fn wrong_embedding_length_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    let index = sample_index("report", 2);
    let path = store.save(&index).expect("should save");

    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("should read")).expect("valid json");
    json["entries"][1]["embedding"] = serde_json::json!([1.0]);
    fs::write(&path, json.to_string()).expect("should write");

    assert!(matches!(
        store.load(index.document_id()),
        Err(IndexError::DimensionMismatch { .. })
    ));
}

#[test]
fn duplicate_ordinal_in_file_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    let index = sample_index("report", 2);
    let path = store.save(&index).expect("should save");

    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("should read")).expect("valid json");
    json["entries"][1]["passage"]["ordinal"] = serde_json::json!(0);
    fs::write(&path, json.to_string()).expect("should write");

    assert!(matches!(
        store.load(index.document_id()),
        Err(IndexError::OrdinalOrder {
            previous: 0,
            ordinal: 0
        })
    ));
}

#[test]
fn garbage_file_is_a_serialization_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    fs::write(store.path_for(&document_id("junk")), "not json").expect("should write");

    assert!(matches!(
        store.load(&document_id("junk")),
        Err(IndexError::Serialization(_))
    ));
}

#[test]
fn list_and_delete() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    assert!(store.list().expect("should list").is_empty());

    store.save(&sample_index("beta", 1)).expect("should save");
    store.save(&sample_index("alpha", 2)).expect("should save");
    fs::write(temp_dir.path().join("broken.index.json"), "{").expect("should write");
    fs::write(temp_dir.path().join("notes.txt"), "ignored").expect("should write");

    let ids: Vec<String> = store
        .list()
        .expect("should list")
        .into_iter()
        .map(|header| header.document_id.to_string())
        .collect();
    assert_eq!(ids, vec!["alpha", "beta"]);

    assert!(store.delete(&document_id("alpha")).expect("should delete"));
    assert!(!store.delete(&document_id("alpha")).expect("should delete"));
    assert_eq!(store.list().expect("should list").len(), 1);
}

#[test]
fn listing_a_missing_directory_is_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path().join("never-created"));
    assert!(store.list().expect("should list").is_empty());
}

#[test]
fn shared_index_swaps_atomically() {
    let shared = SharedIndex::new(sample_index("report", 1));
    let snapshot = shared.current();
    assert_eq!(snapshot.len(), 1);

    let previous = shared.replace(sample_index("report", 3));

    assert_eq!(previous.len(), 1);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(shared.current().len(), 3);
}

#[test]
fn shared_index_serves_concurrent_readers() {
    let shared = Arc::new(SharedIndex::new(sample_index("report", 2)));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                (0..100)
                    .map(|_| shared.current().len())
                    .all(|len| len == 2 || len == 5)
            })
        })
        .collect();
    shared.replace(sample_index("report", 5));

    for reader in readers {
        assert!(reader.join().expect("reader thread should not panic"));
    }
}
