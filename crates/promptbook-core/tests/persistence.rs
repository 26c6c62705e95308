//! Integration tests for notebook save/load.

use std::fs;

use promptbook_core::{
    Cell, CellKind, CellStatus, Engine, Error, Notebook, PromptConfig,
};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

fn executed_notebook() -> Notebook {
    let mut notebook = Notebook::new("roundtrip");
    notebook.add_cell(Cell::new(CellKind::Markdown, "# Roundtrip"));
    notebook.add_cell(Cell::new(CellKind::Memory, "subject = 'lifetimes'"));
    notebook.add_cell(
        Cell::prompt(
            "Quiz me on {subject}",
            PromptConfig {
                temperature: Some(0.2),
                response_var: Some("quiz".into()),
                ..PromptConfig::default()
            },
        )
        .unwrap(),
    );
    Engine::default().execute_all(&mut notebook);
    notebook
}

#[test]
fn test_roundtrip_preserves_structure_and_empties_state() {
    let dir = temp_dir();
    let path = dir.path().join("notebook.json");

    let notebook = executed_notebook();
    assert!(!notebook.state().is_empty());
    notebook.save(&path).unwrap();

    let loaded = Notebook::load(&path).unwrap();
    assert_eq!(loaded.id(), notebook.id());
    assert_eq!(loaded.name(), "roundtrip");
    assert_eq!(loaded.created_at(), notebook.created_at());
    assert!(loaded.state().is_empty());

    assert_eq!(loaded.len(), notebook.len());
    for (original, restored) in notebook.cells().iter().zip(loaded.cells()) {
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.kind(), original.kind());
        assert_eq!(restored.content(), original.content());
        assert_eq!(restored.outputs(), original.outputs());
        assert_eq!(restored.state_dependencies(), original.state_dependencies());
        assert_eq!(restored.state_produces(), original.state_produces());
        assert_eq!(restored.prompt_config(), original.prompt_config());
        assert_eq!(restored.status(), CellStatus::Idle);
    }
}

#[test]
fn test_loaded_notebook_reexecutes() {
    let dir = temp_dir();
    let path = dir.path().join("rerun.json");
    executed_notebook().save(&path).unwrap();

    let mut loaded = Notebook::load(&path).unwrap();
    let summary = Engine::default().execute_all(&mut loaded);
    assert!(summary.is_success());
    assert!(loaded.state().contains_key("quiz"));
    assert_eq!(loaded.cells()[2].outputs().len(), 2);
}

#[test]
fn test_document_excludes_state_values() {
    let dir = temp_dir();
    let path = dir.path().join("doc.json");
    executed_notebook().save(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(json.get("state").is_none());
    let keys: Vec<&str> = json["state_keys"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|k| k.as_str())
        .collect();
    assert_eq!(keys, vec!["subject", "quiz"]);
    assert_eq!(json["cells"][2]["prompt"]["response_var"], "quiz");
}

#[test]
fn test_save_creates_parent_and_leaves_no_temp_file() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("deeper").join("nb.json");
    Notebook::new("nested").save(&path).unwrap();

    let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["nb.json".to_string()]);
}

#[test]
fn test_load_errors_are_persistence_errors() {
    let dir = temp_dir();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        Notebook::load(&missing),
        Err(Error::Persistence { path, .. }) if path == missing
    ));

    let corrupt = dir.path().join("corrupt.json");
    fs::write(&corrupt, "{\"cells\": [").unwrap();
    assert!(matches!(
        Notebook::load(&corrupt),
        Err(Error::Persistence { .. })
    ));
}

#[test]
fn test_failed_save_keeps_previous_document() {
    let dir = temp_dir();
    let path = dir.path().join("keep.json");
    let notebook = executed_notebook();
    notebook.save(&path).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    // A directory where the temp file should go makes the write fail.
    fs::create_dir(dir.path().join("keep.json.tmp")).unwrap();
    assert!(Notebook::new("other").save(&path).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_save_to_tmp_extension_keeps_previous_document() {
    let dir = temp_dir();
    let path = dir.path().join("draft.tmp");
    let notebook = executed_notebook();
    notebook.save(&path).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    fs::create_dir(dir.path().join("draft.tmp.tmp")).unwrap();
    assert!(Notebook::new("other").save(&path).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), before);

    fs::remove_dir(dir.path().join("draft.tmp.tmp")).unwrap();
    Notebook::new("other").save(&path).unwrap();
    assert_eq!(Notebook::load(&path).unwrap().name(), "other");
}

#[test]
fn test_sibling_documents_use_separate_temp_files() {
    let dir = temp_dir();
    let json = dir.path().join("notes.json");
    let backup = dir.path().join("notes.bak");

    // A stale temp file of one document must not block the other.
    fs::create_dir(dir.path().join("notes.json.tmp")).unwrap();
    executed_notebook().save(&backup).unwrap();
    assert!(Notebook::load(&backup).is_ok());
    assert!(executed_notebook().save(&json).is_err());
}
