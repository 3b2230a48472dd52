use livemark::{
    application::{editor::Editor, live::LivePreview, render::render_service},
    config::{
        EditorSettings, LogFormat, LoggingSettings, RenderSettings, Settings, StorageSettings,
    },
    domain::{
        presentation::{Direction, Theme},
        toolbar::SyntaxKind,
    },
    infra::store::{CONTENT_KEY, DOCUMENTS_KEY, FileStore, SettingsStore, THEME_KEY},
};
use tracing::level_filters::LevelFilter;

#[test]
fn session_state_survives_a_restart_through_the_file_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("settings.json");

    {
        let store = FileStore::open(&path).expect("open store");
        let mut editor = Editor::load(store, render_service(), RenderSettings::default());
        editor.set_theme(Theme::Light).unwrap();
        editor.set_text_direction(Direction::Rtl).unwrap();
        editor.set_text("1. one\n2. two");
        editor.apply_toolbar(0..13, &SyntaxKind::Blockquote).unwrap();
        editor.save_content().unwrap();
    }

    let store = FileStore::open(&path).expect("reopen store");
    assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));
    assert!(store.get(DOCUMENTS_KEY).is_some());

    let editor = Editor::load(store, render_service(), RenderSettings::default());
    assert_eq!(editor.presentation().theme, Theme::Light);
    assert_eq!(editor.presentation().text_direction, Direction::Rtl);
    assert_eq!(editor.text(), "> 1. one\n> 2. two");
    assert!(editor.preview().html().contains("<blockquote>"));
    assert!(editor.preview().html().contains("data-text-direction=\"rtl\""));
}

#[test]
fn corrupt_document_list_falls_back_to_a_fresh_session() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("settings.json");
    {
        let mut store = FileStore::open(&path).expect("open store");
        store.set(DOCUMENTS_KEY, "not json".to_string()).unwrap();
    }

    let store = FileStore::open(&path).expect("reopen store");
    let editor = Editor::load(store, render_service(), RenderSettings::default());
    assert_eq!(editor.documents().len(), 1);
    assert_eq!(editor.active_document().name, "Untitled 1");
}

fn settings_in(dir: &std::path::Path) -> Settings {
    Settings {
        logging: LoggingSettings {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        },
        editor: EditorSettings::default(),
        render: RenderSettings::default(),
        storage: StorageSettings {
            settings_file: dir.join("session.json"),
        },
    }
}

#[tokio::test(start_paused = true)]
async fn live_preview_uses_the_configured_settings_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = settings_in(dir.path());

    {
        let preview = LivePreview::open(&settings).expect("open preview");
        preview.input("# Saved");
        preview.flush().expect("flush");
    }

    let store = FileStore::open(&settings.storage.settings_file).expect("reopen store");
    assert_eq!(store.get(CONTENT_KEY).as_deref(), Some("# Saved"));

    let preview = LivePreview::open(&settings).expect("reopen preview");
    assert!(preview.subscribe().borrow().html().contains("<h1>Saved</h1>"));
}
