//! Editor session: the source buffer, presentation flags, open documents and
//! the most recent preview, persisted through a [`SettingsStore`].

use std::{ops::Range, str::FromStr, sync::Arc};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    application::render::{
        RENDER_ERROR_PANEL, RenderError, RenderOptions, RenderRequest, RenderService,
        RenderedDocument, reapply_directions,
    },
    config::RenderSettings,
    domain::{
        documents::{Document, DocumentError, DocumentSet},
        presentation::{Direction, PresentationState, Theme, parse_flag},
        stats::TextStats,
        toolbar::{self, SyntaxKind, ToolbarError},
    },
    infra::store::{
        ACTIVE_DOCUMENT_KEY, AUTO_RENDER_KEY, CODE_DIR_KEY, CONTENT_KEY, DOCUMENTS_KEY,
        FULL_HEIGHT_KEY, INLINE_CODE_DIR_KEY, INPUT_VISIBLE_KEY, SettingsStore, StoreError,
        TEXT_DIR_KEY, THEME_KEY,
    },
};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Toolbar(#[from] ToolbarError),
}

/// What the output panel currently shows.
#[derive(Debug, Clone)]
pub enum Preview {
    Rendered(RenderedDocument),
    Failed(RenderError),
}

impl Preview {
    /// Markup for the output area.
    pub fn html(&self) -> String {
        match self {
            Preview::Rendered(document) => document.container_html(),
            Preview::Failed(_) => RENDER_ERROR_PANEL.to_string(),
        }
    }

    pub fn document(&self) -> Option<&RenderedDocument> {
        match self {
            Preview::Rendered(document) => Some(document),
            Preview::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Preview::Failed(_))
    }
}

pub struct Editor<S: SettingsStore> {
    store: S,
    presentation: PresentationState,
    documents: DocumentSet,
    renderer: Arc<dyn RenderService>,
    render_settings: RenderSettings,
    preview: Preview,
}

impl<S: SettingsStore> Editor<S> {
    /// Restore a session from `store` and perform the first render.
    ///
    /// Unreadable values fall back to their defaults.
    pub fn load(store: S, renderer: Arc<dyn RenderService>, render_settings: RenderSettings) -> Self {
        let presentation = load_presentation(&store);
        let documents = load_documents(&store);
        let preview = Preview::Rendered(RenderedDocument::empty(presentation.text_direction));

        let mut editor = Self {
            store,
            presentation,
            documents,
            renderer,
            render_settings,
            preview,
        };
        editor.render_now();
        editor
    }

    pub fn presentation(&self) -> &PresentationState {
        &self.presentation
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn documents(&self) -> &[Document] {
        self.documents.documents()
    }

    pub fn active_document(&self) -> &Document {
        self.documents.active()
    }

    pub fn text(&self) -> &str {
        &self.documents.active().content
    }

    pub fn stats(&self) -> TextStats {
        TextStats::of(self.text())
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::from(&self.presentation).with_render_settings(&self.render_settings)
    }

    /// Replace the buffer. Neither renders nor persists.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.documents.set_active_content(text.into());
    }

    /// Render the current buffer into the preview. A failure swaps the whole
    /// preview for the error panel; the buffer is untouched.
    pub fn render_now(&mut self) -> &Preview {
        let request =
            RenderRequest::new(self.text().to_string()).with_options(self.render_options());

        self.preview = match self.renderer.render(&request) {
            Ok(document) => {
                debug!(
                    target = "application::editor",
                    bytes = request.markdown.len(),
                    code_blocks = document.code_blocks.len(),
                    "Preview refreshed"
                );
                Preview::Rendered(document)
            }
            Err(err) => {
                warn!(target = "application::editor", "Render failed: {err}");
                Preview::Failed(err)
            }
        };
        &self.preview
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), EditorError> {
        self.presentation.theme = theme;
        self.store.set(THEME_KEY, theme.as_str().to_string())?;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, EditorError> {
        let theme = self.presentation.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /// Enabling auto-render renders immediately.
    pub fn set_auto_render(&mut self, enabled: bool) -> Result<(), EditorError> {
        self.presentation.auto_render = enabled;
        self.store.set(AUTO_RENDER_KEY, enabled.to_string())?;
        if enabled {
            self.render_now();
        }
        Ok(())
    }

    pub fn set_text_direction(&mut self, direction: Direction) -> Result<(), EditorError> {
        self.presentation.text_direction = direction;
        self.store.set(TEXT_DIR_KEY, direction.as_str().to_string())?;
        self.render_now();
        Ok(())
    }

    pub fn set_inline_code_direction(&mut self, direction: Direction) -> Result<(), EditorError> {
        self.presentation.inline_code_direction = direction;
        self.store
            .set(INLINE_CODE_DIR_KEY, direction.as_str().to_string())?;
        self.reapply_directions();
        Ok(())
    }

    pub fn set_code_direction(&mut self, direction: Direction) -> Result<(), EditorError> {
        self.presentation.code_direction = direction;
        self.store.set(CODE_DIR_KEY, direction.as_str().to_string())?;
        self.reapply_directions();
        Ok(())
    }

    pub fn set_full_height(&mut self, enabled: bool) -> Result<(), EditorError> {
        self.presentation.full_height = enabled;
        self.store.set(FULL_HEIGHT_KEY, enabled.to_string())?;
        Ok(())
    }

    pub fn set_input_visible(&mut self, visible: bool) -> Result<(), EditorError> {
        self.presentation.input_visible = visible;
        self.store.set(INPUT_VISIBLE_KEY, visible.to_string())?;
        Ok(())
    }

    /// Apply a toolbar edit to the buffer and return the new selection.
    pub fn apply_toolbar(
        &mut self,
        selection: Range<usize>,
        kind: &SyntaxKind,
    ) -> Result<Range<usize>, EditorError> {
        let edit = toolbar::apply(self.text(), selection, kind)?;
        self.documents.set_active_content(edit.text);
        if self.presentation.auto_render {
            self.render_now();
        }
        Ok(edit.selection)
    }

    pub fn create_document(&mut self) -> Uuid {
        let id = self.documents.create();
        self.render_now();
        id
    }

    pub fn rename_document(&mut self, id: Uuid, name: &str) -> Result<(), EditorError> {
        self.documents.rename(id, name)?;
        Ok(())
    }

    pub fn switch_document(&mut self, id: Uuid) -> Result<(), EditorError> {
        self.documents.switch_to(id)?;
        self.render_now();
        Ok(())
    }

    pub fn close_document(&mut self, id: Uuid) -> Result<(), EditorError> {
        let was_active = self.documents.active_id() == id;
        self.documents.close(id)?;
        if was_active {
            self.render_now();
        }
        Ok(())
    }

    /// Persist every document, the active selection and the active buffer.
    pub fn save_content(&mut self) -> Result<(), EditorError> {
        let encoded = serde_json::to_string(self.documents.documents()).map_err(|source| {
            StoreError::Encode {
                key: DOCUMENTS_KEY,
                source,
            }
        })?;
        self.store.set(DOCUMENTS_KEY, encoded)?;
        self.store
            .set(ACTIVE_DOCUMENT_KEY, self.documents.active_id().to_string())?;
        self.store.set(CONTENT_KEY, self.text().to_string())?;
        Ok(())
    }

    fn reapply_directions(&mut self) {
        let options = self.render_options();
        if let Preview::Rendered(document) = &mut self.preview {
            match reapply_directions(&document.html, &options) {
                Ok(html) => document.html = html,
                Err(err) => warn!(
                    target = "application::editor",
                    "Direction reapplication failed: {err}"
                ),
            }
        }
    }
}

fn load_presentation(store: &impl SettingsStore) -> PresentationState {
    let defaults = PresentationState::default();
    PresentationState {
        theme: load_parsed(store, THEME_KEY, defaults.theme),
        auto_render: load_flag(store, AUTO_RENDER_KEY, defaults.auto_render),
        text_direction: load_parsed(store, TEXT_DIR_KEY, defaults.text_direction),
        inline_code_direction: load_parsed(
            store,
            INLINE_CODE_DIR_KEY,
            defaults.inline_code_direction,
        ),
        code_direction: load_parsed(store, CODE_DIR_KEY, defaults.code_direction),
        full_height: load_flag(store, FULL_HEIGHT_KEY, defaults.full_height),
        input_visible: load_flag(store, INPUT_VISIBLE_KEY, defaults.input_visible),
    }
}

fn load_parsed<T>(store: &impl SettingsStore, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = store.get(key) else {
        return default;
    };
    raw.parse().unwrap_or_else(|err| {
        warn!(target = "application::editor", key, "Ignoring stored value: {err}");
        default
    })
}

fn load_flag(store: &impl SettingsStore, key: &str, default: bool) -> bool {
    store
        .get(key)
        .map_or(default, |raw| parse_flag(&raw).unwrap_or(default))
}

fn load_documents(store: &impl SettingsStore) -> DocumentSet {
    let stored = store
        .get(DOCUMENTS_KEY)
        .and_then(|raw| match serde_json::from_str::<Vec<Document>>(&raw) {
            Ok(documents) => Some(documents),
            Err(err) => {
                warn!(
                    target = "application::editor",
                    key = DOCUMENTS_KEY,
                    "Ignoring stored documents: {err}"
                );
                None
            }
        })
        .unwrap_or_default();
    let active = store
        .get(ACTIVE_DOCUMENT_KEY)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());
    let legacy = store.get(CONTENT_KEY).filter(|content| !content.is_empty());

    DocumentSet::restore(stored, active, legacy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{application::render::render_service, infra::store::MemoryStore};

    struct FailingRenderer;

    impl RenderService for FailingRenderer {
        fn render(&self, _request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
            Err(RenderError::Markdown {
                message: "boom".to_string(),
            })
        }
    }

    fn editor_with(store: MemoryStore) -> Editor<MemoryStore> {
        Editor::load(store, render_service(), RenderSettings::default())
    }

    #[test]
    fn fresh_store_uses_first_launch_defaults() {
        let editor = editor_with(MemoryStore::new());
        assert_eq!(*editor.presentation(), PresentationState::default());
        assert_eq!(editor.documents().len(), 1);
        assert_eq!(editor.text(), "");
        assert!(editor.preview().document().is_some_and(RenderedDocument::is_empty));
    }

    #[test]
    fn stored_preferences_and_legacy_content_are_loaded() {
        let mut store = MemoryStore::new();
        store.set(THEME_KEY, "light".into()).unwrap();
        store.set(AUTO_RENDER_KEY, "false".into()).unwrap();
        store.set(TEXT_DIR_KEY, "rtl".into()).unwrap();
        store.set(CODE_DIR_KEY, "sideways".into()).unwrap();
        store.set(FULL_HEIGHT_KEY, "yes".into()).unwrap();
        store.set(CONTENT_KEY, "# Saved".into()).unwrap();

        let editor = editor_with(store);
        let presentation = editor.presentation();
        assert_eq!(presentation.theme, Theme::Light);
        assert!(!presentation.auto_render);
        assert_eq!(presentation.text_direction, Direction::Rtl);
        assert_eq!(presentation.code_direction, Direction::Ltr);
        assert!(!presentation.full_height);
        assert_eq!(editor.text(), "# Saved");
        assert!(editor.preview().html().contains("data-text-direction=\"rtl\""));
        assert!(editor.preview().html().contains("<h1>Saved</h1>"));
    }

    #[test]
    fn render_failure_shows_panel_and_keeps_text() {
        let mut editor = Editor::load(
            MemoryStore::new(),
            Arc::new(FailingRenderer),
            RenderSettings::default(),
        );
        editor.set_text("**still here**");
        assert!(editor.render_now().is_failed());
        assert_eq!(editor.preview().html(), RENDER_ERROR_PANEL);
        assert_eq!(editor.text(), "**still here**");
    }

    #[test]
    fn set_text_neither_renders_nor_persists() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_text("hello");
        assert!(editor.preview().document().is_some_and(RenderedDocument::is_empty));
        assert!(editor.store().get(CONTENT_KEY).is_none());
    }

    #[test]
    fn code_direction_is_reapplied_without_rendering() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_text("`x`\n\n```\nblock\n```");
        editor.render_now();
        editor.set_text("changed");

        editor.set_code_direction(Direction::Rtl).unwrap();
        editor.set_inline_code_direction(Direction::Rtl).unwrap();

        let html = editor.preview().html();
        assert!(html.contains("data-code-direction=\"rtl\""));
        assert!(html.contains("data-inline-code-direction=\"rtl\""));
        assert!(html.contains("block"));
        assert_eq!(editor.store().get(CODE_DIR_KEY).as_deref(), Some("rtl"));
    }

    #[test]
    fn toolbar_edit_renders_when_auto_render_is_on() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_text("make bold");
        let selection = editor.apply_toolbar(5..9, &SyntaxKind::Bold).unwrap();
        assert_eq!(editor.text(), "make **bold**");
        assert_eq!(selection, 13..13);
        assert!(editor.preview().html().contains("<strong>bold</strong>"));

        editor.set_auto_render(false).unwrap();
        editor.apply_toolbar(0..4, &SyntaxKind::Italic).unwrap();
        assert!(!editor.preview().html().contains("<em>"));
    }

    #[test]
    fn enabling_auto_render_renders_latest_text() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_auto_render(false).unwrap();
        editor.set_text("~~gone~~");
        editor.set_auto_render(true).unwrap();
        assert!(editor.preview().html().contains("<del>gone</del>"));
        assert_eq!(editor.store().get(AUTO_RENDER_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn documents_survive_a_save_and_reload() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_text("first");
        let second = editor.create_document();
        editor.set_text("second");
        editor.rename_document(second, "Notes").unwrap();
        editor.save_content().unwrap();

        let store = editor.store().clone();
        let reloaded = editor_with(store);
        assert_eq!(reloaded.documents().len(), 2);
        assert_eq!(reloaded.active_document().name, "Notes");
        assert_eq!(reloaded.text(), "second");
        assert!(reloaded.preview().html().contains("<p>second</p>"));
    }

    #[test]
    fn closing_active_document_renders_neighbour() {
        let mut editor = editor_with(MemoryStore::new());
        editor.set_text("left");
        let right = editor.create_document();
        editor.set_text("right");
        editor.close_document(right).unwrap();
        assert_eq!(editor.text(), "left");
        assert!(editor.preview().html().contains("<p>left</p>"));

        let missing = Uuid::new_v4();
        assert!(matches!(
            editor.switch_document(missing),
            Err(EditorError::Document(DocumentError::NotFound(id))) if id == missing
        ));
    }

    #[test]
    fn theme_toggle_is_persisted() {
        let mut editor = editor_with(MemoryStore::new());
        assert_eq!(editor.toggle_theme().unwrap(), Theme::Light);
        assert_eq!(editor.store().get(THEME_KEY).as_deref(), Some("light"));
    }
}
