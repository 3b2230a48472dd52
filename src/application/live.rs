//! Debounced live preview around a shared [`Editor`].
//!
//! Keystrokes update the buffer immediately. Rendering and saving are each
//! deferred until typing pauses, and every render reads the buffer as it is
//! when the timer fires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    application::{
        debounce::Debouncer,
        editor::{Editor, EditorError, Preview},
        render::render_service,
    },
    config::{EditorSettings, Settings},
    domain::stats::TextStats,
    infra::store::{FileStore, SettingsStore},
};

type SharedEditor<S> = Arc<Mutex<Editor<S>>>;

pub struct LivePreview<S: SettingsStore + 'static> {
    editor: SharedEditor<S>,
    render: Debouncer,
    save: Debouncer,
    updates: watch::Sender<Preview>,
}

impl<S: SettingsStore + 'static> LivePreview<S> {
    pub fn new(editor: Editor<S>, settings: &EditorSettings) -> Self {
        let (updates, _) = watch::channel(editor.preview().clone());
        Self {
            editor: Arc::new(Mutex::new(editor)),
            render: Debouncer::new(settings.render_debounce),
            save: Debouncer::new(settings.save_debounce),
            updates,
        }
    }

    /// Receive every preview published after a render.
    pub fn subscribe(&self) -> watch::Receiver<Preview> {
        self.updates.subscribe()
    }

    /// Handle a buffer change: counts are returned at once, the render (when
    /// auto-render is on) and the save are debounced.
    pub fn input(&self, text: impl Into<String>) -> TextStats {
        let (stats, auto_render) = {
            let mut editor = lock(&self.editor);
            editor.set_text(text);
            (editor.stats(), editor.presentation().auto_render)
        };

        if auto_render {
            let editor = Arc::clone(&self.editor);
            let updates = self.updates.clone();
            self.render.schedule(async move {
                render_and_publish(&editor, &updates);
            });
        }

        let editor = Arc::clone(&self.editor);
        self.save.schedule(async move {
            if let Err(err) = lock(&editor).save_content() {
                warn!(target = "application::live", "Saving content failed: {err}");
            } else {
                debug!(target = "application::live", "Content saved");
            }
        });

        stats
    }

    /// Render immediately, dropping any pending debounced render.
    pub fn render_now(&self) {
        self.render.cancel();
        render_and_publish(&self.editor, &self.updates);
    }

    /// Run an editor operation and publish the preview it leaves behind.
    pub fn with_editor<R>(&self, operation: impl FnOnce(&mut Editor<S>) -> R) -> R {
        let (result, preview) = {
            let mut editor = lock(&self.editor);
            let result = operation(&mut editor);
            (result, editor.preview().clone())
        };
        self.updates.send_replace(preview);
        result
    }

    /// Save now, dropping any pending debounced save.
    pub fn flush(&self) -> Result<(), EditorError> {
        self.save.cancel();
        lock(&self.editor).save_content()
    }

    pub fn is_render_pending(&self) -> bool {
        self.render.is_pending()
    }
}

impl LivePreview<FileStore> {
    /// Open the session persisted in the configured settings file.
    pub fn open(settings: &Settings) -> Result<Self, EditorError> {
        let store = FileStore::open(&settings.storage.settings_file)?;
        let editor = Editor::load(store, render_service(), settings.render);
        Ok(Self::new(editor, &settings.editor))
    }
}

fn render_and_publish<S: SettingsStore>(editor: &SharedEditor<S>, updates: &watch::Sender<Preview>) {
    let preview = lock(editor).render_now().clone();
    updates.send_replace(preview);
}

fn lock<S: SettingsStore>(editor: &SharedEditor<S>) -> MutexGuard<'_, Editor<S>> {
    editor.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::{
        application::render::{
            RenderError, RenderRequest, RenderService, RenderedDocument, render_service,
        },
        config::{EditorSettings, RenderSettings},
        infra::store::{CONTENT_KEY, MemoryStore},
    };

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl RenderService for CountingRenderer {
        fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            render_service().render(request)
        }
    }

    fn live(renderer: Arc<CountingRenderer>) -> LivePreview<MemoryStore> {
        let editor = Editor::load(MemoryStore::new(), renderer, RenderSettings::default());
        LivePreview::new(editor, &EditorSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_renders_latest_text_once() {
        let renderer = Arc::new(CountingRenderer::default());
        let preview = live(Arc::clone(&renderer));
        let mut updates = preview.subscribe();
        let initial_renders = renderer.calls.load(Ordering::SeqCst);

        for text in ["h", "he", "hello world"] {
            let stats = preview.input(text);
            assert_eq!(stats.chars, text.chars().count());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(preview.is_render_pending());

        tokio::time::sleep(Duration::from_millis(300)).await;
        updates.changed().await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), initial_renders + 1);
        assert!(updates.borrow().html().contains("<p>hello world</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn content_is_saved_after_typing_pauses() {
        let preview = live(Arc::new(CountingRenderer::default()));
        preview.input("draft");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(preview.with_editor(|editor| editor.store().get(CONTENT_KEY)).is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(
            preview
                .with_editor(|editor| editor.store().get(CONTENT_KEY))
                .as_deref(),
            Some("draft")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auto_render_off_skips_debounced_render() {
        let renderer = Arc::new(CountingRenderer::default());
        let preview = live(Arc::clone(&renderer));
        preview
            .with_editor(|editor| editor.set_auto_render(false))
            .unwrap();
        let before = renderer.calls.load(Ordering::SeqCst);

        preview.input("quiet");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), before);

        preview.render_now();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), before + 1);
        assert!(preview.subscribe().borrow().html().contains("<p>quiet</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_saves_immediately() {
        let preview = live(Arc::new(CountingRenderer::default()));
        preview.input("now");
        preview.flush().unwrap();
        assert_eq!(
            preview
                .with_editor(|editor| editor.store().get(CONTENT_KEY))
                .as_deref(),
            Some("now")
        );
    }
}
