//! LSP server for refactor-css
//!
//! Provides editor features for spotting repeated class combinations:
//! - Decorations: attributes whose class combination is used often enough
//!   are reported through the `refactorCss/decorations` notification
//! - Hover: how often the combination under the caret is used, and where

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use eyre::{Result, WrapErr};
use refactor_css_core::{ClassSignature, DocumentId, LineCol, LineIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::engine::{Engine, IndexReport, LineRange};
use crate::watcher::WatcherManager;

/// Language ids hover is offered for
pub const HOVER_LANGUAGES: &[&str] = &[
    "html",
    "jade",
    "pug",
    "razor",
    "php",
    "blade",
    "twig",
    "markdown",
    "erb",
    "handlebars",
    "ejs",
    "nunjucks",
    "haml",
    "leaf",
    "HTML (Eex)",
    "vue",
];

/// How many unreadable files are listed by name in the warning shown to the
/// user; the rest are only logged
const SHOWN_WARNINGS: usize = 3;

/// Ranges the client should decorate in one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationParams {
    pub uri: Url,
    /// Attributes that pass the highlight thresholds
    pub qualifying: Vec<Range>,
    /// Attributes sharing the most recently hovered combination
    pub hovered: Vec<Range>,
}

/// `refactorCss/decorations` server-to-client notification
pub enum PublishDecorations {}

impl Notification for PublishDecorations {
    type Params = DecorationParams;
    const METHOD: &'static str = "refactorCss/decorations";
}

/// Run the LSP server over stdio
pub async fn run() -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}

struct Buffer {
    /// The URI the editor uses for this document
    uri: Url,
    text: String,
    language_id: String,
}

/// Editor content cache: id -> buffer
type Buffers = Arc<RwLock<HashMap<DocumentId, Buffer>>>;

/// Which document the user is looking at, and what they last hovered there
#[derive(Default)]
struct ViewState {
    active: Option<DocumentId>,
    hovered: Option<ClassSignature>,
}

/// What background tasks need to push decorations to the client
#[derive(Clone)]
struct Publisher {
    client: Client,
    engine: Arc<Engine>,
    view: Arc<Mutex<ViewState>>,
    buffers: Buffers,
}

impl Publisher {
    /// Send decorations for `id`
    async fn publish(&self, id: &DocumentId) {
        let hovered = {
            let view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
            if view.active.as_ref() == Some(id) {
                view.hovered.clone()
            } else {
                None
            }
        };

        // Answer in the editor's terms, which may name the file through a link
        let uri = self
            .buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|buffer| buffer.uri.clone())
            .unwrap_or_else(|| id.uri().clone());

        let decorations = self.engine.decorations(id, hovered.as_ref()).await;
        let params = DecorationParams {
            uri,
            qualifying: decorations.qualifying.into_iter().map(to_lsp_range).collect(),
            hovered: decorations.hovered.into_iter().map(to_lsp_range).collect(),
        };
        self.client
            .send_notification::<PublishDecorations>(params)
            .await;
    }

    /// Send decorations for the active document, if there is one
    async fn publish_active(&self) {
        let active = self
            .view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone();
        if let Some(active) = active {
            self.publish(&active).await;
        }
    }

    /// Send decorations for `id` and, if it is another document, for the
    /// active one, whose workspace counts may have changed too
    async fn publish_with_active(&self, id: &DocumentId) {
        self.publish(id).await;
        let active = self
            .view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone();
        if let Some(active) = active.filter(|active| active != id) {
            self.publish(&active).await;
        }
    }

    /// Run workspace discovery and report what could not be read
    async fn index_workspace(&self) {
        match self.engine.index_workspace().await {
            Ok(report) => {
                self.report_warnings(&report).await;
                self.publish_active().await;
            }
            Err(e) => {
                warn!("{:?}", e);
                self.client
                    .show_message(MessageType::WARNING, format!("refactor-css: {e:#}"))
                    .await;
            }
        }
    }

    async fn report_warnings(&self, report: &IndexReport) {
        if report.warnings.is_empty() {
            return;
        }
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        let mut message = format!(
            "refactor-css: skipped {} file(s) while indexing the workspace",
            report.warnings.len()
        );
        for warning in report.warnings.iter().take(SHOWN_WARNINGS) {
            message.push('\n');
            message.push_str(warning);
        }
        self.client.show_message(MessageType::WARNING, message).await;
    }
}

pub struct Backend {
    client: Client,
    /// Set once `initialize` has told us the workspace root
    engine: OnceLock<Arc<Engine>>,
    view: Arc<Mutex<ViewState>>,
    debouncer: Arc<Debouncer>,
    buffers: Buffers,
    watcher: Mutex<Option<WatcherManager>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            engine: OnceLock::new(),
            view: Arc::new(Mutex::new(ViewState::default())),
            debouncer: Arc::new(Debouncer::new()),
            buffers: Arc::new(RwLock::new(HashMap::new())),
            watcher: Mutex::new(None),
        }
    }

    fn publisher(&self) -> Option<Publisher> {
        Some(Publisher {
            client: self.client.clone(),
            engine: self.engine.get()?.clone(),
            view: self.view.clone(),
            buffers: self.buffers.clone(),
        })
    }

    /// Index identity of the document the editor calls `uri`
    fn identity(&self, uri: &Url) -> DocumentId {
        match self.engine.get() {
            Some(engine) => engine.identity(uri),
            None => DocumentId::new(uri.clone()),
        }
    }

    /// Make `id` the active document. Moving to another document forgets
    /// the hovered combination.
    fn set_active(&self, id: &DocumentId) {
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        if view.active.as_ref() != Some(id) {
            view.active = Some(id.clone());
            view.hovered = None;
        }
    }

    /// The user typed in `id`: it becomes active and old hover spans are
    /// no longer meaningful
    fn edited(&self, id: &DocumentId) {
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        view.active = Some(id.clone());
        view.hovered = None;
    }

    /// Rebuild `id` from `text` once edits settle, then republish
    async fn schedule_rebuild(&self, id: DocumentId, text: String) {
        let Some(publisher) = self.publisher() else {
            return;
        };
        let generation = publisher.engine.begin_update(&id);
        let delay = publisher.engine.config().await.debounce();

        let key = id.clone();
        self.debouncer.schedule(key, delay, async move {
            if publisher.engine.commit_update(&id, generation, &text).await {
                debug!("Rebuilt {} (generation {})", id, generation);
                publisher.publish_with_active(&id).await;
            }
        });
    }

    /// Start watching the workspace for changes made outside the editor
    async fn start_watcher(&self, publisher: Publisher) -> Result<()> {
        let Some(root) = publisher.engine.root().map(PathBuf::from) else {
            return Ok(());
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let mut manager =
            WatcherManager::new(root.clone(), tx).wrap_err("Failed to start file watcher")?;
        manager
            .reconfigure(&publisher.engine.config().await)
            .wrap_err_with(|| format!("Failed to watch {}", root.display()))?;
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(manager);

        tokio::spawn(async move {
            while let Some(paths) = rx.recv().await {
                for path in &paths {
                    publisher.engine.file_changed(path).await;
                }
                debug!("Processed {} file change(s)", paths.len());
                publisher.publish_active().await;
            }
        });

        Ok(())
    }

    async fn apply_settings(&self, settings: &Value) {
        let Some(publisher) = self.publisher() else {
            return;
        };

        let config = match Config::from_settings(settings) {
            Ok(config) => config,
            Err(e) => {
                self.warn_user(format!("{e:#}; keeping previous settings")).await;
                return;
            }
        };

        match publisher.engine.set_config(config.clone()).await {
            Ok(true) => {
                info!("Include/exclude patterns changed, re-indexing workspace");
                if let Some(manager) = self
                    .watcher
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                    && let Err(e) = manager.reconfigure(&config)
                {
                    warn!("{:?}", e);
                }
                tokio::spawn(async move { publisher.index_workspace().await });
            }
            Ok(false) => publisher.publish_active().await,
            Err(e) => {
                self.warn_user(format!("{e:#}; keeping previous settings")).await;
            }
        }
    }

    async fn warn_user(&self, message: String) {
        warn!("{}", message);
        self.client
            .show_message(MessageType::WARNING, format!("refactor-css: {message}"))
            .await;
    }
}

/// Workspace root from the first workspace folder, or the legacy root URI
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    if let Some(folder) = params.workspace_folders.as_ref().and_then(|f| f.first()) {
        return folder.uri.to_file_path().ok();
    }
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();
    root_uri.and_then(|uri| uri.to_file_path().ok())
}

fn to_lsp_position(pos: LineCol) -> Position {
    Position::new(pos.line, pos.col)
}

fn to_lsp_range((start, end): LineRange) -> Range {
    Range::new(to_lsp_position(start), to_lsp_position(end))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
        let root = workspace_root(&params);
        let settings = params.initialization_options.unwrap_or(Value::Null);

        let config = Config::from_settings(&settings).unwrap_or_else(|e| {
            warn!("{:#}; using default settings", e);
            Config::default()
        });
        let engine = match Engine::new(root.clone(), config) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Engine::new(root, Config::default()).map_err(|e| {
                    tower_lsp::jsonrpc::Error::invalid_params(format!("{e:#}"))
                })?
            }
        };
        if self.engine.set(Arc::new(engine)).is_err() {
            warn!("Received a second initialize request, ignoring it");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                // Sync full document content
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "refactor-css".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let Some(publisher) = self.publisher() else {
            return;
        };
        match publisher.engine.root() {
            Some(root) => info!("Workspace root: {}", root.display()),
            None => info!("No workspace root, indexing open documents only"),
        }

        let discovery = publisher.clone();
        tokio::spawn(async move { discovery.index_workspace().await });

        if let Err(e) = self.start_watcher(publisher).await {
            self.warn_user(format!("{e:#}")).await;
        }
    }

    async fn shutdown(&self) -> LspResult<()> {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let id = self.identity(&params.text_document.uri);
        let text = params.text_document.text;
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                Buffer {
                    uri: params.text_document.uri,
                    text: text.clone(),
                    language_id: params.text_document.language_id,
                },
            );
        if let Some(engine) = self.engine.get() {
            engine.open(&id);
        }
        self.edited(&id);
        self.schedule_rebuild(id, text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let id = self.identity(&params.text_document.uri);
        // Full sync: the last change carries the whole document
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        if let Some(buffer) = self
            .buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            buffer.text = change.text.clone();
        }
        self.edited(&id);
        self.schedule_rebuild(id, change.text).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let id = self.identity(&params.text_document.uri);
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.debouncer.cancel(&id);
        {
            let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
            if view.active.as_ref() == Some(&id) {
                *view = ViewState::default();
            }
        }

        let Some(publisher) = self.publisher() else {
            return;
        };
        publisher.engine.close(&id);
        // The saved file may differ from the discarded buffer
        let indexed = publisher.engine.refresh_from_disk(&id).await;
        debug!("Closed {} (still indexed: {})", id, indexed);
        publisher.publish_active().await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.apply_settings(&params.settings).await;
    }

    async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let id = self.identity(&params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;

        let text = {
            let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
            buffers.get(&id).and_then(|buffer| {
                HOVER_LANGUAGES
                    .contains(&buffer.language_id.as_str())
                    .then(|| buffer.text.clone())
            })
        };
        let Some(text) = text else {
            return Ok(None);
        };
        let Some(publisher) = self.publisher() else {
            return Ok(None);
        };

        self.set_active(&id);
        let lines = LineIndex::new(text);
        let offset = lines.offset(LineCol::new(position.line, position.character));
        let Some(result) = publisher.engine.hover(lines.text(), offset).await else {
            return Ok(None);
        };

        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hovered = Some(result.signature.clone());
        publisher.publish(&id).await;

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: publisher.engine.render(&result, &id),
            }),
            range: Some(to_lsp_range(lines.range(result.value_span))),
        }))
    }
}
