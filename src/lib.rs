//! SuperCollider Language Server implementation.
//!
//! The server tracks open documents and resolves "evaluate block at cursor"
//! requests: the enclosing top-level `( ... )` region, located over a
//! comment/string-masked copy of the source, is sent to a managed sclang
//! subprocess and returned to the client for highlighting.

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::debug;

mod document;
pub mod eval;
mod interp;
pub(crate) mod settings;

pub use document::{DocumentState, DocumentStore, LineIndex};
pub use eval::{evaluation_selection, find_region, mask, Selection};
pub use interp::{Interpreter, InterpreterError, Status};
pub use settings::{discover_settings, load_settings, InterpreterSettings, Settings};

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    workspace_root: OnceLock<PathBuf>,
    interpreter_settings: OnceLock<InterpreterSettings>,
    interpreter: Mutex<Interpreter>,
}

/// Parameters for `supercollider/evaluateSelection`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateSelectionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

/// Response for `supercollider/evaluateSelection`: the code that was (or
/// would be) evaluated and the document range it came from, so the client
/// can flash the region.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateSelectionResponse {
    pub text: String,
    pub range: Range,
    /// Interpreter liveness at the time of the request.
    pub interpreter: String,
}

/// Response for `supercollider/interpreterStatus`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpreterStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            workspace_root: OnceLock::new(),
            interpreter_settings: OnceLock::new(),
            interpreter: Mutex::new(Interpreter::new()),
        }
    }

    /// Store the new full text of a document.
    fn on_document_change(&self, uri: Url, text: String, version: i32) {
        debug!("document changed: {} v{}", uri, version);
        self.documents.open(uri, text, version);
    }

    fn settings(&self) -> InterpreterSettings {
        self.interpreter_settings.get().cloned().unwrap_or_default()
    }

    /// Resolve the evaluation target at the cursor and, when an interpreter
    /// is live, send it for interpretation.
    pub async fn evaluate_selection(
        &self,
        params: EvaluateSelectionParams,
    ) -> Result<EvaluateSelectionResponse> {
        let uri = params.text_document.uri;
        let Some(doc) = self.documents.get(&uri) else {
            return Err(Error::invalid_params(format!("unknown document: {}", uri)));
        };

        let selection = doc.evaluation_selection(params.position);
        let range = doc.line_index.span_to_range(&selection.range);

        let mut interp = self.interpreter.lock().await;
        let status = interp.probe();
        if status == Status::Running {
            let file_path = uri.to_file_path().ok();
            interp
                .send(&selection.text, file_path.as_deref())
                .await
                .map_err(rpc_error)?;
            if self.settings().echo() {
                self.client
                    .log_message(MessageType::LOG, format!("> {}", selection.text))
                    .await;
            }
        }

        Ok(EvaluateSelectionResponse {
            text: selection.text,
            range,
            interpreter: status.as_str().to_string(),
        })
    }

    /// Start the sclang subprocess with the discovered settings.
    pub async fn start_interpreter(&self) -> Result<InterpreterStatusResponse> {
        let settings = self.settings();
        let mut interp = self.interpreter.lock().await;
        interp.start(&settings).map_err(rpc_error)?;
        self.client
            .log_message(MessageType::INFO, "sclang interpreter started")
            .await;
        Ok(status_response(&mut interp))
    }

    /// Stop the sclang subprocess.
    pub async fn stop_interpreter(&self) -> Result<InterpreterStatusResponse> {
        let mut interp = self.interpreter.lock().await;
        interp.stop().await.map_err(rpc_error)?;
        self.client
            .log_message(MessageType::INFO, "sclang interpreter stopped")
            .await;
        Ok(status_response(&mut interp))
    }

    /// Report interpreter liveness.
    pub async fn interpreter_status(&self) -> Result<InterpreterStatusResponse> {
        let mut interp = self.interpreter.lock().await;
        Ok(status_response(&mut interp))
    }
}

fn status_response(interp: &mut Interpreter) -> InterpreterStatusResponse {
    InterpreterStatusResponse {
        status: interp.probe().as_str().to_string(),
        exit_code: interp.exit_code(),
    }
}

fn rpc_error(err: InterpreterError) -> Error {
    let mut rpc = Error::internal_error();
    rpc.message = err.to_string().into();
    rpc
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Extract workspace root from params
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let _ = self.workspace_root.set(root.clone());

            // Discover settings by walking up the directory tree
            let (settings, settings_dir) = settings::discover_settings(&root);
            let interp = settings
                .interpreter
                .map(|i| i.resolved(&settings_dir))
                .unwrap_or_default();
            let _ = self.interpreter_settings.set(interp);
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "SuperCollider language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        let mut interp = self.interpreter.lock().await;
        // A dead or never-started interpreter is fine at shutdown.
        let _ = interp.stop().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.on_document_change(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_document_change(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(Backend::new)
        .custom_method("supercollider/evaluateSelection", Backend::evaluate_selection)
        .custom_method("supercollider/startInterpreter", Backend::start_interpreter)
        .custom_method("supercollider/stopInterpreter", Backend::stop_interpreter)
        .custom_method("supercollider/interpreterStatus", Backend::interpreter_status)
        .finish()
}
