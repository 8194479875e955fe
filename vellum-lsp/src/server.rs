//! The tower-lsp backend.

use crate::features::{definition, document_symbols};
use std::path::PathBuf;
use std::sync::Mutex;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use vellum_analysis::{Change, Settings, Workspace};

/// The Vellum language server.
pub struct VellumLanguageServer {
    client: Client,
    workspace: Mutex<Workspace>,
    snippets: bool,
}

impl VellumLanguageServer {
    pub fn new(client: Client) -> Self {
        Self::with_settings(client, Settings::default(), true)
    }

    pub fn with_settings(client: Client, settings: Settings, snippets: bool) -> Self {
        Self {
            client,
            workspace: Mutex::new(Workspace::new(settings)),
            snippets,
        }
    }

    fn path_of(uri: &Url) -> Option<PathBuf> {
        uri.to_file_path().ok()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for VellumLanguageServer {
    async fn initialize(&self, _params: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        ["\\", "{", "[", ","].map(str::to_string).to_vec(),
                    ),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(["{", "["].map(str::to_string).to_vec()),
                    ..Default::default()
                }),
                document_symbol_provider: Some(OneOf::Left(true)),
                definition_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "vellum-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let Some(path) = Self::path_of(&params.text_document.uri) else {
            return;
        };
        let doc = params.text_document;
        self.workspace
            .lock()
            .unwrap()
            .did_open(path, doc.text, &doc.language_id, doc.version.into());
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(path) = Self::path_of(&params.text_document.uri) else {
            return;
        };
        let changes = params
            .content_changes
            .into_iter()
            .map(|change| match change.range {
                Some(range) => Change::Incremental {
                    start: (range.start.line as usize, range.start.character as usize),
                    end: (range.end.line as usize, range.end.character as usize),
                    range_length: change.range_length.map(|len| len as usize),
                    text: change.text,
                },
                None => Change::Full { text: change.text },
            })
            .collect();
        let result = self.workspace.lock().unwrap().did_change(
            &path,
            changes,
            params.text_document.version.into(),
        );
        if let Err(err) = result {
            // The shell is expected to resynchronize after a rejected
            // change.
            tracing::warn!(%err, file = %path.display(), "rejected change");
            self.client
                .log_message(MessageType::WARNING, format!("rejected change: {}", err))
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if let Some(path) = Self::path_of(&params.text_document.uri) {
            self.workspace.lock().unwrap().did_close(&path);
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some(path) = Self::path_of(&position.text_document.uri) else {
            return Ok(None);
        };
        let reply = self.workspace.lock().unwrap().hover(
            &path,
            position.position.line as usize,
            position.position.character as usize,
        );
        Ok(reply.map(|hover| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: hover.contents,
            }),
            range: None,
        }))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params;
        let Some(path) = Self::path_of(&position.text_document.uri) else {
            return Ok(None);
        };
        let reply = self.workspace.lock().unwrap().signature_help(
            &path,
            position.position.line as usize,
            position.position.character as usize,
        );
        Ok(reply.map(|help| SignatureHelp {
            signatures: vec![SignatureInformation {
                label: help.label,
                documentation: help.documentation.map(Documentation::String),
                parameters: Some(
                    help.parameters
                        .into_iter()
                        .map(|param| ParameterInformation {
                            label: ParameterLabel::Simple(param.label),
                            documentation: param.doc.map(Documentation::String),
                        })
                        .collect(),
                ),
                active_parameter: None,
            }],
            active_signature: Some(0),
            active_parameter: help.active_parameter.map(|index| index as u32),
        }))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some(path) = Self::path_of(&position.text_document.uri) else {
            return Ok(None);
        };
        let reply = self.workspace.lock().unwrap().completion(
            &path,
            position.position.line as usize,
            position.position.character as usize,
        );
        let Some(items) = reply else {
            return Ok(None);
        };
        let items = items
            .into_iter()
            .map(|item| {
                let range = Range {
                    start: Position {
                        line: item.edit_start.0 as u32,
                        character: item.edit_start.1 as u32,
                    },
                    end: Position {
                        line: item.edit_end.0 as u32,
                        character: item.edit_end.1 as u32,
                    },
                };
                let snippet = item.snippet && self.snippets;
                let new_text = if snippet {
                    item.new_text
                } else {
                    item.label.clone()
                };
                CompletionItem {
                    label: item.label,
                    kind: Some(item.kind),
                    detail: item.detail,
                    documentation: item.documentation.map(Documentation::String),
                    filter_text: item.filter_text,
                    insert_text_format: Some(if snippet {
                        InsertTextFormat::SNIPPET
                    } else {
                        InsertTextFormat::PLAIN_TEXT
                    }),
                    text_edit: Some(CompletionTextEdit::Edit(TextEdit { range, new_text })),
                    ..Default::default()
                }
            })
            .collect();
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(path) = Self::path_of(&params.text_document.uri) else {
            return Ok(None);
        };
        let mut workspace = self.workspace.lock().unwrap();
        let Some(outline) = workspace.outline(&path) else {
            return Ok(None);
        };
        let symbols = document_symbols::from_outline(&mut workspace, &path, &outline);
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let Some(path) = Self::path_of(&position.text_document.uri) else {
            return Ok(None);
        };
        let mut workspace = self.workspace.lock().unwrap();
        Ok(definition::find_definition(
            &mut workspace,
            &path,
            position.position.line as usize,
            position.position.character as usize,
        ))
    }
}
