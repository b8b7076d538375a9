//! Application state for the terminal UI.
//!
//! The app mirrors backend data as plain snapshots (documents, last search)
//! and delegates everything about the streaming answer to the
//! [`SessionController`]. Rendering reads [`App::answer_view`]; nothing here
//! mutates session state directly.

use std::path::PathBuf;
use std::time::Duration;

use ragdesk_client::{ClientError, RagClient};
use ragdesk_core::{Document, SearchResponse, SessionId};
use ragdesk_session::{SessionController, SessionError, SessionEvent, SessionState, SessionView};

/// Refresh interval for the document list.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Which panel has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Document list.
    #[default]
    Documents,
    /// Search query and hits.
    Search,
    /// Question input and streamed answer.
    Chat,
}

impl Focus {
    /// Cycle forward.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Documents => Self::Search,
            Self::Search => Self::Chat,
            Self::Chat => Self::Documents,
        }
    }

    /// Cycle backward.
    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::Documents => Self::Chat,
            Self::Search => Self::Documents,
            Self::Chat => Self::Search,
        }
    }
}

/// Input mode for modal dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Panels receive keys.
    #[default]
    Normal,
    /// Upload dialog is open.
    Uploading,
}

/// Single-line text input with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    /// Current text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map_or(self.value.len(), |(i, _)| i)
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    /// Insert a character at the cursor.
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    /// Move cursor left.
    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    /// Move cursor to the start.
    pub fn home(&mut self) {
        self.cursor = 0;
    }

    /// Move cursor to the end.
    pub fn end(&mut self) {
        self.cursor = self.len();
    }

    /// Clear the input.
    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Take the current text, leaving the input empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }
}

/// Application state.
pub struct App {
    /// Client for non-streaming calls.
    client: RagClient,
    /// Owner of the streaming answer.
    session: SessionController<RagClient>,
    /// Retrieval depth for search and chat.
    pub top_k: u32,
    /// Last successfully loaded document list.
    pub documents: Vec<Document>,
    /// Selected document index.
    pub selected_document: Option<usize>,
    /// Last successful search.
    pub search_results: Option<SearchResponse>,
    /// Search query being typed.
    pub search_input: TextInput,
    /// Question being typed.
    pub question_input: TextInput,
    /// Path typed into the upload dialog.
    pub upload_input: TextInput,
    /// Which panel has focus.
    pub focus: Focus,
    /// Current input mode.
    pub input_mode: InputMode,
    /// Answer scroll offset from the bottom.
    pub answer_scroll: usize,
    /// Status message to display.
    pub status_message: Option<String>,
    /// The single error surface.
    pub error_message: Option<String>,
    /// Last background refresh failure.
    pub refresh_error: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for the streaming spinner.
    pub animation_frame: usize,
    /// Session and state last reported in the status bar.
    reported: (Option<SessionId>, SessionState),
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(client: RagClient, session: SessionController<RagClient>, top_k: u32) -> Self {
        Self {
            client,
            session,
            top_k,
            documents: Vec::new(),
            selected_document: None,
            search_results: None,
            search_input: TextInput::default(),
            question_input: TextInput::default(),
            upload_input: TextInput::default(),
            focus: Focus::Chat,
            input_mode: InputMode::Normal,
            answer_scroll: 0,
            status_message: None,
            error_message: None,
            refresh_error: None,
            should_quit: false,
            animation_frame: 0,
            reported: (None, SessionState::Idle),
        }
    }

    /// Tick the animation frame.
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Current spinner character.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Backend URL for display.
    #[must_use]
    pub fn api_url(&self) -> &str {
        self.client.base_url()
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Input that receives typed characters, if any.
    pub fn active_input(&mut self) -> Option<&mut TextInput> {
        match (self.input_mode, self.focus) {
            (InputMode::Uploading, _) => Some(&mut self.upload_input),
            (InputMode::Normal, Focus::Search) => Some(&mut self.search_input),
            (InputMode::Normal, Focus::Chat) => Some(&mut self.question_input),
            (InputMode::Normal, Focus::Documents) => None,
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// The selected document.
    #[must_use]
    pub fn selected_document(&self) -> Option<&Document> {
        self.selected_document.and_then(|i| self.documents.get(i))
    }

    /// Move selection up.
    pub fn select_prev_document(&mut self) {
        if self.documents.is_empty() {
            return;
        }
        self.selected_document = Some(match self.selected_document {
            Some(0) | None => self.documents.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Move selection down.
    pub fn select_next_document(&mut self) {
        if self.documents.is_empty() {
            return;
        }
        self.selected_document = Some(match self.selected_document {
            Some(i) if i + 1 < self.documents.len() => i + 1,
            _ => 0,
        });
    }

    /// Reload the document list, keeping the selection on the same document.
    pub async fn refresh_documents(&mut self) -> Result<(), ClientError> {
        let selected_id = self.selected_document().map(|d| d.id.clone());
        self.documents = self.client.list_documents().await?;

        self.selected_document = selected_id
            .and_then(|id| self.documents.iter().position(|d| d.id == id))
            .or(if self.documents.is_empty() { None } else { Some(0) });
        Ok(())
    }

    /// Open the upload dialog.
    pub fn open_upload_dialog(&mut self) {
        self.upload_input.clear();
        self.input_mode = InputMode::Uploading;
    }

    /// Close the upload dialog.
    pub fn close_upload_dialog(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Upload the file named in the dialog.
    pub async fn upload_from_dialog(&mut self) -> Result<(), ClientError> {
        let raw = self.upload_input.take();
        let path = PathBuf::from(raw.trim());
        self.close_upload_dialog();
        if path.as_os_str().is_empty() {
            return Ok(());
        }

        let document = self.client.upload_document(&path).await?;
        self.set_status(format!(
            "Uploaded {} (press i to index it)",
            document.filename
        ));
        let id = document.id.clone();
        self.refresh_documents().await?;
        if let Some(i) = self.documents.iter().position(|d| d.id == id) {
            self.selected_document = Some(i);
        }
        Ok(())
    }

    /// Index the selected document.
    pub async fn index_selected_document(&mut self) -> Result<(), ClientError> {
        let Some(document) = self.selected_document() else {
            self.set_error("No document selected");
            return Ok(());
        };
        let (id, filename) = (document.id.clone(), document.filename.clone());

        self.set_status(format!("Indexing {filename}..."));
        let indexed = self.client.index_document(&id).await?;
        self.set_status(format!("Indexed {indexed} chunks from {filename}"));
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Run the typed search query.
    pub async fn run_search(&mut self) -> Result<(), ClientError> {
        let query = self.search_input.value().trim().to_string();
        if query.is_empty() {
            return Ok(());
        }

        let top_k = self.top_k.min(ragdesk_client::MAX_SEARCH_TOP_K);
        let response = self.client.search_chunks(&query, top_k).await?;
        if response.hits.is_empty() {
            self.set_status(format!("No matches for \"{query}\""));
        } else {
            self.set_status(format!(
                "{} hits ({})",
                response.hits.len(),
                response.embedding_model
            ));
        }
        self.search_results = Some(response);
        Ok(())
    }

    // =========================================================================
    // Streaming answer
    // =========================================================================

    /// Ask the typed question, superseding any answer in flight.
    pub async fn ask(&mut self) {
        let question = self.question_input.value().to_string();
        let top_k = self.top_k.min(ragdesk_client::MAX_CHAT_TOP_K);

        match self.session.ask(&question, top_k).await {
            Ok(_) => {
                self.question_input.clear();
                self.answer_scroll = 0;
                self.clear_error();
                self.sync_session_status();
            }
            Err(SessionError::EmptyQuestion) => self.set_error("Type a question first"),
            Err(e) => self.set_error(e.to_string()),
        }
    }

    /// Feed a session event to the controller.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        let changed = self.session.apply_event(event);
        if changed {
            self.answer_scroll = 0;
            self.sync_session_status();
        }
        changed
    }

    /// Cancel the answer in flight.
    pub fn cancel_answer(&mut self) -> bool {
        let cancelled = self.session.cancel();
        if cancelled {
            self.sync_session_status();
        }
        cancelled
    }

    /// Release everything before exit.
    pub fn teardown(&mut self) {
        self.session.teardown();
    }

    /// Snapshot of the active answer.
    #[must_use]
    pub fn answer_view(&self) -> SessionView {
        self.session.snapshot()
    }

    /// Whether an answer is streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.session.is_busy()
    }

    /// Check if the UI needs high-frequency redraws.
    #[must_use]
    pub fn needs_immediate_redraw(&self) -> bool {
        self.is_streaming()
    }

    /// Report session state changes once each.
    fn sync_session_status(&mut self) {
        let view = self.session.snapshot();
        let current = (view.session_id, view.state);
        if current == self.reported {
            return;
        }
        self.reported = current;

        match view.state {
            SessionState::Idle => {}
            SessionState::Open => self.set_status("Asking... (Esc to cancel)"),
            SessionState::Streaming => self.set_status("Answering... (Esc to cancel)"),
            SessionState::Completed => match &view.meta {
                Some(meta) => self.set_status(format!(
                    "Answered by {} in {} ms",
                    meta.model_label(),
                    meta.latency_ms
                )),
                None => self.set_status("Answer complete"),
            },
            SessionState::Cancelled => self.set_status("Cancelled"),
            SessionState::Failed => {
                let error = view.error.unwrap_or_else(|| "answer failed".to_string());
                self.set_error(error);
            }
        }
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    /// Scroll the answer up.
    pub fn scroll_answer_up(&mut self, amount: usize) {
        self.answer_scroll = self.answer_scroll.saturating_add(amount);
    }

    /// Scroll the answer down.
    pub fn scroll_answer_down(&mut self, amount: usize) {
        self.answer_scroll = self.answer_scroll.saturating_sub(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdesk_client::ClientConfig;

    #[test]
    fn text_input_handles_multibyte_characters() {
        let mut input = TextInput::default();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.left();
        input.left();
        input.backspace();
        assert_eq!(input.value(), "hélo");
        assert_eq!(input.cursor(), 2);

        input.home();
        input.delete();
        assert_eq!(input.value(), "élo");
        input.end();
        input.insert('!');
        assert_eq!(input.take(), "élo!");
        assert_eq!(input.cursor(), 0);
    }

    #[tokio::test]
    async fn each_failed_ask_is_reported() {
        let client = RagClient::new(ClientConfig::default().with_base_url("http://127.0.0.1:1"))
            .expect("client builds");
        let (session, _events) = SessionController::channel(client.clone());
        let mut app = App::new(client, session, 5);

        for question in ["first", "second"] {
            for c in question.chars() {
                app.question_input.insert(c);
            }
            app.ask().await;

            assert_eq!(app.answer_view().state, SessionState::Failed);
            let error = app.error_message.clone().expect("failure is surfaced");
            assert!(error.contains(&format!("question={question}")), "{error}");
        }
    }

    #[test]
    fn focus_cycles_through_panels() {
        let focus = Focus::Documents;
        assert_eq!(focus.next(), Focus::Search);
        assert_eq!(focus.next().next().next(), Focus::Documents);
        assert_eq!(focus.prev(), Focus::Chat);
    }
}
