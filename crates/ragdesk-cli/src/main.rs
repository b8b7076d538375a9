//! ragdesk - terminal client for a RAG question-answering backend.
//!
//! This is the entry point for the `ragdesk` binary. Without a subcommand it
//! starts the interactive TUI.

mod app;
mod commands;
mod markdown;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ragdesk_client::{ClientConfig, RagClient};
use ragdesk_core::DocumentId;
use ragdesk_session::{SessionController, SessionEvent};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use app::{App, Focus, InputMode, REFRESH_INTERVAL};

/// ragdesk - ask questions about your documents.
#[derive(Parser, Debug)]
#[command(name = "ragdesk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "RAGDESK_API_BASE_URL", global = true)]
    api_url: Option<String>,

    /// Number of chunks to retrieve for search and chat.
    #[arg(long, env = "RAGDESK_TOP_K", global = true)]
    top_k: Option<u32>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List uploaded documents.
    Docs,
    /// Upload a file.
    Upload {
        /// File to upload.
        path: PathBuf,
    },
    /// Chunk and embed an uploaded document.
    Index {
        /// Document id.
        document_id: DocumentId,
    },
    /// Show a document's chunks.
    Chunks {
        /// Document id.
        document_id: DocumentId,
    },
    /// Semantic search over indexed chunks.
    Search {
        /// Search query.
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Ask a question and print the answer with citations.
    Ask {
        /// The question.
        #[arg(required = true)]
        question: Vec<String>,

        /// Wait for the full answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },
    /// Check that the backend is up.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.command.is_some(), args.debug);

    let mut config = ClientConfig::from_env();
    if let Some(url) = &args.api_url {
        config = config.with_base_url(url.as_str());
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    let top_k = config.top_k;
    let client = RagClient::new(config)?;

    match args.command {
        Some(command) => run_command(command, client, top_k).await,
        None => run_tui(client, top_k).await,
    }
}

/// Install the subscriber before anything that may log.
fn init_logging(one_shot: bool, debug: bool) {
    if one_shot {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("ragdesk=info,warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if debug {
        // Logs would corrupt the alternate screen unless redirected.
        tracing_subscriber::fmt()
            .with_env_filter("ragdesk=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run_command(command: Command, client: RagClient, top_k: u32) -> anyhow::Result<()> {
    match command {
        Command::Docs => commands::docs(&client).await,
        Command::Upload { path } => commands::upload(&client, &path).await,
        Command::Index { document_id } => commands::index(&client, &document_id).await,
        Command::Chunks { document_id } => commands::chunks(&client, &document_id).await,
        Command::Search { query } => commands::search(&client, &query.join(" "), top_k).await,
        Command::Ask {
            question,
            no_stream,
        } => {
            let question = question.join(" ");
            if no_stream {
                commands::ask_blocking(&client, &question, top_k).await
            } else {
                commands::ask_streaming(client, &question, top_k).await
            }
        }
        Command::Health => commands::health(&client).await,
    }
}

async fn run_tui(client: RagClient, top_k: u32) -> anyhow::Result<()> {
    let (session, mut session_rx) = SessionController::channel(client.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(client, session, top_k);

    if let Err(e) = app.refresh_documents().await {
        app.set_error(format!("Failed to load documents: {e}"));
    }

    let result = run_event_loop(&mut terminal, &mut app, &mut session_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
///
/// Session events trigger an immediate redraw so tokens appear as they arrive.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    session_rx: &mut mpsc::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    let mut refresh_interval = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        app.tick_animation();
        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.needs_immediate_redraw() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt).await;
                    }
                }
            }

            Some(event) = session_rx.recv() => {
                if app.handle_session_event(event) {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            _ = refresh_interval.tick() => {
                if app.input_mode == InputMode::Normal && !app.is_streaming() {
                    if let Err(e) = app.refresh_documents().await {
                        app.refresh_error = Some(format!("Refresh failed: {e}"));
                        tracing::warn!(error = %e, "Failed to refresh documents");
                    } else {
                        app.refresh_error = None;
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.teardown();
    Ok(())
}

/// Handle a terminal event.
async fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                app.should_quit = true;
                return;
            }
            match app.input_mode {
                InputMode::Normal => handle_normal_mode(app, key).await,
                InputMode::Uploading => handle_upload_mode(app, key.code).await,
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_answer_up(3),
            MouseEventKind::ScrollDown => app.scroll_answer_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Keys shared by every panel, then the focused panel's keys.
async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if !app.cancel_answer() {
                app.clear_error();
            }
            return;
        }
        KeyCode::Tab => {
            app.focus = app.focus.next();
            return;
        }
        KeyCode::BackTab => {
            app.focus = app.focus.prev();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_answer_up(10);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_answer_down(10);
            return;
        }
        _ => {}
    }

    match app.focus {
        Focus::Documents => handle_documents_keys(app, key.code).await,
        Focus::Search | Focus::Chat => handle_text_keys(app, key).await,
    }
}

/// Single-key commands in the document panel.
async fn handle_documents_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_document(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_document(),
        KeyCode::Char('u') => app.open_upload_dialog(),
        KeyCode::Char('i') => {
            if let Err(e) = app.index_selected_document().await {
                app.set_error(format!("Index failed: {e}"));
            }
        }
        KeyCode::Char('r') => match app.refresh_documents().await {
            Ok(()) => {
                app.refresh_error = None;
                app.set_status(format!("{} documents", app.documents.len()));
            }
            Err(e) => app.set_error(format!("Refresh failed: {e}")),
        },
        _ => {}
    }
}

/// Line editing in the search and question inputs.
async fn handle_text_keys(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        if app.focus == Focus::Search {
            if let Err(e) = app.run_search().await {
                app.set_error(format!("Search failed: {e}"));
            }
        } else {
            app.ask().await;
        }
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let Some(input) = app.active_input() else {
        return;
    };

    match key.code {
        KeyCode::Char('a') if ctrl => input.home(),
        KeyCode::Char('e') if ctrl => input.end(),
        KeyCode::Char('u') if ctrl => input.clear(),
        KeyCode::Char(c) => input.insert(c),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        _ => {}
    }
}

/// Keys in the upload dialog.
async fn handle_upload_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.close_upload_dialog(),
        KeyCode::Enter => {
            if let Err(e) = app.upload_from_dialog().await {
                app.set_error(format!("Upload failed: {e}"));
            }
        }
        KeyCode::Char(c) => app.upload_input.insert(c),
        KeyCode::Backspace => app.upload_input.backspace(),
        KeyCode::Left => app.upload_input.left(),
        KeyCode::Right => app.upload_input.right(),
        _ => {}
    }
}
