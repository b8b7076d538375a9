//! One-shot subcommands that print plain text and exit.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use ragdesk_client::RagClient;
use ragdesk_core::{ChatMeta, DocumentId};
use ragdesk_session::{SessionController, SessionState};

use crate::markdown::citation_label;

/// Print every uploaded document.
pub async fn docs(client: &RagClient) -> anyhow::Result<()> {
    let documents = client.list_documents().await?;
    if documents.is_empty() {
        println!("No documents uploaded yet.");
        return Ok(());
    }

    for document in documents {
        println!(
            "{}  {}  {}  {}",
            document.id,
            document.created_at.format("%Y-%m-%d %H:%M:%S"),
            document.content_type,
            document.filename
        );
    }
    Ok(())
}

/// Upload a file and print the new document id.
pub async fn upload(client: &RagClient, path: &Path) -> anyhow::Result<()> {
    let document = client
        .upload_document(path)
        .await
        .with_context(|| format!("uploading {}", path.display()))?;
    println!("Uploaded {} as {}", document.filename, document.id);
    println!("Run `ragdesk index {}` to make it searchable.", document.id);
    Ok(())
}

/// Index a document and print the chunk count.
pub async fn index(client: &RagClient, document_id: &DocumentId) -> anyhow::Result<()> {
    let indexed = client.index_document(document_id).await?;
    println!("Indexed {indexed} chunks");
    Ok(())
}

/// Print a document's chunks in order.
pub async fn chunks(client: &RagClient, document_id: &DocumentId) -> anyhow::Result<()> {
    for chunk in client.list_chunks(document_id).await? {
        let span = match (chunk.start_char, chunk.end_char) {
            (Some(start), Some(end)) => format!(" [{start}..{end}]"),
            _ => String::new(),
        };
        println!("#{}{span}", chunk.chunk_index);
        println!("{}\n", chunk.text);
    }
    Ok(())
}

/// Run a search and print ranked hits.
pub async fn search(client: &RagClient, query: &str, top_k: u32) -> anyhow::Result<()> {
    let response = client.search_chunks(query, top_k).await?;
    if response.hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (rank, hit) in response.hits.iter().enumerate() {
        println!(
            "{}. {:.3}  {} (chunk {})",
            rank + 1,
            hit.score,
            hit.filename,
            hit.chunk_index
        );
        println!("   {}", hit.text.replace('\n', " "));
    }
    Ok(())
}

/// Ask without streaming and print the full answer.
pub async fn ask_blocking(client: &RagClient, question: &str, top_k: u32) -> anyhow::Result<()> {
    let (answer, meta) = client.chat(question, top_k).await?.into_parts();
    println!("{answer}");
    print_meta(&meta);
    Ok(())
}

/// Ask and print the answer as it streams in.
///
/// Ctrl-C tears the session down before returning.
pub async fn ask_streaming(client: RagClient, question: &str, top_k: u32) -> anyhow::Result<()> {
    let (mut controller, mut events) = SessionController::channel(client);
    controller.ask(question, top_k).await?;

    let mut stdout = io::stdout();
    let mut printed = 0;

    while controller.is_busy() {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if controller.apply_event(event) {
                    printed = print_delta(&controller, printed, &mut stdout)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.teardown();
                println!();
                bail!("cancelled");
            }
        }
    }

    print_delta(&controller, printed, &mut stdout)?;
    println!();

    let view = controller.snapshot();
    match view.state {
        SessionState::Completed => {
            if let Some(meta) = &view.meta {
                print_meta(meta);
            }
            Ok(())
        }
        SessionState::Failed => bail!(view.error.unwrap_or_else(|| "answer failed".to_string())),
        state => bail!("answer ended in state {state}"),
    }
}

/// Write the part of the answer not yet printed, returning the new length.
fn print_delta(
    controller: &SessionController<RagClient>,
    printed: usize,
    out: &mut impl Write,
) -> io::Result<usize> {
    let Some(session) = controller.active() else {
        return Ok(printed);
    };
    let answer = session.answer();
    if let Some(delta) = answer.get(printed..) {
        out.write_all(delta.as_bytes())?;
        out.flush()?;
    }
    Ok(answer.len())
}

fn print_meta(meta: &ChatMeta) {
    println!();
    println!("{} · {} ms", meta.model_label(), meta.latency_ms);
    for (i, citation) in meta.citations.iter().enumerate() {
        println!("{}", citation_label(i + 1, citation));
    }
}

/// Print the backend health.
pub async fn health(client: &RagClient) -> anyhow::Result<()> {
    let status = client.health().await?;
    println!("{} {}", client.base_url(), status.status);
    if !status.is_ok() {
        bail!("backend reported status {}", status.status);
    }
    Ok(())
}
