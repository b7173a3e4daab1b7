use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use itertools::Itertools;
use tracing::{info, warn};

use crate::config::Config;
use crate::conversation::{Conversation, Reply};
use crate::corpus::{
    CorpusBuilder, Document, DocumentId, PdfExtractor, PlainTextExtractor, TextExtractor,
    extractor_for_path,
};
use crate::embeddings::{Embedder, embedder_from_config};
use crate::engine::{AnswerEngine, IndexRetriever};
use crate::generation::{ChatCompleter, completer_from_config};
use crate::index::{IndexStore, ScoredPassage, VectorIndex};

/// How the source document is stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    Pdf,
    /// Text with pages separated by form feeds
    Text,
}

type CliEngine =
    AnswerEngine<IndexRetriever<Arc<VectorIndex>, Arc<dyn Embedder>>, Arc<dyn ChatCompleter>>;

/// Build and persist the index for one report
#[inline]
pub fn build_index(
    config: &Config,
    path: &Path,
    id: Option<&str>,
    format: Option<SourceFormat>,
) -> Result<()> {
    let document = match id {
        Some(id) => Document::with_id(DocumentId::new(id)?, path),
        None => Document::from_path(path)?,
    };
    info!("Building index {} from {}", document.id, path.display());

    let extractor: Box<dyn TextExtractor> = match format {
        Some(SourceFormat::Pdf) => Box::new(PdfExtractor),
        Some(SourceFormat::Text) => Box::new(PlainTextExtractor),
        None => extractor_for_path(path),
    };
    let embedder =
        embedder_from_config(&config.embedding).context("Failed to create embedding client")?;

    let builder = CorpusBuilder::new(extractor, embedder, &config.corpus, &config.chunking)?
        .with_metric(config.retrieval.metric)
        .with_batch_size(config.embedding.batch_size as usize);
    let store = IndexStore::new(config.index_dir_path());
    let (outcome, saved_to) = builder.build_into(&document, &store)?;
    let report = &outcome.report;

    println!(
        "{} {} ({} passages)",
        style("Built index").green(),
        style(&document.id).cyan(),
        report.passages_stored
    );
    println!(
        "  Pages: {} total, {} outside margins, {} unreadable",
        report.pages_total, report.pages_filtered, report.pages_failed
    );
    println!(
        "  Chunks: {} character, {} token",
        report.character_chunks, report.token_chunks
    );
    if report.chunk_failures > 0 || report.embedding_failures > 0 {
        println!(
            "  {} {} chunks failed to tokenize, {} passages failed to embed",
            style("Skipped:").yellow(),
            report.chunk_failures,
            report.embedding_failures
        );
    }
    println!("  Saved to {}", saved_to.display());

    Ok(())
}

/// List the stored indexes
#[inline]
pub fn list_indexes(config: &Config) -> Result<()> {
    let store = IndexStore::new(config.index_dir_path());
    let headers = store.list().context("Failed to list indexes")?;

    if headers.is_empty() {
        println!("No indexes have been built yet.");
        println!("Use 'report-qa build <path>' to index a report.");
        return Ok(());
    }

    println!("Indexes ({} total):", headers.len());
    println!();
    for header in &headers {
        println!("📄 {}", style(&header.document_id).cyan());
        println!("   Model: {} ({} dimensions)", header.model, header.dimension);
        println!("   Metric: {}", header.metric);
        println!(
            "   Built: {}",
            header.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!("   Build ID: {}", header.build_id);
        println!();
    }

    Ok(())
}

/// Delete a stored index
#[inline]
pub fn delete_index(config: &Config, id: &str) -> Result<()> {
    let document_id = DocumentId::new(id)?;
    let store = IndexStore::new(config.index_dir_path());

    if store.delete(&document_id)? {
        println!("Deleted index {}", style(&document_id).cyan());
    } else {
        println!("No index named {}", style(&document_id).yellow());
    }
    Ok(())
}

/// Answer a single question
#[inline]
pub fn ask(
    config: &Config,
    question: &str,
    index: Option<&str>,
    k: Option<usize>,
    show_sources: bool,
) -> Result<()> {
    let engine = open_engine(config, index)?;
    let answer = engine.answer(question, k.unwrap_or(config.retrieval.top_k))?;

    println!("{}", answer.text);
    if show_sources {
        print_sources(&answer.sources)?;
    }
    Ok(())
}

/// A line typed at the chat prompt
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Quit,
    Clear,
    Sources,
    Question(&'a str),
}

fn parse_chat_input(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "" => ChatInput::Empty,
        "/quit" | "/exit" => ChatInput::Quit,
        "/clear" => ChatInput::Clear,
        "/sources" => ChatInput::Sources,
        question => ChatInput::Question(question),
    }
}

/// Interactive question loop; `/sources` shows the passages behind the last answer,
/// `/clear` forgets the history, `/quit` exits
#[inline]
pub fn chat(config: &Config, index: Option<&str>, k: Option<usize>) -> Result<()> {
    let engine = open_engine(config, index)?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let mut conversation = Conversation::new();

    eprintln!(
        "{}",
        style("Ask a question about the report. /sources shows the passages used, /clear resets, /quit exits.").dim()
    );

    loop {
        let Ok(line) = Input::<String>::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        else {
            break;
        };

        let question = match parse_chat_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Clear => {
                conversation.clear();
                eprintln!("{}", style("Conversation cleared.").dim());
                continue;
            }
            ChatInput::Sources => {
                match conversation.last_sources() {
                    Some(sources) => print_sources(sources)?,
                    None => eprintln!("{}", style("No answered question yet.").dim()),
                }
                continue;
            }
            ChatInput::Question(question) => question,
        };

        let outcome = engine.answer(question, k);
        match &conversation.push(question, &outcome).reply {
            Reply::Answered { text, sources } => {
                println!("{} {}", style("Assistant:").green(), text);
                eprintln!(
                    "{}",
                    style(format!("({} sources, /sources to view)", sources.len())).dim()
                );
            }
            Reply::Failed(message) => println!("{} {}", style("Assistant:").red(), message),
        }
    }

    info!("Chat ended after {} turns", conversation.len());
    Ok(())
}

fn open_engine(config: &Config, index: Option<&str>) -> Result<CliEngine> {
    let store = IndexStore::new(config.index_dir_path());
    let document_id = match index {
        Some(id) => DocumentId::new(id)?,
        None => only_index(&store)?,
    };

    let index = store
        .load(&document_id)
        .with_context(|| format!("Failed to load index {document_id}"))?;
    if index.is_empty() {
        warn!("Index {} has no passages", document_id);
    }

    let embedder =
        embedder_from_config(&config.embedding).context("Failed to create embedding client")?;
    if embedder.model_id() != index.model() {
        bail!(
            "Index {} was built with {}, but the configured embedding model is {}",
            document_id,
            index.model(),
            embedder.model_id()
        );
    }
    let completer = completer_from_config(&config.generation)
        .context("Failed to create completion client")?;

    Ok(AnswerEngine::new(
        IndexRetriever::new(Arc::new(index), embedder),
        completer,
        config.generation.domain.clone(),
    )
    .with_temperature(config.generation.temperature)
    .with_empty_context(config.retrieval.empty_context))
}

/// The id of the single stored index, when `--index` was not given
fn only_index(store: &IndexStore) -> Result<DocumentId> {
    let mut headers = store.list()?;
    match headers.len() {
        0 => bail!("No indexes found. Use 'report-qa build <path>' first."),
        1 => Ok(headers.remove(0).document_id),
        _ => {
            bail!(
                "Several indexes exist ({}); choose one with --index",
                headers.iter().map(|h| &h.document_id).join(", ")
            )
        }
    }
}

fn print_sources(sources: &[ScoredPassage]) -> io::Result<()> {
    write_sources(&mut io::stdout().lock(), sources)
}

fn write_sources(out: &mut impl Write, sources: &[ScoredPassage]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style("Sources:").bold())?;
    if sources.is_empty() {
        writeln!(out, "  (no passages were retrieved)")?;
    }
    for (rank, source) in sources.iter().enumerate() {
        writeln!(
            out,
            "  {}. [passage {}, distance {:.3}] {}",
            rank + 1,
            source.passage.ordinal,
            source.distance,
            source.passage.text.replace('\n', " ")
        )?;
    }
    Ok(())
}
