//! Command-line entry points: web server, index build and terminal Q&A.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::indexer::build_index;
use crate::llm::completion::{answer_in_conversation, answer_question, AnswerWithContext};
use crate::llm::history::Conversation;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(version, about = "Question answering over a methodology document corpus", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the question form over HTTP (default)
    Serve,

    /// Rebuild the vector store and BM25 index from the corpus
    Index,

    /// Ask a question from the terminal; without one, start an interactive session
    Ask {
        /// Question to answer
        question: Option<String>,

        /// Restrict retrieval to chunks tagged with this topic (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Index => {
            let manifest = build_index(&config).await?;
            println!(
                "Indexed {} documents into {} chunks ({})",
                manifest.document_count, manifest.chunk_count, manifest.embedding_model
            );
            for (topic, count) in &manifest.topics {
                println!("  {topic}: {count}");
            }
            Ok(())
        }
        Commands::Ask { question, topics } => {
            let state = AppState::new(config)?;
            let topics = (!topics.is_empty()).then_some(topics);
            match question {
                Some(q) => ask_once(&state, &q, topics.as_deref()).await,
                None => interactive(&state, topics.as_deref()).await,
            }
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = crate::api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn ask_once(state: &AppState, question: &str, topics: Option<&[String]>) -> Result<()> {
    let reply = answer_question(state, question, topics).await?;
    println!("{}", format_reply(&reply));
    Ok(())
}

/// Terminal session; follow-up questions see the last few exchanges.
async fn interactive(state: &AppState, topics: Option<&[String]>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation = Conversation::new();

    println!("Ask a question (type 'exit' to quit, 'reset' to forget the conversation).");
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.eq_ignore_ascii_case("reset") {
            conversation = Conversation::new();
            println!("Conversation cleared.");
            continue;
        }

        // A failed question should not end the session
        match answer_in_conversation(state, question, topics, &conversation).await {
            Ok(reply) => {
                println!("{}", format_reply(&reply));
                conversation.push(question, &reply.answer.text);
            }
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }
    Ok(())
}

/// Answer text followed by each cited source and the topic it was indexed under.
fn format_reply(reply: &AnswerWithContext) -> String {
    let mut out = format!("\n{}\n", reply.answer.text);
    if !reply.answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for source in &reply.answer.sources {
            let topic = reply
                .context
                .iter()
                .find(|h| &h.source == source)
                .and_then(|h| h.topic.as_deref());
            match topic {
                Some(t) => out.push_str(&format!("  - {source} [{t}]\n")),
                None => out.push_str(&format!("  - {source}\n")),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, SearchHit};

    fn hit(source: &str, topic: Option<&str>) -> SearchHit {
        SearchHit {
            source: source.into(),
            chunk_index: 0,
            content: String::new(),
            topic: topic.map(str::to_string),
            bm25_score: 0.0,
            vector_score: 0.0,
            combined_score: 0.0,
        }
    }

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["docqa"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_ask_with_topics() {
        let cli = Cli::try_parse_from([
            "docqa",
            "ask",
            "What happens in Validate?",
            "--topic",
            "powered_tom_assets",
            "-t",
            "powered_phase_delivery",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask { question, topics }) => {
                assert_eq!(question.as_deref(), Some("What happens in Validate?"));
                assert_eq!(topics, vec!["powered_tom_assets", "powered_phase_delivery"]);
            }
            _ => panic!("expected ask subcommand"),
        }
    }

    #[test]
    fn test_cli_ask_without_question() {
        let cli = Cli::try_parse_from(["docqa", "ask"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Ask { question: None, .. })
        ));
    }

    #[test]
    fn test_format_reply_shows_topics() {
        let reply = AnswerWithContext {
            answer: Answer {
                text: "Stage 9 is the Compliance Checklist.".into(),
                sources: vec!["09-salesprocess-compliance-checklist.md".into(), "notes.md".into()],
            },
            context: vec![
                hit("09-salesprocess-compliance-checklist.md", Some("kpmg_sales_process")),
                hit("notes.md", None),
            ],
        };
        let out = format_reply(&reply);
        assert!(out.contains("Stage 9 is the Compliance Checklist."));
        assert!(out.contains("  - 09-salesprocess-compliance-checklist.md [kpmg_sales_process]\n"));
        assert!(out.contains("  - notes.md\n"));
    }
}
