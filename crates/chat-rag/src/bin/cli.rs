//! Chat RAG command line client
//!
//! Runs the pipeline in-process against the configured backends.
//!
//! ```text
//! chat-rag ask "What's the sound signature of Jwick Semi-Silents?"
//! chat-rag chat
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chat_rag::{
    config::RagConfig, server::state::AppState, ChatHistory, ChatRequest, PipelineEvent,
    PipelineResult, RagPipeline,
};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chat-rag", version, about = "Ask questions about the indexed corpus")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, default_value = "chat-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question and print the streamed answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive conversation; follow-ups see earlier answers
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so answers stay clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = RagConfig::load(Some(cli.config.as_path()))?;
    config.validate().context("invalid configuration")?;
    let pipeline = AppState::new(config)?.pipeline();

    match cli.command {
        Command::Ask { question } => {
            let question = question.join(" ");
            let result = stream_answer(&pipeline, ChatRequest::new(question)).await?;
            print_sources(&result);
        }
        Command::Chat => chat_loop(&pipeline).await?,
    }

    Ok(())
}

async fn chat_loop(pipeline: &Arc<RagPipeline>) -> anyhow::Result<()> {
    println!(
        "{}",
        style("Ask about the corpus. /reset clears the conversation, /quit exits.").dim()
    );

    let mut history = ChatHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("you>").green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                history = ChatHistory::new();
                println!("{}", style("Conversation cleared").dim());
                continue;
            }
            _ => {}
        }

        let request = ChatRequest::new(question).with_history(history.clone());
        match stream_answer(pipeline, request).await {
            Ok(result) => {
                print_sources(&result);
                // Only finished answers are replayed on the next turn
                history.push_turn(question, result.text);
            }
            Err(e) => eprintln!("{} {}", style("error:").red().bold(), e),
        }
    }

    Ok(())
}

/// Run one request, printing tokens as they arrive
async fn stream_answer(
    pipeline: &Arc<RagPipeline>,
    request: ChatRequest,
) -> anyhow::Result<PipelineResult> {
    let spinner = spinner("Thinking...");
    let (tx, mut rx) = mpsc::channel(1);

    let run = tokio::spawn({
        let pipeline = Arc::clone(pipeline);
        async move { pipeline.run(request, tx).await }
    });

    let mut stdout = std::io::stdout();
    let mut started = false;
    let outcome = loop {
        match rx.recv().await {
            Some(PipelineEvent::Token(token)) => {
                if !started {
                    spinner.finish_and_clear();
                    print!("{} ", style("bot>").cyan().bold());
                    started = true;
                }
                print!("{}", token);
                stdout.flush()?;
            }
            Some(PipelineEvent::Completed(result)) => break Ok(result),
            Some(PipelineEvent::Failed(err)) => break Err(err),
            None => break Err(chat_rag::Error::internal("pipeline stopped without a result")),
        }
    };

    spinner.finish_and_clear();
    if started {
        println!();
    }
    run.await.context("pipeline task panicked")?;

    Ok(outcome?)
}

fn print_sources(result: &PipelineResult) {
    if result.sources.is_empty() {
        return;
    }

    println!("\n{}", style("Sources").bold().underlined());
    for (i, passage) in result.sources.iter().enumerate() {
        let source = passage.source().unwrap_or("(no source)");
        println!("  [{}] {}", i + 1, style(source).blue());
    }
    println!();
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("-\\|/ "),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
