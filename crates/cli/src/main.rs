mod config;
mod error;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use runtime::{
    Completion, Exchange, GeminiBackend, NoteStore, Role, Session, ToolExecutor, ToolOutcome,
    ToolRegistry, Turn, TurnContent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{CONFIG_FILE, Config};
use error::Result;

const SYSTEM_PROMPT: &str = "You are a helpful personal assistant with access to tools.

You can help with calculations, web searches, weather, the current date and time in any \
timezone, and creating or retrieving notes.

Use the calculator for math, web_search for current facts, get_weather for weather, \
get_current_time for dates and times, create_note to save information and get_note to \
retrieve it. Explain what you are doing and answer clearly.";

const PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "aide")]
#[command(about = "A tool-calling personal assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question
        text: String,
    },
    /// List the available tools and their parameter schemas
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Ask { text }) => cmd_ask(&config, &text).await,
        Some(Commands::Tools) => cmd_tools(&config),
    }
}

fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let notes = Arc::new(NoteStore::new());
    Ok(ToolRegistry::builtin(config.builtin_tools(), notes)?)
}

fn build_session(config: &Config) -> Result<Session<GeminiBackend>> {
    let backend = GeminiBackend::builder(config.api_key()?, &config.backend.model)
        .system(SYSTEM_PROMPT)
        .retry(config.retry())
        .build();
    let registry = Arc::new(build_registry(config)?);
    let executor = ToolExecutor::new(registry, config.executor());
    let session = Session::new(backend, executor).with_max_iterations(config.session.max_iterations);
    info!(session = %session.id(), backend = %session.backend(), "session started");
    Ok(session)
}

async fn cmd_ask(config: &Config, text: &str) -> Result<()> {
    let mut session = build_session(config)?;
    let exchange = run_request(&mut session, text).await?;
    print_answer(&exchange);
    Ok(())
}

fn cmd_tools(config: &Config) -> Result<()> {
    let registry = build_registry(config)?;
    for spec in registry.list_schemas() {
        println!("{}\n  {}", spec.name, spec.description);
        let schema = serde_json::to_string_pretty(&spec.json_schema())?;
        for line in schema.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;

    println!("aide v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", config.backend.model);
    println!("Tools: {}", session.executor().registry().names().join(", "));
    println!("Commands: 'history', 'reset', 'tools', 'quit' or 'exit'. Ctrl+C cancels a request.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        match input.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "history" => print_history(session.history().snapshot()),
            "reset" => {
                session.reset();
                println!("\nConversation cleared.\n");
            }
            "tools" => {
                for spec in session.executor().registry().list_schemas() {
                    println!("  {}: {}", spec.name, spec.description);
                }
                println!();
            }
            _ => match run_request(&mut session, input).await {
                Ok(exchange) => print_answer(&exchange),
                Err(runtime::Error::Cancelled) => println!("\nRequest cancelled.\n"),
                Err(e) => eprintln!("\nError: {e}\n"),
            },
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

/// Run a request, cancelling it if Ctrl+C arrives first.
async fn run_request(
    session: &mut Session<GeminiBackend>,
    text: &str,
) -> runtime::Result<Exchange> {
    let cancel = CancellationToken::new();
    let request = session.handle_request_with_cancel(text, &cancel);
    tokio::pin!(request);

    tokio::select! {
        outcome = &mut request => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            request.await
        }
    }
}

fn print_answer(exchange: &Exchange) {
    println!("\nAssistant: {}\n", exchange.answer);
    if exchange.completion == Completion::IterationLimit {
        println!("(stopped after {} tool rounds)\n", exchange.iterations);
    }
}

fn print_history(turns: &[Turn]) {
    println!("\nConversation History:");
    println!("{}", "=".repeat(50));
    for (i, turn) in turns.iter().enumerate() {
        let role = match turn.role {
            Role::User => "USER",
            Role::Model => "MODEL",
            Role::ToolCall => "TOOL CALL",
            Role::ToolResult => "TOOL RESULT",
        };
        println!("\n{}. [{role}]", i + 1);
        match &turn.content {
            TurnContent::Text { text } => println!("   Text: {}", preview(text)),
            TurnContent::ToolCall(call) => {
                println!("   Function Call: {}", call.name);
                println!("   Args: {}", call.arguments);
            }
            TurnContent::ToolResult(result) => {
                println!("   Function Response: {}", result.tool_name);
                let body = match &result.outcome {
                    ToolOutcome::Success { output } => match output.as_str() {
                        Some(s) => s.to_string(),
                        None => output.to_string(),
                    },
                    ToolOutcome::Failure { error } => format!("{error}"),
                };
                println!("   Result ({:?}): {}", result.kind(), preview(&body));
            }
        }
    }
    println!();
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
