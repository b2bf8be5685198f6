//! `ask`: chat with hosted AI models from the terminal.

mod config;
mod configure;
mod repl;

use ask_llm::{Conversation, CredentialStore, Credentials, ProviderHandle, ProviderKind};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;
use crate::repl::Chat;

const EXAMPLES: &str = "\
Examples:
  ask                                    # Interactive mode with Groq
  ask -p openai \"Explain Python\"         # Single query with OpenAI
  ask -p anthropic -m claude-opus-4      # Use Claude Opus
  ask \"Write a function\"                 # Quick query with Groq (default)
  ask --configure                        # Configure API keys
  ask --system \"You are a poet\" -i       # Set system prompt

Providers: groq (default), gemini, openai, anthropic";

/// Exit status used when a one-shot request is interrupted.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "ask",
    version,
    about = "CLI AI Client - Chat with AI models in your terminal",
    after_help = EXAMPLES
)]
struct Cli {
    /// Your question or prompt.
    query: Vec<String>,

    /// AI provider to use.
    #[arg(
        short,
        long,
        default_value = "groq",
        value_parser = PossibleValuesParser::new(ProviderKind::NAMES)
    )]
    provider: String,

    /// Specific model to use.
    #[arg(short, long)]
    model: Option<String>,

    /// Start interactive chat mode.
    #[arg(short, long)]
    interactive: bool,

    /// System prompt.
    #[arg(short, long)]
    system: Option<String>,

    /// Configure API keys.
    #[arg(long)]
    configure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Configure,
    OneShot(String),
    Interactive,
}

/// How a run ended, before it becomes a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Failure,
    Interrupted,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => ExitCode::SUCCESS,
            Status::Failure => ExitCode::FAILURE,
            Status::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
        }
    }
}

impl Cli {
    /// The joined query, or `None` when there is nothing to send.
    fn query_text(&self) -> Option<String> {
        let query = self.query.join(" ");
        if query.trim().is_empty() { None } else { Some(query) }
    }

    fn mode(&self) -> Mode {
        if self.configure {
            return Mode::Configure;
        }
        match self.query_text() {
            Some(query) if !self.interactive => Mode::OneShot(query),
            _ => Mode::Interactive,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Error: load .env: {e}");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = init_tracing() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    install_panic_hook();

    let cli = Cli::parse();
    let result = run(cli).await;
    report(result, &mut std::io::stderr()).into()
}

/// Prints a failed run as `Error: <message>`.
fn report(result: anyhow::Result<Status>, err_out: &mut impl Write) -> Status {
    match result {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(error = ?e, "ask failed");
            let _ = writeln!(err_out, "Error: {e}");
            Status::Failure
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Status> {
    let store = CredentialStore::open_default();
    let mode = cli.mode();

    if mode == Mode::Configure {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        configure::run(&store, stdin, tokio::io::stdout()).await?;
        return Ok(Status::Success);
    }

    let credentials = store.load().await?;
    let base_url = config::base_url_override(&cli.provider);
    let mut conversation = open_conversation(&cli, &credentials, base_url.as_deref())?;
    tracing::info!(
        provider = %conversation.provider(),
        model = %conversation.model(),
        interactive = mode == Mode::Interactive,
        "conversation ready"
    );

    match mode {
        Mode::OneShot(query) => {
            one_shot(&mut conversation, &query, tokio::io::stdout(), interrupted()).await
        }
        _ => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let exit = repl::run(&mut conversation, stdin, tokio::io::stdout(), interrupted()).await?;
            tracing::debug!(?exit, "interactive session ended");
            if exit == repl::Exit::Interrupted {
                // The blocking stdin read cannot be cancelled and would stall runtime shutdown.
                std::process::exit(0);
            }
            Ok(Status::Success)
        }
    }
}

fn open_conversation(
    cli: &Cli,
    credentials: &Credentials,
    base_url: Option<&str>,
) -> ask_llm::Result<Conversation> {
    let handle = ProviderHandle::create_with_base_url(
        credentials,
        &cli.provider,
        cli.model.as_deref(),
        base_url,
    )?;
    Ok(Conversation::new(handle, cli.system.clone()))
}

/// Sends `query` once and prints the reply on its own line.
async fn one_shot<C, W, F>(chat: &mut C, query: &str, mut out: W, interrupt: F) -> anyhow::Result<Status>
where
    C: Chat + ?Sized,
    W: tokio::io::AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    use tokio::io::AsyncWriteExt;

    tokio::select! {
        reply = chat.send(query) => {
            out.write_all(format!("{}\n", reply?).as_bytes()).await?;
            out.flush().await?;
            Ok(Status::Success)
        }
        _ = interrupt => {
            tracing::info!("interrupted before the reply arrived");
            Ok(Status::Interrupted)
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(%e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("warn"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let log_format = LogFormat::from_env()?;
    match log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
    }

    tracing::debug!(
        ?log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
