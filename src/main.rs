use std::sync::{Arc, Mutex};

use adminchat::auth::{AuthUser, SessionAuth};
use adminchat::completion::{CompletionError, HttpCompletionClient};
use adminchat::config::ChatConfig;
use adminchat::console;
use adminchat::llm::{self, LlmChat};
use adminchat::state::{AppState, ChatSettings};
use adminchat::store::MessageStore;
use adminchat::store::memory::MemoryStore;
use adminchat::store::postgres::PgStore;
use adminchat::view::ChatView;
use adminchat::{db, routes};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("DATABASE_URL is required for the postgres store")]
    MissingDatabaseUrl,
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("completion client: {0}")]
    Completion(#[from] CompletionError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "adminchat", about = "Admin chat console and completion backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /api/chat` backed by the configured LLM.
    Serve(ServeArgs),
    /// Open the chat view in this terminal.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Signed-in user id; omit to start signed out.
    #[arg(long, env = "CHAT_USER")]
    user: Option<String>,

    #[arg(long, value_enum, default_value = "memory")]
    store: StoreKind,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Overrides `CHAT_API_BASE_URL`.
    #[arg(long)]
    api_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            tracing_subscriber::fmt::init();
            run_serve(args).await
        }
        Command::Chat(args) => {
            // stdout belongs to the console; logs go to stderr.
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            run_chat(args).await
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    // Non-fatal: the endpoint answers 503 until the LLM is configured.
    let llm: Option<Arc<dyn LlmChat>> = match llm::client_from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client) as Arc<dyn LlmChat>)
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; /api/chat will answer 503");
            None
        }
    };

    let app = routes::app(AppState::new(llm, ChatSettings::from_env()));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    tracing::info!(port = args.port, "adminchat listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_chat(args: ChatArgs) -> Result<(), CliError> {
    let mut config = ChatConfig::from_env();
    if let Some(base) = args.api_base_url {
        config.api_base_url = base.trim_end_matches('/').to_string();
    }

    let store: Arc<dyn MessageStore> = match args.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => {
            let url = args.database_url.ok_or(CliError::MissingDatabaseUrl)?;
            Arc::new(PgStore::new(db::init_pool(&url).await?))
        }
    };
    let completions = Arc::new(HttpCompletionClient::new(&config.api_base_url, config.timeouts)?);
    let auth = Arc::new(match args.user {
        Some(uid) => SessionAuth::signed_in(AuthUser::new(uid)),
        None => SessionAuth::signed_out(),
    });

    tracing::info!(api = completions.url(), store = ?args.store, "chat console starting");
    let view = Arc::new(ChatView::new(auth.clone(), store, completions, config));
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    console::run(view, auth, input, Arc::new(Mutex::new(std::io::stdout()))).await?;
    Ok(())
}
