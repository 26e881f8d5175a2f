//! Survey Express: WhatsApp survey progression service.
//!
//! `serve` runs the webhook server; `outreach` sends the first-contact
//! template to a contact list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use survey_api::ApiServer;
use survey_channels::{MessageTransport, OutreachRunner, WhatsAppProvider};
use survey_core::config::AppConfig;
use survey_engine::{EngineConfig, QuestionCatalog, SurveyEngine};
use survey_store::{MemoryStore, PgProgressStore, ProgressStore};

#[derive(Parser, Debug)]
#[command(name = "survey-express")]
#[command(about = "Webhook-driven WhatsApp survey engine")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./survey-express.toml when present)
    #[arg(long, env = "SURVEY_EXPRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Node identifier (overrides config)
    #[arg(long, env = "SURVEY_EXPRESS__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "SURVEY_EXPRESS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Postgres connection URL (overrides config)
    #[arg(long, env = "SURVEY_EXPRESS__DATABASE__URL")]
    database_url: Option<String>,

    /// Keep progress in memory instead of Postgres
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the webhook (default)
    Serve,

    /// Send the survey template to every contact in a file
    Outreach {
        /// Newline-separated list of recipient addresses
        #[arg(short, long)]
        contacts: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "survey_express=info,survey_engine=info,survey_api=info,survey_channels=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Survey Express starting up");

    let mut config = AppConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if cli.in_memory {
        config.database.in_memory = true;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        in_memory = config.database.in_memory,
        questions = config.survey.questions.len(),
        "Configuration loaded"
    );

    let transport: Arc<dyn MessageTransport> = Arc::new(WhatsAppProvider::new(&config.whatsapp)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, transport).await,
        Commands::Outreach { contacts } => outreach(&config, transport, &contacts).await,
    }
}

async fn serve(config: AppConfig, transport: Arc<dyn MessageTransport>) -> anyhow::Result<()> {
    let catalog = Arc::new(QuestionCatalog::from_config(&config.survey)?);
    let store = build_store(&config).await?;
    let engine = Arc::new(SurveyEngine::new(
        store.clone(),
        catalog,
        transport,
        EngineConfig::from_app(&config),
    ));

    let api_server = ApiServer::new(config, engine, store);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Survey Express is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ProgressStore>> {
    if config.database.in_memory {
        warn!("Using in-memory progress store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgProgressStore::connect(&config.database).await?;
    store.migrate().await?;
    info!("Postgres progress store ready");
    Ok(Arc::new(store))
}

async fn outreach(
    config: &AppConfig,
    transport: Arc<dyn MessageTransport>,
    path: &Path,
) -> anyhow::Result<()> {
    let catalog = QuestionCatalog::from_config(&config.survey)?;
    let contents = tokio::fs::read_to_string(path).await?;
    let contacts = OutreachRunner::parse_contacts(&contents);
    if contacts.is_empty() {
        warn!(path = %path.display(), "Contact list is empty");
        return Ok(());
    }

    let runner = OutreachRunner::new(
        transport,
        catalog.template().clone(),
        config.outreach.messages_per_second,
    );
    let report = runner.run(&contacts).await;

    if report.failed > 0 {
        warn!(sent = report.sent, failed = report.failed, "Outreach finished with failures");
    }
    Ok(())
}
