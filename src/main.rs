use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mdex_pack::application::{ExportChapterUseCase, ExportRequest};
use mdex_pack::infrastructure::{
    ApiGateway, AppConfig, BuiltinRenderer, CliArgs, Command, ConfigStore, ImageFetcher,
    MangaDexClient, QueryParams, ReqwestTransport, ResponseCache,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }

    Ok(())
}

fn load_config(store: &ConfigStore, args: &CliArgs) -> Result<AppConfig> {
    let mut config = store.load()?;
    config.merge_with_args(args);
    Ok(config)
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn run(
    command: &Command,
    config: &AppConfig,
    gateway: Arc<ApiGateway>,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = MangaDexClient::new(Arc::clone(&gateway), config.language.clone())
        .with_data_saver(config.data_saver)
        .with_md_uploads(config.md_uploads);
    let language = config.language.as_str();

    match command {
        Command::Chapter { id, format, output } => {
            let use_case = ExportChapterUseCase::new(
                client,
                ImageFetcher::new(gateway, config.fetch.concurrency),
                Arc::new(BuiltinRenderer::new()?),
            );

            let mut request = ExportRequest::new(*id, format.unwrap_or(config.format));
            if let Some(output) = output {
                request = request.with_output(output);
            }

            let response = use_case.export_to_path(&request, cancel).await?;
            if let Some(path) = response.path {
                println!("{}", path.display());
            }
        }
        Command::Feed { manga_id } => {
            let manga = client
                .fetch_manga(*manga_id, &QueryParams::new(), cancel)
                .await?;
            let chapters = client
                .manga_feed(&manga, &QueryParams::new(), cancel)
                .await?;

            println!("{}", manga.title(language));
            for chapter in chapters {
                println!("{}  {}", chapter.id, chapter.full_title(language));
            }
        }
        Command::Search { title, limit } => {
            let params = QueryParams::new()
                .with("title", title.as_str())
                .with("limit", limit.to_string());

            for manga in client.search_manga(&params, cancel).await? {
                println!("{}  {}", manga.id, manga.title(language));
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let store = ConfigStore::locate(args.config.as_deref())?;
    let config = load_config(&store, &args)?;

    init_logging(&config)?;

    info!(
        version = mdex_pack::VERSION,
        config = %store.path().display(),
        "Starting {}",
        mdex_pack::NAME
    );

    let cache = Arc::new(ResponseCache::new(config.cache.to_cache_config())?);
    let sweeper = cache.spawn_sweeper();

    let transport = Arc::new(ReqwestTransport::with_timeout(config.fetch.timeout())?);
    let gateway = Arc::new(ApiGateway::new(
        transport,
        Arc::clone(&cache),
        Arc::new(config.rate_limit.limiter()),
        config.gateway_options(),
    )?);

    let cancel = cancel_on_interrupt();
    let result = run(&args.command, &config, gateway, &cancel).await;

    cache.shutdown();
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    info!(stats = %cache.stats(), "Cache drained");

    result
}
