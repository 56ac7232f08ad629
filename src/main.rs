use std::{future::IntoFuture, process, sync::Arc};

use photostream::{
    application::{
        error::AppError,
        notifier::{BroadcastPublisher, EventPublisher, MutationNotifier},
        photos::PhotoService,
        repos::{CommentsRepo, PhotosRepo, PhotosWriteRepo, StoreHealth},
        search::SearchService,
        session::SessionCache,
        stream::StreamService,
    },
    config,
    infra::{
        db::PostgresRepositories, error::InfraError, http, http::ApiState,
        memory::InMemoryRepositories, telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

/// Every store the services need, behind their traits.
struct Repositories {
    photos: Arc<dyn PhotosRepo>,
    writer: Arc<dyn PhotosWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    health: Arc<dyn StoreHealth>,
}

impl Repositories {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PhotosRepo + PhotosWriteRepo + CommentsRepo + StoreHealth + 'static,
    {
        Self {
            photos: store.clone(),
            writer: store.clone(),
            comments: store.clone(),
            health: store,
        }
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!("no database configured; photos are kept in memory and lost on restart");
        return Ok(Repositories::from_store(Arc::new(InMemoryRepositories::new())));
    };

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!("database ready");

    Ok(Repositories::from_store(Arc::new(PostgresRepositories::new(
        pool,
    ))))
}

fn build_api_state(repos: Repositories, settings: &config::Settings) -> ApiState {
    let sessions = Arc::new(SessionCache::new(settings.session.ttl));
    let page_size = settings.feed.page_size;

    let stream = StreamService::new(repos.photos.clone(), sessions.clone(), page_size);
    let search = SearchService::new(repos.photos.clone(), sessions, page_size);

    let events = Arc::new(BroadcastPublisher::new(
        settings.events.channel_capacity.get() as usize,
    ));
    let publisher: Arc<dyn EventPublisher> = events.clone();
    let notifier = MutationNotifier::new(publisher);

    let photos = PhotoService::new(
        repos.photos,
        repos.writer,
        repos.comments,
        stream.clone(),
        notifier,
        settings.feed.max_comment_length.get() as usize,
    );

    ApiState {
        stream: Arc::new(stream),
        search: Arc::new(search),
        photos: Arc::new(photos),
        events,
        store: repos.health,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repos = init_repositories(&settings).await?;
    let state = build_api_state(repos, &settings);
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, prefix = http::API_PREFIX, "listening");

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(true);
        })
        .into_future();

    // Open event streams never finish on their own, so draining is bounded.
    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        if stopping_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out");
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::validation("database.url is required to run migrations")
    })?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!("migrations applied");
    Ok(())
}
