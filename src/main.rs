use std::{process, sync::Arc};

use specchio::{
    cache::{
        CacheConfig, EntryStore, FIELD_RESOURCE, FIELD_RESOURCE_TYPE, FIELD_TYPE, Invalidator,
        MutationStream,
    },
    config,
    domain::{self, DeepSlice, OperationKind},
    error::AppError,
    infra::{
        redis::{RedisEntryStore, RedisMutationStream, connect},
        telemetry,
    },
};
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
        config::Command::Flatten(args) => run_flatten(args).await,
        config::Command::Ingest(args) => run_ingest(args).await,
        config::Command::Emit(args) => run_emit(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let connection = connect(&settings.redis.url).await?;
    let cache_config = CacheConfig::from(&settings.cache);

    info!(
        stream = %cache_config.stream_name,
        group = %cache_config.group,
        consumer = %cache_config.consumer,
        languages = ?cache_config.languages,
        "starting invalidation worker"
    );

    let stream: Arc<dyn MutationStream> = Arc::new(RedisMutationStream::new(
        connection.clone(),
        cache_config.stream_name.clone(),
    ));
    let entry_ttl_seconds = settings
        .cache
        .entry_ttl_seconds
        .map(std::num::NonZeroU64::get);
    let store: Arc<dyn EntryStore> = Arc::new(RedisEntryStore::new(connection, entry_ttl_seconds));

    let mut handle = Invalidator::new(cache_config, stream, store).spawn();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = &mut ctrl_c => {
            info!("received interrupt, shutting down");
        }
        result = handle.finished() => {
            return result.map_err(AppError::from);
        }
    }

    handle.shutdown().await.map_err(AppError::from)
}

async fn run_flatten(args: config::FlattenArgs) -> Result<(), AppError> {
    let input = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to read input: {err}")))?;
    let deep: DeepSlice = serde_json::from_str(&input)
        .map_err(|err| AppError::unexpected(format!("failed to parse deep document: {err}")))?;

    let flat = domain::flatten(deep);
    write_document(args.output.as_deref(), &flat).await
}

async fn run_ingest(args: config::IngestArgs) -> Result<(), AppError> {
    let input = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to read input: {err}")))?;
    let slice = domain::parse_hextuples(&input)?;
    write_document(args.output.as_deref(), &slice).await
}

async fn write_document(
    output: Option<&std::path::Path>,
    document: &impl serde::Serialize,
) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(document)
        .map_err(|err| AppError::unexpected(format!("failed to serialize document: {err}")))?;
    match output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .map_err(|err| AppError::unexpected(format!("failed to write output: {err}"))),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn run_emit(settings: config::Settings, args: config::EmitArgs) -> Result<(), AppError> {
    url::Url::parse(&args.resource)
        .map_err(|err| AppError::unexpected(format!("resource is not a valid IRI: {err}")))?;
    if OperationKind::parse_qualified(&args.kind).is_none() {
        warn!(kind = %args.kind, "kind is not part of the mutation taxonomy; readers will skip it");
    }

    let connection = connect(&settings.redis.url).await?;
    let stream = RedisMutationStream::new(connection, settings.cache.stream_name.clone());

    let mut fields = vec![
        (FIELD_RESOURCE.to_owned(), args.resource.clone()),
        (FIELD_TYPE.to_owned(), args.kind.clone()),
    ];
    if let Some(resource_type) = args.resource_type.as_ref() {
        fields.push((FIELD_RESOURCE_TYPE.to_owned(), resource_type.clone()));
    }

    let id = stream
        .append(&fields)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to append message: {err}")))?;
    info!(message_id = %id, resource = %args.resource, kind = %args.kind, "appended mutation message");
    Ok(())
}
