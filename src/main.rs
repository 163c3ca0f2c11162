use std::{collections::BTreeMap, process, sync::Arc};

use hackhub::{
    application::{
        error::AppError,
        platform::{Collaborators, Platform},
        relations::TeamPolicy,
        repos::{Direction, DocumentStore, Query},
    },
    cache::{CacheConfig, CacheManager},
    config,
    domain::documents::{DocRef, FlatDocument, Handle},
    infra::{
        integrations::{LoggingChannelService, LoggingCodeHost, StaticIdentityDirectory},
        rate_limit::RateLimiter,
        store::MemoryStore,
        telemetry,
    },
};
use serde_json::Value as Json;
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        eprintln!("{}", error.public_message());
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

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let store = Arc::new(open_store(&settings).await?);
    let platform = build_platform(store.clone(), &settings);

    match cli_args.command {
        config::Command::Get(args) => {
            let reference = DocRef::new(args.collection, args.id);
            let document = if args.deep {
                match store.get(&reference).await? {
                    Some(snapshot) => Some(platform.resolve_deep(&snapshot).await?),
                    None => None,
                }
            } else {
                let handle = Handle::Unresolved(reference.clone());
                platform.resolve(&reference.id, Some(&handle)).await?
            };
            let document =
                document.ok_or_else(|| AppError::not_found("document", reference.to_string()))?;
            print_json(&document.into_json())
        }
        config::Command::List(args) => {
            let mut query = Query::new();
            if let Some(field) = args.order_by {
                let direction = if args.desc {
                    Direction::Descending
                } else {
                    Direction::Ascending
                };
                query = query.order_by(field, direction);
            }
            if let Some(limit) = args.limit {
                query = query.limit(limit);
            }
            let documents = platform.list_collection(&args.collection, &query).await?;
            print_documents(documents)
        }
        config::Command::Hackathons(args) => {
            let today = OffsetDateTime::now_utc().date();
            let documents = platform.list_hackathons(args.window, today).await?;
            print_documents(documents)
        }
        config::Command::Join(args) => {
            platform.join(&args.user, &args.team).await?;
            persist(&store, &settings).await?;
            info!(user = %args.user, team = %args.team, "Joined team");
            Ok(())
        }
        config::Command::Leave(args) => {
            platform.leave(&args.user, &args.team).await?;
            persist(&store, &settings).await?;
            info!(user = %args.user, team = %args.team, "Left team");
            Ok(())
        }
        config::Command::Link(args) => {
            let mapping = BTreeMap::from([(args.problem_statement, args.events)]);
            platform.link_problem_statements_to_events(&mapping).await?;
            persist(&store, &settings).await
        }
    }
}

async fn open_store(settings: &config::Settings) -> Result<MemoryStore, AppError> {
    let path = settings.store.data_file.as_path();
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|err| AppError::Infra(err.into()))?;
    if !exists {
        warn!(path = %path.display(), "Data file missing; starting with an empty store");
        return Ok(MemoryStore::new());
    }
    Ok(MemoryStore::load(path).await?)
}

fn build_platform(store: Arc<MemoryStore>, settings: &config::Settings) -> Platform {
    let cache = Arc::new(CacheManager::new(CacheConfig::from(&settings.cache)));
    let limiter = RateLimiter::new(settings.rate_limit.budgets.clone());
    let collaborators = Collaborators {
        channels: Arc::new(LoggingChannelService),
        code_host: Arc::new(LoggingCodeHost::new(settings.channels.code_host_url.clone())),
        identities: Arc::new(StaticIdentityDirectory::default()),
        policy: TeamPolicy::from(&settings.channels),
    };
    let store: Arc<dyn DocumentStore> = store;
    Platform::new(store, cache, limiter, collaborators)
}

async fn persist(store: &MemoryStore, settings: &config::Settings) -> Result<(), AppError> {
    store.save(&settings.store.data_file).await?;
    Ok(())
}

fn print_documents(documents: Vec<FlatDocument>) -> Result<(), AppError> {
    let items = documents.into_iter().map(FlatDocument::into_json).collect();
    print_json(&Json::Array(items))
}

fn print_json(value: &Json) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
