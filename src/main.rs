#![deny(clippy::all, clippy::pedantic)]

use std::{io::Write, process, sync::Arc};

use serde::Serialize;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use wp_query_cache::{
    Action, BindingProps, QueryBinding, Record, Resource, WpClient,
    config::{self, Command, GetArgs, ListArgs, Settings},
    error::AppError,
    telemetry,
};

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

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::List(args) => run_list(&settings, &args).await,
        Command::Get(args) => run_get(&settings, args).await,
    }
}

fn resource(settings: &Settings, name: &str) -> Result<Resource, AppError> {
    let kind = settings
        .resources
        .get(name)
        .ok_or_else(|| AppError::unknown_resource(name, settings.resources.names()))?;
    let client = WpClient::from_settings(&settings.site)?;
    info!(
        resource = kind.name(),
        endpoint = %settings.site.endpoint,
        "Resource bound"
    );
    Ok(Resource::new(kind, Arc::new(client)))
}

async fn run_list(settings: &Settings, args: &ListArgs) -> Result<(), AppError> {
    let resource = resource(settings, &args.resource)?;
    let store = Arc::clone(resource.store());
    let query = args.query();
    let key = store.kind().query_key(Some(&query));

    let actions = store.subscribe();
    let mut binding = QueryBinding::new(resource);
    binding.activate(BindingProps::collection(query.clone()));

    wait_for(actions, |action| match action {
        Action::CollectionRequestSuccess { query, .. }
            if store.kind().query_key(Some(query)) == key =>
        {
            Some(Ok(()))
        }
        Action::CollectionRequestFailure { query, error }
            if store.kind().query_key(Some(query)) == key =>
        {
            Some(Err(AppError::from(Arc::clone(error))))
        }
        _ => None,
    })
    .await?;

    let records = store.get_for_query(Some(&query)).unwrap_or_default();
    write_json(&ListOutput {
        query: &key,
        total_pages: store.total_pages_for_query(Some(&query)),
        records: records.iter().map(AsRef::as_ref).collect(),
    })
}

async fn run_get(settings: &Settings, args: GetArgs) -> Result<(), AppError> {
    let resource = resource(settings, &args.resource)?;
    let store = Arc::clone(resource.store());
    let slug = args.slug;

    let actions = store.subscribe();
    let mut binding = QueryBinding::new(resource);
    binding.activate(BindingProps::single(slug.clone()));

    wait_for(actions, |action| match action {
        Action::SingleRequestSuccess { slug: done, .. } if *done == slug => Some(Ok(())),
        Action::SingleRequestFailure { slug: done, error } if *done == slug => {
            Some(Err(AppError::from(Arc::clone(error))))
        }
        _ => None,
    })
    .await?;

    let record = store
        .id_from_slug(&slug)
        .and_then(|id| store.get_by_id(id))
        .ok_or(AppError::Missing { slug })?;
    write_json(record.as_ref())
}

#[derive(Serialize)]
struct ListOutput<'a> {
    query: &'a str,
    total_pages: u64,
    records: Vec<&'a Record>,
}

/// Consume cache actions until `terminal` yields a verdict.
async fn wait_for<F>(mut actions: Receiver<Action>, mut terminal: F) -> Result<(), AppError>
where
    F: FnMut(&Action) -> Option<Result<(), AppError>>,
{
    loop {
        match actions.recv().await {
            Ok(action) => {
                if let Some(verdict) = terminal(&action) {
                    return verdict;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Action stream lagged");
            }
            Err(RecvError::Closed) => return Err(AppError::Interrupted),
        }
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
