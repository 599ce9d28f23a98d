use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use collection::CollectionStore;
use foundation::MapId;
use mapstate::MapState;
use protocol::SearchSettings;
use runtime::{Event, EventBus};
use search::{JobEnd, SearchOutcome, SearchStore};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tools::{MapSummary, describe, search_settings};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use transport::{ClientConfig, HttpTransport};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive map searches against a map backend")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "MAPSYNC_BASE_URL")]
    base_url: Option<String>,

    /// Poll response encoding (cbor or json)
    #[arg(long, env = "MAPSYNC_ACCEPT")]
    accept: Option<String>,

    /// Ask the backend to recompute instead of serving cached results
    #[arg(long)]
    ignore_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a search and follow its map job to the end
    Search {
        query: String,

        /// Dataset ids to search (repeatable)
        #[arg(long = "dataset", default_value = "demo")]
        datasets: Vec<String>,

        /// Cap on the number of mapped items
        #[arg(long)]
        max_items: Option<u32>,

        /// Store the finished map under its generated name
        #[arg(long)]
        store: bool,
    },

    /// Restore a stored map and follow its job
    StoredMap { map_id: String },

    /// Print a dataset's metadata as JSON
    Dataset { dataset_id: String },

    /// List the collections visible to an organization
    Collections {
        #[arg(long)]
        organization: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(accept) = args.accept {
        config.accept = accept.parse().context("--accept")?;
    }
    config.ignore_cache |= args.ignore_cache;
    debug!(?config, "client config");

    let transport = HttpTransport::from_config(&config).context("building HTTP client")?;
    let events = EventBus::with_history(0);
    let rx = events.subscribe();

    match args.command {
        Command::Search {
            query,
            datasets,
            max_items,
            store,
        } => {
            let search = SearchStore::new(transport, config, SearchSettings::default(), MapState::new().shared(), events);
            search.set_logged_in(true);
            let settings = search_settings(&search.settings(), &query, &datasets, max_items);
            search.update_settings(|s| *s = settings);
            let outcome = search.request_search_results().await?;
            follow(&search, rx, outcome).await?;
            if store {
                let stored = search.store_current_map().await?;
                println!("stored as '{}' ({})", stored.name, stored.id);
            }
        }
        Command::StoredMap { map_id } => {
            let search = SearchStore::new(transport, config, SearchSettings::default(), MapState::new().shared(), events);
            search.set_logged_in(true);
            let outcome = search.show_stored_map(MapId::new(map_id)).await?;
            follow(&search, rx, outcome).await?;
        }
        Command::Dataset { dataset_id } => {
            let search = SearchStore::new(transport, config, SearchSettings::default(), MapState::new().shared(), events);
            let info = search.retrieve_dataset(&dataset_id).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Collections { organization } => {
            let collections = CollectionStore::new(transport, config, events);
            for c in collections.get_available_collections(organization.as_deref()).await? {
                let items: u64 = c
                    .actual_classes
                    .iter()
                    .map(|class| class.positive_count + class.negative_count)
                    .sum();
                println!("{}\t{}\t{items} items", c.id, c.name);
            }
        }
    }
    Ok(())
}

/// Prints progress until the job ends, then a summary of the map.
async fn follow(
    search: &SearchStore<HttpTransport>,
    mut rx: broadcast::Receiver<Event>,
    outcome: SearchOutcome,
) -> anyhow::Result<()> {
    let job = match outcome {
        SearchOutcome::Started(job) => job,
        SearchOutcome::StoredMapMissing => bail!("stored map not found"),
        other => bail!("search did not start: {other:?}"),
    };
    info!(map_id = %job.map_id, "following map job");
    let finished = job.finished();
    tokio::pin!(finished);
    let end = loop {
        tokio::select! {
            end = &mut finished => break end,
            received = rx.recv() => match received {
                Ok(event) => print_signal(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress printer lagged"),
                Err(RecvError::Closed) => break (&mut finished).await,
            },
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_signal(&event);
    }

    match end {
        JobEnd::Finished => {
            let total = search.state().map_total_matches;
            let summary = MapSummary::of(search.current_map_name(), &search.map().read());
            print!("{summary}");
            if let Some(total) = total {
                println!("total matches: {total}");
            }
            Ok(())
        }
        JobEnd::Errored => bail!("map job failed"),
        JobEnd::Superseded => bail!("map job was superseded"),
    }
}

fn print_signal(event: &Event) {
    if let Some(line) = describe(&event.signal) {
        println!("{line}");
    }
}
