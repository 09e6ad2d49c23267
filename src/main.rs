#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
use jemallocator::Jemalloc;

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::panic;
use std::sync::Arc;

use clap::{crate_version, App, Arg, ArgMatches};
use log::{error, info};

use chanloader::config::Config;
use chanloader::model::{CatalogDescriptor, ChanDescriptor, ThreadDescriptor};
use chanloader::reader::{MemoryPostCache, ParseLookups, ParseWorkerPool, PostLoader};
use chanloader::site::SiteRegistry;

enum Target {
    Load(ChanDescriptor),
    Bookmark(ThreadDescriptor),
}

async fn run_async(config: Config, target: Target, payload: String) -> i32 {
    let sites = SiteRegistry::from(&config);
    info!("Loaded {} site(s) from configuration", sites.len());
    let loader = PostLoader::new(Arc::new(sites), Arc::new(MemoryPostCache::new()))
        .with_pool(ParseWorkerPool::new(config.parse_workers()));

    let body = match File::open(&payload) {
        Ok(f) => BufReader::new(f),
        Err(err) => {
            error!("Failed to open payload @ {}: {}", payload, err);
            return 1;
        }
    };

    let json = match target {
        Target::Load(descriptor) => loader
            .load(descriptor, body, 0, ParseLookups::new())
            .await
            .and_then(|r| serde_json::to_string_pretty(&r).map_err(Into::into)),
        Target::Bookmark(thread) => loader
            .load_bookmark_info(thread, 0, body)
            .await
            .and_then(|r| serde_json::to_string_pretty(&r).map_err(Into::into)),
    };

    match json {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(err) => {
            error!("Failed to read {}: {}", payload, err);
            1
        }
    }
}

fn run<'a>(matches: ArgMatches<'a>) -> i32 {
    let config_path = matches.value_of("config").unwrap_or("./Chanloader.toml");
    let config: Config = {
        let config_str = match std::fs::read_to_string(config_path) {
            Ok(s) => s,
            Err(err) => {
                error!("Failed to read configuration @ {}: {}", config_path, err);
                return 1;
            }
        };
        match toml::from_str(&config_str) {
            Ok(c) => c,
            Err(err) => {
                error!(
                    "Failed to parse configuration file @ {}: {}",
                    config_path, err
                );
                return 1;
            }
        }
    };

    let site = matches.value_of("site").unwrap_or_default();
    let board = matches.value_of("board").unwrap_or_default();
    let thread = match matches.value_of("thread").map(str::parse::<u64>) {
        Some(Ok(no)) => Some(ThreadDescriptor::new(site, board, no)),
        Some(Err(err)) => {
            error!("Invalid thread number: {}", err);
            return 1;
        }
        None => None,
    };
    let target = match (thread, matches.is_present("bookmark")) {
        (Some(thread), true) => Target::Bookmark(thread),
        (Some(thread), false) => Target::Load(thread.into()),
        (None, false) => Target::Load(CatalogDescriptor::new(site, board).into()),
        (None, true) => {
            error!("--bookmark requires --thread");
            return 1;
        }
    };
    let payload = matches.value_of("PAYLOAD").unwrap_or_default().to_string();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("chanloader")
        .build()
    {
        Ok(r) => r,
        Err(err) => {
            error!("Failed to start runtime: {}", err);
            return 1;
        }
    };

    runtime.block_on(run_async(config, target, payload))
}

fn main() {
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        std::process::exit(1);
    }));

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "chanloader=info")
    }
    pretty_env_logger::init_timed();

    let matches = App::new("Chanloader")
        .about("Decodes saved imageboard thread and catalog payloads.")
        .version(crate_version!())
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .help("Path to configuration file")
                .takes_value(true)
                .value_name("FILE")
                .default_value("./Chanloader.toml")
                .env("CONFIG"),
        )
        .arg(
            Arg::with_name("site")
                .long("site")
                .short("s")
                .help("Site name as configured")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("board")
                .long("board")
                .short("b")
                .help("Board code")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("thread")
                .long("thread")
                .short("t")
                .help("Thread number. The payload is read as a catalog when omitted")
                .takes_value(true)
                .value_name("NO"),
        )
        .arg(
            Arg::with_name("bookmark")
                .long("bookmark")
                .help("Only extract bookmark info from a thread payload"),
        )
        .arg(
            Arg::with_name("PAYLOAD")
                .help("Path to the saved JSON payload")
                .required(true)
                .index(1),
        )
        .get_matches();

    match run(matches) {
        0 => return,
        i => std::process::exit(i),
    };
}
