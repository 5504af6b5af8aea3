use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

use fedisync::cache::{CacheStorage, NoopStorage, SqliteStorage, ViewCache};
use fedisync::config::Config;
use fedisync::logging;
use fedisync::replay::{self, Replay, Script};

#[derive(Parser, Debug)]
#[command(name = "fedisync")]
#[command(about = "Replay mutation scripts against an optimistic view cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fedisync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Load and save the cache in SQLite, regardless of config
  #[arg(long)]
  persist: bool,

  /// YAML script of seed views and steps
  script: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if args.persist {
    config.cache.persist = true;
  }

  let _log_guard = logging::init(&config.log)?;

  let storage: Box<dyn CacheStorage> = if config.cache.persist {
    Box::new(SqliteStorage::open(config.cache.path.as_deref())?)
  } else {
    Box::new(NoopStorage)
  };

  let cache = ViewCache::new().with_stale_time(config.stale_time());
  cache.restore(storage.load_views()?);

  let script = Script::load(&args.script)?;
  let replay = Replay::new(cache.clone());
  let outcomes = replay.run(&script).await?;

  let report = serde_json::json!({
    "outcomes": outcomes,
    "views": replay::dump(&cache)?,
  });
  let rendered =
    serde_json::to_string_pretty(&report).map_err(|e| eyre!("Failed to render report: {}", e))?;
  println!("{}", rendered);

  storage.save_views(&cache.export())?;
  tracing::info!(views = cache.keys().len(), "replay finished");

  Ok(())
}
