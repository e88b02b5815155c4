//! Seekback - replay page activity against the undo pipeline

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;

use seekback::Settings;
use seekback::page::MediaElement;
use seekback::replay::{Replayer, Script};
use seekback::storage::{JsonFileStore, MemoryStore, SeekStore};

const USAGE: &str = "Usage: seekback [--persist] [script.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let mut persist = false;
    let mut script_path: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--persist" => persist = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ if script_path.is_none() => script_path = Some(PathBuf::from(arg)),
            _ => bail!("Unexpected argument {:?}\n{}", arg, USAGE),
        }
    }

    let settings = Settings::load();

    let store: Arc<dyn SeekStore> = if persist {
        let store = JsonFileStore::default_location()
            .context("Could not determine data directory")?;
        info!("Persisting seek history under {:?}", store.dir());
        Arc::new(store)
    } else {
        Arc::new(MemoryStore::new())
    };

    let script = match &script_path {
        Some(path) => Script::load(path).with_context(|| format!("Loading {:?}", path))?,
        None => {
            info!("No script given, running built-in scenario");
            Script::demo()
        }
    };

    let mut replayer = Replayer::new(settings, store);
    replayer.run(&script).await?;

    for id in replayer.open_tabs() {
        let Some(session) = replayer.session(id.0) else {
            continue;
        };
        let position = replayer
            .media(id.0)
            .map(|media| format!("{:.1}s", media.current_time()))
            .unwrap_or_else(|| "no player".to_string());
        println!(
            "Tab {} ({}), {} seek(s) in history",
            id,
            position,
            session.history_len()
        );
        for event in session.history() {
            println!("  {:.1}s -> {:.1}s", event.origin, event.target);
        }
    }

    Ok(())
}
