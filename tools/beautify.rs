use std::env;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = common::config_path_from_env();
    let (config, created) = common::load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    }

    let music_root = env::args()
        .nth(1)
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .map(PathBuf::from)
        .or_else(|| common::resolve_music_root(&config_path, &config.music_root))
        .ok_or("MUSIC_ROOT not set and no path argument")?;

    let outcomes = organize::beautify_library(&music_root, &config.folders);
    let stats = organize::stats(&outcomes);

    println!(
        "Beautified: {} albums, {} failed",
        stats.albums - stats.failed,
        stats.failed
    );

    Ok(())
}
