//! irac-state - inspect persisted IRAC version state.
//!
//! Usage: `irac-state [config.toml] [--json]`

use anyhow::Context;
use irac::config::{self, IracConfig, PersistenceBackend};
use irac::persistence::{RedbStateStore, ScopedStateStore};
use irac::telemetry;
use irac::version::{DefaultIracVersionGenerator, decode_versions};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("warn", false);

    let mut json = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => config_path = Some(arg),
        }
    }
    let config_path = config_path.unwrap_or_else(|| "config.toml".to_string());

    let config = IracConfig::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(problems) = config::validate(&config) {
        for problem in &problems {
            error!(error = %problem, "Invalid configuration");
        }
        anyhow::bail!("{} configuration problem(s) in {config_path}", problems.len());
    }

    if config.persistence.backend == PersistenceBackend::Memory {
        warn!(
            cache = %config.site.cache,
            "Memory persistence keeps nothing between processes"
        );
        return Ok(());
    }

    let store = RedbStateStore::open(&config.persistence.path)
        .with_context(|| format!("opening state file {}", config.persistence.path))?;
    let scope = DefaultIracVersionGenerator::scope_name(&config.site.cache);
    let Some(state) = store.read_scope(&scope).await? else {
        info!(scope = %scope, "No persisted versions");
        return Ok(());
    };

    let (segments, skipped) = decode_versions(&state);
    if json {
        let rendered: Vec<serde_json::Value> = segments
            .iter()
            .map(|(segment, vector)| {
                let versions: serde_json::Map<String, serde_json::Value> = vector
                    .iter()
                    .map(|(site, version)| (site.to_string(), version.to_string().into()))
                    .collect();
                serde_json::json!({ "segment": segment, "versions": versions })
            })
            .collect();
        let document = serde_json::json!({
            "cache": config.site.cache,
            "written_by": state.version(),
            "skipped": skipped,
            "segments": rendered,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        println!(
            "cache {} ({} segments, written by {})",
            config.site.cache,
            segments.len(),
            state.version().unwrap_or("unknown")
        );
        for (segment, vector) in &segments {
            println!("{segment:>6}  {vector}");
        }
        if skipped > 0 {
            println!("{skipped} malformed properties skipped");
        }
    }
    Ok(())
}
