use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{SyncError, SyncResult};

/// Loads the static YAML configuration file. Secrets never live in the
/// file; the catalog token and any static AWS keys come from the
/// environment at run time.
pub fn load_config<P: AsRef<Path>>(path: P) -> SyncResult<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(SyncError::config(format!(
                "failed to read config file {path_ref:?}: {e}"
            )));
        }
    };

    let config: AppConfig = match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(SyncError::config(format!(
                "failed to parse config YAML: {e}"
            )));
        }
    };

    if config.catalog.base_url.trim().is_empty() {
        error!("catalog.base_url is empty");
        return Err(SyncError::config("catalog.base_url must not be empty"));
    }

    if config.schedule.interval_seconds == 0 {
        error!("schedule.interval_seconds is zero");
        return Err(SyncError::config(
            "schedule.interval_seconds must be greater than zero",
        ));
    }

    if config.providers.is_empty() {
        warn!("No providers configured; runs will produce no mutations");
    }

    info!(
        catalog_base_url = %config.catalog.base_url,
        providers = config.providers.len(),
        interval_seconds = config.schedule.interval_seconds,
        "Config loaded successfully"
    );

    Ok(config)
}
