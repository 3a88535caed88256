//! Known-ids file
//!
//! The CLI persists reported API ids between runs as a JSON array.

use std::path::Path;
use tracing::{debug, info};

use crate::error::DiscoveryError;
use crate::types::KnownIds;

fn store_error(path: &Path, message: impl ToString) -> DiscoveryError {
    DiscoveryError::Store {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Load known ids; a missing file is an empty set
pub async fn load_known_ids(path: &Path) -> Result<KnownIds, DiscoveryError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Known-ids file not found, starting empty");
            return Ok(KnownIds::default());
        }
        Err(e) => return Err(store_error(path, e)),
    };

    if contents.trim().is_empty() {
        return Ok(KnownIds::default());
    }

    let ids: KnownIds = serde_json::from_str(&contents).map_err(|e| store_error(path, e))?;
    debug!(path = %path.display(), count = ids.len(), "Loaded known ids");
    Ok(ids)
}

/// Replace the file with the given set
pub async fn save_known_ids(path: &Path, ids: &KnownIds) -> Result<(), DiscoveryError> {
    let json = serde_json::to_string_pretty(ids).map_err(|e| store_error(path, e))?;

    // Write then rename so an interrupted save leaves the old set intact
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| store_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| store_error(path, e))?;

    info!(path = %path.display(), count = ids.len(), "Saved known ids");
    Ok(())
}
