//! Static lookup resources
//!
//! Two read-only JSON documents hosted on object storage feed a sync cycle:
//! a universe map whose entries name the region every known station belongs
//! to, and a structure directory mapping structure ids to their parent
//! system and region. Both are fetched once per cycle through the shared
//! client, so their `expires` headers keep repeat cycles cheap.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use crate::client::{ApiClient, ClientError, RequestOptions};

/// Resource errors
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Fetching the resource failed
    #[error("resource fetch error: {0}")]
    Client(#[from] ClientError),

    /// The resource did not have the expected shape
    #[error("malformed resource: {0}")]
    Malformed(String),
}

/// Parent identifiers of an addressable location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LocationInfo {
    /// Solar system the location sits in
    pub system_id: i64,
    /// Region the system belongs to
    pub region_id: i64,
}

/// Lookup from location id to its parent identifiers.
#[derive(Debug, Clone, Default)]
pub struct LocationDirectory {
    entries: HashMap<i64, LocationInfo>,
}

impl LocationDirectory {
    /// Build a directory from explicit entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (i64, LocationInfo)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Look up a location.
    pub fn get(&self, location_id: i64) -> Option<&LocationInfo> {
        self.entries.get(&location_id)
    }

    /// Whether the directory knows a location.
    pub fn contains(&self, location_id: i64) -> bool {
        self.entries.contains_key(&location_id)
    }

    /// Number of known locations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the known location ids.
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }
}

#[derive(Debug, Deserialize)]
struct UniverseEntry {
    #[serde(default)]
    region: Option<i64>,
}

/// Fetch the universe map and distill the distinct region ids from it.
pub async fn fetch_region_ids(client: &ApiClient, url: &str) -> Result<Vec<i64>, ResourceError> {
    let response = client.get(url, &RequestOptions::strict()).await?;
    let universe: HashMap<String, UniverseEntry> = response
        .json()
        .map_err(|e| ResourceError::Malformed(e.to_string()))?;

    let regions: BTreeSet<i64> = universe.values().filter_map(|entry| entry.region).collect();
    if regions.is_empty() {
        return Err(ResourceError::Malformed(format!(
            "universe map at {url} names no regions"
        )));
    }

    info!(regions = regions.len(), "resolved region list");
    Ok(regions.into_iter().collect())
}

/// Fetch the structure directory.
///
/// Keys are location ids serialized as strings; entries with a non-numeric
/// key or a missing parent are skipped with a warning rather than failing
/// the whole directory.
pub async fn fetch_location_directory(
    client: &ApiClient,
    url: &str,
) -> Result<LocationDirectory, ResourceError> {
    let response = client.get(url, &RequestOptions::strict()).await?;
    let raw: HashMap<String, serde_json::Value> = response
        .json()
        .map_err(|e| ResourceError::Malformed(e.to_string()))?;

    let mut entries = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Ok(location_id) = key.parse::<i64>() else {
            warn!(key = %key, "skipping directory entry with non-numeric id");
            continue;
        };
        match serde_json::from_value::<LocationInfo>(value) {
            Ok(info) => {
                entries.insert(location_id, info);
            }
            Err(e) => warn!(location_id, error = %e, "skipping malformed directory entry"),
        }
    }

    info!(structures = entries.len(), "resolved location directory");
    Ok(LocationDirectory { entries })
}
