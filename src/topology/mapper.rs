//! Topology Mapper
//!
//! Maintains the live `availabilityZone -> region` table, rebuilt
//! atomically from either a static config or DNS TXT discovery. See
//! spec.md §4.E.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{CompassError, Result};

const DEFAULT_ZONE_SENTINEL: &str = "defaultZone";

/// Resolves the zones that belong to a region. Two implementations exist:
/// [`StaticZoneResolver`] (reads a config map) and
/// [`DnsZoneResolver`](super::dns_zone::DnsZoneResolver) (DNS TXT
/// discovery). Resolution is async because the DNS variant needs to be.
#[async_trait]
pub trait ZoneResolver: Send + Sync {
    async fn zones(&self, region: &str) -> Vec<String>;
}

/// Reads `availabilityZones(region)` from static configuration.
pub struct StaticZoneResolver {
    pub availability_zones: HashMap<String, Vec<String>>,
}

#[async_trait]
impl ZoneResolver for StaticZoneResolver {
    async fn zones(&self, region: &str) -> Vec<String> {
        self.availability_zones
            .get(region)
            .cloned()
            .unwrap_or_default()
    }
}

/// A handful of canonical cloud regions and their zones, seeded so a
/// misconfigured deployment still boots with sensible fallback behavior.
pub fn default_region_to_zones() -> HashMap<String, Vec<String>> {
    let mut m = HashMap::new();
    m.insert(
        "us-east-1".to_string(),
        vec!["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1d"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    m.insert(
        "us-west-1".to_string(),
        vec!["us-west-1a", "us-west-1c"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    m.insert(
        "us-west-2".to_string(),
        vec!["us-west-2a", "us-west-2b", "us-west-2c"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    m.insert(
        "eu-west-1".to_string(),
        vec!["eu-west-1a", "eu-west-1b", "eu-west-1c"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    m.insert(
        "ap-southeast-1".to_string(),
        vec!["ap-southeast-1a", "ap-southeast-1b"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    m
}

pub struct TopologyMapper {
    resolver: Arc<dyn ZoneResolver>,
    default_region_to_zones: HashMap<String, Vec<String>>,
    live: ArcSwap<HashMap<String, String>>,
    last_regions: AsyncMutex<Vec<String>>,
}

impl TopologyMapper {
    pub fn new(resolver: Arc<dyn ZoneResolver>, default_region_to_zones: HashMap<String, Vec<String>>) -> Self {
        Self {
            resolver,
            default_region_to_zones,
            live: ArcSwap::from_pointee(HashMap::new()),
            last_regions: AsyncMutex::new(Vec::new()),
        }
    }

    /// Rebuild the live map from `regions`. Serialized on an internal
    /// monitor so two concurrent rebuilds can't interleave; the swap into
    /// `live` is atomic, so lookups never observe a partial merge.
    pub async fn set_regions_to_fetch(&self, regions: Vec<String>) -> Result<()> {
        let mut last_regions = self.last_regions.lock().await;

        let mut new_map = HashMap::new();
        for region in &regions {
            let zones = self.resolver.zones(region).await;
            let default_only = zones.is_empty()
                || (zones.len() == 1 && zones[0] == DEFAULT_ZONE_SENTINEL);

            if default_only {
                match self.default_region_to_zones.get(region) {
                    Some(defaults) => {
                        for zone in defaults {
                            new_map.insert(zone.clone(), region.clone());
                        }
                    }
                    None => {
                        return Err(CompassError::Configuration(format!(
                            "region '{region}' resolved no zones and has no default fallback"
                        )));
                    }
                }
            } else {
                for zone in zones {
                    new_map.insert(zone, region.clone());
                }
            }
        }

        self.live.store(Arc::new(new_map));
        *last_regions = regions;
        Ok(())
    }

    /// Repeat the last `set_regions_to_fetch` call.
    pub async fn refresh(&self) -> Result<()> {
        let regions = self.last_regions.lock().await.clone();
        self.set_regions_to_fetch(regions).await
    }

    /// Direct lookup, then the "strip last character, match a region
    /// value" heuristic. `None` means "treat as local region".
    pub fn region_for(&self, zone: &str) -> Option<String> {
        let map = self.live.load();
        if let Some(region) = map.get(zone) {
            return Some(region.clone());
        }
        if zone.is_empty() {
            return None;
        }
        let truncated = &zone[..zone.len() - 1];
        if map.values().any(|region| region == truncated) {
            return Some(truncated.to_string());
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResolver {
        answers: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ZoneResolver for FixedResolver {
        async fn zones(&self, region: &str) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers.get(region).cloned().unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn topology_fallback_scenario() {
        let mut answers = HashMap::new();
        answers.insert("us-east-1".to_string(), vec![DEFAULT_ZONE_SENTINEL.to_string()]);
        let resolver = Arc::new(FixedResolver {
            answers,
            calls: AtomicUsize::new(0),
        });
        let mapper = TopologyMapper::new(resolver, default_region_to_zones());
        mapper
            .set_regions_to_fetch(vec!["us-east-1".to_string()])
            .await
            .unwrap();
        assert_eq!(mapper.region_for("us-east-1c").as_deref(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn zone_heuristic_scenario() {
        let mut answers = HashMap::new();
        answers.insert(
            "us-east-1".to_string(),
            vec!["us-east-1a".to_string(), "us-east-1b".to_string()],
        );
        let resolver = Arc::new(FixedResolver {
            answers,
            calls: AtomicUsize::new(0),
        });
        let mapper = TopologyMapper::new(resolver, HashMap::new());
        mapper
            .set_regions_to_fetch(vec!["us-east-1".to_string()])
            .await
            .unwrap();

        // Not explicitly mapped, but stripping the last char yields a
        // known region value.
        assert_eq!(mapper.region_for("us-east-1x").as_deref(), Some("us-east-1"));
        assert_eq!(mapper.region_for("us-east-x"), None);
    }

    #[tokio::test]
    async fn unresolvable_region_without_default_is_fatal() {
        let resolver = Arc::new(FixedResolver {
            answers: HashMap::new(),
            calls: AtomicUsize::new(0),
        });
        let mapper = TopologyMapper::new(resolver, HashMap::new());
        let err = mapper
            .set_regions_to_fetch(vec!["nowhere".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Configuration(_)));
    }

    #[tokio::test]
    async fn refresh_repeats_last_setter() {
        let mut answers = HashMap::new();
        answers.insert("us-east-1".to_string(), vec!["us-east-1a".to_string()]);
        let resolver = Arc::new(FixedResolver {
            answers,
            calls: AtomicUsize::new(0),
        });
        let mapper = TopologyMapper::new(resolver, HashMap::new());
        mapper
            .set_regions_to_fetch(vec!["us-east-1".to_string()])
            .await
            .unwrap();
        mapper.refresh().await.unwrap();
        assert_eq!(mapper.region_for("us-east-1a").as_deref(), Some("us-east-1"));
    }
}
