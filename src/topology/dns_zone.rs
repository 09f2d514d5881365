//! DNS-based [`ZoneResolver`]: resolves a region's zones via TXT discovery
//! on a structured host name (`txt.<region>.<domain>`), per spec.md §4.E.

use std::sync::Arc;

use async_trait::async_trait;

use super::dns::DnsResolver;
use super::mapper::ZoneResolver;

pub struct DnsZoneResolver {
    dns: Arc<dyn DnsResolver>,
    domain_name: String,
}

impl DnsZoneResolver {
    pub fn new(dns: Arc<dyn DnsResolver>, domain_name: String) -> Self {
        Self { dns, domain_name }
    }
}

#[async_trait]
impl ZoneResolver for DnsZoneResolver {
    async fn zones(&self, region: &str) -> Vec<String> {
        let discovery_host = format!("txt.{region}.{domain}", domain = self.domain_name);
        let entries = self.dns.txt_entries(&discovery_host).await;

        // Each entry names a per-zone discovery host, e.g.
        // `txt.us-east-1c.us-east-1.example.com`; the zone is its first
        // label.
        entries
            .into_iter()
            .filter_map(|entry| entry.split('.').nth(1).map(str::to_string))
            .collect()
    }
}
