//! DNS Resolver
//!
//! The lowest layer of component E: CNAME chasing, A-record listing, and
//! TXT entry listing, each degrading to a benign fallback (plus a warning
//! log) rather than a hard error. Grounded on agentgateway's
//! `hickory-resolver`-backed client DNS resolver
//! (`crates/agentgateway/src/client/dns.rs`), which is the one place in the
//! example pool that wraps `hickory-resolver` for production use.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioResolver;

use crate::error::CompassError;

/// Language-neutral wrapper over the platform DNS interface; spec.md §4.F.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Walk the CNAME chain, returning the terminal A-record target host,
    /// or `host` itself if it's local, an IP literal, or resolution fails.
    async fn resolve(&self, host: &str) -> String;

    /// A-record IPs for `host`, but only when there is no CNAME on the same
    /// name; `None` otherwise (including on failure).
    async fn a_records(&self, host: &str) -> Option<Vec<IpAddr>>;

    /// TXT entries for `name`: the record's value, with at most one layer
    /// of surrounding quotes stripped, split on ASCII space. Empty or
    /// missing yields the empty set.
    async fn txt_entries(&self, name: &str) -> BTreeSet<String>;
}

const MAX_CNAME_HOPS: usize = 8;

pub struct HickoryDnsResolver {
    resolver: TokioResolver,
}

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default(), ResolverOpts::default())
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        let mut builder =
            hickory_resolver::Resolver::builder_with_config(config, TokioConnectionProvider::default());
        *builder.options_mut() = opts;
        Self {
            resolver: builder.build(),
        }
    }

    async fn cname_target(&self, host: &str) -> Option<String> {
        let lookup = self.resolver.lookup(host, RecordType::CNAME).await.ok()?;
        lookup
            .record_iter()
            .find_map(|r| r.data().as_cname().map(|c| c.0.to_utf8()))
    }
}

impl Default for HickoryDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> String {
        if host.parse::<IpAddr>().is_ok() {
            return host.to_string();
        }

        let mut current = host.to_string();
        for _ in 0..MAX_CNAME_HOPS {
            match self.cname_target(&current).await {
                Some(target) if target != current => current = target,
                _ => return current,
            }
        }
        tracing::warn!(host, "dns: CNAME chain exceeded max hops, stopping early");
        current
    }

    async fn a_records(&self, host: &str) -> Option<Vec<IpAddr>> {
        if self.cname_target(host).await.is_some() {
            return None;
        }
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => Some(lookup.iter().filter(IpAddr::is_ipv4).collect()),
            Err(e) => {
                let err = CompassError::TransientIo(e.to_string());
                tracing::warn!(host, error = %err, "dns: A-record lookup failed");
                None
            }
        }
    }

    async fn txt_entries(&self, name: &str) -> BTreeSet<String> {
        let lookup = match self.resolver.txt_lookup(name).await {
            Ok(lookup) => lookup,
            Err(e) => {
                let err = CompassError::TransientIo(e.to_string());
                tracing::warn!(name, error = %err, "dns: TXT lookup failed");
                return BTreeSet::new();
            }
        };

        let mut out = BTreeSet::new();
        for txt in lookup.iter() {
            let joined = txt
                .txt_data()
                .iter()
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<Vec<_>>()
                .join("");
            let unquoted = strip_one_layer_of_quotes(&joined);
            for entry in unquoted.split(' ') {
                if !entry.is_empty() {
                    out.insert(entry.to_string());
                }
            }
        }
        out
    }
}

fn strip_one_layer_of_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
