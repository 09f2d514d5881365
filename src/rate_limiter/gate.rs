//! Request Gate
//!
//! Classifies inbound reads and consults the two-bucket rate limiter on
//! their behalf. Deliberately abstract over the HTTP layer: wire framing
//! and concrete request/response types are out of scope (spec.md §1), so
//! this module only needs a caller to hand it a path and an identity
//! header lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CompassError, Result};

use super::{RateUnit, TokenBucket};

/// What the gate needs from an inbound request. A real HTTP layer (pingora,
/// hyper, whatever the registry is built on) implements this; this crate
/// never constructs one itself.
pub trait IncomingRequest {
    fn method_is_read(&self) -> bool;
    fn path(&self) -> &str;
    fn header(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    FullFetch,
    DeltaFetch,
    ApplicationFetch,
    Other,
}

const APPS_PATTERN: &str = r"^.*/apps(?:/([^/]*))?$";

/// Compiled once and reused across calls, not rebuilt per request — this
/// is consulted on the registry's hot read path. Mirrors river's
/// `RegexShim` (a `Regex` built once and held, not reconstructed per use).
fn apps_pattern() -> &'static Regex {
    static APPS_REGEX: OnceLock<Regex> = OnceLock::new();
    APPS_REGEX.get_or_init(|| Regex::new(APPS_PATTERN).expect("static pattern is valid"))
}

/// Classify a read request by its URL shape.
///
/// A request whose path matches `…/apps(/[^/]*)?` is a full, delta, or
/// per-application fetch; everything else (writes, heartbeats, anything
/// not matching) is [`RequestClass::Other`] and is always admitted.
pub fn classify(path: &str) -> RequestClass {
    let Some(caps) = apps_pattern().captures(path) else {
        return RequestClass::Other;
    };
    match caps.get(1).map(|m| m.as_str()) {
        None | Some("") => RequestClass::FullFetch,
        Some("delta") => RequestClass::DeltaFetch,
        Some(_) => RequestClass::ApplicationFetch,
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub enabled: bool,
    pub throttle_standard_clients: bool,
    pub privileged_clients: Vec<String>,
    pub burst_size: i64,
    pub combined_average_rate: i64,
    pub full_average_rate: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            throttle_standard_clients: false,
            privileged_clients: Vec::new(),
            burst_size: 10,
            combined_average_rate: 10,
            full_average_rate: 5,
        }
    }
}

const DEFAULT_PRIVILEGED_CLIENTS: &[&str] = &["standard client", "peer-server"];
const IDENTITY_HEADER: &str = "DiscoveryIdentity-Name";

#[derive(Debug, Default)]
pub struct GateCounters {
    pub rejected: AtomicU64,
    pub candidates: AtomicU64,
    pub admitted_privileged: AtomicU64,
}

/// The registry-side admission gate: classification + privileged check +
/// two-bucket rate check + enforce-or-count.
pub struct Gate {
    config: GateConfig,
    combined: TokenBucket,
    full_only: TokenBucket,
    pub counters: GateCounters,
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            combined: TokenBucket::new(RateUnit::Seconds),
            full_only: TokenBucket::new(RateUnit::Seconds),
            counters: GateCounters::default(),
        }
    }

    fn is_privileged(&self, identity: Option<&str>) -> bool {
        if self.config.throttle_standard_clients {
            return false;
        }
        let Some(identity) = identity else {
            return false;
        };
        DEFAULT_PRIVILEGED_CLIENTS.contains(&identity)
            || self
                .config
                .privileged_clients
                .iter()
                .any(|c| c == identity)
    }

    /// `Ok(())` if the request should be admitted; `Err(OverloadRejected)`
    /// if it should be dropped — the 503-equivalent from spec.md §6's
    /// error mapping ("Overload + enabled -> 503 Service Unavailable").
    pub fn admit<R: IncomingRequest>(&self, request: &R, now_millis: i64) -> Result<()> {
        if !request.method_is_read() {
            return Ok(());
        }
        let class = classify(request.path());
        if class == RequestClass::Other {
            return Ok(());
        }

        if self.is_privileged(request.header(IDENTITY_HEADER)) {
            self.counters.admitted_privileged.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let combined_ok =
            self.combined
                .acquire(self.config.burst_size, self.config.combined_average_rate, now_millis);
        let full_ok = if class == RequestClass::FullFetch {
            self.full_only
                .acquire(self.config.burst_size, self.config.full_average_rate, now_millis)
        } else {
            true
        };
        let overloaded = !combined_ok || !full_ok;

        if !overloaded {
            return Ok(());
        }

        if self.config.enabled {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            let err = CompassError::OverloadRejected;
            tracing::debug!(?class, error = %err, "request gate: overload, rejecting");
            Err(err)
        } else {
            self.counters.candidates.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(?class, "request gate: overload, would reject (disabled)");
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    struct FakeRequest {
        method_is_read: bool,
        path: String,
        headers: HashMap<String, String>,
    }

    impl IncomingRequest for FakeRequest {
        fn method_is_read(&self) -> bool {
            self.method_is_read
        }
        fn path(&self) -> &str {
            &self.path
        }
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }
    }

    fn get(path: &str) -> FakeRequest {
        FakeRequest {
            method_is_read: true,
            path: path.to_string(),
            headers: HashMap::new(),
        }
    }

    fn post(path: &str) -> FakeRequest {
        FakeRequest {
            method_is_read: false,
            path: path.to_string(),
            headers: HashMap::new(),
        }
    }

    #[test]
    fn classification_scenarios() {
        assert_eq!(classify("/eureka/apps"), RequestClass::FullFetch);
        assert_eq!(classify("/eureka/apps/"), RequestClass::FullFetch);
        assert_eq!(classify("/eureka/apps/delta"), RequestClass::DeltaFetch);
        assert_eq!(classify("/eureka/apps/FOO"), RequestClass::ApplicationFetch);
    }

    #[test]
    fn post_is_always_other_and_admitted() {
        let gate = Gate::new(GateConfig {
            burst_size: 0,
            ..GateConfig::default()
        });
        assert!(gate.admit(&post("/eureka/apps/FOO"), 0).is_ok());
    }

    #[test]
    fn privileged_client_bypasses_limiter() {
        let mut cfg = GateConfig::default();
        cfg.burst_size = 1;
        cfg.combined_average_rate = 1;
        let gate = Gate::new(cfg);
        let mut req = get("/eureka/apps");
        req.headers
            .insert(IDENTITY_HEADER.to_string(), "peer-server".to_string());
        for _ in 0..10 {
            assert!(gate.admit(&req, 0).is_ok());
        }
    }

    #[test]
    fn overload_enabled_rejects() {
        let mut cfg = GateConfig::default();
        cfg.burst_size = 1;
        cfg.combined_average_rate = 1;
        cfg.full_average_rate = 1;
        let gate = Gate::new(cfg);
        let req = get("/eureka/apps");
        assert!(gate.admit(&req, 0).is_ok());
        assert!(matches!(
            gate.admit(&req, 0),
            Err(CompassError::OverloadRejected)
        ));
        assert_eq!(gate.counters.rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn overload_disabled_counts_candidates_but_admits() {
        let mut cfg = GateConfig::default();
        cfg.enabled = false;
        cfg.burst_size = 1;
        cfg.combined_average_rate = 1;
        let gate = Gate::new(cfg);
        let req = get("/eureka/apps");
        assert!(gate.admit(&req, 0).is_ok());
        assert!(gate.admit(&req, 0).is_ok());
        assert_eq!(gate.counters.candidates.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn delta_fetch_survives_full_fetch_throttling() {
        let mut cfg = GateConfig::default();
        cfg.burst_size = 100;
        cfg.combined_average_rate = 100;
        cfg.full_average_rate = 1;
        let gate = Gate::new(cfg);
        // Exhaust the full-only bucket.
        assert!(gate.admit(&get("/eureka/apps"), 0).is_ok());
        assert!(gate.admit(&get("/eureka/apps"), 0).is_err());
        // Delta fetches never touch the full-only bucket.
        assert!(gate.admit(&get("/eureka/apps/delta"), 0).is_ok());
    }
}
