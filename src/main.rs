//! `compass`: a service-discovery registry/client core — rate limiting,
//! eviction, supervised tasks, zone/region topology, and instance
//! lifecycle. See spec.md and SPEC_FULL.md for the full component
//! breakdown; this binary (component J) wires A-G together for a
//! smoke-test deployment. It is not a wire-protocol server — the
//! client/registry protocol itself is explicitly out of scope (spec.md
//! §1).

mod config;
mod error;
mod eviction;
mod instance;
mod metrics;
mod rate_limiter;
mod task;
mod topology;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use config::internal::Config;
use error::Result;
use instance::{
    DataCenterInfo, InstanceConfigSource, InstanceInfo, InstanceManager, LeaseInfo, Status,
};
use rate_limiter::gate::{Gate, GateConfig, IncomingRequest};
use topology::{default_region_to_zones, StaticZoneResolver, TopologyMapper};

/// A config source that never changes — stands in for the "refreshable
/// config" spec.md §4.G assumes without requiring a concrete property
/// subsystem (out of scope per spec.md §1).
struct StaticInstanceConfig {
    host_name: String,
    ip_addr: String,
    lease: LeaseInfo,
}

impl InstanceConfigSource for StaticInstanceConfig {
    fn resolve_host_name(&self, _refresh: bool) -> String {
        self.host_name.clone()
    }
    fn resolve_ip_for_host(&self, _host: &str) -> String {
        self.ip_addr.clone()
    }
    fn lease_info(&self) -> LeaseInfo {
        self.lease.clone()
    }
    fn spot_termination_action(&self) -> Option<String> {
        None
    }
    fn build_data_center_info(&self, _host: &str, _ip: &str) -> DataCenterInfo {
        DataCenterInfo::Generic
    }
}

/// A minimal stand-in for the registry's actual read endpoint, just
/// enough for [`Gate::admit`] to have a request to classify. The
/// request/response framing itself is out of scope (spec.md §1).
struct FixedRequest<'a> {
    path: &'a str,
}

impl IncomingRequest for FixedRequest<'_> {
    fn method_is_read(&self) -> bool {
        true
    }
    fn path(&self) -> &str {
        self.path
    }
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_gate(config: &Config) -> Gate {
    Gate::new(GateConfig {
        enabled: config.rate_limiter_enabled,
        throttle_standard_clients: config.rate_limiter_throttle_standard_clients,
        privileged_clients: config.rate_limiter_privileged_clients.clone(),
        burst_size: config.rate_limiter_burst_size,
        combined_average_rate: config.rate_limiter_registry_fetch_average_rate,
        full_average_rate: config.rate_limiter_full_fetch_average_rate,
    })
}

fn build_instance_manager(config: &Config) -> Arc<InstanceManager> {
    let host_name = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let initial = InstanceInfo::new("compass-0", "compass", host_name.clone(), "127.0.0.1");
    let config_source = Arc::new(StaticInstanceConfig {
        host_name,
        ip_addr: "127.0.0.1".to_string(),
        lease: LeaseInfo {
            renewal_interval_secs: config.lease_renewal_interval_in_seconds,
            expiration_duration_secs: config.lease_expiration_duration_in_seconds,
        },
    });
    Arc::new(InstanceManager::new(
        initial,
        config_source,
        instance::identity_status_mapper(),
    ))
}

fn build_topology_mapper(config: &Config) -> Arc<TopologyMapper> {
    let resolver = Arc::new(StaticZoneResolver {
        availability_zones: config.availability_zones.clone(),
    });
    Arc::new(TopologyMapper::new(resolver, default_region_to_zones()))
}

async fn run(config: Config) -> Result<()> {
    let gate = Arc::new(build_gate(&config));
    let instance_manager = build_instance_manager(&config);
    let topology = build_topology_mapper(&config);

    if !config.regions_to_fetch.is_empty() {
        topology.set_regions_to_fetch(config.regions_to_fetch.clone()).await?;
    }

    instance_manager.set_status(Status::Up);

    // Sweep: compute how much eviction a registry sweep could perform
    // against a stub, slowly drifting "expected" count, demonstrating
    // component B without owning real registration storage (out of
    // scope, spec.md §1).
    let expected = Arc::new(AtomicI64::new(100));
    let actual = Arc::new(AtomicI64::new(97));
    let drop_ratio = config.allowed_drop_ratio();
    let eviction_pool = Arc::new(Semaphore::new(1));
    let eviction_task = task::SupervisedTask::spawn(Duration::from_secs(30), 8, eviction_pool, {
        let expected = expected.clone();
        let actual = actual.clone();
        move || {
            let expected = expected.clone();
            let actual = actual.clone();
            async move {
                let allowed = eviction::allowed_to_evict(
                    expected.load(Ordering::Relaxed),
                    actual.load(Ordering::Relaxed),
                    drop_ratio,
                );
                tracing::info!(allowed, "eviction sweep: entries allowed to expire");
                Ok(())
            }
        }
    });

    // Heartbeat: renew this instance's lease and demonstrate the gate
    // admitting a delta fetch against the registry's (stubbed) read path.
    let heartbeat_pool = Arc::new(Semaphore::new(1));
    let heartbeat_gate = gate.clone();
    let heartbeat_manager = instance_manager.clone();
    let heartbeat_task = task::SupervisedTask::spawn(Duration::from_secs(10), 8, heartbeat_pool, move || {
        let gate = heartbeat_gate.clone();
        let manager = heartbeat_manager.clone();
        async move {
            manager.refresh_lease_info_if_required();
            manager.refresh_data_center_info_if_required();
            let now = now_millis();
            let admitted = gate.admit(&FixedRequest { path: "/eureka/apps/delta" }, now).is_ok();
            tracing::debug!(admitted, "heartbeat tick: delta fetch probe");
            Ok(())
        }
    });

    // Registry fetch: re-resolve zone/region topology on the same cadence
    // a real client would refresh its peer list.
    let fetch_pool = Arc::new(Semaphore::new(1));
    let fetch_topology = topology.clone();
    let fetch_task = task::SupervisedTask::spawn(Duration::from_secs(60), 8, fetch_pool, move || {
        let topology = fetch_topology.clone();
        async move {
            topology.refresh().await.map_err(|e| e.to_string())?;
            Ok(())
        }
    });

    tracing::info!("compass bootstrapped, running until interrupted");
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, cancelling supervised tasks");

    eviction_task.cancel();
    heartbeat_task.cancel();
    fetch_task.cancel();

    metrics::log_gate_snapshot("registry_gate", &gate.counters);
    metrics::log_supervisor_snapshot("heartbeat", &heartbeat_task.metrics);
    metrics::log_supervisor_snapshot("registry_fetch", &fetch_task.metrics);

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    let cli = config::parse_cli();
    init_tracing(cli.log_level.as_deref());

    tracing::info!("Parsing CLI options");
    let config = config::render_config(&cli)?;

    if config.validate_configs {
        tracing::info!("configuration is valid, exiting (--validate-configs)");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");
    runtime.block_on(run(config))?;
    Ok(())
}
