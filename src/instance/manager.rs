//! Instance Manager
//!
//! Owns the authoritative [`InstanceInfo`] for this process: single-writer
//! contract, status propagation to listeners, and the two "refresh if
//! required" checks that keep the descriptor in step with its config
//! source. See spec.md §4.G.
//!
//! Per the "descriptor builder used as mutator" design note, mutation here
//! never rewrites fields on a shared, locked object — it builds a new
//! [`InstanceInfo`] snapshot and swaps it into an [`ArcSwap`] atomically.
//! The `write_lock` only serializes the read-modify-write sequence across
//! concurrent writers; readers never take it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::error::CompassError;

use super::descriptor::{DataCenterInfo, InstanceInfo, LeaseInfo, Status};

/// `(previous, current)` delivered to listeners on a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChangeEvent {
    pub previous: Status,
    pub current: Status,
}

/// A subscriber to status transitions. A listener that fails is logged and
/// skipped; it never blocks delivery to the remaining listeners.
pub trait StatusChangeListener: Send + Sync {
    fn notify(&self, event: &StatusChangeEvent) -> std::result::Result<(), String>;
}

/// `Status -> Option<Status>`; `None` means "no change" (spec.md's
/// `UnknownStatus`/no-op case). The identity mapper (pass new status
/// through unchanged) is the common case.
pub type StatusMapper = Box<dyn Fn(Status) -> Option<Status> + Send + Sync>;

pub fn identity_status_mapper() -> StatusMapper {
    Box::new(Some)
}

/// What the manager asks its config source for when refreshing the
/// descriptor. A real deployment backs this with whatever config layer
/// owns host resolution, lease parameters, and cloud metadata; this crate
/// only specifies the contract (spec.md §4.G).
pub trait InstanceConfigSource: Send + Sync {
    /// Resolve this process's host name. `refresh` hints that cached
    /// config values (if any) should be bypassed, mirroring the source's
    /// "refresh=true" config lookup.
    fn resolve_host_name(&self, refresh: bool) -> String;

    /// Resolve an IP address for `host`, used to rebuild the host+ip pair
    /// together when the host name changes.
    fn resolve_ip_for_host(&self, host: &str) -> String;

    /// The lease parameters configuration currently calls for.
    fn lease_info(&self) -> LeaseInfo;

    /// The current value of the "spot instance termination action"
    /// metadata key, if this process runs on cloud infrastructure that
    /// tracks one. `None` for generic data centers.
    fn spot_termination_action(&self) -> Option<String>;

    /// Rebuild data-center info wholesale (used when the spot-termination
    /// signal changes, per spec.md §4.G).
    fn build_data_center_info(&self, host: &str, ip: &str) -> DataCenterInfo;
}

const SPOT_TERMINATION_KEY: &str = "spot-instance-termination-action";

/// Single-writer owner of the local [`InstanceInfo`]. Cheap to clone
/// (internally `Arc`-backed); readers call [`InstanceManager::info`] and
/// get a consistent snapshot without blocking writers.
pub struct InstanceManager {
    info: ArcSwap<InstanceInfo>,
    listeners: DashMap<String, Arc<dyn StatusChangeListener>>,
    status_mapper: StatusMapper,
    config: Arc<dyn InstanceConfigSource>,
    write_lock: Mutex<()>,
}

impl InstanceManager {
    pub fn new(
        initial: InstanceInfo,
        config: Arc<dyn InstanceConfigSource>,
        status_mapper: StatusMapper,
    ) -> Self {
        Self {
            info: ArcSwap::from_pointee(initial),
            listeners: DashMap::new(),
            status_mapper,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// A shared read of the current descriptor.
    pub fn info(&self) -> Arc<InstanceInfo> {
        self.info.load_full()
    }

    /// Merge `metadata` into the descriptor's runtime metadata and mark it
    /// dirty.
    pub fn register_app_metadata(&self, metadata: BTreeMap<String, String>) {
        let _guard = self.write_lock.lock().unwrap();
        let mut next = (*self.info.load_full()).clone();
        next.metadata.extend(metadata);
        next.dirty = true;
        self.info.store(Arc::new(next));
    }

    /// Pass `new_raw` through the configured status mapper; if it yields a
    /// status different from the current one, commit it and dispatch a
    /// [`StatusChangeEvent`] to every listener, in registration order of
    /// iteration (unordered by id, per spec.md §3 — insertion order is not
    /// part of the contract).
    pub fn set_status(&self, new_raw: Status) {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.info.load_full();

        let Some(mapped) = (self.status_mapper)(new_raw) else {
            let err = CompassError::UnknownStatus;
            tracing::trace!(?new_raw, error = %err, "instance manager: status mapper returned no-op");
            return;
        };
        if mapped == current.status {
            return;
        }

        let previous = current.status;
        let mut next = (*current).clone();
        next.status = mapped;
        next.status_dirty = true;
        self.info.store(Arc::new(next));

        tracing::info!(?previous, current = ?mapped, "instance manager: status transition");
        self.dispatch_status_change(previous, mapped);
    }

    fn dispatch_status_change(&self, previous: Status, current: Status) {
        let event = StatusChangeEvent { previous, current };
        for entry in self.listeners.iter() {
            if let Err(reason) = entry.value().notify(&event) {
                let err = CompassError::ListenerFault(reason);
                tracing::warn!(
                    listener_id = %entry.key(),
                    error = %err,
                    "instance manager: listener fault, swallowing"
                );
            }
        }
    }

    pub fn register_status_change_listener(
        &self,
        id: impl Into<String>,
        listener: Arc<dyn StatusChangeListener>,
    ) {
        self.listeners.insert(id.into(), listener);
    }

    pub fn unregister_status_change_listener(&self, id: &str) {
        self.listeners.remove(id);
    }

    /// Re-resolve the host name; if it differs from the stored one, rebuild
    /// host+ip and mark dirty. For cloud data centers, also refresh the
    /// whole data-center info if the spot-termination-action metadata
    /// value changed.
    pub fn refresh_data_center_info_if_required(&self) {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.info.load_full();

        let resolved_host = self.config.resolve_host_name(true);
        let mut next = (*current).clone();
        let mut changed = false;

        if resolved_host != current.host_name {
            let resolved_ip = self.config.resolve_ip_for_host(&resolved_host);
            tracing::info!(
                old_host = %current.host_name,
                new_host = %resolved_host,
                "instance manager: host name changed, rebuilding descriptor"
            );
            next.host_name = resolved_host.clone();
            next.ip_addr = resolved_ip;
            changed = true;
        }

        if let DataCenterInfo::Cloud { metadata } = &current.data_center_info {
            let live_action = self.config.spot_termination_action();
            let stored_action = metadata.get(SPOT_TERMINATION_KEY).cloned();
            if live_action != stored_action {
                tracing::info!("instance manager: spot termination action changed, refreshing data center info");
                next.data_center_info = self
                    .config
                    .build_data_center_info(&next.host_name, &next.ip_addr);
                changed = true;
            }
        }

        if changed {
            next.dirty = true;
            self.info.store(Arc::new(next));
        }
    }

    /// Compare the descriptor's lease parameters against config; install a
    /// new lease record and mark dirty on any difference.
    pub fn refresh_lease_info_if_required(&self) {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.info.load_full();
        let desired = self.config.lease_info();
        if desired != current.lease_info {
            tracing::info!(?desired, "instance manager: lease info changed");
            let mut next = (*current).clone();
            next.lease_info = desired;
            next.dirty = true;
            self.info.store(Arc::new(next));
        }
    }
}

/// Process-wide pointer for legacy callers that can't be constructed with
/// an injected manager. A concession, not a contract — see spec.md §9;
/// new code should take an `Arc<InstanceManager>` directly.
static DEFAULT_MANAGER: OnceLock<Arc<InstanceManager>> = OnceLock::new();

/// Install the process-wide default. Returns the rejected manager if one
/// was already installed.
pub fn install_default(manager: Arc<InstanceManager>) -> std::result::Result<(), Arc<InstanceManager>> {
    DEFAULT_MANAGER.set(manager)
}

pub fn default_instance() -> Option<Arc<InstanceManager>> {
    DEFAULT_MANAGER.get().cloned()
}
