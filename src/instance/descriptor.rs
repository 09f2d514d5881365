//! The instance descriptor: the authoritative record of one running
//! process. See spec.md §3.
//!
//! Per DESIGN.md's resolution of the "descriptor builder used as mutator"
//! design note, the descriptor is immutable; [`InstanceManager`][mgr]
//! mutates by building a new snapshot and atomically swapping the
//! reference, rather than rewriting fields in place under a lock.
//!
//! [mgr]: super::manager::InstanceManager

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Starting,
    Up,
    Down,
    OutOfService,
    Unknown,
}

impl Default for Status {
    fn default() -> Self {
        Status::Starting
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaseInfo {
    pub renewal_interval_secs: u32,
    pub expiration_duration_secs: u32,
}

impl Default for LeaseInfo {
    fn default() -> Self {
        Self {
            renewal_interval_secs: 30,
            expiration_duration_secs: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataCenterInfo {
    Generic,
    Cloud {
        metadata: BTreeMap<String, String>,
    },
}

impl Default for DataCenterInfo {
    fn default() -> Self {
        DataCenterInfo::Generic
    }
}

/// The local instance descriptor. `id` is immutable after creation;
/// everything else may be replaced wholesale by the owning
/// [`InstanceManager`](super::manager::InstanceManager).
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub id: String,
    pub app_name: String,
    pub app_group: Option<String>,
    pub host_name: String,
    pub ip_addr: String,
    pub non_secure_port: u16,
    pub non_secure_port_enabled: bool,
    pub secure_port: u16,
    pub secure_port_enabled: bool,
    pub vip_address: Option<String>,
    secure_vip_address: Option<String>,
    pub status: Status,
    pub lease_info: LeaseInfo,
    pub data_center_info: DataCenterInfo,
    pub metadata: BTreeMap<String, String>,
    pub dirty: bool,
    pub status_dirty: bool,
}

impl InstanceInfo {
    pub fn new(id: impl Into<String>, app_name: impl Into<String>, host_name: impl Into<String>, ip_addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app_name: app_name.into(),
            app_group: None,
            host_name: host_name.into(),
            ip_addr: ip_addr.into(),
            non_secure_port: 80,
            non_secure_port_enabled: true,
            secure_port: 443,
            secure_port_enabled: false,
            vip_address: None,
            secure_vip_address: None,
            status: Status::default(),
            lease_info: LeaseInfo::default(),
            data_center_info: DataCenterInfo::default(),
            metadata: BTreeMap::new(),
            dirty: false,
            status_dirty: false,
        }
    }

    pub fn with_secure_vip_address(mut self, secure_vip_address: impl Into<String>) -> Self {
        self.secure_vip_address = Some(secure_vip_address.into());
        self
    }

    /// `None` whenever the secure port is disabled: an unobservable field
    /// per spec.md §3's invariant, regardless of what was set at
    /// construction.
    pub fn secure_vip_address(&self) -> Option<&str> {
        if self.secure_port_enabled {
            self.secure_vip_address.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secure_vip_address_hidden_when_secure_port_disabled() {
        let info = InstanceInfo::new("i-1", "app", "host", "1.2.3.4")
            .with_secure_vip_address("secure.example.com");
        assert_eq!(info.secure_vip_address(), None);

        let mut enabled = info.clone();
        enabled.secure_port_enabled = true;
        assert_eq!(enabled.secure_vip_address(), Some("secure.example.com"));
    }
}
