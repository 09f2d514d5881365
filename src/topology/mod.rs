//! Topology Mapper & DNS Resolver
//!
//! Components E and F: the client-side availability-zone -> region table,
//! and the raw DNS lookups it's built from.

pub mod dns;
pub mod dns_zone;
pub mod mapper;

pub use dns::{DnsResolver, HickoryDnsResolver};
pub use dns_zone::DnsZoneResolver;
pub use mapper::{default_region_to_zones, StaticZoneResolver, TopologyMapper, ZoneResolver};
