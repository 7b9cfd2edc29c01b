use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The registrable identity of this process. Built once at startup and reused
/// unchanged for every registration and heartbeat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub service_name: String,
    /// Address the registry should advertise for this instance.
    pub ip: IpAddr,
    pub port: u16,
    /// Registry tenant the instance is registered under.
    pub namespace_id: Uuid,
}

impl InstanceDescriptor {
    pub fn new(
        service_name: impl Into<String>,
        ip: IpAddr,
        port: u16,
        namespace_id: Uuid,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            ip,
            port,
            namespace_id,
        }
    }
}

impl fmt::Display for InstanceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.service_name, self.ip, self.port)
    }
}
