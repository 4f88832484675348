use serde::{Deserialize, Serialize};

/// Name of the managed service, its package and its systemd unit.
pub const SERVICE_NAME: &str = "rb-reputation";

/// Port the service instance is announced on.
pub const SERVICE_PORT: u16 = 7777;

/// Payload accepted by the agent's `/v1/agent/service/register` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, hostname: &str, address: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: instance_id(&name, hostname),
            name,
            address: address.into(),
            port: SERVICE_PORT,
        }
    }
}

/// Instance id of a service on a given host: `<name>-<hostname>`
pub fn instance_id(name: &str, hostname: &str) -> String {
    format!("{}-{}", name, hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_payload_shape() {
        let registration = ServiceRegistration::new(SERVICE_NAME, "node1", "10.0.0.5");
        let json = serde_json::to_string(&registration).unwrap();

        assert_eq!(
            json,
            r#"{"ID":"rb-reputation-node1","Name":"rb-reputation","Address":"10.0.0.5","Port":7777}"#
        );
    }

    #[test]
    fn test_instance_id() {
        assert_eq!(instance_id("rb-reputation", "ip-10-0-0-5"), "rb-reputation-ip-10-0-0-5");
    }
}
