use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Request to expose job ports through the fleet's ingress controller.
/// The executor-side object generator consumes this; the submit service
/// only validates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressConfig {
    pub ports: Vec<u32>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub tls_enabled: bool,
}

/// Request for an in-cluster service in front of job ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub ports: Vec<u32>,
}
