use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A resource quantity in the orchestrator's notation ("2", "100m", "1Gi").
///
/// Quantities keep the text they were written as but compare and do
/// arithmetic in milli-units, so "1" == "1000m".
#[derive(Debug, Clone)]
pub struct Quantity {
    text: String,
    millis: i128,
}

impl Quantity {
    pub fn from_millis(millis: i128) -> Self {
        let text = if millis % 1000 == 0 {
            format!("{}", millis / 1000)
        } else {
            format!("{}m", millis)
        };
        Self { text, millis }
    }

    pub fn millis(&self) -> i128 {
        self.millis
    }

    pub fn saturating_add(&self, other: &Quantity) -> Quantity {
        Quantity::from_millis(self.millis.saturating_add(other.millis))
    }

    pub fn saturating_sub(&self, other: &Quantity) -> Quantity {
        Quantity::from_millis(self.millis.saturating_sub(other.millis).max(0))
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.millis.cmp(&other.millis)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quantity {0:?}")]
pub struct InvalidQuantity(String);

impl FromStr for Quantity {
    type Err = InvalidQuantity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidQuantity(s.to_string()));
        }
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let value: f64 = number.parse().map_err(|_| InvalidQuantity(s.to_string()))?;
        let scale: f64 = match suffix {
            "" => 1.0,
            "m" => 0.001,
            "k" => 1e3,
            "M" => 1e6,
            "G" => 1e9,
            "T" => 1e12,
            "P" => 1e15,
            "Ki" => 1024.0,
            "Mi" => 1024f64.powi(2),
            "Gi" => 1024f64.powi(3),
            "Ti" => 1024f64.powi(4),
            "Pi" => 1024f64.powi(5),
            _ => return Err(InvalidQuantity(s.to_string())),
        };
        if value < 0.0 {
            return Err(InvalidQuantity(s.to_string()));
        }
        Ok(Self {
            text: s.to_string(),
            millis: (value * scale * 1000.0).round() as i128,
        })
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Named resource amounts (cpu, memory, ...), keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(pub BTreeMap<String, Quantity>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: &str) -> Option<&Quantity> {
        self.0.get(resource)
    }

    pub fn insert(&mut self, resource: impl Into<String>, quantity: Quantity) {
        self.0.insert(resource.into(), quantity);
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.0.contains_key(resource)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every amount of `other` into `self`.
    pub fn add(&mut self, other: &ResourceList) {
        for (resource, quantity) in &other.0 {
            match self.0.get_mut(resource) {
                Some(existing) => *existing = existing.saturating_add(quantity),
                None => {
                    self.0.insert(resource.clone(), quantity.clone());
                }
            }
        }
    }

    /// Per-resource `self - other`, floored at zero.
    pub fn saturating_sub(&self, other: &ResourceList) -> ResourceList {
        let mut result = self.clone();
        for (resource, quantity) in &other.0 {
            if let Some(existing) = result.0.get_mut(resource) {
                *existing = existing.saturating_sub(quantity);
            }
        }
        result
    }

    /// True if every amount in `self` is covered by `other`.
    /// Resources missing from `other` count as zero.
    pub fn fits_within(&self, other: &ResourceList) -> bool {
        self.0.iter().all(|(resource, quantity)| {
            other
                .0
                .get(resource)
                .map(|available| quantity <= available)
                .unwrap_or(quantity.millis() == 0)
        })
    }
}

impl<const N: usize> From<[(&str, Quantity); N]> for ResourceList {
    fn from(entries: [(&str, Quantity); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, quantity)| (name.to_string(), quantity))
                .collect(),
        )
    }
}

/// Requests and limits for one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: ResourceList,
    #[serde(default)]
    pub limits: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerPort {
    #[serde(default)]
    pub name: Option<String>,
    pub container_port: u32,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    Exists,
    Equal,
}

impl Default for TolerationOperator {
    fn default() -> Self {
        TolerationOperator::Equal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: TolerationOperator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub effect: Option<TaintEffect>,
}

impl Toleration {
    /// True if both tolerations select the same taints.
    pub fn matches(&self, other: &Toleration) -> bool {
        self.key == other.key
            && self.operator == other.operator
            && self.value == other.value
            && self.effect == other.effect
    }

    /// Toleration-matching rules: an empty key with `Exists` tolerates
    /// everything, an absent effect tolerates all effects, and `Exists`
    /// ignores the taint value.
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if let Some(effect) = self.effect {
            if effect != taint.effect {
                return false;
            }
        }
        match self.operator {
            TolerationOperator::Exists => self.key.is_empty() || self.key == taint.key,
            TolerationOperator::Equal => self.key == taint.key && self.value == taint.value,
        }
    }
}

/// The pod specification surface the submit service defaults and validates.
/// Conveyed by value; fields outside this surface are not interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub priority_class_name: Option<String>,
    #[serde(default)]
    pub restart_policy: Option<String>,
}

impl PodSpec {
    /// Sum of all container resource requests.
    pub fn total_requests(&self) -> ResourceList {
        let mut total = ResourceList::new();
        for container in &self.containers {
            total.add(&container.resources.requests);
        }
        total
    }

    /// True if this pod tolerates every given taint.
    pub fn tolerates_all(&self, taints: &[Taint]) -> bool {
        taints
            .iter()
            .all(|taint| self.tolerations.iter().any(|t| t.tolerates(taint)))
    }
}
