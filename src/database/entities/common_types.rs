use serde::{Deserialize, Serialize};

/// String items of a JSON array column; anything else reads as empty
pub fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Change state of a staged resource relative to the last monitor run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffStatus {
    #[serde(rename = "addition")]
    Addition,
    #[serde(rename = "removal")]
    Removal,
    #[serde(rename = "classification_addition")]
    ClassificationAddition,
    #[serde(rename = "classification_update")]
    ClassificationUpdate,
    #[serde(rename = "monitored")]
    Monitored,
    #[serde(rename = "muted")]
    Muted,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Removal => "removal",
            Self::ClassificationAddition => "classification_addition",
            Self::ClassificationUpdate => "classification_update",
            Self::Monitored => "monitored",
            Self::Muted => "muted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "addition" => Some(Self::Addition),
            "removal" => Some(Self::Removal),
            "classification_addition" => Some(Self::ClassificationAddition),
            "classification_update" => Some(Self::ClassificationUpdate),
            "monitored" => Some(Self::Monitored),
            "muted" => Some(Self::Muted),
            _ => None,
        }
    }
}

impl From<DiffStatus> for String {
    fn from(status: DiffStatus) -> Self {
        status.as_str().to_string()
    }
}

/// How often a monitor runs. Never stored; derived from the execution trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorFrequency {
    #[serde(rename = "Daily")]
    Daily,
    #[serde(rename = "Weekly")]
    Weekly,
    #[serde(rename = "Monthly")]
    Monthly,
    #[serde(rename = "Not scheduled")]
    NotScheduled,
}

impl MonitorFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::NotScheduled => "Not scheduled",
        }
    }

    /// Case-insensitive; accepts `not_scheduled` as well as `Not scheduled`
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', " ").as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "not scheduled" => Some(Self::NotScheduled),
            _ => None,
        }
    }
}

/// Monitor execution lifecycle values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorExecutionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "errored")]
    Errored,
}

impl MonitorExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }
}

impl From<MonitorExecutionStatus> for String {
    fn from(status: MonitorExecutionStatus) -> Self {
        status.as_str().to_string()
    }
}
