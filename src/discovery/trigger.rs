//! Cron-style execution triggers for discovery monitors.
//!
//! A trigger is derived from a frequency and a start date: the start date's
//! time of day is kept for every run, weekly monitors also pin the weekday
//! (Monday = 0) and monthly monitors the day of month.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::database::entities::common_types::MonitorFrequency;
use crate::errors::{DiscoveryError, DiscoveryResult};

/// Stored as the monitor's `monitor_execution_trigger` JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrigger {
    pub start_date: DateTime<FixedOffset>,
    pub timezone: String,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
}

impl ExecutionTrigger {
    /// `None` for [`MonitorFrequency::NotScheduled`]
    pub fn derive(frequency: MonitorFrequency, start_date: DateTime<FixedOffset>) -> Option<Self> {
        let mut trigger = ExecutionTrigger {
            start_date,
            timezone: timezone_name(start_date.offset()),
            hour: start_date.hour(),
            minute: start_date.minute(),
            second: start_date.second(),
            day: None,
            day_of_week: None,
        };

        match frequency {
            MonitorFrequency::NotScheduled => return None,
            MonitorFrequency::Daily => {}
            MonitorFrequency::Weekly => {
                trigger.day_of_week = Some(start_date.weekday().num_days_from_monday())
            }
            MonitorFrequency::Monthly => trigger.day = Some(start_date.day()),
        }
        Some(trigger)
    }

    pub fn frequency(&self) -> MonitorFrequency {
        if self.day.is_some() {
            MonitorFrequency::Monthly
        } else if self.day_of_week.is_some() {
            MonitorFrequency::Weekly
        } else {
            MonitorFrequency::Daily
        }
    }

    pub fn to_json(&self) -> DiscoveryResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> DiscoveryResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

fn timezone_name(offset: &FixedOffset) -> String {
    if offset.local_minus_utc() == 0 {
        "UTC".to_string()
    } else {
        format!("UTC{}", offset)
    }
}

/// What a create or update does to the stored trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerChange {
    /// Frequency or start date missing: leave the stored trigger alone
    Keep,
    Clear,
    Set(ExecutionTrigger),
}

/// Not scheduled always clears; otherwise both inputs are needed to set a trigger
pub fn derive_trigger_change(
    frequency: Option<MonitorFrequency>,
    start_date: Option<DateTime<FixedOffset>>,
) -> TriggerChange {
    match (frequency, start_date) {
        (Some(MonitorFrequency::NotScheduled), _) => TriggerChange::Clear,
        (Some(frequency), Some(start_date)) => match ExecutionTrigger::derive(frequency, start_date)
        {
            Some(trigger) => TriggerChange::Set(trigger),
            None => TriggerChange::Clear,
        },
        _ => TriggerChange::Keep,
    }
}

/// Tuning for the classification step of a monitor run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_samples: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<u32>,
}

impl ClassifyParams {
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.num_samples == Some(0) {
            return Err(DiscoveryError::Validation(
                "num_samples must be greater than zero".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(DiscoveryError::Validation(
                "num_threads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-14T12:00:00+00:00").unwrap()
    }

    #[test]
    fn test_daily_trigger() {
        let trigger = ExecutionTrigger::derive(MonitorFrequency::Daily, start()).unwrap();
        assert_eq!(trigger.timezone, "UTC");
        assert_eq!((trigger.hour, trigger.minute, trigger.second), (12, 0, 0));
        assert_eq!(trigger.day, None);
        assert_eq!(trigger.day_of_week, None);
        assert_eq!(trigger.frequency(), MonitorFrequency::Daily);
    }

    #[test]
    fn test_weekly_trigger_uses_monday_zero() {
        // 2024-05-14 is a Tuesday
        let trigger = ExecutionTrigger::derive(MonitorFrequency::Weekly, start()).unwrap();
        assert_eq!(trigger.day_of_week, Some(1));
        assert_eq!(trigger.day, None);
        assert_eq!(trigger.frequency(), MonitorFrequency::Weekly);
    }

    #[test]
    fn test_monthly_trigger() {
        let trigger = ExecutionTrigger::derive(MonitorFrequency::Monthly, start()).unwrap();
        assert_eq!(trigger.day, Some(14));
        assert_eq!(trigger.day_of_week, None);
        assert_eq!(trigger.frequency(), MonitorFrequency::Monthly);
    }

    #[test]
    fn test_not_scheduled_clears() {
        assert_eq!(
            ExecutionTrigger::derive(MonitorFrequency::NotScheduled, start()),
            None
        );
        assert_eq!(
            derive_trigger_change(Some(MonitorFrequency::NotScheduled), None),
            TriggerChange::Clear
        );
    }

    #[test]
    fn test_missing_input_keeps_trigger() {
        assert_eq!(
            derive_trigger_change(Some(MonitorFrequency::Daily), None),
            TriggerChange::Keep
        );
        assert_eq!(derive_trigger_change(None, Some(start())), TriggerChange::Keep);
    }

    #[test]
    fn test_offset_timezone_and_json_shape() {
        let date = DateTime::parse_from_rfc3339("2024-05-14T08:30:15+02:00").unwrap();
        let trigger = ExecutionTrigger::derive(MonitorFrequency::Weekly, date).unwrap();
        assert_eq!(trigger.timezone, "UTC+02:00");
        assert_eq!((trigger.hour, trigger.minute, trigger.second), (8, 30, 15));

        let value = trigger.to_json().unwrap();
        assert_eq!(value["day_of_week"], json!(1));
        assert!(value.get("day").is_none());
        assert_eq!(ExecutionTrigger::from_json(&value).unwrap(), trigger);
    }

    #[test]
    fn test_classify_params_validation() {
        assert!(ClassifyParams::default().validate().is_ok());
        let params = ClassifyParams {
            num_samples: Some(0),
            num_threads: Some(4),
        };
        assert!(params.validate().unwrap_err().is_validation_error());
    }
}
