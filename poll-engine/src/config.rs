//! Configuration for the poll engine.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use poll_calendar::{Day, PeriodResolver};

use crate::archive::Delimiter;
use crate::types::{PollError, Result, Slot};
use crate::visibility::{VisibilityMode, VisibilitySetting};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Deployment timezone
    pub calendar: CalendarConfig,
    /// Go/no-go rule
    pub decision: DecisionConfig,
    /// Default count visibility
    pub visibility: VisibilityConfig,
    /// Archive persistence
    pub archive: ArchiveConfig,
    /// Offered (day, slot) options
    pub catalog: CatalogConfig,
}

impl PollConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.resolver()?;
        if self.decision.threshold == 0 {
            return Err(PollError::Config("decision.threshold must be at least 1".to_string()));
        }
        if self.catalog.days.is_empty() || self.catalog.slots.is_empty() {
            return Err(PollError::Config("catalog must offer at least one day and one slot".to_string()));
        }
        Ok(())
    }

    /// Period resolver for the configured timezone.
    pub fn resolver(&self) -> Result<PeriodResolver> {
        PeriodResolver::from_timezone_name(&self.calendar.timezone)
            .map_err(|e| PollError::Config(e.to_string()))
    }
}

/// Calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA timezone name
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

/// Decision configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Minimum participants for an event to happen
    pub threshold: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { threshold: 6 }
    }
}

/// Default visibility for days without an explicit setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub default_mode: VisibilityMode,
    /// Time of day (`HH:MM`) when counts are revealed
    #[serde(with = "time_of_day")]
    pub default_deadline: NaiveTime,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            default_mode: VisibilityMode::AlwaysVisible,
            default_deadline: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }
}

impl VisibilityConfig {
    pub fn default_setting(&self) -> VisibilitySetting {
        VisibilitySetting {
            mode: self.default_mode,
            deadline: self.default_deadline,
        }
    }
}

/// Archive configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Field delimiter for row-store documents
    pub delimiter: Delimiter,
}

/// The option catalog: which slots are offered on which days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub days: Vec<Day>,
    pub slots: Vec<Slot>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            days: Day::ALL.to_vec(),
            slots: Slot::ALL.to_vec(),
        }
    }
}

impl CatalogConfig {
    pub fn allows(&self, day: Day, slot: Slot) -> bool {
        self.days.contains(&day) && self.slots.contains(&slot)
    }
}

/// `HH:MM` serde for time-of-day fields. Seconds are accepted on input.
pub(crate) mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PollConfig::default();
        config.validate().unwrap();
        assert_eq!(config.decision.threshold, 6);
        assert_eq!(config.archive.delimiter, Delimiter::Comma);
        assert!(config.catalog.allows(Day::Friday, Slot::TENTATIVE));
    }

    #[test]
    fn test_yaml_roundtrip_and_partial_config() {
        let yaml = r#"
calendar:
  timezone: America/New_York
visibility:
  default_mode: hidden_until_deadline
  default_deadline: "17:30"
archive:
  delimiter: semicolon
"#;
        let config = PollConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.calendar.timezone, "America/New_York");
        assert_eq!(config.visibility.default_mode, VisibilityMode::HiddenUntilDeadline);
        assert_eq!(
            config.visibility.default_deadline,
            NaiveTime::from_hms_opt(17, 30, 0).unwrap()
        );
        assert_eq!(config.archive.delimiter, Delimiter::Semicolon);
        assert_eq!(config.decision.threshold, 6);

        let back = PollConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back.visibility.default_deadline, config.visibility.default_deadline);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PollConfig::default();
        config.calendar.timezone = "Nowhere/Special".to_string();
        assert!(matches!(config.validate(), Err(PollError::Config(_))));

        let mut config = PollConfig::default();
        config.decision.threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_restriction() {
        let catalog = CatalogConfig {
            days: vec![Day::Friday, Day::Saturday, Day::Sunday],
            slots: vec![Slot::LATE, Slot::TENTATIVE],
        };
        assert!(catalog.allows(Day::Friday, Slot::LATE));
        assert!(!catalog.allows(Day::Friday, Slot::EARLY));
        assert!(!catalog.allows(Day::Monday, Slot::LATE));
    }
}
