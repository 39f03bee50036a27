//! Geotechnical alert levels.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Discrete geotechnical state, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// No rule triggered.
    #[default]
    Normal,
    /// Early warning.
    Alerta,
    /// Highest severity.
    Alarma,
}

impl AlertLevel {
    /// All levels, lowest severity first.
    pub const ALL: [AlertLevel; 3] = [Self::Normal, Self::Alerta, Self::Alarma];

    /// Raise severity by exactly one level, saturating at ALARMA.
    pub fn elevate(self) -> Self {
        match self {
            Self::Normal => Self::Alerta,
            Self::Alerta | Self::Alarma => Self::Alarma,
        }
    }

    /// Whether this level opens or extends an event.
    pub fn is_elevated(self) -> bool {
        self != Self::Normal
    }

    /// Stable label used in logs, metrics, and flat snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Alerta => "ALERTA",
            Self::Alarma => "ALARMA",
        }
    }

    /// Numeric encoding for gauges (0/1/2).
    pub fn severity(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Alerta => 1,
            Self::Alarma => 2,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "ALERTA" => Ok(Self::Alerta),
            "ALARMA" => Ok(Self::Alarma),
            other => Err(CoreError::UnknownLevel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevate_saturates() {
        assert_eq!(AlertLevel::Normal.elevate(), AlertLevel::Alerta);
        assert_eq!(AlertLevel::Alerta.elevate(), AlertLevel::Alarma);
        assert_eq!(AlertLevel::Alarma.elevate(), AlertLevel::Alarma);
    }

    #[test]
    fn test_ordering_follows_severity() {
        assert!(AlertLevel::Normal < AlertLevel::Alerta);
        assert!(AlertLevel::Alerta < AlertLevel::Alarma);
        assert_eq!(AlertLevel::ALL.iter().max(), Some(&AlertLevel::Alarma));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("alerta".parse::<AlertLevel>().unwrap(), AlertLevel::Alerta);
        assert_eq!(" ALARMA ".parse::<AlertLevel>().unwrap(), AlertLevel::Alarma);
        assert!("PRE-ALERTA".parse::<AlertLevel>().is_err());
        assert_eq!(AlertLevel::Normal.to_string(), "NORMAL");
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&AlertLevel::Alarma).unwrap();
        assert_eq!(json, "\"ALARMA\"");
        let back: AlertLevel = serde_json::from_str("\"NORMAL\"").unwrap();
        assert_eq!(back, AlertLevel::Normal);
    }
}
