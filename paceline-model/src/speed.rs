use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};
use crate::ids::ChannelName;

/// Playback rate multiplier written to the player.
///
/// Values are plain `f64`s. Anything finite is accepted: negative or absurdly
/// large rates are passed through to the player untouched, which may reject
/// them on its own.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    pub const fn new(rate: f64) -> Self {
        Speed(rate)
    }

    pub const fn get(self) -> f64 {
        self.0
    }

    /// Parse a speed from user or storage text (`"1.5"`, `" 2 "`).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(rate) if rate.is_finite() => Ok(Speed(rate)),
            _ => Err(ModelError::InvalidSpeed(raw.to_string())),
        }
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::NORMAL
    }
}

impl FromStr for Speed {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Speed::parse(s)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Speed as it appears in storage and on the wire: either a JSON number or a
/// numeric string. Older settings saved every value as a string.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SpeedValue {
    Number(f64),
    Text(String),
}

impl SpeedValue {
    pub fn to_speed(&self) -> Result<Speed> {
        match self {
            SpeedValue::Number(rate) if rate.is_finite() => Ok(Speed(*rate)),
            SpeedValue::Number(rate) => {
                Err(ModelError::InvalidSpeed(rate.to_string()))
            }
            SpeedValue::Text(raw) => Speed::parse(raw),
        }
    }
}

impl From<Speed> for SpeedValue {
    fn from(speed: Speed) -> Self {
        SpeedValue::Text(speed.to_string())
    }
}

impl From<&str> for SpeedValue {
    fn from(raw: &str) -> Self {
        SpeedValue::Text(raw.to_string())
    }
}

/// The eight rates offered by the settings list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpeedPreset {
    Quarter,
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    OneAndQuarter,
    OneAndHalf,
    OneAndThreeQuarters,
    Double,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 8] = [
        SpeedPreset::Quarter,
        SpeedPreset::Half,
        SpeedPreset::ThreeQuarters,
        SpeedPreset::Normal,
        SpeedPreset::OneAndQuarter,
        SpeedPreset::OneAndHalf,
        SpeedPreset::OneAndThreeQuarters,
        SpeedPreset::Double,
    ];

    pub const fn speed(self) -> Speed {
        match self {
            SpeedPreset::Quarter => Speed(0.25),
            SpeedPreset::Half => Speed(0.5),
            SpeedPreset::ThreeQuarters => Speed(0.75),
            SpeedPreset::Normal => Speed(1.0),
            SpeedPreset::OneAndQuarter => Speed(1.25),
            SpeedPreset::OneAndHalf => Speed(1.5),
            SpeedPreset::OneAndThreeQuarters => Speed(1.75),
            SpeedPreset::Double => Speed(2.0),
        }
    }

    /// Exact match against a preset; arbitrary speeds yield `None`.
    pub fn from_speed(speed: Speed) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.speed() == speed)
    }

    /// Text shown in the selection list, e.g. `1 (Normal)`.
    pub fn label(self) -> String {
        match self {
            SpeedPreset::Normal => format!("{} (Normal)", self.speed()),
            other => other.speed().to_string(),
        }
    }
}

impl FromStr for SpeedPreset {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let speed = Speed::parse(s)?;
        SpeedPreset::from_speed(speed)
            .ok_or_else(|| ModelError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.speed().fmt(f)
    }
}

impl From<SpeedPreset> for Speed {
    fn from(preset: SpeedPreset) -> Self {
        preset.speed()
    }
}

/// Per-channel overrides keyed by exact display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedOverrides {
    entries: HashMap<ChannelName, Speed>,
}

impl SpeedOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &str) -> Option<Speed> {
        self.entries.get(channel).copied()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    pub fn insert(&mut self, channel: ChannelName, speed: Speed) -> Option<Speed> {
        self.entries.insert(channel, speed)
    }

    pub fn remove(&mut self, channel: &str) -> Option<Speed> {
        self.entries.remove(channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelName, &Speed)> {
        self.entries.iter()
    }

    /// Entries ordered by channel name, for stable listings.
    pub fn sorted(&self) -> Vec<(ChannelName, Speed)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(channel, speed)| (channel.clone(), *speed))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl FromIterator<(ChannelName, Speed)> for SpeedOverrides {
    fn from_iter<T: IntoIterator<Item = (ChannelName, Speed)>>(iter: T) -> Self {
        SpeedOverrides {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Snapshot of everything needed to pick a rate for a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedPolicy {
    pub overrides: SpeedOverrides,
    pub default_speed: Speed,
}

impl SpeedPolicy {
    pub fn new(overrides: SpeedOverrides, default_speed: Speed) -> Self {
        Self {
            overrides,
            default_speed,
        }
    }

    /// Override for `channel` when one exists, otherwise the global default.
    pub fn resolve(&self, channel: Option<&ChannelName>) -> Speed {
        channel
            .and_then(|name| self.overrides.get(name.as_str()))
            .unwrap_or(self.default_speed)
    }
}
