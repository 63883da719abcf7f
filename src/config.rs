//! User-facing settings.
//!
//! The bass boost has two knobs: the corner frequency of the low-pass filter that extracts the
//! bass, and a gain that sets how much of it is added back. They come either as preference
//! strings (which is how a host application stores them) or from a TOML file such as
//! ```toml
//! center_frequency = 60
//! gain = 400
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::boost::GAIN_TO_RESONANCE;
use crate::{Error, Result};

/// The corner frequency used when none is configured, in Hz.
pub const DEFAULT_CENTER_FREQUENCY: f64 = 55.0;
/// The gain used when none is configured. Zero turns the boost off.
pub const DEFAULT_GAIN: f64 = 0.0;

/// The bass-boost settings.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// The corner frequency of the bass band, in Hz.
    pub center_frequency: f64,
    /// The boost strength. It is turned into the filter's resonance by [`Settings::resonance`].
    pub gain: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            center_frequency: DEFAULT_CENTER_FREQUENCY,
            gain: DEFAULT_GAIN,
        }
    }
}

fn parse_preference(key: &'static str, value: Option<&str>, default: f64) -> Result<f64> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| Error::InvalidSetting {
            key,
            value: v.to_owned(),
        }),
    }
}

impl Settings {
    /// The preference key holding the corner frequency.
    pub const CENTER_FREQUENCY_KEY: &'static str = "center_frequency";
    /// The preference key holding the gain.
    pub const GAIN_KEY: &'static str = "gain";

    /// Builds settings from string-valued preferences; missing ones take their defaults.
    pub fn from_preferences(
        center_frequency: Option<&str>,
        gain: Option<&str>,
    ) -> Result<Settings> {
        Settings {
            center_frequency: parse_preference(
                Settings::CENTER_FREQUENCY_KEY,
                center_frequency,
                DEFAULT_CENTER_FREQUENCY,
            )?,
            gain: parse_preference(Settings::GAIN_KEY, gain, DEFAULT_GAIN)?,
        }
        .validated()
    }

    /// Parses settings from TOML; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(s)?;
        settings.validated()
    }

    /// Reads settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings> {
        Settings::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Checks that the values can be fed to the filter.
    ///
    /// This can't check the corner frequency against Nyquist, because the sample rate is only
    /// known once audio arrives.
    pub fn validated(self) -> Result<Settings> {
        if !(self.center_frequency.is_finite() && self.center_frequency > 0.0) {
            return Err(Error::InvalidSetting {
                key: Settings::CENTER_FREQUENCY_KEY,
                value: self.center_frequency.to_string(),
            });
        }
        if !(self.gain.is_finite() && self.gain >= 0.0) {
            return Err(Error::InvalidSetting {
                key: Settings::GAIN_KEY,
                value: self.gain.to_string(),
            });
        }
        Ok(self)
    }

    /// The filter resonance corresponding to the gain.
    pub fn resonance(&self) -> f64 {
        self.gain / GAIN_TO_RESONANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_defaults() {
        let s = Settings::from_preferences(None, None).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.center_frequency, 55.0);
        assert_eq!(s.resonance(), 0.0);
    }

    #[test]
    fn preference_strings() {
        let s = Settings::from_preferences(Some("80"), Some(" 333 ")).unwrap();
        assert_eq!(s.center_frequency, 80.0);
        assert_eq!(s.gain, 333.0);
        assert!((s.resonance() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn bad_preferences() {
        match Settings::from_preferences(Some("loud"), None) {
            Err(Error::InvalidSetting { key, value }) => {
                assert_eq!(key, "center_frequency");
                assert_eq!(value, "loud");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Settings::from_preferences(None, Some("-3")),
            Err(Error::InvalidSetting { key: "gain", .. })
        ));
        assert!(matches!(
            Settings::from_preferences(Some("0"), None),
            Err(Error::InvalidSetting {
                key: "center_frequency",
                ..
            })
        ));
        assert!(Settings::from_preferences(Some("NaN"), None).is_err());
    }

    #[test]
    fn toml_settings() {
        let s = Settings::from_toml_str("center_frequency = 60\ngain = 120.5\n").unwrap();
        assert_eq!(s.center_frequency, 60.0);
        assert_eq!(s.gain, 120.5);

        let s = Settings::from_toml_str("gain = 10").unwrap();
        assert_eq!(s.center_frequency, DEFAULT_CENTER_FREQUENCY);

        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn bad_toml() {
        assert!(matches!(
            Settings::from_toml_str("gain = \"lots\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("volume = 3"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("gain = -1"),
            Err(Error::InvalidSetting { .. })
        ));
    }
}
