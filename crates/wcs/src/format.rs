//! Display formatting of world coordinates.
//!
//! Celestial values are shown as sexagesimal triples (`12h 03m 04.50s`,
//! `-20° 30' 15.0"`). When a column of values is rendered, components that
//! did not change with respect to the previous value are suppressed, so the
//! caller threads the returned triple into the next call.

use serde::{Deserialize, Serialize};

use crate::celestial::wrap_360;
use crate::error::{Result, WcsError};

/// Components closer than this are treated as unchanged.
pub const STABILITY_EPSILON: f64 = 1e-6;

/// Previous triple that forces every component to be shown.
pub const NO_PREVIOUS: [f64; 3] = [f64::NAN; 3];

/// Largest supported number of decimals on the last component.
const MAX_PRECISION: usize = 9;

/// Which display axis a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    X,
    Y,
    Z,
}

/// Symbol set used for degree marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Unicode,
    Ascii,
}

impl Language {
    fn degree_suffix(&self) -> &'static str {
        match self {
            Language::Unicode => "\u{00B0} ",
            Language::Ascii => "d ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayHint {
    DegreeAsArcMinutesArcSeconds,
    HoursAsMinutesSeconds,
    Plain,
}

impl DisplayHint {
    pub fn is_sexagesimal(&self) -> bool {
        !matches!(self, DisplayHint::Plain)
    }
}

/// Physical quantity displayed on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Longitude,
    Latitude,
    Velocity,
    Frequency,
    Generic,
}

/// How one axis is displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPreference {
    pub quantity: Quantity,
    pub hint: DisplayHint,
    /// Unit label appended to plain values.
    pub unit: String,
    /// Factor applied to world values before display.
    pub scale: f64,
}

impl UnitPreference {
    pub fn is_velocity(&self) -> bool {
        self.quantity == Quantity::Velocity
    }

    pub fn plain(quantity: Quantity, unit: impl Into<String>, scale: f64) -> Self {
        Self {
            quantity,
            hint: DisplayHint::Plain,
            unit: unit.into(),
            scale,
        }
    }
}

/// Display settings handed explicitly to formatting calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: Language,
    pub x: UnitPreference,
    pub y: UnitPreference,
    pub z: UnitPreference,
    /// Pad suppressed components with spaces so columns line up.
    pub additional_space: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            language: Language::Unicode,
            x: UnitPreference {
                quantity: Quantity::Longitude,
                hint: DisplayHint::HoursAsMinutesSeconds,
                unit: String::new(),
                scale: 1.0,
            },
            y: UnitPreference {
                quantity: Quantity::Latitude,
                hint: DisplayHint::DegreeAsArcMinutesArcSeconds,
                unit: String::new(),
                scale: 1.0,
            },
            z: UnitPreference::plain(Quantity::Velocity, "km/s", 0.001),
            additional_space: false,
        }
    }
}

impl DisplayConfig {
    pub fn unit(&self, role: AxisRole) -> &UnitPreference {
        match role {
            AxisRole::X => &self.x,
            AxisRole::Y => &self.y,
            AxisRole::Z => &self.z,
        }
    }

    pub fn unit_mut(&mut self, role: AxisRole) -> &mut UnitPreference {
        match role {
            AxisRole::X => &mut self.x,
            AxisRole::Y => &mut self.y,
            AxisRole::Z => &mut self.z,
        }
    }
}

/// Rendered value plus the component triple to pass to the next call.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedValue {
    pub text: String,
    pub components: [f64; 3],
}

fn changed(current: f64, previous: f64) -> bool {
    // NaN never compares as unchanged.
    !((current - previous).abs() <= STABILITY_EPSILON)
}

/// Format a world value according to the display preference of its axis.
pub fn format_world_value(
    value: f64,
    role: AxisRole,
    precision: usize,
    previous: [f64; 3],
    config: &DisplayConfig,
) -> Result<FormattedValue> {
    if !value.is_finite() {
        return Err(WcsError::OutOfRange(format!("{} is not a finite value", value)));
    }
    let pref = config.unit(role);

    match pref.hint {
        DisplayHint::Plain => Ok(format_plain(value, precision, pref)),
        hint => {
            let value = match pref.quantity {
                Quantity::Longitude => wrap_360(value),
                Quantity::Latitude if !(-90.0..=90.0).contains(&value) => {
                    return Err(WcsError::OutOfRange(format!(
                        "latitude {} outside [-90, 90]",
                        value
                    )));
                }
                _ => value,
            };
            Ok(format_sexagesimal(
                value,
                hint,
                precision.min(MAX_PRECISION),
                previous,
                config,
            ))
        }
    }
}

fn format_plain(value: f64, precision: usize, pref: &UnitPreference) -> FormattedValue {
    let scaled = value * pref.scale;
    let text = if pref.unit.is_empty() {
        format!("{:.*}", precision, scaled)
    } else {
        format!("{:.*} {}", precision, scaled, pref.unit)
    };
    FormattedValue {
        text,
        components: [scaled, 0.0, 0.0],
    }
}

fn format_sexagesimal(
    value: f64,
    hint: DisplayHint,
    precision: usize,
    previous: [f64; 3],
    config: &DisplayConfig,
) -> FormattedValue {
    let (value, suffixes) = match hint {
        DisplayHint::HoursAsMinutesSeconds => (value / 15.0, ["h ", "m ", "s"]),
        _ => (value, [config.language.degree_suffix(), "' ", "\""]),
    };

    // Round once on the smallest unit so carries propagate (59.9999s → 1m).
    let negative = value < 0.0;
    let unit = 10f64.powi(precision as i32);
    let per_first = 3600.0 * unit;
    let per_second = 60.0 * unit;
    let total = (value.abs() * per_first).round();
    let first = (total / per_first).floor();
    let remainder = total - first * per_first;
    let second = (remainder / per_second).floor();
    let third = (remainder - second * per_second) / unit;

    let components = [if negative { -first } else { first }, second, third];

    let show_first = changed(components[0], previous[0]);
    let show_second = show_first || changed(components[1], previous[1]);
    let show_third = show_second || changed(components[2], previous[2]);

    let first_text = format!(
        "{}{}{}",
        if negative { "-" } else { "" },
        first as i64,
        suffixes[0]
    );
    let second_text = format!("{:02}{}", second as i64, suffixes[1]);
    let third_text = if precision > 0 {
        format!(
            "{:0width$.prec$}{}",
            third,
            suffixes[2],
            width = precision + 3,
            prec = precision
        )
    } else {
        format!("{:02}{}", third as i64, suffixes[2])
    };

    let mut text = String::new();
    for (show, part) in [
        (show_first, first_text),
        (show_second, second_text),
        (show_third, third_text),
    ] {
        if show {
            text.push_str(&part);
        } else if config.additional_space {
            text.push_str(&" ".repeat(part.chars().count()));
        }
    }

    FormattedValue { text, components }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_formatting() {
        let config = DisplayConfig::default();
        // 180.5 deg = 12h 02m 00s
        let out = format_world_value(180.5, AxisRole::X, 1, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.text, "12h 02m 00.0s");
        assert_eq!(out.components, [12.0, 2.0, 0.0]);
    }

    #[test]
    fn test_degrees_formatting() {
        let config = DisplayConfig::default();
        let out = format_world_value(-20.50425, AxisRole::Y, 1, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.text, "-20\u{00B0} 30' 15.3\"");
        assert_eq!(out.components, [-20.0, 30.0, 15.3]);
    }

    #[test]
    fn test_ascii_degree_mark() {
        let config = DisplayConfig {
            language: Language::Ascii,
            ..DisplayConfig::default()
        };
        let out = format_world_value(45.0, AxisRole::Y, 0, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.text, "45d 00' 00\"");
    }

    #[test]
    fn test_carry_on_rounding() {
        let config = DisplayConfig::default();
        // 10° 59' 59.99" rounds up to 11° 00' 00.0"
        let value = 10.0 + 59.0 / 60.0 + 59.99 / 3600.0;
        let out = format_world_value(value, AxisRole::Y, 1, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.components, [11.0, 0.0, 0.0]);
        assert_eq!(out.text, "11\u{00B0} 00' 00.0\"");
    }

    #[test]
    fn test_unchanged_components_suppressed() {
        let config = DisplayConfig::default();
        let first = format_world_value(20.5, AxisRole::Y, 0, NO_PREVIOUS, &config).unwrap();
        let second =
            format_world_value(20.5 + 10.0 / 3600.0, AxisRole::Y, 0, first.components, &config)
                .unwrap();
        assert_eq!(second.text, "10\"");

        let third =
            format_world_value(20.6, AxisRole::Y, 0, second.components, &config).unwrap();
        assert_eq!(third.text, "36' 00\"");
    }

    #[test]
    fn test_additional_space_pads() {
        let config = DisplayConfig {
            additional_space: true,
            ..DisplayConfig::default()
        };
        let first = format_world_value(20.5, AxisRole::Y, 0, NO_PREVIOUS, &config).unwrap();
        let second =
            format_world_value(20.5 + 10.0 / 3600.0, AxisRole::Y, 0, first.components, &config)
                .unwrap();
        assert_eq!(second.text.chars().count(), first.text.chars().count());
        assert!(second.text.ends_with("10\""));
    }

    #[test]
    fn test_longitude_wraps() {
        let config = DisplayConfig::default();
        let out = format_world_value(-15.0, AxisRole::X, 0, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.text, "23h 00m 00s");
    }

    #[test]
    fn test_latitude_out_of_range() {
        let config = DisplayConfig::default();
        assert!(matches!(
            format_world_value(95.0, AxisRole::Y, 0, NO_PREVIOUS, &config),
            Err(WcsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_plain_velocity() {
        let config = DisplayConfig::default();
        let out = format_world_value(12500.0, AxisRole::Z, 2, NO_PREVIOUS, &config).unwrap();
        assert_eq!(out.text, "12.50 km/s");
        assert_eq!(out.components, [12.5, 0.0, 0.0]);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"language": "ascii", "additional_space": true}"#;
        let config: DisplayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.language, Language::Ascii);
        assert!(config.additional_space);
        assert_eq!(config.x.hint, DisplayHint::HoursAsMinutesSeconds);
    }
}
