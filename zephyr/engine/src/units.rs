//! Display units for overlay values and readouts.
//! Products store SI values (m/s, K); conversion happens only at the display edge.

use std::fmt;

/// A display unit with its conversion from the product's SI value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Meters per second (SI, identity).
    MetersPerSecond,
    /// Kilometers per hour.
    KilometersPerHour,
    /// Nautical miles per hour.
    Knots,
    /// Statute miles per hour.
    MilesPerHour,
    /// Kelvin (SI, identity).
    Kelvin,
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl Unit {
    /// Speed units in the order a readout cycles through them.
    pub const SPEED: [Unit; 4] =
        [Unit::KilometersPerHour, Unit::MetersPerSecond, Unit::Knots, Unit::MilesPerHour];
    /// Temperature units in the order a readout cycles through them.
    pub const TEMPERATURE: [Unit; 3] = [Unit::Celsius, Unit::Fahrenheit, Unit::Kelvin];

    /// Short label shown next to values.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::MetersPerSecond => "m/s",
            Unit::KilometersPerHour => "km/h",
            Unit::Knots => "kn",
            Unit::MilesPerHour => "mph",
            Unit::Kelvin => "K",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
        }
    }

    /// Fraction digits used by [`Unit::format`].
    pub fn precision(self) -> usize {
        match self {
            Unit::MetersPerSecond | Unit::Kelvin | Unit::Celsius | Unit::Fahrenheit => 1,
            Unit::KilometersPerHour | Unit::Knots | Unit::MilesPerHour => 0,
        }
    }

    /// Convert an SI value (m/s or K) into this unit.
    pub fn convert(self, si: f64) -> f64 {
        match self {
            Unit::MetersPerSecond | Unit::Kelvin => si,
            Unit::KilometersPerHour => si * 3.6,
            Unit::Knots => si * 1.943_844,
            Unit::MilesPerHour => si * 2.236_936,
            Unit::Celsius => si - 273.15,
            Unit::Fahrenheit => si * 9.0 / 5.0 - 459.67,
        }
    }

    /// Converted value with this unit's precision and symbol, e.g. `"36 km/h"`.
    pub fn format(self, si: f64) -> String {
        format!("{:.*} {}", self.precision(), self.convert(si), self.symbol())
    }

    /// True for units that measure speed.
    pub fn is_speed(self) -> bool {
        Self::SPEED.contains(&self)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_conversions() {
        assert!((Unit::KilometersPerHour.convert(10.0) - 36.0).abs() < 1e-9);
        assert!((Unit::Knots.convert(1.0) - 1.943_844).abs() < 1e-9);
        assert_eq!(Unit::KilometersPerHour.format(10.0), "36 km/h");
        assert_eq!(Unit::MetersPerSecond.format(2.26), "2.3 m/s");
    }

    #[test]
    fn temperature_conversions() {
        assert!(Unit::Celsius.convert(273.15).abs() < 1e-9);
        assert!((Unit::Fahrenheit.convert(273.15) - 32.0).abs() < 1e-9);
        assert_eq!(Unit::Celsius.format(300.0), "26.9 °C");
        assert!(!Unit::Kelvin.is_speed() && Unit::Knots.is_speed());
    }
}
