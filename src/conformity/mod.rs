//! Room conformity scoring.
//!
//! [`evaluate`] compares the latest per-quantity averages of a room against
//! its active threshold set and classifies the room:
//!
//! | non-compliant / tested | level       | score |
//! |------------------------|-------------|-------|
//! | 0                      | `EXCELLENT` | 1     |
//! | below 0.5              | `GOOD`      | 2     |
//! | below 0.75             | `MEDIUM`    | 3     |
//! | 0.75 and above         | `BAD`       | 4     |
//!
//! A quantity counts once against the ratio even when it breaks both of its
//! bounds (only possible with inverted thresholds). Readings equal to a bound
//! are compliant.
//!
//! The scoring itself only produces structured [`Violation`]s; the
//! human-readable alert (`"Temperature too high: 30.0°C > 28.0°C"`) is the
//! `Display` of a violation and is only rendered on serialisation.

pub mod report;

use std::fmt;

use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::{
    db::models::{RoomAverages, SensorType, ThresholdSet},
    error::{Error, Result},
};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Latest average per quantity; `None` means no sensor or no data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Averages {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

impl Averages {
    pub fn get(&self, quantity: SensorType) -> Option<f64> {
        match quantity {
            SensorType::Temperature => self.temperature,
            SensorType::Humidity => self.humidity,
            SensorType::Pressure => self.pressure,
        }
    }
}

impl From<&RoomAverages> for Averages {
    fn from(a: &RoomAverages) -> Self {
        Self {
            temperature: a.avg_temperature,
            humidity: a.avg_humidity,
            pressure: a.avg_pressure,
        }
    }
}

/// Comfort bounds; an absent bound is not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub pressure_high: Option<f64>,
    pub pressure_low: Option<f64>,
}

impl Thresholds {
    /// `(low, high)` bounds of `quantity`.
    pub fn bounds(&self, quantity: SensorType) -> (Option<f64>, Option<f64>) {
        match quantity {
            SensorType::Temperature => (self.temp_low, self.temp_high),
            SensorType::Humidity => (self.humidity_low, self.humidity_high),
            SensorType::Pressure => (self.pressure_low, self.pressure_high),
        }
    }
}

impl From<&ThresholdSet> for Thresholds {
    fn from(t: &ThresholdSet) -> Self {
        Self {
            temp_high: t.temp_high,
            temp_low: t.temp_low,
            humidity_high: t.humidity_high,
            humidity_low: t.humidity_low,
            pressure_high: t.pressure_high,
            pressure_low: t.pressure_low,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Room-level status. [`evaluate`] only yields the first two; the others are
/// set by the aggregation in [`report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Compliant,
    NonCompliant,
    NoData,
    ThresholdsUndefined,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Compliant => "COMPLIANT",
            Status::NonCompliant => "NON_COMPLIANT",
            Status::NoData => "NO_DATA",
            Status::ThresholdsUndefined => "THRESHOLDS_UNDEFINED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Excellent,
    Good,
    Medium,
    Bad,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Excellent, Level::Good, Level::Medium, Level::Bad];

    pub fn from_ratio(violation_ratio: f64) -> Self {
        if violation_ratio <= 0.0 {
            Level::Excellent
        } else if violation_ratio < 0.5 {
            Level::Good
        } else if violation_ratio < 0.75 {
            Level::Medium
        } else {
            Level::Bad
        }
    }

    /// 1 (best) to 4 (worst).
    pub fn score(self) -> u8 {
        match self {
            Level::Excellent => 1,
            Level::Good => 2,
            Level::Medium => 3,
            Level::Bad => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Excellent => "EXCELLENT",
            Level::Good => "GOOD",
            Level::Medium => "MEDIUM",
            Level::Bad => "BAD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Low,
    High,
}

/// One broken bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub quantity: SensorType,
    pub side: Side,
    pub value: f64,
    pub bound: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.quantity.unit();
        let (word, op) = match self.side {
            Side::Low => ("low", '<'),
            Side::High => ("high", '>'),
        };
        write!(
            f,
            "{} too {word}: {}{unit} {op} {}{unit}",
            self.quantity.label(),
            format_reading(self.value),
            format_reading(self.bound),
        )
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Verdict for a single tested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct QuantityCheck {
    pub quantity: SensorType,
    pub value: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Evaluation {
    pub status: Status,
    /// Ordered temperature, humidity, pressure; low before high.
    #[serde(rename = "alerts")]
    #[schema(value_type = Vec<String>)]
    pub violations: Vec<Violation>,
    pub details: Vec<QuantityCheck>,
    pub score: u8,
    pub level: Level,
    pub parameters_tested: u32,
    pub parameters_non_compliant: u32,
    pub compliance_percentage: f64,
}

impl Evaluation {
    pub fn alerts(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    pub fn violation_ratio(&self) -> f64 {
        if self.parameters_tested == 0 {
            0.0
        } else {
            f64::from(self.parameters_non_compliant) / f64::from(self.parameters_tested)
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score `averages` against `thresholds`.
///
/// Fails with [`Error::InvalidMeasurement`] if a present average or an
/// applicable bound is NaN or infinite.
pub fn evaluate(averages: &Averages, thresholds: &Thresholds) -> Result<Evaluation> {
    let mut violations = Vec::new();
    let mut details = Vec::with_capacity(SensorType::ALL.len());
    let mut tested = 0u32;
    let mut non_compliant = 0u32;

    for quantity in SensorType::ALL {
        let Some(value) = averages.get(quantity) else {
            continue;
        };
        let (low, high) = thresholds.bounds(quantity);
        for v in [Some(value), low, high].into_iter().flatten() {
            ensure_finite(quantity, v)?;
        }

        tested += 1;
        let before = violations.len();
        if let Some(bound) = low.filter(|&b| value < b) {
            violations.push(Violation { quantity, side: Side::Low, value, bound });
        }
        if let Some(bound) = high.filter(|&b| value > b) {
            violations.push(Violation { quantity, side: Side::High, value, bound });
        }

        let compliant = violations.len() == before;
        if !compliant {
            non_compliant += 1;
        }
        details.push(QuantityCheck { quantity, value, low, high, compliant });
    }

    let violation_ratio = if tested == 0 {
        0.0
    } else {
        f64::from(non_compliant) / f64::from(tested)
    };
    let level = Level::from_ratio(violation_ratio);
    let compliance_percentage = if tested == 0 {
        100.0
    } else {
        round_to(f64::from(tested - non_compliant) / f64::from(tested) * 100.0, 1)
    };
    let status = if violations.is_empty() {
        Status::Compliant
    } else {
        Status::NonCompliant
    };

    Ok(Evaluation {
        status,
        violations,
        details,
        score: level.score(),
        level,
        parameters_tested: tested,
        parameters_non_compliant: non_compliant,
        compliance_percentage,
    })
}

fn ensure_finite(quantity: SensorType, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidMeasurement { quantity, value })
    }
}

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Shortest representation that keeps at least one decimal: `30` → `30.0`,
/// `1013.25` → `1013.25`. Integral values from 1e15 up print as plain
/// digits with no decimal.
fn format_reading(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reference_thresholds() -> Thresholds {
        Thresholds {
            temp_high: Some(28.0),
            temp_low: Some(18.0),
            humidity_high: Some(70.0),
            humidity_low: Some(40.0),
            pressure_high: Some(1020.0),
            pressure_low: Some(1000.0),
        }
    }

    fn averages(t: f64, h: f64, p: f64) -> Averages {
        Averages {
            temperature: Some(t),
            humidity: Some(h),
            pressure: Some(p),
        }
    }

    // -----------------------------------------------------------------------
    // Reference scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn everything_within_bounds_is_excellent() {
        let e = evaluate(&averages(25.0, 60.0, 1013.0), &reference_thresholds()).unwrap();
        assert_eq!(e.status, Status::Compliant);
        assert!(e.violations.is_empty());
        assert_eq!(e.score, 1);
        assert_eq!(e.level, Level::Excellent);
        assert_eq!(e.parameters_tested, 3);
        assert_eq!(e.parameters_non_compliant, 0);
        assert_eq!(e.compliance_percentage, 100.0);
        assert!(e.details.iter().all(|d| d.compliant));
    }

    #[test]
    fn one_hot_room_is_good() {
        let e = evaluate(&averages(30.0, 60.0, 1013.0), &reference_thresholds()).unwrap();
        assert_eq!(e.status, Status::NonCompliant);
        assert_eq!(e.alerts(), vec!["Temperature too high: 30.0°C > 28.0°C"]);
        assert_eq!(e.score, 2);
        assert_eq!(e.level, Level::Good);
        assert_eq!(e.parameters_non_compliant, 1);
        assert_eq!(e.compliance_percentage, 66.7);
        assert!(!e.details[0].compliant);
        assert!(e.details[1].compliant);
    }

    #[test]
    fn two_violations_are_medium() {
        let e = evaluate(&averages(30.0, 80.0, 1013.0), &reference_thresholds()).unwrap();
        assert_eq!(e.violations.len(), 2);
        assert_eq!(e.score, 3);
        assert_eq!(e.level, Level::Medium);
        assert_eq!(e.compliance_percentage, 33.3);
    }

    #[test]
    fn three_violations_are_bad() {
        let e = evaluate(&averages(35.0, 20.0, 950.0), &reference_thresholds()).unwrap();
        assert_eq!(
            e.alerts(),
            vec![
                "Temperature too high: 35.0°C > 28.0°C",
                "Humidity too low: 20.0% < 40.0%",
                "Pressure too low: 950.0hPa < 1000.0hPa",
            ]
        );
        assert_eq!(e.score, 4);
        assert_eq!(e.level, Level::Bad);
        assert_eq!(e.parameters_non_compliant, 3);
        assert_eq!(e.compliance_percentage, 0.0);
    }

    #[test]
    fn nothing_to_test_is_excellent() {
        let e = evaluate(&Averages::default(), &Thresholds::default()).unwrap();
        assert_eq!(e.parameters_tested, 0);
        assert_eq!(e.score, 1);
        assert_eq!(e.level, Level::Excellent);
        assert_eq!(e.compliance_percentage, 100.0);
        assert!(e.violations.is_empty());
        assert!(e.details.is_empty());
    }

    #[test]
    fn single_quantity_out_of_bounds_is_bad() {
        let a = Averages { temperature: Some(30.0), ..Default::default() };
        let t = Thresholds { temp_high: Some(28.0), temp_low: Some(18.0), ..Default::default() };
        let e = evaluate(&a, &t).unwrap();
        assert_eq!(e.parameters_tested, 1);
        assert_eq!(e.parameters_non_compliant, 1);
        assert_eq!(e.violation_ratio(), 1.0);
        assert_eq!(e.score, 4);
        assert_eq!(e.level, Level::Bad);
    }

    // -----------------------------------------------------------------------
    // Edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn readings_equal_to_a_bound_are_compliant() {
        let e = evaluate(&averages(28.0, 40.0, 1020.0), &reference_thresholds()).unwrap();
        assert_eq!(e.status, Status::Compliant);
        let e = evaluate(&averages(18.0, 70.0, 1000.0), &reference_thresholds()).unwrap();
        assert_eq!(e.status, Status::Compliant);
    }

    #[test]
    fn half_violated_is_medium_not_good() {
        let a = Averages { temperature: Some(30.0), humidity: Some(60.0), pressure: None };
        let e = evaluate(&a, &reference_thresholds()).unwrap();
        assert_eq!(e.violation_ratio(), 0.5);
        assert_eq!(e.level, Level::Medium);
        assert_eq!(e.compliance_percentage, 50.0);
    }

    #[test]
    fn ratio_buckets() {
        assert_eq!(Level::from_ratio(0.0), Level::Excellent);
        assert_eq!(Level::from_ratio(0.01), Level::Good);
        assert_eq!(Level::from_ratio(0.49), Level::Good);
        assert_eq!(Level::from_ratio(0.5), Level::Medium);
        assert_eq!(Level::from_ratio(0.74), Level::Medium);
        assert_eq!(Level::from_ratio(0.75), Level::Bad);
        assert_eq!(Level::from_ratio(1.0), Level::Bad);
    }

    #[test]
    fn absent_bounds_are_not_enforced() {
        let t = Thresholds {
            temp_high: Some(28.0),
            temp_low: None,
            humidity_high: None,
            humidity_low: Some(40.0),
            ..reference_thresholds()
        };
        let e = evaluate(&averages(-5.0, 99.0, 1013.0), &t).unwrap();
        assert_eq!(e.status, Status::Compliant);
        assert_eq!(e.details[0].low, None);
        assert_eq!(e.details[1].high, None);
    }

    #[test]
    fn inverted_bounds_count_the_quantity_once() {
        // low > high: any value between them breaks both sides.
        let t = Thresholds { temp_low: Some(30.0), temp_high: Some(20.0), ..Default::default() };
        let a = Averages { temperature: Some(25.0), humidity: Some(50.0), ..Default::default() };
        let e = evaluate(&a, &t).unwrap();
        assert_eq!(
            e.alerts(),
            vec![
                "Temperature too low: 25.0°C < 30.0°C",
                "Temperature too high: 25.0°C > 20.0°C",
            ]
        );
        assert_eq!(e.parameters_tested, 2);
        assert_eq!(e.parameters_non_compliant, 1);
        assert_eq!(e.level, Level::Medium);
    }

    #[test]
    fn quantities_without_average_are_skipped() {
        let a = Averages { pressure: Some(1030.0), ..Default::default() };
        let e = evaluate(&a, &reference_thresholds()).unwrap();
        assert_eq!(e.parameters_tested, 1);
        assert_eq!(e.details.len(), 1);
        assert_eq!(e.details[0].quantity, SensorType::Pressure);
        assert_eq!(e.alerts(), vec!["Pressure too high: 1030.0hPa > 1020.0hPa"]);
    }

    #[test]
    fn non_finite_average_is_rejected() {
        let a = Averages { humidity: Some(f64::NAN), ..Default::default() };
        let err = evaluate(&a, &Thresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMeasurement { quantity: SensorType::Humidity, .. }
        ));
    }

    #[test]
    fn non_finite_bound_is_rejected() {
        let a = Averages { temperature: Some(20.0), ..Default::default() };
        let t = Thresholds { temp_high: Some(f64::INFINITY), ..Default::default() };
        assert!(evaluate(&a, &t).is_err());
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn fractional_readings_keep_their_digits() {
        let v = Violation {
            quantity: SensorType::Pressure,
            side: Side::High,
            value: 1021.25,
            bound: 1020.0,
        };
        assert_eq!(v.to_string(), "Pressure too high: 1021.25hPa > 1020.0hPa");
    }

    #[test]
    fn evaluation_serialises_alerts_as_strings() {
        let e = evaluate(&averages(30.0, 60.0, 1013.0), &reference_thresholds()).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["status"], "NON_COMPLIANT");
        assert_eq!(json["level"], "GOOD");
        assert_eq!(json["score"], 2);
        assert_eq!(json["alerts"][0], "Temperature too high: 30.0°C > 28.0°C");
        assert_eq!(json["details"][0]["quantity"], "temperature");
        assert_eq!(json["details"][0]["compliant"], false);
        assert_eq!(json["compliance_percentage"], 66.7);
    }

    #[test]
    fn status_strings() {
        assert_eq!(serde_json::to_value(Status::NoData).unwrap(), "NO_DATA");
        assert_eq!(Status::ThresholdsUndefined.to_string(), "THRESHOLDS_UNDEFINED");
        assert_eq!(serde_json::to_value(Level::Medium).unwrap(), Level::Medium.as_str());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn reading() -> impl Strategy<Value = f64> {
        -100.0f64..2000.0
    }

    fn any_averages() -> impl Strategy<Value = Averages> {
        (
            proptest::option::of(reading()),
            proptest::option::of(reading()),
            proptest::option::of(reading()),
        )
            .prop_map(|(temperature, humidity, pressure)| Averages { temperature, humidity, pressure })
    }

    fn any_thresholds() -> impl Strategy<Value = Thresholds> {
        (
            proptest::option::of(reading()),
            proptest::option::of(reading()),
            proptest::option::of(reading()),
            proptest::option::of(reading()),
            proptest::option::of(reading()),
            proptest::option::of(reading()),
        )
            .prop_map(|(th, tl, hh, hl, ph, pl)| Thresholds {
                temp_high: th,
                temp_low: tl,
                humidity_high: hh,
                humidity_low: hl,
                pressure_high: ph,
                pressure_low: pl,
            })
    }

    #[test]
    fn reading_formatting() {
        assert_eq!(format_reading(30.0), "30.0");
        assert_eq!(format_reading(-5.0), "-5.0");
        assert_eq!(format_reading(1013.25), "1013.25");
        assert_eq!(format_reading(0.1), "0.1");
        assert_eq!(format_reading(1e16), "10000000000000000");
        assert_eq!(format_reading(-1e16), "-10000000000000000");
    }

    proptest! {
        /// Without bounds nothing can be violated.
        #[test]
        fn unbounded_rooms_are_always_excellent(a in any_averages()) {
            let e = evaluate(&a, &Thresholds::default()).unwrap();
            prop_assert_eq!(e.status, Status::Compliant);
            prop_assert_eq!(e.level, Level::Excellent);
            prop_assert_eq!(e.compliance_percentage, 100.0);
        }

        /// Values strictly inside their bounds never raise an alert.
        #[test]
        fn strictly_inside_bounds_is_compliant(
            a in any_averages(),
            below in 0.001f64..100.0,
            above in 0.001f64..100.0,
        ) {
            let around = |v: Option<f64>| (v.map(|v| v - below), v.map(|v| v + above));
            let (temp_low, temp_high) = around(a.temperature);
            let (humidity_low, humidity_high) = around(a.humidity);
            let (pressure_low, pressure_high) = around(a.pressure);
            let t = Thresholds { temp_high, temp_low, humidity_high, humidity_low, pressure_high, pressure_low };

            let e = evaluate(&a, &t).unwrap();
            prop_assert_eq!(e.status, Status::Compliant);
            prop_assert!(e.violations.is_empty());
            prop_assert_eq!(e.score, 1);
        }

        #[test]
        fn evaluation_is_deterministic(a in any_averages(), t in any_thresholds()) {
            prop_assert_eq!(evaluate(&a, &t).unwrap(), evaluate(&a, &t).unwrap());
        }

        /// Adding a violated quantity never improves the level.
        #[test]
        fn extra_violation_never_improves_the_level(
            temperature in proptest::option::of(reading()),
            humidity in proptest::option::of(reading()),
            t in any_thresholds(),
            excess in 0.001f64..100.0,
        ) {
            let t = Thresholds { pressure_high: Some(1020.0), ..t };
            let without = Averages { temperature, humidity, pressure: None };
            let with = Averages { pressure: Some(1020.0 + excess), ..without };

            let before = evaluate(&without, &t).unwrap();
            let after = evaluate(&with, &t).unwrap();
            prop_assert!(after.violation_ratio() >= before.violation_ratio());
            prop_assert!(after.level >= before.level);
        }

        /// With a single tested quantity only the extreme levels are reachable.
        #[test]
        fn single_quantity_is_binary(value in reading(), t in any_thresholds()) {
            let a = Averages { humidity: Some(value), ..Default::default() };
            let e = evaluate(&a, &t).unwrap();
            prop_assert!(matches!(e.level, Level::Excellent | Level::Bad));
        }
    }
}
