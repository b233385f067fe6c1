use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::{evaluate, round_to, Averages, Evaluation, Level, Status, Thresholds};
use crate::{
    db::models::{Room, RoomAverages, SensorType, ThresholdSet},
    error::Result,
};

pub const NO_DATA_ALERT: &str = "No sensor data available";
pub const THRESHOLDS_UNDEFINED_ALERT: &str = "Conformity thresholds not defined for this room";

/// Conformity verdict of one room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomConformity {
    pub room: Room,
    pub status: Status,
    pub alerts: Vec<String>,
    pub averages: Option<RoomAverages>,
    pub thresholds: Option<ThresholdSet>,
    /// Present only when the room was actually scored.
    pub evaluation: Option<Evaluation>,
}

impl RoomConformity {
    pub fn no_data(room: Room, averages: Option<RoomAverages>) -> Self {
        Self {
            room,
            status: Status::NoData,
            alerts: vec![NO_DATA_ALERT.to_owned()],
            averages,
            thresholds: None,
            evaluation: None,
        }
    }

    /// Scores `room` when it has both data and thresholds, otherwise reports
    /// which of the two is missing.
    pub fn assess(
        room: Room,
        averages: RoomAverages,
        thresholds: Option<ThresholdSet>,
    ) -> Result<Self> {
        if !averages.has_data() {
            return Ok(Self::no_data(room, Some(averages)));
        }

        let Some(thresholds) = thresholds else {
            return Ok(Self {
                room,
                status: Status::ThresholdsUndefined,
                alerts: vec![THRESHOLDS_UNDEFINED_ALERT.to_owned()],
                averages: Some(averages),
                thresholds: None,
                evaluation: None,
            });
        };

        let evaluation = evaluate(&Averages::from(&averages), &Thresholds::from(&thresholds))?;
        Ok(Self {
            room,
            status: evaluation.status,
            alerts: evaluation.alerts(),
            averages: Some(averages),
            thresholds: Some(thresholds),
            evaluation: Some(evaluation),
        })
    }
}

// ---------------------------------------------------------------------------
// Building summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Statistics {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub no_data: usize,
    pub thresholds_undefined: usize,
    /// Share of compliant rooms, in percent, two decimals.
    pub compliance_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Scoring {
    /// Mean score of the scored rooms, two decimals; 0 when none was scored.
    pub average_score: f64,
    pub score_distribution: BTreeMap<u8, usize>,
    pub level_distribution: BTreeMap<String, usize>,
    pub rooms_scored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoomAlert {
    pub room: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AlertsByType {
    pub temperature: Vec<RoomAlert>,
    pub humidity: Vec<RoomAlert>,
    pub pressure: Vec<RoomAlert>,
}

impl AlertsByType {
    fn bucket(&mut self, quantity: SensorType) -> &mut Vec<RoomAlert> {
        match quantity {
            SensorType::Temperature => &mut self.temperature,
            SensorType::Humidity => &mut self.humidity,
            SensorType::Pressure => &mut self.pressure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportParameters {
    /// Readings per sensor that were averaged.
    pub measurement_window: i64,
}

/// Whole-building conformity report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConformityReport {
    pub rooms: Vec<RoomConformity>,
    pub statistics: Statistics,
    pub scoring: Scoring,
    pub alerts_by_type: AlertsByType,
    pub parameters: ReportParameters,
}

impl ConformityReport {
    pub fn build(rooms: Vec<RoomConformity>, measurement_window: i64) -> Self {
        let count = |status: Status| rooms.iter().filter(|r| r.status == status).count();
        let total = rooms.len();
        let compliant = count(Status::Compliant);
        let statistics = Statistics {
            total,
            compliant,
            non_compliant: count(Status::NonCompliant),
            no_data: count(Status::NoData),
            thresholds_undefined: count(Status::ThresholdsUndefined),
            compliance_percentage: if total == 0 {
                0.0
            } else {
                round_to(compliant as f64 / total as f64 * 100.0, 2)
            },
        };

        let mut score_distribution: BTreeMap<u8, usize> =
            Level::ALL.iter().map(|l| (l.score(), 0)).collect();
        let mut level_distribution: BTreeMap<String, usize> =
            Level::ALL.iter().map(|l| (l.as_str().to_owned(), 0)).collect();
        let mut alerts_by_type = AlertsByType::default();
        let mut score_sum = 0u32;
        let mut rooms_scored = 0usize;

        for room in &rooms {
            let Some(evaluation) = &room.evaluation else {
                continue;
            };
            rooms_scored += 1;
            score_sum += u32::from(evaluation.score);
            *score_distribution.entry(evaluation.score).or_default() += 1;
            *level_distribution
                .entry(evaluation.level.as_str().to_owned())
                .or_default() += 1;

            for violation in &evaluation.violations {
                alerts_by_type.bucket(violation.quantity).push(RoomAlert {
                    room: room.room.name.clone(),
                    message: violation.to_string(),
                });
            }
        }

        let average_score = if rooms_scored == 0 {
            0.0
        } else {
            round_to(f64::from(score_sum) / rooms_scored as f64, 2)
        };

        Self {
            rooms,
            statistics,
            scoring: Scoring {
                average_score,
                score_distribution,
                level_distribution,
                rooms_scored,
            },
            alerts_by_type,
            parameters: ReportParameters { measurement_window },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::models::RoomState;

    fn room(id: i64, name: &str) -> Room {
        Room {
            id,
            name: name.to_owned(),
            building: "A".to_owned(),
            floor: 1,
            capacity: 20,
            state: RoomState::Active,
            created_at: Utc::now(),
        }
    }

    fn room_averages(id: i64, t: Option<f64>, h: Option<f64>, p: Option<f64>) -> RoomAverages {
        RoomAverages {
            room_id: id,
            room_name: format!("R{id}"),
            building: "A".to_owned(),
            floor: 1,
            avg_temperature: t,
            avg_humidity: h,
            avg_pressure: p,
            temperature_unit: t.map(|_| "°C".to_owned()),
            humidity_unit: h.map(|_| "%".to_owned()),
            pressure_unit: p.map(|_| "hPa".to_owned()),
        }
    }

    fn thresholds(room_id: i64) -> ThresholdSet {
        ThresholdSet {
            id: 1,
            room_id,
            temp_high: Some(28.0),
            temp_low: Some(18.0),
            humidity_high: Some(70.0),
            humidity_low: Some(40.0),
            pressure_high: Some(1020.0),
            pressure_low: Some(1000.0),
            valid_from: Utc::now(),
            valid_until: None,
        }
    }

    #[test]
    fn room_without_readings_has_no_data() {
        let r = RoomConformity::assess(
            room(1, "R1"),
            room_averages(1, None, None, None),
            Some(thresholds(1)),
        )
        .unwrap();
        assert_eq!(r.status, Status::NoData);
        assert_eq!(r.alerts, vec![NO_DATA_ALERT]);
        assert!(r.evaluation.is_none());
    }

    #[test]
    fn room_without_thresholds_is_undefined() {
        let r = RoomConformity::assess(
            room(1, "R1"),
            room_averages(1, Some(25.0), Some(60.0), None),
            None,
        )
        .unwrap();
        assert_eq!(r.status, Status::ThresholdsUndefined);
        assert_eq!(r.alerts, vec![THRESHOLDS_UNDEFINED_ALERT]);
        assert!(r.averages.is_some());
    }

    #[test]
    fn scored_room_carries_the_evaluation() {
        let r = RoomConformity::assess(
            room(1, "R1"),
            room_averages(1, Some(30.0), Some(60.0), Some(1013.0)),
            Some(thresholds(1)),
        )
        .unwrap();
        assert_eq!(r.status, Status::NonCompliant);
        assert_eq!(r.alerts, vec!["Temperature too high: 30.0°C > 28.0°C"]);
        assert_eq!(r.evaluation.unwrap().level, Level::Good);
    }

    #[test]
    fn empty_building_report() {
        let report = ConformityReport::build(vec![], 1);
        assert_eq!(report.statistics, Statistics::default());
        assert_eq!(report.scoring.average_score, 0.0);
        assert_eq!(report.scoring.rooms_scored, 0);
        assert_eq!(report.scoring.score_distribution.len(), 4);
        assert!(report.scoring.score_distribution.values().all(|&n| n == 0));
        assert_eq!(report.parameters.measurement_window, 1);
    }

    #[test]
    fn report_aggregates_statuses_scores_and_alerts() {
        let rooms = vec![
            RoomConformity::assess(
                room(1, "R1"),
                room_averages(1, Some(25.0), Some(60.0), Some(1013.0)),
                Some(thresholds(1)),
            )
            .unwrap(),
            RoomConformity::assess(
                room(2, "R2"),
                room_averages(2, Some(30.0), Some(80.0), Some(1013.0)),
                Some(thresholds(2)),
            )
            .unwrap(),
            RoomConformity::no_data(room(3, "R3"), None),
            RoomConformity::assess(room(4, "R4"), room_averages(4, Some(21.0), None, None), None)
                .unwrap(),
        ];

        let report = ConformityReport::build(rooms, 5);

        assert_eq!(report.statistics.total, 4);
        assert_eq!(report.statistics.compliant, 1);
        assert_eq!(report.statistics.non_compliant, 1);
        assert_eq!(report.statistics.no_data, 1);
        assert_eq!(report.statistics.thresholds_undefined, 1);
        assert_eq!(report.statistics.compliance_percentage, 25.0);

        assert_eq!(report.scoring.rooms_scored, 2);
        assert_eq!(report.scoring.average_score, 2.0);
        assert_eq!(report.scoring.score_distribution[&1], 1);
        assert_eq!(report.scoring.score_distribution[&3], 1);
        assert_eq!(report.scoring.level_distribution["EXCELLENT"], 1);
        assert_eq!(report.scoring.level_distribution["MEDIUM"], 1);
        assert_eq!(report.scoring.level_distribution["BAD"], 0);

        assert_eq!(report.alerts_by_type.temperature.len(), 1);
        assert_eq!(report.alerts_by_type.temperature[0].room, "R2");
        assert_eq!(report.alerts_by_type.humidity[0].message, "Humidity too high: 80.0% > 70.0%");
        assert!(report.alerts_by_type.pressure.is_empty());
    }

    #[test]
    fn compliance_percentage_rounds_to_two_decimals() {
        let rooms = (1..=3)
            .map(|id| {
                let t = if id == 1 { 25.0 } else { 35.0 };
                RoomConformity::assess(
                    room(id, &format!("R{id}")),
                    room_averages(id, Some(t), None, None),
                    Some(thresholds(id)),
                )
                .unwrap()
            })
            .collect();
        let report = ConformityReport::build(rooms, 1);
        assert_eq!(report.statistics.compliance_percentage, 33.33);
        // scores 1, 4, 4
        assert_eq!(report.scoring.average_score, 3.0);
    }
}
