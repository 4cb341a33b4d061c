//! Lap and run formats for fitness units.

use navlink_core::{Category, Error, Lap, Result, Run, Workout, WorkoutStep};

use super::{RecordReader, RecordWriter};
use crate::capability::DataType;

const CADENCE_INVALID: u8 = 0xFF;
const D1015_TRAILER: usize = 5;
const WORKOUT_STEPS: usize = 20;
const NAME_LEN: usize = 16;

/// Lap record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LapFormat {
    /// Early fitness units; laps point at a track by index.
    D906,
    D1001,
    /// D1001 with cadence and trigger method.
    D1011,
    /// D1011 followed by five undocumented bytes.
    D1015,
}

impl LapFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            906 => Ok(Self::D906),
            1001 => Ok(Self::D1001),
            1011 => Ok(Self::D1011),
            1015 => Ok(Self::D1015),
            n => Err(Error::UnsupportedFormat {
                category: Category::Laps,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(match self {
            Self::D906 => 906,
            Self::D1001 => 1001,
            Self::D1011 => 1011,
            Self::D1015 => 1015,
        })
    }

    pub fn decode(self, data: &[u8]) -> Result<Lap> {
        let mut r = RecordReader::new(self.datatype(), data);
        if self == Self::D906 {
            let lap = Lap {
                start_time: r.time()?,
                total_time: r.u32()?,
                total_distance: r.f32()?,
                begin: r.position()?,
                end: r.position()?,
                calories: r.u16()?,
                track_index: Some(r.u8()?),
                ..Default::default()
            };
            r.skip(1)?;
            r.finish()?;
            return Ok(lap);
        }

        let index = match self {
            Self::D1001 => r.u32()?,
            _ => {
                let index = r.u16()?;
                r.skip(2)?;
                u32::from(index)
            }
        };
        let mut lap = Lap {
            index: Some(index),
            start_time: r.time()?,
            total_time: r.u32()?,
            total_distance: r.f32()?,
            max_speed: Some(r.f32()?),
            begin: r.position()?,
            end: r.position()?,
            calories: r.u16()?,
            avg_heart_rate: heart_rate(r.u8()?),
            max_heart_rate: heart_rate(r.u8()?),
            ..Default::default()
        };
        let intensity = r.u8()?;
        if intensity > 1 {
            return Err(r.invalid("intensity", intensity));
        }
        lap.intensity = Some(intensity);
        if self != Self::D1001 {
            let cadence = r.u8()?;
            lap.avg_cadence = (cadence != CADENCE_INVALID).then_some(cadence);
            let trigger = r.u8()?;
            if trigger > 4 {
                return Err(r.invalid("trigger method", trigger));
            }
            lap.trigger_method = Some(trigger);
        }
        if self == Self::D1015 {
            r.skip(D1015_TRAILER)?;
        }
        r.finish()?;
        Ok(lap)
    }

    pub fn encode(self, lap: &Lap) -> Result<Vec<u8>> {
        let mut w = RecordWriter::new();
        if self == Self::D906 {
            w.time(lap.start_time.as_ref())
                .u32(lap.total_time)
                .f32(lap.total_distance)
                .position(&lap.begin)
                .position(&lap.end)
                .u16(lap.calories)
                .u8(lap.track_index.unwrap_or(0))
                .zeros(1);
            return Ok(w.finish());
        }

        let index = lap.index.unwrap_or(0);
        match self {
            Self::D1001 => {
                w.u32(index);
            }
            _ => {
                let index = u16::try_from(index).map_err(|_| {
                    Error::InvalidParameter(format!(
                        "lap index {index} does not fit format {}",
                        self.datatype()
                    ))
                })?;
                w.u16(index).zeros(2);
            }
        }
        w.time(lap.start_time.as_ref())
            .u32(lap.total_time)
            .f32(lap.total_distance)
            .f32(lap.max_speed.unwrap_or(0.0))
            .position(&lap.begin)
            .position(&lap.end)
            .u16(lap.calories)
            .u8(lap.avg_heart_rate.unwrap_or(0))
            .u8(lap.max_heart_rate.unwrap_or(0))
            .u8(lap.intensity.unwrap_or(0));
        if self != Self::D1001 {
            w.u8(lap.avg_cadence.unwrap_or(CADENCE_INVALID))
                .u8(lap.trigger_method.unwrap_or(0));
        }
        if self == Self::D1015 {
            w.zeros(D1015_TRAILER);
        }
        Ok(w.finish())
    }
}

/// Run record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunFormat {
    /// Run header followed by an embedded D1008 workout.
    D1009,
}

impl RunFormat {
    pub fn from_datatype(datatype: DataType) -> Result<Self> {
        match datatype.0 {
            1009 => Ok(Self::D1009),
            n => Err(Error::UnsupportedFormat {
                category: Category::Runs,
                datatype: n,
            }),
        }
    }

    pub fn datatype(self) -> DataType {
        DataType(1009)
    }

    pub fn decode(self, data: &[u8]) -> Result<Run> {
        let mut r = RecordReader::new(self.datatype(), data);
        let mut run = Run {
            track_index: r.u16()?,
            first_lap_index: r.u16()?,
            last_lap_index: r.u16()?,
            sport_type: r.u8()?,
            program_type: r.u8()?,
            multisport: r.u8()?,
            ..Default::default()
        };
        r.skip(3)?;
        run.quick_workout_time = r.u32()?;
        run.quick_workout_distance = r.f32()?;

        let valid = r.u32()?;
        if valid as usize > WORKOUT_STEPS {
            return Err(r.invalid("workout step count", valid));
        }
        let mut steps = Vec::with_capacity(valid as usize);
        for i in 0..WORKOUT_STEPS {
            let step = WorkoutStep {
                custom_name: r.fixed_str(NAME_LEN)?,
                target_zone_low: r.f32()?,
                target_zone_high: r.f32()?,
                duration_value: r.u16()?,
                intensity: r.u8()?,
                duration_type: r.u8()?,
                target_type: r.u8()?,
                target_value: r.u8()?,
            };
            r.skip(2)?;
            if i < valid as usize {
                steps.push(step);
            }
        }
        run.workout = Workout {
            name: r.fixed_str(NAME_LEN)?,
            sport_type: r.u8()?,
            steps,
        };
        r.finish()?;
        Ok(run)
    }

    pub fn encode(self, run: &Run) -> Result<Vec<u8>> {
        let steps = &run.workout.steps;
        if steps.len() > WORKOUT_STEPS {
            return Err(Error::InvalidParameter(format!(
                "workout has {} steps, {} holds {WORKOUT_STEPS}",
                steps.len(),
                self.datatype()
            )));
        }
        let mut w = RecordWriter::new();
        w.u16(run.track_index)
            .u16(run.first_lap_index)
            .u16(run.last_lap_index)
            .u8(run.sport_type)
            .u8(run.program_type)
            .u8(run.multisport)
            .zeros(3)
            .u32(run.quick_workout_time)
            .f32(run.quick_workout_distance)
            .u32(steps.len() as u32);
        for step in steps {
            w.fixed_str(&step.custom_name, NAME_LEN, 0)
                .f32(step.target_zone_low)
                .f32(step.target_zone_high)
                .u16(step.duration_value)
                .u8(step.intensity)
                .u8(step.duration_type)
                .u8(step.target_type)
                .u8(step.target_value)
                .zeros(2);
        }
        w.zeros((WORKOUT_STEPS - steps.len()) * 32)
            .fixed_str(&run.workout.name, NAME_LEN, 0)
            .u8(run.workout.sport_type);
        Ok(w.finish())
    }
}

fn heart_rate(bpm: u8) -> Option<u8> {
    (bpm != 0).then_some(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use navlink_core::Position;

    fn sample() -> Lap {
        Lap {
            index: Some(4),
            start_time: Some(Utc.with_ymd_and_hms(2006, 5, 20, 9, 0, 0).unwrap()),
            total_time: 42_000,
            total_distance: 1000.0,
            max_speed: Some(4.5),
            begin: Position::from_degrees(47.6, -122.3),
            end: Position::INVALID,
            calories: 61,
            avg_heart_rate: Some(142),
            max_heart_rate: Some(171),
            intensity: Some(0),
            avg_cadence: None,
            trigger_method: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn sizes() {
        let lap = sample();
        for (format, size) in [
            (LapFormat::D906, 32),
            (LapFormat::D1001, 41),
            (LapFormat::D1011, 43),
            (LapFormat::D1015, 48),
        ] {
            let bytes = format.encode(&lap).unwrap();
            assert_eq!(bytes.len(), size, "{format:?}");
            assert!(format.decode(&bytes[..size - 1]).is_err());
        }
    }

    #[test]
    fn d1011_round_trip() {
        let lap = sample();
        let bytes = LapFormat::D1011.encode(&lap).unwrap();
        assert_eq!(LapFormat::D1011.decode(&bytes).unwrap(), lap);
    }

    #[test]
    fn every_format_round_trips_its_fields() {
        for format in [
            LapFormat::D906,
            LapFormat::D1001,
            LapFormat::D1011,
            LapFormat::D1015,
        ] {
            let mut lap = Lap {
                end: Position::from_degrees(47.61, -122.31),
                intensity: Some(1),
                ..sample()
            };
            match format {
                LapFormat::D906 => {
                    lap.index = None;
                    lap.max_speed = None;
                    lap.avg_heart_rate = None;
                    lap.max_heart_rate = None;
                    lap.intensity = None;
                    lap.trigger_method = None;
                    lap.track_index = Some(6);
                }
                LapFormat::D1001 => {
                    lap.index = Some(70_000);
                    lap.trigger_method = None;
                }
                LapFormat::D1011 | LapFormat::D1015 => {
                    lap.avg_cadence = Some(91);
                    lap.trigger_method = Some(4);
                }
            }
            let bytes = format.encode(&lap).unwrap();
            assert_eq!(format.decode(&bytes).unwrap(), lap, "{format:?}");
        }
    }

    #[test]
    fn d1001_has_no_cadence() {
        let bytes = LapFormat::D1001.encode(&sample()).unwrap();
        let lap = LapFormat::D1001.decode(&bytes).unwrap();
        assert_eq!(lap.index, Some(4));
        assert_eq!(lap.avg_cadence, None);
        assert_eq!(lap.trigger_method, None);
    }

    #[test]
    fn d906_track_index() {
        let lap = Lap {
            track_index: Some(2),
            ..sample()
        };
        let decoded = LapFormat::D906
            .decode(&LapFormat::D906.encode(&lap).unwrap())
            .unwrap();
        assert_eq!(decoded.track_index, Some(2));
        assert_eq!(decoded.index, None);
        assert_eq!(decoded.max_speed, None);
        assert_eq!(decoded.calories, 61);
    }

    #[test]
    fn zero_heart_rate_is_none() {
        let lap = Lap {
            avg_heart_rate: None,
            max_heart_rate: None,
            ..sample()
        };
        let bytes = LapFormat::D1015.encode(&lap).unwrap();
        let decoded = LapFormat::D1015.decode(&bytes).unwrap();
        assert_eq!(decoded.avg_heart_rate, None);
        assert_eq!(decoded.max_heart_rate, None);
    }

    #[test]
    fn rejects_bad_intensity_and_trigger() {
        let mut bytes = LapFormat::D1011.encode(&sample()).unwrap();
        bytes[40] = 2;
        let err = LapFormat::D1011.decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "malformed D1011 record: invalid intensity 2");

        let mut bytes = LapFormat::D1011.encode(&sample()).unwrap();
        bytes[42] = 5;
        assert!(LapFormat::D1011.decode(&bytes).is_err());
    }

    #[test]
    fn index_must_fit_u16() {
        let lap = Lap {
            index: Some(70_000),
            ..sample()
        };
        assert!(LapFormat::D1011.encode(&lap).is_err());
        assert!(LapFormat::D1001.encode(&lap).is_ok());
    }

    fn run() -> Run {
        Run {
            track_index: 3,
            first_lap_index: 10,
            last_lap_index: 14,
            sport_type: 1,
            program_type: 2,
            multisport: 0,
            quick_workout_time: 180_000,
            quick_workout_distance: 5000.0,
            workout: Workout {
                name: "Intervals".into(),
                sport_type: 1,
                steps: vec![
                    WorkoutStep {
                        custom_name: "Warm up".into(),
                        target_zone_low: 100.0,
                        target_zone_high: 130.0,
                        duration_value: 600,
                        intensity: 0,
                        duration_type: 0,
                        target_type: 1,
                        target_value: 2,
                    },
                    WorkoutStep {
                        custom_name: "Recover".into(),
                        duration_value: 120,
                        intensity: 1,
                        ..Default::default()
                    },
                ],
            },
        }
    }

    #[test]
    fn d1009_layout() {
        let run = run();
        let bytes = RunFormat::D1009.encode(&run).unwrap();
        assert_eq!(bytes.len(), 681);
        assert_eq!(&bytes[..6], &[3, 0, 10, 0, 14, 0]);
        assert_eq!(&bytes[20..24], &[2, 0, 0, 0]);
        assert_eq!(&bytes[24..31], b"Warm up");
        assert_eq!(RunFormat::D1009.decode(&bytes).unwrap(), run);
        assert!(RunFormat::D1009.decode(&bytes[..680]).is_err());
    }

    #[test]
    fn d1009_step_count_out_of_range() {
        let mut bytes = RunFormat::D1009.encode(&run()).unwrap();
        bytes[20] = 21;
        let err = RunFormat::D1009.decode(&bytes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed D1009 record: invalid workout step count 21"
        );

        let mut long = run();
        long.workout.steps = vec![WorkoutStep::default(); 21];
        assert!(matches!(
            RunFormat::D1009.encode(&long),
            Err(Error::InvalidParameter(_))
        ));
    }
}
