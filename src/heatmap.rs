//! Maps a visible period's day buckets to colour intensities.
//!
//! Scaling is relative to the days passed in, so the heaviest day of the
//! visible month is always fully saturated, whatever its absolute size.

use std::fmt::Display;

use serde::{Deserialize, Serialize, Serializer};
use time::Date;

use crate::{Error, transaction::DayBucket};

/// Which total of a [DayBucket] drives the heatmap and trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeSource {
    /// The day's outflow total.
    #[default]
    Spending,
    /// The day's inflow total.
    Income,
    /// The day's net total.
    Net,
}

impl MagnitudeSource {
    /// The value of `bucket` this source reads.
    pub fn value(self, bucket: &DayBucket) -> f64 {
        match self {
            MagnitudeSource::Spending => bucket.outflow_total,
            MagnitudeSource::Income => bucket.inflow_total,
            MagnitudeSource::Net => bucket.net_total,
        }
    }
}

/// A 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let channel = |from: u8, to: u8| {
            let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
            value.round().clamp(0.0, 255.0) as u8
        };

        Rgb(
            channel(self.0, other.0),
            channel(self.1, other.1),
            channel(self.2, other.2),
        )
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A colour pinned to an intensity threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// The intensity at which `color` applies exactly, in [0, 1].
    pub threshold: f64,
    /// The colour at `threshold`.
    pub color: Rgb,
}

/// An ordered list of colour stops to interpolate between.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Create a ramp from `stops`.
    ///
    /// # Errors
    /// Returns [Error::InvalidColorRamp] if `stops` is empty, a threshold is
    /// outside [0, 1] or the thresholds are not strictly ascending.
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, Error> {
        if stops.is_empty() {
            return Err(Error::InvalidColorRamp("a ramp needs at least one stop".to_owned()));
        }

        if let Some(stop) = stops
            .iter()
            .find(|stop| !(0.0..=1.0).contains(&stop.threshold))
        {
            return Err(Error::InvalidColorRamp(format!(
                "threshold {} is outside [0, 1]",
                stop.threshold
            )));
        }

        if stops
            .windows(2)
            .any(|pair| pair[0].threshold >= pair[1].threshold)
        {
            return Err(Error::InvalidColorRamp(
                "thresholds must be strictly ascending".to_owned(),
            ));
        }

        Ok(Self { stops })
    }

    /// The colour for `intensity`.
    ///
    /// Intensities between two stops are linearly interpolated; intensities
    /// before the first or after the last stop take that stop's colour.
    pub fn color_at(&self, intensity: f64) -> Rgb {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rgb(0, 0, 0),
        };

        if intensity <= first.threshold {
            return first.color;
        }

        if intensity >= last.threshold {
            return last.color;
        }

        self.stops
            .windows(2)
            .find(|pair| pair[0].threshold <= intensity && intensity <= pair[1].threshold)
            .map(|pair| {
                let (low, high) = (pair[0], pair[1]);
                let t = (intensity - low.threshold) / (high.threshold - low.threshold);
                low.color.lerp(high.color, t)
            })
            .unwrap_or(last.color)
    }
}

impl Default for ColorRamp {
    /// A five step ramp from a pale background to a deep red.
    fn default() -> Self {
        Self {
            stops: vec![
                ColorStop {
                    threshold: 0.0,
                    color: Rgb(0xf5, 0xf5, 0xf4),
                },
                ColorStop {
                    threshold: 0.25,
                    color: Rgb(0xfe, 0xd7, 0xaa),
                },
                ColorStop {
                    threshold: 0.5,
                    color: Rgb(0xfb, 0x92, 0x3c),
                },
                ColorStop {
                    threshold: 0.75,
                    color: Rgb(0xea, 0x58, 0x0c),
                },
                ColorStop {
                    threshold: 1.0,
                    color: Rgb(0x9a, 0x34, 0x12),
                },
            ],
        }
    }
}

/// The heatmap value of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    /// The day.
    #[serde(with = "crate::date::iso_date")]
    pub date: Date,
    /// The raw value read from the day's bucket.
    pub value: f64,
    /// `|value|` relative to the largest magnitude in the period, in [0, 1].
    pub intensity: f64,
    /// The ramp colour for `intensity`.
    pub color: Rgb,
}

/// Scales day buckets into heatmap cells using a colour ramp.
#[derive(Debug, Clone, Default)]
pub struct HeatmapScaler {
    ramp: ColorRamp,
}

impl HeatmapScaler {
    /// Create a scaler using `ramp`.
    pub fn new(ramp: ColorRamp) -> Self {
        Self { ramp }
    }

    /// Scale the visible `days` by `source`.
    ///
    /// The day with the largest magnitude gets intensity 1. If every value is
    /// zero, every intensity is zero.
    pub fn scale(&self, days: &[DayBucket], source: MagnitudeSource) -> Vec<HeatCell> {
        let max = days
            .iter()
            .map(|day| source.value(day).abs())
            .fold(0.0_f64, f64::max);

        days.iter()
            .map(|day| {
                let value = source.value(day);
                let intensity = if max == 0.0 {
                    0.0
                } else {
                    (value.abs() / max).clamp(0.0, 1.0)
                };

                HeatCell {
                    date: day.date,
                    value,
                    intensity,
                    color: self.ramp.color_at(intensity),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::date};

    use crate::{
        Error,
        heatmap::{ColorRamp, ColorStop, HeatmapScaler, MagnitudeSource, Rgb},
        transaction::DayBucket,
    };

    fn bucket(day_offset: i64, inflow: f64, outflow: f64) -> DayBucket {
        let mut bucket = DayBucket::empty(date!(2024 - 03 - 01) + Duration::days(day_offset));
        bucket.inflow_total = inflow;
        bucket.outflow_total = outflow;
        bucket.net_total = inflow - outflow;
        bucket
    }

    fn two_stop_ramp() -> ColorRamp {
        ColorRamp::new(vec![
            ColorStop {
                threshold: 0.0,
                color: Rgb(0, 0, 0),
            },
            ColorStop {
                threshold: 1.0,
                color: Rgb(200, 100, 50),
            },
        ])
        .unwrap()
    }

    #[test]
    fn max_day_has_full_intensity() {
        let days = vec![bucket(0, 0.0, 25.0), bucket(1, 0.0, 100.0), bucket(2, 0.0, 0.0)];

        let cells = HeatmapScaler::default().scale(&days, MagnitudeSource::Spending);

        let intensities: Vec<_> = cells.iter().map(|cell| cell.intensity).collect();
        assert_eq!(intensities, vec![0.25, 1.0, 0.0]);
    }

    #[test]
    fn all_zero_period_has_zero_intensity() {
        let days = vec![bucket(0, 0.0, 0.0), bucket(1, 0.0, 0.0)];

        let cells = HeatmapScaler::default().scale(&days, MagnitudeSource::Net);

        assert!(cells.iter().all(|cell| cell.intensity == 0.0));
    }

    #[test]
    fn net_source_scales_by_magnitude() {
        let days = vec![bucket(0, 10.0, 50.0), bucket(1, 20.0, 0.0), bucket(2, 5.0, 5.0)];

        let cells = HeatmapScaler::default().scale(&days, MagnitudeSource::Net);

        assert_eq!(cells[0].value, -40.0);
        assert_eq!(cells[0].intensity, 1.0);
        assert_eq!(cells[1].intensity, 0.5);
        assert_eq!(cells[2].intensity, 0.0);
        assert!(cells.iter().all(|cell| (0.0..=1.0).contains(&cell.intensity)));
    }

    #[test]
    fn income_source_reads_inflow() {
        let days = vec![bucket(0, 30.0, 500.0), bucket(1, 60.0, 0.0)];

        let cells = HeatmapScaler::default().scale(&days, MagnitudeSource::Income);

        assert_eq!(cells[0].intensity, 0.5);
        assert_eq!(cells[1].intensity, 1.0);
    }

    #[test]
    fn colors_are_interpolated_between_stops() {
        let ramp = two_stop_ramp();

        assert_eq!(ramp.color_at(0.0), Rgb(0, 0, 0));
        assert_eq!(ramp.color_at(0.5), Rgb(100, 50, 25));
        assert_eq!(ramp.color_at(1.0), Rgb(200, 100, 50));
    }

    #[test]
    fn colors_outside_the_stops_are_clamped() {
        let ramp = ColorRamp::new(vec![
            ColorStop {
                threshold: 0.2,
                color: Rgb(10, 10, 10),
            },
            ColorStop {
                threshold: 0.8,
                color: Rgb(90, 90, 90),
            },
        ])
        .unwrap();

        assert_eq!(ramp.color_at(0.0), Rgb(10, 10, 10));
        assert_eq!(ramp.color_at(1.0), Rgb(90, 90, 90));
        assert_eq!(ramp.color_at(0.5), Rgb(50, 50, 50));
    }

    #[test]
    fn rejects_invalid_ramps() {
        let stop = |threshold| ColorStop {
            threshold,
            color: Rgb(0, 0, 0),
        };

        assert!(matches!(ColorRamp::new(vec![]), Err(Error::InvalidColorRamp(_))));
        assert!(matches!(
            ColorRamp::new(vec![stop(0.5), stop(0.5)]),
            Err(Error::InvalidColorRamp(_))
        ));
        assert!(matches!(
            ColorRamp::new(vec![stop(0.0), stop(1.5)]),
            Err(Error::InvalidColorRamp(_))
        ));
    }

    #[test]
    fn colors_serialize_as_hex() {
        assert_eq!(
            serde_json::to_string(&Rgb(0x9a, 0x34, 0x12)).unwrap(),
            "\"#9a3412\""
        );
    }
}
