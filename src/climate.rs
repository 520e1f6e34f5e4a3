//! Room climate logs: one reading per line in the form
//! `HH:MM:SS <T>C [<P>hPa] <H>%`, e.g. `12:00:01 21.5C [1013hPa] 40%`.

use crate::error::{AppError, AppResult};
use crate::models::SelectedLine;

const SECONDS_PER_DAY: u32 = 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub line_number: i64,
    /// Seconds since midnight
    pub seconds: u32,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Readings ordered by time of day, at most one per second.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateSeries {
    pub readings: Vec<ClimateReading>,
}

impl ClimateSeries {
    pub fn from_selection(selected: &[SelectedLine]) -> AppResult<Self> {
        Self::parse(selected.iter().map(|l| (l.line_number, l.content.as_str())))
    }

    /// Parse `(line_number, content)` pairs given in line order.
    ///
    /// Every malformed line is reported, not just the first. A reading taken
    /// before the hour of the first line is rejected, as is an empty input.
    pub fn parse<'a>(lines: impl IntoIterator<Item = (i64, &'a str)>) -> AppResult<Self> {
        let mut readings = Vec::new();
        let mut errors = Vec::new();
        let mut start_hour = None;

        for (line_number, text) in lines {
            match parse_reading(text) {
                Ok((seconds, temperature, pressure, humidity)) => {
                    let start = *start_hour.get_or_insert(seconds / 3600 * 3600);
                    if seconds < start {
                        errors.push(format!(
                            "line {}: reading at {} precedes the first logged hour",
                            line_number,
                            clock(seconds as f64)
                        ));
                        continue;
                    }
                    readings.push(ClimateReading {
                        line_number,
                        seconds,
                        temperature,
                        pressure,
                        humidity,
                    });
                }
                Err(reason) => errors.push(format!("line {}: {}", line_number, reason)),
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        if readings.is_empty() {
            return Err(AppError::validation("no climate readings selected"));
        }

        // Stable sort keeps the earliest line for a repeated second
        readings.sort_by_key(|r| r.seconds);
        readings.dedup_by_key(|r| r.seconds);

        Ok(Self { readings })
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// First and last reading time, in seconds since midnight
    pub fn span(&self) -> Option<(u32, u32)> {
        Some((self.readings.first()?.seconds, self.readings.last()?.seconds))
    }

    pub fn times(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.seconds as f64).collect()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.temperature).collect()
    }

    pub fn pressures(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.pressure).collect()
    }

    pub fn humidities(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.humidity).collect()
    }
}

/// Split one log line into (seconds since midnight, temperature, pressure, humidity).
fn parse_reading(text: &str) -> Result<(u32, f64, f64, f64), String> {
    let cleaned = text
        .replace('C', "")
        .replace(['[', ']'], "")
        .replace("hPa", "")
        .replace('%', "");
    let fields: Vec<&str> = cleaned.split_whitespace().collect();

    let [time, temperature, pressure, humidity, ..] = fields.as_slice() else {
        return Err(format!(
            "expected `HH:MM:SS <T>C [<P>hPa] <H>%`, got {:?}",
            text
        ));
    };

    Ok((
        parse_time(time)?,
        parse_value("temperature", temperature)?,
        parse_value("pressure", pressure)?,
        parse_value("humidity", humidity)?,
    ))
}

fn parse_time(raw: &str) -> Result<u32, String> {
    let parts: Vec<u32> = raw
        .split(':')
        .map(|p| p.parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid time {:?}", raw))?;

    match parts.as_slice() {
        [h, m, s] if *h < 24 && *m < 60 && *s < 60 => Ok(h * 3600 + m * 60 + s),
        _ => Err(format!("invalid time {:?}", raw)),
    }
}

fn parse_value(name: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid {} {:?}", name, raw))
}

/// Format seconds since midnight as `HH:MM:SS`.
pub fn clock(seconds: f64) -> String {
    let total = (seconds.round().max(0.0) as u32) % SECONDS_PER_DAY;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        total / 60 % 60,
        total % 60
    )
}
