//! Reference-year and actual weather, and the bill/weather join.

use crate::error::{CalibrationError, Result};
use crate::types::{BillPeriod, WeatherJoinedBillRow};
use crate::units::celsius_to_fahrenheit;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

pub const DAYS_PER_YEAR: usize = 365;

/// Reference-year (typical) weather read from an EPW file
#[derive(Debug, Clone)]
pub struct EpwWeather {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Hours from UTC
    pub timezone: f64,
    /// Daily mean dry bulb in degrees F, one entry per day of a 365-day year
    pub daily_temps_f: Vec<f64>,
}

impl EpwWeather {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CalibrationError::Weather(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_epw(&content)
    }

    /// Parse EPW content: 8 header lines, then hourly rows with dry bulb (C) in field 6.
    ///
    /// Hourly values are averaged per calendar day; 29 February is dropped.
    pub fn from_epw(content: &str) -> Result<Self> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() < 9 {
            return Err(CalibrationError::Weather(
                "EPW file too short: expected at least 9 lines".to_string(),
            ));
        }

        let header: Vec<&str> = lines[0].split(',').collect();
        if header.len() < 9 || header[0].trim() != "LOCATION" {
            return Err(CalibrationError::Weather("Invalid LOCATION header".to_string()));
        }
        let location = format!("{}, {}", header[1].trim(), header[3].trim());
        let latitude = parse_field(header[6], "latitude", 1)?;
        let longitude = parse_field(header[7], "longitude", 1)?;
        let timezone = parse_field(header[8], "timezone", 1)?;

        let mut by_day: BTreeMap<(u32, u32), (f64, usize)> = BTreeMap::new();
        for (i, line) in lines.iter().enumerate().skip(8) {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 7 {
                continue;
            }
            let line_no = i + 1;
            let month = parse_field(fields[1], "month", line_no)? as u32;
            let day = parse_field(fields[2], "day", line_no)? as u32;
            if month == 2 && day == 29 {
                continue;
            }
            let dry_bulb = parse_field(fields[6], "dry bulb", line_no)?;
            let entry = by_day.entry((month, day)).or_insert((0.0, 0));
            entry.0 += dry_bulb;
            entry.1 += 1;
        }

        if by_day.len() != DAYS_PER_YEAR {
            return Err(CalibrationError::Weather(format!(
                "EPW file covers {} days, expected {}",
                by_day.len(),
                DAYS_PER_YEAR
            )));
        }

        let daily_temps_f = by_day
            .values()
            .map(|(sum, count)| celsius_to_fahrenheit(sum / *count as f64))
            .collect();

        Ok(Self {
            location,
            latitude,
            longitude,
            timezone,
            daily_temps_f,
        })
    }

    /// Daily reference temperatures that fall inside `window`
    pub fn temps_in_window(&self, window: &DayOfYearWindow) -> Vec<f64> {
        window
            .days()
            .map(|day| self.daily_temps_f[day - 1])
            .collect()
    }
}

fn parse_field(value: &str, name: &str, line: usize) -> Result<f64> {
    value.trim().parse().map_err(|_| {
        CalibrationError::Weather(format!("Invalid {} at line {}: '{}'", name, line, value))
    })
}

/// Observed outdoor temperatures in local standard time, sorted by timestamp
#[derive(Debug, Clone, Default)]
pub struct TemperatureSeries {
    readings: Vec<(NaiveDateTime, f64)>,
}

impl TemperatureSeries {
    /// Build from unsorted (timestamp, degrees F) pairs
    pub fn new(mut readings: Vec<(NaiveDateTime, f64)>) -> Self {
        readings.retain(|(_, t)| t.is_finite());
        readings.sort_by_key(|(ts, _)| *ts);
        Self { readings }
    }

    /// Load a CSV with a `timestamp` column and either `temp_f` or `temp_c`.
    ///
    /// Timestamps with an explicit offset are shifted to the building's standard time;
    /// naive timestamps are taken as already local.
    pub fn from_csv<P: AsRef<Path>>(path: P, utc_offset_hours: f64) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()?;

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let has = |name: &str| names.iter().any(|n| n == name);

        if !has("timestamp") {
            return Err(CalibrationError::Weather(
                "Temperature CSV needs a 'timestamp' column".to_string(),
            ));
        }
        let (temp_col, is_celsius) = if has("temp_f") {
            ("temp_f", false)
        } else if has("temp_c") {
            ("temp_c", true)
        } else {
            return Err(CalibrationError::Weather(
                "Temperature CSV needs a 'temp_f' or 'temp_c' column".to_string(),
            ));
        };

        let offset = FixedOffset::east_opt((utc_offset_hours * 3600.0).round() as i32)
            .ok_or_else(|| {
                CalibrationError::Weather(format!("Invalid UTC offset {}", utc_offset_hours))
            })?;

        let timestamps = df.column("timestamp")?.cast(&DataType::String)?;
        let temps = df.column(temp_col)?.cast(&DataType::Float64)?;
        let timestamps = timestamps.str()?;
        let temps = temps.f64()?;

        let mut readings = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(raw_ts), Some(temp)) = (timestamps.get(i), temps.get(i)) else {
                continue;
            };
            let ts = parse_timestamp(raw_ts, offset)?;
            let temp_f = if is_celsius {
                celsius_to_fahrenheit(temp)
            } else {
                temp
            };
            readings.push((ts, temp_f));
        }

        if readings.is_empty() {
            return Err(CalibrationError::Weather(
                "Temperature CSV contains no readings".to_string(),
            ));
        }
        Ok(Self::new(readings))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[(NaiveDateTime, f64)] {
        &self.readings
    }

    /// Readings with `start <= t <= end`
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[(NaiveDateTime, f64)] {
        let lo = self.readings.partition_point(|(ts, _)| *ts < start);
        let hi = self.readings.partition_point(|(ts, _)| *ts <= end);
        if lo >= hi {
            &[]
        } else {
            &self.readings[lo..hi]
        }
    }

    pub fn mean_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<f64> {
        let slice = self.between(start, end);
        if slice.is_empty() {
            None
        } else {
            Some(slice.iter().map(|(_, t)| t).sum::<f64>() / slice.len() as f64)
        }
    }

    /// Mean temperature of each calendar day touched by `[start, end]`, days without data skipped
    pub fn daily_means(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<f64> {
        let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (ts, t) in self.between(start, end) {
            let entry = by_day.entry(ts.date()).or_insert((0.0, 0));
            entry.0 += t;
            entry.1 += 1;
        }
        by_day
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .collect()
    }
}

fn parse_timestamp(raw: &str, local: FixedOffset) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&local).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    Err(CalibrationError::Weather(format!(
        "Unrecognised timestamp '{}'",
        raw
    )))
}

/// Attach mean outdoor temperature, length and daily use to each bill period
pub fn join_bills_weather(
    bills: &[BillPeriod],
    temperatures: &TemperatureSeries,
) -> Result<Vec<WeatherJoinedBillRow>> {
    bills
        .iter()
        .map(|bill| {
            let n_days = bill.n_days();
            if !(n_days > 0.0) {
                return Err(CalibrationError::BillData(format!(
                    "{} bill starting {} has non-positive length",
                    bill.fuel_type, bill.start_date
                )));
            }
            let avg_temp = temperatures
                .mean_between(bill.start_date, bill.end_date)
                .ok_or_else(|| {
                    CalibrationError::Weather(format!(
                        "No temperature readings between {} and {}",
                        bill.start_date, bill.end_date
                    ))
                })?;
            Ok(WeatherJoinedBillRow {
                bill: bill.clone(),
                avg_temp,
                n_days,
                daily_consumption: bill.consumption / n_days,
            })
        })
        .collect()
}

/// Inclusive, 1-based day-of-year range of a bill within a 365-day reference year.
///
/// `start > end` means the window wraps across 31 December.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOfYearWindow {
    pub start: usize,
    pub end: usize,
}

impl DayOfYearWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: fold_day(start),
            end: fold_day(end),
        }
    }

    /// Window covering `[start_date, end_date)`; the last day is the one holding `end_date - 1s`
    pub fn from_dates(start_date: NaiveDateTime, end_date: NaiveDateTime) -> Self {
        let last = end_date - Duration::seconds(1);
        Self::new(reference_day(start_date.date()), reference_day(last.date()))
    }

    pub fn from_bill(bill: &BillPeriod) -> Self {
        Self::from_dates(bill.start_date, bill.end_date)
    }

    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Days in the window, each exactly once
    pub fn days(&self) -> impl Iterator<Item = usize> {
        let (first, second) = if self.wraps() {
            (self.start..=DAYS_PER_YEAR, 1..=self.end)
        } else {
            (self.start..=self.end, 1..=0)
        };
        first.chain(second)
    }

    pub fn len(&self) -> usize {
        if self.wraps() {
            DAYS_PER_YEAR - self.start + 1 + self.end
        } else {
            self.end - self.start + 1
        }
    }
}

fn fold_day(day: usize) -> usize {
    day.clamp(1, DAYS_PER_YEAR)
}

/// Day of the 365-day reference year. In leap years 29 February shares day 59
/// with 28 February and every later date shifts back by one.
fn reference_day(date: NaiveDate) -> usize {
    let ordinal = date.ordinal() as usize;
    if is_leap_year(date.year()) && ordinal > 59 {
        ordinal - 1
    } else {
        ordinal
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
