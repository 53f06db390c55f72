//! Position history and the CSV wire format.
//!
//! History is append-only: samples are never rewritten or reordered, and a
//! sample older than the last one is rejected. Export writes one `time,x,y`
//! row per spot; samples without spots produce no rows.

use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::detect::Spot;

/// Spots found in one processed frame pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionSample {
    /// Offset from the session origin.
    pub time: Duration,
    pub spots: Vec<Spot>,
}

impl PositionSample {
    pub fn new(time: Duration, spots: Vec<Spot>) -> Self {
        Self { time, spots }
    }
}

/// How the `time` column is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// Float seconds since the Unix epoch.
    #[default]
    EpochSeconds,
    /// Integer milliseconds on the session's monotonic clock.
    MonotonicMillis,
}

impl TimeFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "epoch" | "epoch_seconds" => Ok(TimeFormat::EpochSeconds),
            "monotonic" | "monotonic_millis" => Ok(TimeFormat::MonotonicMillis),
            other => bail!("unknown time format '{}' (epoch_seconds|monotonic_millis)", other),
        }
    }
}

#[derive(Clone, Copy, Serialize)]
#[serde(untagged)]
enum TimeValue {
    Seconds(f64),
    Millis(u64),
}

#[derive(Serialize)]
struct RowOut {
    time: TimeValue,
    x: f64,
    y: f64,
}

#[derive(Clone, Debug)]
pub struct PositionHistory {
    epoch_origin: SystemTime,
    samples: Vec<PositionSample>,
}

impl PositionHistory {
    pub fn new(epoch_origin: SystemTime) -> Self {
        Self {
            epoch_origin,
            samples: Vec::new(),
        }
    }

    pub fn epoch_origin(&self) -> SystemTime {
        self.epoch_origin
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn spot_count(&self) -> usize {
        self.samples.iter().map(|s| s.spots.len()).sum()
    }

    /// Write the history as CSV. Returns the number of data rows.
    pub fn write_csv<W: Write>(&self, writer: W, format: TimeFormat) -> Result<usize> {
        let origin = self
            .epoch_origin
            .duration_since(UNIX_EPOCH)
            .map_err(|_| anyhow!("epoch origin predates the Unix epoch"))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(["time", "x", "y"])?;

        let mut rows = 0;
        for sample in &self.samples {
            let time = match format {
                TimeFormat::EpochSeconds => TimeValue::Seconds((origin + sample.time).as_secs_f64()),
                TimeFormat::MonotonicMillis => TimeValue::Millis(
                    u64::try_from(sample.time.as_millis()).context("timestamp out of range")?,
                ),
            };
            for spot in &sample.spots {
                writer.serialize(RowOut {
                    time,
                    x: spot.x,
                    y: spot.y,
                })?;
                rows += 1;
            }
        }
        writer.flush()?;
        Ok(rows)
    }

    pub fn save_csv(&self, path: &Path, format: TimeFormat) -> Result<usize> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("create position file {}", path.display()))?;
        let rows = self.write_csv(file, format)?;
        log::info!("wrote {} position rows to {}", rows, path.display());
        Ok(rows)
    }
}

/// Sole writer of a [`PositionHistory`].
#[derive(Debug)]
pub struct PositionRecorder {
    history: PositionHistory,
}

impl PositionRecorder {
    pub fn new(epoch_origin: SystemTime) -> Self {
        Self {
            history: PositionHistory::new(epoch_origin),
        }
    }

    /// Append a sample. Its time must not precede the last recorded sample.
    pub fn record(&mut self, sample: PositionSample) -> Result<()> {
        if let Some(last) = self.history.samples.last() {
            if sample.time < last.time {
                bail!(
                    "sample at {:?} precedes last recorded sample at {:?}",
                    sample.time,
                    last.time
                );
            }
        }
        self.history.samples.push(sample);
        Ok(())
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    pub fn into_history(self) -> PositionHistory {
        self.history
    }

    /// Export without clearing the in-memory history.
    pub fn write_csv<W: Write>(&self, writer: W, format: TimeFormat) -> Result<usize> {
        self.history.write_csv(writer, format)
    }
}

// ---- Reading position files ----

/// One data row of a position file.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct CsvRow {
    pub time: f64,
    pub x: f64,
    pub y: f64,
}

/// Consecutive rows sharing a timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct RowGroup {
    pub time: f64,
    pub spots: Vec<Spot>,
}

pub fn read_position_rows<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    if headers.iter().collect::<Vec<_>>() != ["time", "x", "y"] {
        bail!("unexpected position file header: {:?}", headers);
    }
    reader
        .deserialize()
        .map(|row| row.map_err(<_>::into))
        .collect::<Result<Vec<CsvRow>>>()
}

pub fn load_position_rows(path: &Path) -> Result<Vec<CsvRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open position file {}", path.display()))?;
    read_position_rows(file).with_context(|| format!("parse position file {}", path.display()))
}

pub fn group_rows(rows: &[CsvRow]) -> Vec<RowGroup> {
    let mut groups: Vec<RowGroup> = Vec::new();
    for row in rows {
        let spot = Spot::new(row.x, row.y);
        match groups.last_mut() {
            Some(group) if group.time == row.time => group.spots.push(spot),
            _ => groups.push(RowGroup {
                time: row.time,
                spots: vec![spot],
            }),
        }
    }
    groups
}
