//! CSV tick files
//!
//! One row per tick. The `frequency` column is required, `cal_active`,
//! `cal_ok` and `reset` are optional and default to `false`.

use std::io::{
    Read,
    Write,
};

use robot8::{
    CalibrationStatus,
    Frequency,
    TickInput,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};

use crate::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TickRecord {
    pub frequency: Frequency,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub cal_active: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub cal_ok: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub reset: bool,
}

impl TickRecord {
    pub fn tick_input(&self) -> TickInput {
        TickInput {
            frequency: self.frequency,
            reset: self.reset,
        }
    }

    pub fn calibration(&self) -> CalibrationStatus {
        CalibrationStatus {
            active: self.cal_active,
            ok: self.cal_ok,
        }
    }
}

/// Accepts `0`, `1`, `true`, `false` and empty cells.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    match value.trim() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => {
            Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&value),
                &"0, 1, true or false",
            ))
        }
    }
}

#[derive(Debug)]
pub struct TickReader<R> {
    reader: csv::Reader<R>,
    has_calibration: bool,
}

impl<R> TickReader<R>
where
    R: Read,
{
    pub fn new(reader: R) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?;
        let has_column = |name: &str| headers.iter().any(|header| header == name);
        let has_calibration = has_column("cal_active") && has_column("cal_ok");
        tracing::debug!(?headers, has_calibration);

        Ok(Self {
            reader,
            has_calibration,
        })
    }

    /// Whether the file carries calibration flags.
    pub fn has_calibration(&self) -> bool {
        self.has_calibration
    }

    pub fn records(&mut self) -> impl Iterator<Item = Result<TickRecord, Error>> + '_ {
        self.reader
            .deserialize::<TickRecord>()
            .map(|result| Ok(result?))
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
struct ToneRecord {
    frequency: Frequency,
}

/// Writes `tones` with a single `frequency` column and returns the number of
/// ticks written.
pub fn write_tones<W>(
    writer: W,
    tones: impl IntoIterator<Item = Frequency>,
) -> Result<usize, Error>
where
    W: Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    let mut ticks = 0;
    for frequency in tones {
        writer.serialize(ToneRecord { frequency })?;
        ticks += 1;
    }
    writer.flush()?;
    Ok(ticks)
}
