//! OurAirports `airports.csv` decoding.
//!
//! Rows are decoded lazily and in file order into [`ExternalRecord`]s. The
//! header must carry every column in [`REQUIRED_COLUMNS`]; extra columns are
//! ignored.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use airsync_core::types::{Classification, ExternalRecord};

use crate::error::{io_err, SyncError};

/// Columns the decoder reads.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "ident",
    "type",
    "name",
    "latitude_deg",
    "longitude_deg",
    "elevation_ft",
    "iso_country",
    "municipality",
    "iata_code",
    "local_code",
];

#[derive(Debug, Deserialize)]
struct Row {
    ident: String,
    #[serde(rename = "type")]
    kind: String,
    name: String,
    latitude_deg: String,
    longitude_deg: String,
    elevation_ft: String,
    iso_country: String,
    municipality: String,
    iata_code: String,
    local_code: String,
}

/// A decoded row together with its 1-based line number in the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub line: u64,
    pub record: ExternalRecord,
}

/// Iterator over the records of a dataset.
pub struct RecordSource<R: Read> {
    path: PathBuf,
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
    buf: csv::StringRecord,
}

impl RecordSource<File> {
    /// Open `path` and validate its header.
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        Self::from_reader(file, path)
    }
}

impl<R: Read> RecordSource<R> {
    /// Wrap any reader. `path` only labels errors.
    pub fn from_reader(rdr: R, path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(rdr);
        let headers = reader
            .headers()
            .map_err(|source| SyncError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();

        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h.trim() == column) {
                return Err(SyncError::Decode {
                    path,
                    line: 1,
                    message: format!("missing column '{column}'"),
                });
            }
        }

        Ok(Self {
            path,
            reader,
            headers,
            buf: csv::StringRecord::new(),
        })
    }

    fn next_record(&mut self) -> Result<Option<SourceRecord>, SyncError> {
        let more = self
            .reader
            .read_record(&mut self.buf)
            .map_err(|source| SyncError::Csv {
                path: self.path.clone(),
                source,
            })?;
        if !more {
            return Ok(None);
        }
        let line = self.buf.position().map_or(0, |p| p.line());
        let decode_err = |message: String| SyncError::Decode {
            path: self.path.clone(),
            line,
            message,
        };

        let row: Row = self
            .buf
            .deserialize(Some(&self.headers))
            .map_err(|e| decode_err(e.to_string()))?;
        let record = decode_row(row).map_err(decode_err)?;
        Ok(Some(SourceRecord { line, record }))
    }
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<SourceRecord, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn decode_row(row: Row) -> Result<ExternalRecord, String> {
    Ok(ExternalRecord {
        classification: Classification::from(row.kind.trim()),
        name: row.name.trim().to_owned(),
        municipality: row.municipality.trim().to_owned(),
        iso_country: row.iso_country.trim().to_owned(),
        iata_code: row.iata_code.trim().to_owned(),
        local_code: row.local_code.trim().to_owned(),
        longitude: parse_optional_f64("longitude_deg", &row.longitude_deg)?,
        latitude: parse_optional_f64("latitude_deg", &row.latitude_deg)?,
        elevation: parse_elevation(&row.elevation_ft)?,
        ident: row.ident.trim().to_owned(),
    })
}

fn parse_optional_f64(column: &str, raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|e| format!("{column}: '{raw}' is not a number ({e})"))?;
    if !value.is_finite() {
        return Err(format!("{column}: '{raw}' is not a finite number"));
    }
    Ok(Some(value))
}

fn parse_elevation(raw: &str) -> Result<i32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(feet) = raw.parse::<i32>() {
        return Ok(feet);
    }
    let feet = raw
        .parse::<f64>()
        .map_err(|e| format!("elevation_ft: '{raw}' is not a number ({e})"))?
        .round();
    if !feet.is_finite() || feet < f64::from(i32::MIN) || feet > f64::from(i32::MAX) {
        return Err(format!("elevation_ft: '{raw}' is out of range"));
    }
    Ok(feet as i32)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const HEADER: &str = "\"id\",\"ident\",\"type\",\"name\",\"latitude_deg\",\"longitude_deg\",\"elevation_ft\",\"continent\",\"iso_country\",\"iso_region\",\"municipality\",\"scheduled_service\",\"gps_code\",\"iata_code\",\"local_code\",\"home_link\",\"wikipedia_link\",\"keywords\"\n";

    fn source(rows: &str) -> RecordSource<Cursor<String>> {
        RecordSource::from_reader(Cursor::new(format!("{HEADER}{rows}")), "airports.csv")
            .expect("header")
    }

    #[test]
    fn decodes_full_row() {
        let mut src = source(
            "3622,\"KJFK\",\"large_airport\",\"John F Kennedy International Airport\",40.639801,-73.7789,13,\"NA\",\"US\",\"US-NY\",\"New York\",\"yes\",\"KJFK\",\"JFK\",\"JFK\",,,\n",
        );
        let rec = src.next().expect("row").expect("decoded");
        assert_eq!(rec.line, 2);
        assert_eq!(rec.record.ident, "KJFK");
        assert_eq!(rec.record.classification, Classification::LargeAirport);
        assert_eq!(rec.record.iata_code, "JFK");
        assert_eq!(rec.record.latitude, Some(40.639801));
        assert_eq!(rec.record.longitude, Some(-73.7789));
        assert_eq!(rec.record.elevation, 13);
        assert_eq!(rec.record.municipality, "New York");
        assert!(src.next().is_none());
    }

    #[test]
    fn blank_numbers_use_defaults() {
        let mut src = source(
            "1,\"00A\",\"heliport\",\"Total Rf Heliport\",,,,\"NA\",\"US\",\"US-PA\",\"Bensalem\",\"no\",\"00A\",,\"00A\",,,\n",
        );
        let rec = src.next().expect("row").expect("decoded").record;
        assert_eq!(rec.longitude, None);
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.elevation, 0);
        assert_eq!(rec.iata_code, "");
    }

    #[test]
    fn malformed_number_reports_line() {
        let mut src = source(
            "1,\"KAAA\",\"small_airport\",\"A\",1.0,2.0,12,\"NA\",\"US\",\"US-PA\",\"X\",\"no\",,,,,,\n\
             2,\"KBBB\",\"small_airport\",\"B\",north,2.0,12,\"NA\",\"US\",\"US-PA\",\"X\",\"no\",,,,,,\n",
        );
        assert!(src.next().expect("row 1").is_ok());
        let err = src.next().expect("row 2").unwrap_err();
        match err {
            SyncError::Decode { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("latitude_deg"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_column_is_rejected_up_front() {
        let data = "ident,type,name\nKJFK,large_airport,JFK\n";
        let err = RecordSource::from_reader(data.as_bytes(), "bad.csv")
            .err()
            .expect("missing columns must fail");
        assert!(err.to_string().contains("missing column 'latitude_deg'"));
    }

    #[test]
    fn fractional_elevation_is_rounded() {
        assert_eq!(parse_elevation("12.6"), Ok(13));
        assert_eq!(parse_elevation("-5"), Ok(-5));
        assert!(parse_elevation("high").is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for raw in ["NaN", "nan", "inf", "-inf", "infinity", "-Infinity"] {
            let err = parse_optional_f64("latitude_deg", raw).unwrap_err();
            assert!(err.contains("not a finite number"), "{raw}: {err}");
            assert!(parse_elevation(raw).is_err(), "{raw}");
        }
        assert!(parse_elevation("1e12").is_err());
        assert_eq!(parse_optional_f64("latitude_deg", "1e2"), Ok(Some(100.0)));

        let mut src = source(
            "1,\"KAAA\",\"small_airport\",\"A\",NaN,2.0,12,\"NA\",\"US\",\"US-PA\",\"X\",\"no\",,,,,,\n\
             2,\"KBBB\",\"small_airport\",\"B\",1.0,2.0,inf,\"NA\",\"US\",\"US-PA\",\"X\",\"no\",,,,,,\n",
        );
        match src.next().expect("row 1").unwrap_err() {
            SyncError::Decode { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("latitude_deg"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        match src.next().expect("row 2").unwrap_err() {
            SyncError::Decode { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("elevation_ft"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
