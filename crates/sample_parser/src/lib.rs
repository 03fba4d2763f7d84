//! Sample parser crate for vital-sign records.
//!
//! Turns a raw `user_id,hr,rr,in_room,ts` record into a [`Sample`], failing closed
//! on any malformed field, and reads header-led historical datasets for training.

use thiserror::Error;
use vitals_structs::{Sample, UserId};

mod history;

pub use history::{HistoryError, HistoryReport, read_history};

/// Number of fields in a request record.
pub const RECORD_FIELDS: usize = 5;

/// Reasons a record is rejected.
///
/// Callers handle every variant the same way; the detail is for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Expected {RECORD_FIELDS} fields, found {found}")]
    FieldCount { found: usize },

    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a request record into a validated sample.
///
/// Numeric fields tolerate surrounding whitespace. `in_room` is an integer where any
/// non-zero value means present. The timestamp is passed through without format checks,
/// minus trailing line terminators.
///
/// # Errors
///
/// Returns an error if the field count is not exactly five or a numeric field does not parse.
pub fn parse_sample(raw: &str) -> Result<Sample, ParseError> {
    let fields: Vec<&str> = raw.split(',').collect();

    let [user_id, hr, rr, in_room, ts] = fields.as_slice() else {
        return Err(ParseError::FieldCount {
            found: fields.len(),
        });
    };

    Ok(Sample {
        user_id: parse_user_id(user_id)?,
        hr: parse_number("hr", hr)?,
        rr: parse_number("rr", rr)?,
        in_room: parse_flag(in_room)?,
        ts: ts.trim_end_matches(['\r', '\n']).to_string(),
    })
}

fn parse_user_id(value: &str) -> Result<UserId, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidField {
        field: "user_id",
        value: value.to_string(),
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_flag(value: &str) -> Result<bool, ParseError> {
    value
        .trim()
        .parse::<i64>()
        .map(|flag| flag != 0)
        .map_err(|_| ParseError::InvalidField {
            field: "in_room",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_record() {
        let sample = parse_sample("1,92.5692246835,16.613924050599998,1,2000-03-20 19:40:00")
            .unwrap();

        assert_eq!(sample.user_id, 1);
        assert!((sample.hr - 92.569_224_683_5).abs() < f64::EPSILON);
        assert!((sample.rr - 16.613_924_050_599_998).abs() < f64::EPSILON);
        assert!(sample.in_room);
        assert_eq!(sample.ts, "2000-03-20 19:40:00");
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        assert_eq!(
            parse_sample("1,62.5692246835,16.613924050599998,1"),
            Err(ParseError::FieldCount { found: 4 })
        );
        assert_eq!(
            parse_sample("1,62.5,16.6,1,2000-03-20 19:40:00,extra"),
            Err(ParseError::FieldCount { found: 6 })
        );
        assert_eq!(parse_sample(""), Err(ParseError::FieldCount { found: 1 }));
    }

    #[test]
    fn test_non_numeric_fields_are_rejected() {
        for (raw, field) in [
            ("x,62.5,16.6,1,2000-03-20 19:40:00", "user_id"),
            ("1.5,62.5,16.6,1,2000-03-20 19:40:00", "user_id"),
            ("1,fast,16.6,1,2000-03-20 19:40:00", "hr"),
            ("1,62.5,,1,2000-03-20 19:40:00", "rr"),
            ("1,62.5,16.6,yes,2000-03-20 19:40:00", "in_room"),
        ] {
            match parse_sample(raw) {
                Err(ParseError::InvalidField { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected invalid {field} for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_in_room_flag_coercion() {
        assert!(!parse_sample("1,62.5,16.6,0,ts").unwrap().in_room);
        assert!(parse_sample("1,62.5,16.6,2,ts").unwrap().in_room);
    }

    #[test]
    fn test_whitespace_and_line_endings() {
        let sample = parse_sample(" 3 , 60.0 ,15.5, 1 ,2000-01-02 03:04:05\r\n").unwrap();
        assert_eq!(sample.user_id, 3);
        assert_eq!(sample.ts, "2000-01-02 03:04:05");
    }

    #[test]
    fn test_timestamp_is_not_validated() {
        let sample = parse_sample("1,62.5,16.6,1,yesterday").unwrap();
        assert_eq!(sample.ts, "yesterday");
    }

    #[test]
    fn test_csv_round_trip() {
        let original =
            parse_sample("42,61.25,-1,0,2020-05-01 00:00:09").unwrap();
        let reparsed = parse_sample(&original.to_csv()).unwrap();
        assert_eq!(original, reparsed);
    }
}
