// Timestamp codec and range matching
//
// Frame filenames look like `2015-12-07T11-22-53.150000-bgrimage.jpg` and
// annotation cells like `11-22-38.817000`. Both decode to the same
// (hour, minute, second, frame ordinal) tuple. The digits after the '.' are an
// opaque integer, never a fraction of a second: `.5` and `.500000` differ.

use crate::error::FormatError;
use chrono::{NaiveTime, Timelike};
use std::cmp::Ordering;
use std::fmt;

/// Literal suffix every frame image carries.
pub const FRAME_SUFFIX: &str = "-bgrimage.jpg";

/// Separator between the calendar date and the time of day in frame names.
pub const DATE_TIME_SEPARATOR: char = 'T';

/// Time of day plus the frame ordinal within that second.
///
/// Ordering and equality only look at `(hour, minute, second, ordinal)`.
/// The number of digits the ordinal was written with is kept so the value can
/// be re-encoded verbatim, but `05` and `5` compare equal.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    time: NaiveTime,
    ordinal: u64,
    ordinal_digits: usize,
}

impl Timestamp {
    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    pub fn second(&self) -> u32 {
        self.time.second()
    }

    pub fn frame_ordinal(&self) -> u64 {
        self.ordinal
    }

    fn key(&self) -> (u32, u32, u32, u64) {
        (self.hour(), self.minute(), self.second(), self.ordinal)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Annotation encoding: `HH-MM-SS.FRACTION`.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}-{:02}.{:0width$}",
            self.hour(),
            self.minute(),
            self.second(),
            self.ordinal,
            width = self.ordinal_digits
        )
    }
}

/// A decoded frame filename. The date is carried verbatim and never compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameName {
    pub date: String,
    pub timestamp: Timestamp,
}

impl FrameName {
    pub fn parse(name: &str) -> Result<Self, FormatError> {
        let base = name
            .strip_suffix(FRAME_SUFFIX)
            .ok_or_else(|| FormatError::MissingSuffix {
                name: name.to_string(),
                suffix: FRAME_SUFFIX,
            })?;

        let (datetime_part, frame_part) = base
            .split_once('.')
            .ok_or_else(|| FormatError::MissingFraction(base.to_string()))?;

        let (date, time_part) = datetime_part
            .split_once(DATE_TIME_SEPARATOR)
            .ok_or_else(|| FormatError::MissingDateSeparator(datetime_part.to_string()))?;

        Ok(Self {
            date: date.to_string(),
            timestamp: decode_parts(time_part, frame_part)?,
        })
    }
}

impl fmt::Display for FrameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.date, DATE_TIME_SEPARATOR, self.timestamp, FRAME_SUFFIX
        )
    }
}

/// Decode the timestamp embedded in a frame image filename.
pub fn decode_frame_filename(name: &str) -> Result<Timestamp, FormatError> {
    FrameName::parse(name).map(|frame| frame.timestamp)
}

/// Decode an annotation start/end cell (`HH-MM-SS.FRACTION`).
pub fn decode_annotation_timestamp(text: &str) -> Result<Timestamp, FormatError> {
    let (time_part, frame_part) = text
        .split_once('.')
        .ok_or_else(|| FormatError::MissingFraction(text.to_string()))?;
    decode_parts(time_part, frame_part)
}

/// Inclusive on both ends. An interval whose end precedes its start is empty.
pub fn in_range(candidate: &Timestamp, start: &Timestamp, end: &Timestamp) -> bool {
    start <= candidate && candidate <= end
}

fn decode_parts(time_part: &str, frame_part: &str) -> Result<Timestamp, FormatError> {
    let time = parse_time_of_day(time_part)?;

    if frame_part.is_empty() || !frame_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::InvalidOrdinal(frame_part.to_string()));
    }
    let ordinal = frame_part
        .parse::<u64>()
        .map_err(|_| FormatError::InvalidOrdinal(frame_part.to_string()))?;

    Ok(Timestamp {
        time,
        ordinal,
        ordinal_digits: frame_part.len(),
    })
}

/// Strict `HH-MM-SS`: three two-digit fields, validated as a time of day.
fn parse_time_of_day(text: &str) -> Result<NaiveTime, FormatError> {
    let invalid = || FormatError::InvalidTime(text.to_string());

    let fields = text
        .split('-')
        .map(|f| {
            if f.len() == 2 && f.bytes().all(|b| b.is_ascii_digit()) {
                f.parse::<u32>().ok()
            } else {
                None
            }
        })
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(invalid)?;

    match fields.as_slice() {
        // from_hms_opt rejects leap seconds, so second stays within 0..=59
        [h, m, s] => NaiveTime::from_hms_opt(*h, *m, *s).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        decode_annotation_timestamp(text).unwrap()
    }

    #[test]
    fn test_decode_frame_filename() {
        let t = decode_frame_filename("2015-12-07T11-22-53.150000-bgrimage.jpg").unwrap();
        assert_eq!(t.hour(), 11);
        assert_eq!(t.minute(), 22);
        assert_eq!(t.second(), 53);
        assert_eq!(t.frame_ordinal(), 150000);
    }

    #[test]
    fn test_frame_filename_round_trip() {
        let names = [
            "2015-12-07T11-22-53.150000-bgrimage.jpg",
            "2016-01-30T00-00-00.0-bgrimage.jpg",
            "2015-12-07T23-59-59.000120-bgrimage.jpg",
            "2015-12-07T08-05-09.7-bgrimage.jpg",
        ];
        for name in names {
            let frame = FrameName::parse(name).unwrap();
            assert_eq!(frame.to_string(), name);
        }
    }

    #[test]
    fn test_decode_frame_filename_rejects_bad_names() {
        assert!(matches!(
            decode_frame_filename("2015-12-07T11-22-53.150000.jpg"),
            Err(FormatError::MissingSuffix { .. })
        ));
        assert!(matches!(
            decode_frame_filename("2015-12-07T11-22-53-bgrimage.jpg"),
            Err(FormatError::MissingFraction(_))
        ));
        assert!(matches!(
            decode_frame_filename("2015-12-07 11-22-53.1-bgrimage.jpg"),
            Err(FormatError::MissingDateSeparator(_))
        ));
        assert!(matches!(
            decode_frame_filename("2015-12-07T1-22-53.1-bgrimage.jpg"),
            Err(FormatError::InvalidTime(_))
        ));
        assert!(matches!(
            decode_frame_filename("2015-12-07T25-22-53.1-bgrimage.jpg"),
            Err(FormatError::InvalidTime(_))
        ));
        assert!(matches!(
            decode_frame_filename("2015-12-07T11-22-53.1a-bgrimage.jpg"),
            Err(FormatError::InvalidOrdinal(_))
        ));
    }

    #[test]
    fn test_decode_annotation_timestamp() {
        let t = ts("11-22-38.817000");
        assert_eq!((t.hour(), t.minute(), t.second()), (11, 22, 38));
        assert_eq!(t.frame_ordinal(), 817000);

        assert!(matches!(
            decode_annotation_timestamp("11-22-38"),
            Err(FormatError::MissingFraction(_))
        ));
        assert!(matches!(
            decode_annotation_timestamp("11:22:38.5"),
            Err(FormatError::InvalidTime(_))
        ));
        assert!(matches!(
            decode_annotation_timestamp("11-22-38."),
            Err(FormatError::InvalidOrdinal(_))
        ));
    }

    #[test]
    fn test_encodings_agree() {
        let from_file = decode_frame_filename("2015-12-07T11-22-38.817000-bgrimage.jpg").unwrap();
        assert_eq!(from_file, ts("11-22-38.817000"));
    }

    #[test]
    fn test_ordinal_is_not_a_fraction() {
        assert_ne!(ts("11-22-38.5"), ts("11-22-38.500000"));
        assert!(ts("11-22-38.5") < ts("11-22-38.500000"));
        assert_eq!(ts("11-22-38.05"), ts("11-22-38.5"));
    }

    #[test]
    fn test_in_range_inclusive_bounds() {
        let start = ts("11-22-38.0");
        let end = ts("11-22-40.2");
        assert!(in_range(&start, &start, &end));
        assert!(in_range(&end, &start, &end));
        assert!(in_range(&ts("11-22-39.5"), &start, &end));
        assert!(!in_range(&ts("11-22-37.9"), &start, &end));
        assert!(!in_range(&ts("11-22-41.0"), &start, &end));
    }

    #[test]
    fn test_in_range_same_second_uses_ordinal() {
        let start = ts("11-22-38.3");
        let end = ts("11-22-38.7");
        assert!(!in_range(&ts("11-22-38.2"), &start, &end));
        assert!(in_range(&ts("11-22-38.5"), &start, &end));
        assert!(!in_range(&ts("11-22-38.8"), &start, &end));
    }

    #[test]
    fn test_in_range_monotonic_past_end() {
        let start = ts("10-00-00.0");
        let end = ts("10-00-05.3");
        let inside = ts("10-00-04.9");
        assert!(in_range(&inside, &start, &end));
        for later in ["10-00-05.4", "10-00-06.0", "10-01-00.0", "11-00-00.0"] {
            assert!(!in_range(&ts(later), &start, &end), "{later} should be out");
        }
    }

    #[test]
    fn test_inverted_interval_is_empty() {
        let start = ts("23-59-58.0");
        let end = ts("00-00-02.0");
        assert!(!in_range(&ts("23-59-59.0"), &start, &end));
        assert!(!in_range(&ts("00-00-01.0"), &start, &end));
        assert!(!in_range(&start, &start, &end));
    }
}
