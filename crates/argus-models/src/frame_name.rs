//! Persisted frame naming.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// `strftime` format of the timestamp part of a frame file name.
pub const FRAME_TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H-%M-%S";

/// Suffix marking frames with detections.
pub const DETECTED_SUFFIX: &str = "detected";

/// File name for a persisted frame: `{timestamp}[-detected].jpg`.
pub fn frame_file_name<Tz>(timestamp: &DateTime<Tz>, detected: bool) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let stamp = timestamp.format(FRAME_TIMESTAMP_FORMAT);
    if detected {
        format!("{}-{}.jpg", stamp, DETECTED_SUFFIX)
    } else {
        format!("{}.jpg", stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_frame_file_name() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(frame_file_name(&ts, false), "07-03-2024-09-05-01.jpg");
        assert_eq!(frame_file_name(&ts, true), "07-03-2024-09-05-01-detected.jpg");
    }
}
