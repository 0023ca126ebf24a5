//! File identifier derivation.
//!
//! The identifier is what the server keys its stored chunks on, so it must
//! be stable across sessions for the same physical file:
//!
//! ```text
//! <size>-<last-modified millis, or 0>-<escaped name>
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Timestamps closer than this to the observation time are replaced by 0.
///
/// Freshly created files (and clocks that disagree about "now") report
/// modification times that change between observations, which would break
/// identifier stability. A zero timestamp keeps the id stable at the cost of
/// colliding for same-name, same-size files added within the window.
pub const TIMESTAMP_FRESHNESS_WINDOW: Duration = Duration::from_secs(1);

/// Every byte except ASCII alphanumerics and `_` is escaped.
const NAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_');

const ID_DELIMITER: char = '-';

/// Derives the stable identifier of a file.
///
/// `now` is the observation time used by the freshness guard.
pub fn file_id(size: u64, last_modified: Option<SystemTime>, name: &str, now: SystemTime) -> String {
    let millis = last_modified
        .filter(|modified| is_reliable_timestamp(*modified, now))
        .map(unix_millis)
        .unwrap_or(0);
    format!(
        "{size}{ID_DELIMITER}{millis}{ID_DELIMITER}{}",
        escape_name(name)
    )
}

/// Percent-escapes a file name: UTF-8 bytes outside `[A-Za-z0-9_]` become
/// `%XX` with uppercase hex digits.
pub fn escape_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ESCAPE).to_string()
}

/// Returns the lower-cased text after the last `.` of `name`, or an empty
/// string when the name has no dot.
pub fn file_extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn is_reliable_timestamp(modified: SystemTime, now: SystemTime) -> bool {
    // A timestamp in the future yields Err and is treated as fresh.
    now.duration_since(modified)
        .is_ok_and(|age| age >= TIMESTAMP_FRESHNESS_WINDOW)
}

fn unix_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}
