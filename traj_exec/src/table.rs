//! # Exchange table
//!
//! The exchange table is the only thing shared between generation and playback. It is a CSV file
//! with a header row naming the [`SetPoint`] columns, followed by one row per set-point in
//! playback order. The table is written once by generation and treated as read-only afterwards;
//! concurrent readers and writers of the same file are not supported.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use comms_if::traj::SetPoint;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use util::archive::{ArchiveError, ArchiveReader, ArchiveRow, Archiver};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How malformed rows are handled when reading a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// The first malformed row fails the whole read
    Strict,

    /// Malformed rows are skipped with a warning
    Lenient,
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Could not open table {0:?}: {1}")]
    Open(PathBuf, ArchiveError),

    #[error("Could not write table {0:?}: {1}")]
    Write(PathBuf, ArchiveError),

    #[error("Table header is missing columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Malformed table row {row}: {source}")]
    Row { row: usize, source: ArchiveError },

    #[error("Table row {row} has a non-finite value in column {column}")]
    NonFinite { row: usize, column: &'static str },

    #[error("Table {0:?} contains no valid set-points")]
    Empty(PathBuf),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::Strict
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Write the set-points to a new table at `path`, replacing any existing file.
///
/// Returns the number of rows written. Nothing is written if any set-point is not finite.
pub fn write_table<P: AsRef<Path>>(path: P, set_points: &[SetPoint]) -> Result<usize, FormatError> {
    let path = path.as_ref();

    check_finite(set_points)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FormatError::Write(path.to_path_buf(), ArchiveError::from(e)))?;
    }

    let mut arch =
        Archiver::create(path).map_err(|e| FormatError::Write(path.to_path_buf(), e))?;
    let num = arch
        .serialise_all(set_points)
        .map_err(|e| FormatError::Write(path.to_path_buf(), e))?;

    debug!("Wrote {} set-points to {:?}", num, path);

    Ok(num)
}

/// Read every set-point from the table at `path`.
///
/// The whole table is parsed before returning, so a caller never sees part of a malformed table.
pub fn read_table<P: AsRef<Path>>(path: P, mode: ParseMode) -> Result<Vec<SetPoint>, FormatError> {
    let path = path.as_ref();

    let mut reader = ArchiveReader::<SetPoint>::open(path)
        .map_err(|e| FormatError::Open(path.to_path_buf(), e))?;

    let missing: Vec<String> = SetPoint::COLUMNS
        .iter()
        .filter(|c| !reader.headers().iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(FormatError::MissingColumns(missing));
    }

    let mut set_points = Vec::new();
    let mut num_skipped = 0usize;

    for ArchiveRow { row, result } in reader.rows() {
        let parsed = result
            .map_err(|source| FormatError::Row { row, source })
            .and_then(|sp| match sp.first_non_finite() {
                Some(i) => Err(FormatError::NonFinite {
                    row,
                    column: SetPoint::COLUMNS[i],
                }),
                None => Ok(sp),
            });

        match (parsed, mode) {
            (Ok(sp), _) => set_points.push(sp),
            (Err(e), ParseMode::Strict) => return Err(e),
            (Err(e), ParseMode::Lenient) => {
                warn!("Skipping row: {}", e);
                num_skipped += 1;
            }
        }
    }

    if set_points.is_empty() {
        return Err(FormatError::Empty(path.to_path_buf()));
    }

    debug!(
        "Read {} set-points from {:?} ({} rows skipped)",
        set_points.len(),
        path,
        num_skipped
    );

    Ok(set_points)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_finite(set_points: &[SetPoint]) -> Result<(), FormatError> {
    for (row, sp) in set_points.iter().enumerate() {
        if let Some(i) = sp.first_non_finite() {
            return Err(FormatError::NonFinite {
                row,
                column: SetPoint::COLUMNS[i],
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraint::test::scenario_a_constraints;
    use crate::pattern::test::scenario_a;
    use crate::sample::sample;
    use crate::synth::synthesize;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("traj_lib_table_{}.csv", name))
    }

    fn header() -> String {
        SetPoint::COLUMNS.join(",")
    }

    fn row(time_s: f64) -> String {
        let mut vals = vec![time_s.to_string()];
        vals.extend(std::iter::repeat("0.5".to_string()).take(19));
        vals.join(",")
    }

    #[test]
    fn test_write_read_exact() {
        let path = temp_path("write_read");
        let cons = scenario_a_constraints(&scenario_a());
        let samples = sample(&synthesize(&cons).unwrap(), 0.5).unwrap();

        assert_eq!(write_table(&path, &samples).unwrap(), samples.len());
        let read = read_table(&path, ParseMode::Strict).unwrap();

        // Bit exact, including the quaternion components
        assert_eq!(read, samples);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_velocity_field() {
        // Scenario C: one row is missing its vx_ms value
        let path = temp_path("missing_vel");
        let mut short = vec!["1.0".to_string(); 20];
        short.remove(8);
        let contents = format!("{}\n{}\n{}\n{}\n", header(), row(0.0), short.join(","), row(2.0));
        std::fs::write(&path, contents).unwrap();

        assert!(matches!(
            read_table(&path, ParseMode::Strict),
            Err(FormatError::Row { row: 1, .. })
        ));

        // Lenient mode skips it
        let read = read_table(&path, ParseMode::Lenient).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].time_s, 2.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_non_numeric_and_non_finite() {
        let path = temp_path("non_numeric");
        let bad = row(1.0).replacen("0.5", "abc", 1);
        std::fs::write(&path, format!("{}\n{}\n{}\n", header(), row(0.0), bad)).unwrap();
        assert!(matches!(
            read_table(&path, ParseMode::Strict),
            Err(FormatError::Row { row: 1, .. })
        ));

        let nan = row(1.0).replacen("0.5", "NaN", 2).replacen("NaN", "0.5", 1);
        std::fs::write(&path, format!("{}\n{}\n", header(), nan)).unwrap();
        assert!(matches!(
            read_table(&path, ParseMode::Strict),
            Err(FormatError::NonFinite { row: 0, column: "y_m" })
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_and_missing_columns() {
        let path = temp_path("empty");
        std::fs::write(&path, format!("{}\n", header())).unwrap();
        assert!(matches!(
            read_table(&path, ParseMode::Lenient),
            Err(FormatError::Empty(_))
        ));

        std::fs::write(&path, "time_s,x_m\n0.0,1.0\n").unwrap();
        match read_table(&path, ParseMode::Strict) {
            Err(FormatError::MissingColumns(cols)) => assert_eq!(cols.len(), 18),
            r => panic!("Expected missing columns, got {:?}", r),
        }

        std::fs::remove_file(&path).ok();

        assert!(matches!(
            read_table(temp_path("does_not_exist"), ParseMode::Strict),
            Err(FormatError::Open(..))
        ));
    }

    #[test]
    fn test_write_rejects_non_finite() {
        let path = temp_path("write_nan");
        let sps = vec![
            SetPoint::default(),
            SetPoint {
                wz_rads: f64::INFINITY,
                ..Default::default()
            },
        ];

        assert!(matches!(
            write_table(&path, &sps),
            Err(FormatError::NonFinite { row: 1, column: "wz_rads" })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_mode_from_toml() {
        #[derive(Deserialize)]
        struct P {
            #[serde(default)]
            mode: ParseMode,
        }

        let p: P = util::params::from_str("mode = \"lenient\"").unwrap();
        assert_eq!(p.mode, ParseMode::Lenient);
        let p: P = util::params::from_str("").unwrap();
        assert_eq!(p.mode, ParseMode::Strict);
    }
}
