//! CSV archive functionality
//!
//! Archives are flat, row-oriented CSV files with a header row. Any serde
//! struct with scalar fields can be written with an [`Archiver`] and read back
//! with an [`ArchiveReader`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

// Internal imports
use crate::session::Session;

pub use csv::Error as ArchiveError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: csv::Writer<BufWriter<File>>
}

/// Reads rows of type `T` back out of a CSV archive.
pub struct ArchiveReader<T> {
    reader: csv::Reader<BufReader<File>>,
    headers: StringRecord,
    _row: PhantomData<T>
}

/// A single row read from an archive.
///
/// `row` is the zero-based data row index, i.e. not counting the header.
pub struct ArchiveRow<T> {
    pub row: usize,
    pub result: Result<T, ArchiveError>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver at the given path, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::create(path)?;

        let writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(BufWriter::new(file));

        Ok(Self { writer })
    }

    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        let session_path = session.arch_root.join(path);

        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::create(session_path)
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: &T) -> Result<(), ArchiveError> {
        self.writer.serialize(record)
    }

    /// Serialise all records from an iterator into the archive and flush.
    pub fn serialise_all<'a, T, I>(&mut self, records: I) -> Result<usize, ArchiveError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>
    {
        let mut num = 0;
        for r in records {
            self.serialise(r)?;
            num += 1;
        }
        self.flush()?;
        Ok(num)
    }

    /// Flush buffered rows to disk.
    pub fn flush(&mut self) -> Result<(), ArchiveError> {
        self.writer.flush().map_err(ArchiveError::from)
    }
}

impl<T: DeserializeOwned> ArchiveReader<T> {
    /// Open an archive for reading. The first line must be a header row.
    ///
    /// Rows are not allowed to have a different number of fields to the
    /// header, any that do are reported as errors by [`ArchiveReader::rows`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            _row: PhantomData
        })
    }

    /// The header row of the archive.
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Iterate over every data row, each parsed independently.
    pub fn rows(&mut self) -> impl Iterator<Item = ArchiveRow<T>> + '_ {
        let headers = self.headers.clone();
        self.reader
            .records()
            .enumerate()
            .map(move |(row, rec)| ArchiveRow {
                row,
                result: rec.and_then(|r| r.deserialize(Some(&headers)))
            })
    }
}
