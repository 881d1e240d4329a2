// Record readers - lazy, finite sequences of employees from a file or the store

use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use crate::employee::Employee;
use crate::store;

/// Page size used when reading back from the store.
pub const PAGE_SIZE: usize = 100;

/// A lazy, finite sequence of employee records.
///
/// `read` returns `Ok(None)` once the source is exhausted. A fresh reader
/// restarts from the beginning of its source.
pub trait EmployeeReader {
    fn read(&mut self) -> Result<Option<Employee>>;
}

// ============================================================================
// CSV FILE READER
// ============================================================================

/// Reads employees from a delimited text file.
///
/// The first line is a header and is skipped. Each subsequent line carries
/// exactly three fields (id, name, designation) mapped positionally onto
/// [`Employee`], with surrounding whitespace trimmed. The file is opened
/// lazily on the first `read` call.
pub struct CsvEmployeeReader {
    path: PathBuf,
    records: Option<csv::StringRecordsIntoIter<File>>,
}

impl CsvEmployeeReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvEmployeeReader {
            path: path.into(),
            records: None,
        }
    }

    fn open(&self) -> Result<csv::StringRecordsIntoIter<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open input file {}", self.path.display()))?;

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);

        Ok(reader.into_records())
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Employee> {
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != 3 {
            bail!(
                "line {}: expected 3 fields (id, name, designation), got {}",
                line,
                record.len()
            );
        }

        let id: i64 = record[0]
            .parse()
            .with_context(|| format!("line {}: invalid employee id '{}'", line, &record[0]))?;

        Ok(Employee::new(id, &record[1], &record[2]))
    }
}

impl EmployeeReader for CsvEmployeeReader {
    fn read(&mut self) -> Result<Option<Employee>> {
        if self.records.is_none() {
            self.records = Some(self.open()?);
        }
        let Some(records) = self.records.as_mut() else {
            return Ok(None);
        };

        match records.next() {
            None => Ok(None),
            Some(record) => {
                let record = record
                    .with_context(|| format!("failed to read record from {}", self.path.display()))?;
                Self::parse_record(&record).map(Some)
            }
        }
    }
}

// ============================================================================
// STORE READER
// ============================================================================

/// Reads all persisted employees in ascending id order, one page at a time.
///
/// Pagination is keyset-based (id greater than the last id seen), so rows
/// updated between page fetches are neither skipped nor repeated.
pub struct StoreEmployeeReader<'conn> {
    conn: &'conn Connection,
    page_size: usize,
    last_id: Option<i64>,
    buffer: VecDeque<Employee>,
    exhausted: bool,
}

impl<'conn> StoreEmployeeReader<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_page_size(conn, PAGE_SIZE)
    }

    pub fn with_page_size(conn: &'conn Connection, page_size: usize) -> Self {
        StoreEmployeeReader {
            conn,
            page_size,
            last_id: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill_buffer(&mut self) -> Result<()> {
        let page = store::fetch_page(self.conn, self.last_id, self.page_size)?;

        match page.last() {
            None => self.exhausted = true,
            Some(last) => {
                self.last_id = Some(last.id);
                self.buffer.extend(page);
            }
        }

        Ok(())
    }
}

impl EmployeeReader for StoreEmployeeReader<'_> {
    fn read(&mut self) -> Result<Option<Employee>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill_buffer()?;
        }
        Ok(self.buffer.pop_front())
    }
}

// ============================================================================
// TESTS
// ============================================================================
