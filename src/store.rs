// SQLite persistence for employee records

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::employee::Employee;

/// Open (or create) the database at `path` with WAL mode enabled.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    Ok(conn)
}

/// Idempotent DDL for the employee table.
pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            designation TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Fetch up to `limit` employees with id greater than `after_id`, ascending.
pub fn fetch_page(
    conn: &Connection,
    after_id: Option<i64>,
    limit: usize,
) -> Result<Vec<Employee>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, designation FROM employees
         WHERE ?1 IS NULL OR id > ?1
         ORDER BY id ASC
         LIMIT ?2",
    )?;

    let employees = stmt
        .query_map(params![after_id, limit as i64], |row| {
            Ok(Employee {
                id: row.get(0)?,
                name: row.get(1)?,
                designation: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(employees)
}

pub fn get_employee(conn: &Connection, id: i64) -> Result<Option<Employee>> {
    let mut stmt =
        conn.prepare("SELECT id, name, designation FROM employees WHERE id = ?1")?;

    let mut rows = stmt
        .query_map(params![id], |row| {
            Ok(Employee {
                id: row.get(0)?,
                name: row.get(1)?,
                designation: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows.pop())
}

pub fn count_employees(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// WRITER
// ============================================================================

/// Persists chunks of employees, keyed by id.
///
/// Each chunk is upserted inside a single transaction: re-running with the
/// same ids overwrites rather than duplicates, and a failure mid-chunk
/// leaves the store as it was before the chunk.
pub struct EmployeeWriter<'conn> {
    conn: &'conn Connection,
}

impl<'conn> EmployeeWriter<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        EmployeeWriter { conn }
    }

    /// Upsert a chunk of employees. Returns the number of records written.
    pub fn write(&self, employees: &[Employee]) -> Result<usize> {
        if employees.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO employees (id, name, designation, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     designation = excluded.designation,
                     updated_at = excluded.updated_at",
            )?;

            for employee in employees {
                stmt.execute(params![
                    employee.id,
                    employee.name,
                    employee.designation,
                    now,
                ])?;
            }
        }
        tx.commit().context("failed to commit employee chunk")?;

        Ok(employees.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================
