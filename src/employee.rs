// Employee record and the fixed designation category set

use serde::{Deserialize, Serialize};

/// A single employee record.
///
/// `id` is assigned by the upstream source and is never regenerated here;
/// the store keys on it. `designation` arrives as free text from the input
/// file and is rewritten to a canonical category code by the mapping step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub designation: String,
}

impl Employee {
    pub fn new(id: i64, name: impl Into<String>, designation: impl Into<String>) -> Self {
        Employee {
            id,
            name: name.into(),
            designation: designation.into(),
        }
    }
}

// ============================================================================
// DESIGNATION
// ============================================================================

/// Fixed set of designation categories an employee can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Designation {
    Manager,
    Developer,
    Tester,
    Analyst,
    Support,
}

impl Designation {
    pub const ALL: [Designation; 5] = [
        Designation::Manager,
        Designation::Developer,
        Designation::Tester,
        Designation::Analyst,
        Designation::Support,
    ];

    /// Canonical code stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Designation::Manager => "MANAGER",
            Designation::Developer => "DEVELOPER",
            Designation::Tester => "TESTER",
            Designation::Analyst => "ANALYST",
            Designation::Support => "SUPPORT",
        }
    }

    /// Parse a canonical code (exact match only).
    pub fn parse(code: &str) -> Option<Designation> {
        Designation::ALL.into_iter().find(|d| d.as_str() == code)
    }
}

// ============================================================================
// TESTS
// ============================================================================
