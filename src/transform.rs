// Record processors - pure per-record transformations between read and write

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::employee::{Designation, Employee};

/// A pure per-record transformation applied between reading and writing.
pub trait EmployeeProcessor {
    fn process(&self, employee: Employee) -> Result<Employee>;
}

// ============================================================================
// NAME NORMALIZER
// ============================================================================

/// Normalizes the free-text name field: trims the ends, collapses internal
/// whitespace runs, and capitalizes each word ("  john   doe " -> "John Doe").
pub struct NameNormalizer;

impl NameNormalizer {
    pub fn normalize(name: &str) -> String {
        name.split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl EmployeeProcessor for NameNormalizer {
    fn process(&self, mut employee: Employee) -> Result<Employee> {
        employee.name = Self::normalize(&employee.name);
        Ok(employee)
    }
}

// ============================================================================
// DESIGNATION MAPPER
// ============================================================================

/// Maps free-text designations onto the fixed category set.
///
/// The alias table is data, not code: a built-in default set, optionally
/// extended from a JSON file ({"alias": "CODE", ...}). Lookups are
/// case-insensitive and whitespace-insensitive. An unrecognized designation
/// is an error and aborts the step.
#[derive(Debug)]
pub struct DesignationMapper {
    aliases: HashMap<String, Designation>,
}

impl DesignationMapper {
    /// Create a mapper with the built-in alias table.
    ///
    /// Every canonical code resolves to its own category, so re-mapping
    /// already-mapped records is a no-op rather than an error.
    pub fn new() -> Self {
        let mut mapper = DesignationMapper {
            aliases: HashMap::new(),
        };

        for designation in Designation::ALL {
            mapper.insert(designation.as_str(), designation);
        }

        // Manager
        mapper.insert("manager", Designation::Manager);
        mapper.insert("mgr", Designation::Manager);
        mapper.insert("team lead", Designation::Manager);
        mapper.insert("lead", Designation::Manager);

        // Developer
        mapper.insert("developer", Designation::Developer);
        mapper.insert("dev", Designation::Developer);
        mapper.insert("engineer", Designation::Developer);
        mapper.insert("software engineer", Designation::Developer);
        mapper.insert("programmer", Designation::Developer);

        // Tester
        mapper.insert("tester", Designation::Tester);
        mapper.insert("qa", Designation::Tester);
        mapper.insert("qa engineer", Designation::Tester);
        mapper.insert("quality engineer", Designation::Tester);

        // Analyst
        mapper.insert("analyst", Designation::Analyst);
        mapper.insert("business analyst", Designation::Analyst);
        mapper.insert("data analyst", Designation::Analyst);

        // Support
        mapper.insert("support", Designation::Support);
        mapper.insert("support engineer", Designation::Support);
        mapper.insert("helpdesk", Designation::Support);

        mapper
    }

    /// Load extra aliases from a JSON file on top of the built-in table.
    /// File entries win over built-ins on collision.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read rules file: {:?}", path.as_ref()))?;

        let entries: HashMap<String, String> =
            serde_json::from_str(&content).context("failed to parse rules JSON")?;

        let mut mapper = DesignationMapper::new();
        for (alias, code) in entries {
            let designation = match Designation::parse(&code) {
                Some(d) => d,
                None => bail!("rules file maps '{}' to unknown designation code '{}'", alias, code),
            };
            mapper.insert(&alias, designation);
        }

        Ok(mapper)
    }

    /// Add a single alias, returning the mapper for chained construction.
    pub fn with_alias(mut self, alias: &str, designation: Designation) -> Self {
        self.insert(alias, designation);
        self
    }

    /// Resolve a free-text designation to a category, if known.
    pub fn resolve(&self, text: &str) -> Option<Designation> {
        self.aliases.get(&Self::key(text)).copied()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    fn insert(&mut self, alias: &str, designation: Designation) {
        self.aliases.insert(Self::key(alias), designation);
    }

    /// Lookup key: lowercased with whitespace runs collapsed.
    fn key(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ")
            .to_lowercase()
    }
}

impl Default for DesignationMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeProcessor for DesignationMapper {
    fn process(&self, mut employee: Employee) -> Result<Employee> {
        match self.resolve(&employee.designation) {
            Some(designation) => {
                employee.designation = designation.as_str().to_string();
                Ok(employee)
            }
            None => bail!(
                "unrecognized designation '{}' for employee {}",
                employee.designation,
                employee.id
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_name() {
        assert_eq!(NameNormalizer::normalize("john doe"), "John Doe");
        assert_eq!(NameNormalizer::normalize("  john   doe "), "John Doe");
        assert_eq!(NameNormalizer::normalize("ALICE SMITH"), "Alice Smith");
        assert_eq!(NameNormalizer::normalize("bob"), "Bob");
        assert_eq!(NameNormalizer::normalize(""), "");
        assert_eq!(NameNormalizer::normalize("   "), "");
    }

    #[test]
    fn test_name_normalizer_touches_only_the_name() {
        let employee = Employee::new(1, "john doe", " manager");
        let processed = NameNormalizer.process(employee).unwrap();

        assert_eq!(processed.id, 1);
        assert_eq!(processed.name, "John Doe");
        assert_eq!(processed.designation, " manager");
    }

    #[test]
    fn test_mapper_resolves_default_aliases() {
        let mapper = DesignationMapper::new();

        assert_eq!(mapper.resolve("manager"), Some(Designation::Manager));
        assert_eq!(mapper.resolve("MGR"), Some(Designation::Manager));
        assert_eq!(mapper.resolve(" Software   Engineer "), Some(Designation::Developer));
        assert_eq!(mapper.resolve("qa"), Some(Designation::Tester));
        assert_eq!(mapper.resolve("business analyst"), Some(Designation::Analyst));
        assert_eq!(mapper.resolve("helpdesk"), Some(Designation::Support));
    }

    #[test]
    fn test_mapper_accepts_canonical_codes() {
        // Re-running the mapping step over already-mapped records must not fail
        let mapper = DesignationMapper::new();

        for designation in Designation::ALL {
            assert_eq!(mapper.resolve(designation.as_str()), Some(designation));
        }
    }

    #[test]
    fn test_mapper_rewrites_designation() {
        let mapper = DesignationMapper::new();
        let employee = Employee::new(1, "John Doe", "manager");

        let processed = mapper.process(employee).unwrap();
        assert_eq!(processed.designation, "MANAGER");
    }

    #[test]
    fn test_mapper_unknown_designation_is_an_error() {
        let mapper = DesignationMapper::new();
        let employee = Employee::new(9, "Merlin", "wizard");

        let result = mapper.process(employee);
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("wizard"));
        assert!(message.contains('9'));
    }

    #[test]
    fn test_mapper_with_alias() {
        let mapper = DesignationMapper::new().with_alias("wizard", Designation::Developer);

        assert_eq!(mapper.resolve("wizard"), Some(Designation::Developer));
        assert_eq!(mapper.resolve("manager"), Some(Designation::Manager));
    }

    #[test]
    fn test_mapper_from_file_extends_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"wizard": "DEVELOPER", "scrum master": "MANAGER"}}"#).unwrap();

        let mapper = DesignationMapper::from_file(file.path()).unwrap();

        assert_eq!(mapper.resolve("wizard"), Some(Designation::Developer));
        assert_eq!(mapper.resolve("Scrum  Master"), Some(Designation::Manager));
        // built-ins survive
        assert_eq!(mapper.resolve("tester"), Some(Designation::Tester));
    }

    #[test]
    fn test_mapper_from_file_rejects_unknown_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"wizard": "SORCERER"}}"#).unwrap();

        let result = DesignationMapper::from_file(file.path());
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("SORCERER"));
    }
}
