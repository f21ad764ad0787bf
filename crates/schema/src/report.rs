use physim_document::NodePath;
use std::fmt;

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: NodePath,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Ordered list of violations. Empty means the document conforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    pub(crate) fn push(&mut self, path: NodePath, message: impl Into<String>) {
        self.violations.push(Violation {
            path,
            message: message.into(),
        });
    }

    pub(crate) fn extend(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid());
        assert_eq!(report.to_string(), "");
    }

    #[test]
    fn display_lists_each_violation() {
        let mut report = ValidationReport::new();
        report.push(NodePath::root().key("a"), "required property is missing");
        report.push(
            NodePath::root().key("bodies").index(1).key("mass"),
            "expected number, found string",
        );
        assert!(!report.is_valid());
        assert_eq!(
            report.to_string(),
            "a: required property is missing\nbodies[1].mass: expected number, found string"
        );
    }
}
