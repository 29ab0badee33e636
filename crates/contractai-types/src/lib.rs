//! Shared types and error definitions for the ContractAI platform.
//!
//! This crate provides the foundational types used across all ContractAI
//! crates: the closed status/severity enumerations of the data model and
//! the application error taxonomy (via [`AppError`]) with its HTTP
//! serialization contract.
//!
//! No crate in the workspace depends on anything *except* `contractai-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};

/// Processing status of an uploaded document.
///
/// The lifecycle runs `Uploaded` → `Processing` → `Processed` or `Failed`.
/// The set is closed: no other string value is valid in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// The file has been stored but not yet picked up by the pipeline.
    Uploaded,
    /// The analysis pipeline is working on the document.
    Processing,
    /// Analysis finished successfully.
    Processed,
    /// Analysis failed; the document keeps its extracted state, if any.
    Failed,
}

impl DocumentStatus {
    /// Returns the canonical column value for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Attempts to convert a stored column value back to a status.
    ///
    /// Returns `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a clause risk.
///
/// Ordered from least to most severe, so `RiskLevel::Critical` compares
/// greater than every other level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Cosmetic or informational; no action expected.
    Negligible,
    /// Minor exposure; fix opportunistically.
    Low,
    /// Material exposure; should be reviewed.
    Medium,
    /// Serious exposure; review before signing.
    High,
    /// Deal-breaking exposure; must be resolved.
    Critical,
}

impl RiskLevel {
    /// Returns the canonical column value for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Attempts to convert a stored column value back to a level.
    ///
    /// Returns `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "negligible" => Some(Self::Negligible),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

mod error;
pub use error::{AppError, ErrorKind, JsonMap};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_status_round_trip() {
        for status in [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::Processed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn document_status_invalid() {
        assert_eq!(DocumentStatus::parse(""), None);
        assert_eq!(DocumentStatus::parse("UPLOADED"), None);
        assert_eq!(DocumentStatus::parse("done"), None);
    }

    #[test]
    fn risk_level_round_trip() {
        for level in [
            RiskLevel::Negligible,
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            assert_eq!(RiskLevel::parse(level.as_str()), Some(level));
        }
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert!(RiskLevel::Low > RiskLevel::Negligible);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Uploaded).unwrap(),
            "\"uploaded\""
        );
        assert_eq!(
            serde_json::to_string(&RiskLevel::Critical).unwrap(),
            "\"critical\""
        );
    }
}
