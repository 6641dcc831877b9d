//! Canonical coverage types and the display-string lookup table.

use serde::{Deserialize, Serialize};

/// Canonical insurance coverage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    #[serde(alias = "life", alias = "term-life")]
    TermLife,
    #[serde(alias = "whole-life")]
    WholeLife,
    Health,
    Dental,
    Vision,
    Disability,
    Auto,
    Home,
    Renters,
    Pet,
}

impl CoverageType {
    pub const ALL: [CoverageType; 10] = [
        CoverageType::TermLife,
        CoverageType::WholeLife,
        CoverageType::Health,
        CoverageType::Dental,
        CoverageType::Vision,
        CoverageType::Disability,
        CoverageType::Auto,
        CoverageType::Home,
        CoverageType::Renters,
        CoverageType::Pet,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TermLife => "term_life",
            Self::WholeLife => "whole_life",
            Self::Health => "health",
            Self::Dental => "dental",
            Self::Vision => "vision",
            Self::Disability => "disability",
            Self::Auto => "auto",
            Self::Home => "home",
            Self::Renters => "renters",
            Self::Pet => "pet",
        }
    }

    /// Human readable label, used in synthetic feature lists and logs.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::TermLife => "Term Life",
            Self::WholeLife => "Whole Life",
            Self::Health => "Health",
            Self::Dental => "Dental",
            Self::Vision => "Vision",
            Self::Disability => "Disability",
            Self::Auto => "Auto",
            Self::Home => "Homeowners",
            Self::Renters => "Renters",
            Self::Pet => "Pet",
        }
    }

    /// Resolves a caller supplied coverage string to its canonical type.
    ///
    /// Matching ignores case, surrounding whitespace, `-`/space separators and a
    /// trailing "insurance", so `"Term Life Insurance"`, `"term-life"` and
    /// `"life"` all resolve to [`CoverageType::TermLife`].
    pub fn from_display(value: &str) -> Option<Self> {
        let mut key: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        if let Some(stripped) = key.strip_suffix("_insurance") {
            key = stripped.to_string();
        }

        let coverage = match key.as_str() {
            "term_life" | "life" | "term" => Self::TermLife,
            "whole_life" | "permanent_life" | "universal_life" => Self::WholeLife,
            "health" | "medical" | "major_medical" => Self::Health,
            "dental" => Self::Dental,
            "vision" | "eye_care" => Self::Vision,
            "disability" | "income_protection" => Self::Disability,
            "auto" | "car" | "vehicle" | "motor" => Self::Auto,
            "home" | "homeowners" | "homeowner" | "property" => Self::Home,
            "renters" | "renter" | "tenant" => Self::Renters,
            "pet" | "pet_health" => Self::Pet,
            _ => return None,
        };
        Some(coverage)
    }

    /// Medical-style coverage carries a deductible; everything else quotes zero.
    pub const fn has_deductible(self) -> bool {
        matches!(self, Self::Health | Self::Dental | Self::Vision | Self::Pet)
    }

    pub const fn is_life(self) -> bool {
        matches!(self, Self::TermLife | Self::WholeLife)
    }
}

impl std::fmt::Display for CoverageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_display_aliases() {
        assert_eq!(
            CoverageType::from_display("Term Life Insurance"),
            Some(CoverageType::TermLife)
        );
        assert_eq!(CoverageType::from_display("life"), Some(CoverageType::TermLife));
        assert_eq!(
            CoverageType::from_display(" whole-life "),
            Some(CoverageType::WholeLife)
        );
        assert_eq!(CoverageType::from_display("Car"), Some(CoverageType::Auto));
        assert_eq!(
            CoverageType::from_display("Homeowners Insurance"),
            Some(CoverageType::Home)
        );
        assert_eq!(CoverageType::from_display("boat"), None);
    }

    #[test]
    fn test_canonical_names_round_trip_through_lookup() {
        for coverage in CoverageType::ALL {
            assert_eq!(CoverageType::from_display(coverage.as_str()), Some(coverage));
        }
    }

    #[test]
    fn test_deductible_types() {
        assert!(CoverageType::Dental.has_deductible());
        assert!(CoverageType::Pet.has_deductible());
        assert!(!CoverageType::TermLife.has_deductible());
        assert!(!CoverageType::Auto.has_deductible());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&CoverageType::TermLife).unwrap();
        assert_eq!(json, "\"term_life\"");

        let parsed: CoverageType = serde_json::from_str("\"life\"").unwrap();
        assert_eq!(parsed, CoverageType::TermLife);
    }
}
