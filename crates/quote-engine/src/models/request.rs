//! Canonical quote request and its validation rules.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::coverage::CoverageType;
use crate::errors::ValidationError;

pub const MIN_APPLICANT_AGE: u8 = 18;
pub const MAX_APPLICANT_AGE: u8 = 100;
pub const MAX_CHILD_AGE: u8 = 25;

/// How often the policyholder pays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentFrequency {
    #[default]
    Monthly,
    Quarterly,
    #[serde(alias = "semi_annual", alias = "semiannual")]
    SemiAnnual,
    Annual,
}

impl PaymentFrequency {
    pub const fn payments_per_year(self) -> u32 {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::SemiAnnual => 2,
            Self::Annual => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::SemiAnnual => "semi-annual",
            Self::Annual => "annual",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spouse {
    pub age: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub age: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoker: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medical_conditions: Vec<String>,
}

/// A single normalized quote request, fanned out to every eligible provider.
///
/// `coverage_type` is kept as the caller sent it; [`QuoteRequest::validate`]
/// resolves it to a [`CoverageType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub coverage_type: String,
    pub applicant_age: u8,
    pub zip_code: String,
    pub coverage_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_length: Option<u32>,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    #[serde(default = "today")]
    pub effective_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse: Option<Spouse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Child>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_info: Option<HealthInfo>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl QuoteRequest {
    pub fn new(
        coverage_type: impl Into<String>,
        applicant_age: u8,
        zip_code: impl Into<String>,
        coverage_amount: Decimal,
    ) -> Self {
        Self {
            coverage_type: coverage_type.into(),
            applicant_age,
            zip_code: zip_code.into(),
            coverage_amount,
            term_length: None,
            payment_frequency: PaymentFrequency::default(),
            effective_date: today(),
            spouse: None,
            children: Vec::new(),
            health_info: None,
        }
    }

    pub fn with_term_length(mut self, years: u32) -> Self {
        self.term_length = Some(years);
        self
    }

    pub fn with_payment_frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.payment_frequency = frequency;
        self
    }

    pub fn with_spouse(mut self, age: u8) -> Self {
        self.spouse = Some(Spouse { age });
        self
    }

    pub fn with_child(mut self, age: u8) -> Self {
        self.children.push(Child { age });
        self
    }

    pub fn with_health_info(mut self, health_info: HealthInfo) -> Self {
        self.health_info = Some(health_info);
        self
    }

    /// Checks every field and returns the resolved coverage type.
    ///
    /// Runs before any provider is contacted; the first violation wins.
    pub fn validate(&self) -> Result<CoverageType, ValidationError> {
        let coverage = CoverageType::from_display(&self.coverage_type).ok_or_else(|| {
            ValidationError::UnsupportedCoverageType {
                value: self.coverage_type.clone(),
            }
        })?;

        if !(MIN_APPLICANT_AGE..=MAX_APPLICANT_AGE).contains(&self.applicant_age) {
            return Err(ValidationError::ApplicantAgeOutOfRange {
                age: self.applicant_age,
            });
        }

        if self.zip_code.len() != 5 || !self.zip_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidZipCode {
                value: self.zip_code.clone(),
            });
        }

        if self.coverage_amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveCoverageAmount);
        }

        if self.term_length == Some(0) {
            return Err(ValidationError::InvalidTermLength);
        }

        if let Some(spouse) = &self.spouse {
            if !(MIN_APPLICANT_AGE..=MAX_APPLICANT_AGE).contains(&spouse.age) {
                return Err(ValidationError::SpouseAgeOutOfRange { age: spouse.age });
            }
        }

        if let Some((index, child)) = self
            .children
            .iter()
            .enumerate()
            .find(|(_, child)| child.age > MAX_CHILD_AGE)
        {
            return Err(ValidationError::ChildAgeOutOfRange {
                index,
                age: child.age,
            });
        }

        Ok(coverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> QuoteRequest {
        QuoteRequest::new("term life", 35, "10001", dec!(250000))
    }

    #[test]
    fn test_valid_request_resolves_coverage() {
        assert_eq!(base().validate(), Ok(CoverageType::TermLife));
    }

    #[test]
    fn test_age_bounds() {
        let mut request = base();
        request.applicant_age = 17;
        assert_eq!(
            request.validate(),
            Err(ValidationError::ApplicantAgeOutOfRange { age: 17 })
        );

        request.applicant_age = 100;
        assert!(request.validate().is_ok());

        request.applicant_age = 101;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_zip_code_must_be_five_digits() {
        for zip in ["1000", "100011", "1000a", ""] {
            let mut request = base();
            request.zip_code = zip.to_string();
            assert!(
                matches!(request.validate(), Err(ValidationError::InvalidZipCode { .. })),
                "zip {zip:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_coverage_amount_must_be_positive() {
        let mut request = base();
        request.coverage_amount = Decimal::ZERO;
        assert_eq!(
            request.validate(),
            Err(ValidationError::NonPositiveCoverageAmount)
        );
    }

    #[test]
    fn test_dependents_are_validated() {
        let request = base().with_spouse(16);
        assert_eq!(
            request.validate(),
            Err(ValidationError::SpouseAgeOutOfRange { age: 16 })
        );

        let request = base().with_child(4).with_child(26);
        assert_eq!(
            request.validate(),
            Err(ValidationError::ChildAgeOutOfRange { index: 1, age: 26 })
        );

        let request = base().with_child(0).with_child(25);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unknown_coverage_type_is_rejected() {
        let mut request = base();
        request.coverage_type = "yacht".to_string();
        assert_eq!(
            request.validate(),
            Err(ValidationError::UnsupportedCoverageType {
                value: "yacht".to_string()
            })
        );
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let request: QuoteRequest = serde_json::from_str(
            r#"{"coverageType":"dental","applicantAge":40,"zipCode":"33101","coverageAmount":5000}"#,
        )
        .unwrap();

        assert_eq!(request.payment_frequency, PaymentFrequency::Monthly);
        assert_eq!(request.effective_date, Utc::now().date_naive());
        assert_eq!(request.coverage_amount, dec!(5000));
        assert!(request.children.is_empty());
    }

    #[test]
    fn test_payment_frequency_wire_names() {
        let frequency: PaymentFrequency = serde_json::from_str("\"semi-annual\"").unwrap();
        assert_eq!(frequency, PaymentFrequency::SemiAnnual);
        assert_eq!(frequency.payments_per_year(), 2);
    }
}
