//! Per-provider request mapping.
//!
//! Each known provider speaks its own dialect: different coverage codes,
//! different field names, different nesting. [`ProviderMapping`] picks one
//! strategy per provider id; unknown ids fall back to [`ProviderMapping::Passthrough`],
//! which sends the canonical request as-is.

use serde_json::{json, Map, Value};

use crate::models::{CoverageType, QuoteRequest};

pub const LIFESHIELD: &str = "LIFESHIELD";
pub const HEALTHBRIDGE: &str = "HEALTHBRIDGE";
pub const DENTALCARE: &str = "DENTALCARE";
pub const AUTOGUARD: &str = "AUTOGUARD";
pub const HOMESAFE: &str = "HOMESAFE";

/// Request mapping strategy, selected by provider id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderMapping {
    /// Life carrier, snake_case body with an `applicant` block.
    LifeShield,
    /// Health marketplace, camelCase body with a dependents list.
    HealthBridge,
    /// Dental and vision carrier, flat body.
    DentalCare,
    /// Auto and renters carrier, `driver` block.
    AutoGuard,
    /// Property carrier, PascalCase body.
    HomeSafe,
    /// Canonical request forwarded unchanged.
    Passthrough,
}

impl ProviderMapping {
    pub fn for_provider(provider_id: &str) -> Self {
        match provider_id.to_ascii_uppercase().as_str() {
            LIFESHIELD => Self::LifeShield,
            HEALTHBRIDGE => Self::HealthBridge,
            DENTALCARE => Self::DentalCare,
            AUTOGUARD => Self::AutoGuard,
            HOMESAFE => Self::HomeSafe,
            _ => Self::Passthrough,
        }
    }

    /// The provider's name for a canonical coverage type.
    pub fn coverage_code(self, coverage: CoverageType) -> &'static str {
        use CoverageType::*;

        match (self, coverage) {
            (Self::LifeShield, TermLife) => "TERM",
            (Self::LifeShield, WholeLife) => "WHOLE",
            (Self::LifeShield, Disability) => "DI",

            (Self::HealthBridge, Health) => "medical",
            (Self::HealthBridge, Dental) => "dental_ppo",
            (Self::HealthBridge, Vision) => "vision_standard",

            (Self::DentalCare, Dental) => "DENTAL_PPO",
            (Self::DentalCare, Vision) => "VISION_BASIC",

            (Self::AutoGuard, Auto) => "personal_auto",
            (Self::AutoGuard, Renters) => "ho4",
            (Self::AutoGuard, Pet) => "pet_accident_illness",

            (Self::HomeSafe, Home) => "HO3",
            (Self::HomeSafe, Renters) => "HO4",

            _ => coverage.as_str(),
        }
    }

    /// Build the provider-specific JSON body for a validated request.
    pub fn build_request(self, request: &QuoteRequest, coverage: CoverageType) -> Value {
        let code = self.coverage_code(coverage);
        let smoker = request
            .health_info
            .as_ref()
            .and_then(|info| info.smoker)
            .unwrap_or(false);
        let conditions = request
            .health_info
            .as_ref()
            .map(|info| info.medical_conditions.clone())
            .unwrap_or_default();
        let household_size = 1 + usize::from(request.spouse.is_some()) + request.children.len();
        let effective_date = request.effective_date.format("%Y-%m-%d").to_string();

        match self {
            Self::LifeShield => {
                let mut applicant = Map::new();
                applicant.insert("age".into(), json!(request.applicant_age));
                applicant.insert("zip_code".into(), json!(request.zip_code));
                applicant.insert("tobacco".into(), json!(smoker));
                if !conditions.is_empty() {
                    applicant.insert("conditions".into(), json!(conditions));
                }

                let mut body = Map::new();
                body.insert("product_type".into(), json!(code));
                body.insert("applicant".into(), Value::Object(applicant));
                body.insert("face_amount".into(), json!(request.coverage_amount));
                body.insert("payment_mode".into(), json!(request.payment_frequency.as_str()));
                body.insert("effective_date".into(), json!(effective_date));
                if let Some(term) = request.term_length {
                    body.insert("term_years".into(), json!(term));
                }
                if let Some(spouse) = request.spouse {
                    body.insert("spouse_age".into(), json!(spouse.age));
                }
                Value::Object(body)
            }
            Self::HealthBridge => {
                let dependents: Vec<Value> = request
                    .spouse
                    .iter()
                    .map(|spouse| json!({"relationship": "spouse", "age": spouse.age}))
                    .chain(
                        request
                            .children
                            .iter()
                            .map(|child| json!({"relationship": "child", "age": child.age})),
                    )
                    .collect();

                json!({
                    "planType": code,
                    "member": {
                        "age": request.applicant_age,
                        "zip": request.zip_code,
                        "tobaccoUse": smoker,
                    },
                    "dependents": dependents,
                    "householdSize": household_size,
                    "coverageAmount": request.coverage_amount,
                    "preExistingConditions": conditions,
                    "startDate": effective_date,
                })
            }
            Self::DentalCare => json!({
                "plan": code,
                "age": request.applicant_age,
                "zip": request.zip_code,
                "annualMaximum": request.coverage_amount,
                "familyMembers": household_size,
                "billing": request.payment_frequency.as_str(),
            }),
            Self::AutoGuard => json!({
                "line": code,
                "driver": {
                    "age": request.applicant_age,
                    "postalCode": request.zip_code,
                },
                "limits": {
                    "liability": request.coverage_amount,
                },
                "termMonths": request.term_length.unwrap_or(6),
                "effective": effective_date,
            }),
            Self::HomeSafe => json!({
                "PolicyForm": code,
                "ApplicantAge": request.applicant_age,
                "ZipCode": request.zip_code,
                "DwellingCoverage": request.coverage_amount,
                "BillingFrequency": request.payment_frequency.as_str(),
                "EffectiveDate": effective_date,
            }),
            Self::Passthrough => {
                let mut body = match serde_json::to_value(request) {
                    Ok(Value::Object(body)) => body,
                    _ => Map::new(),
                };
                body.insert("coverageType".into(), json!(code));
                Value::Object(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> QuoteRequest {
        QuoteRequest::new("term life", 35, "10001", dec!(500000))
            .with_term_length(20)
            .with_spouse(33)
            .with_child(4)
    }

    #[test]
    fn test_strategy_selection_is_case_insensitive() {
        assert_eq!(
            ProviderMapping::for_provider("lifeshield"),
            ProviderMapping::LifeShield
        );
        assert_eq!(
            ProviderMapping::for_provider("HOMESAFE"),
            ProviderMapping::HomeSafe
        );
        assert_eq!(
            ProviderMapping::for_provider("NEW_CARRIER"),
            ProviderMapping::Passthrough
        );
    }

    #[test]
    fn test_coverage_alias_table() {
        assert_eq!(
            ProviderMapping::LifeShield.coverage_code(CoverageType::TermLife),
            "TERM"
        );
        assert_eq!(
            ProviderMapping::HomeSafe.coverage_code(CoverageType::Renters),
            "HO4"
        );
        // Unmapped pairs fall back to the canonical name
        assert_eq!(
            ProviderMapping::DentalCare.coverage_code(CoverageType::Health),
            "health"
        );
    }

    #[test]
    fn test_lifeshield_body() {
        let body = ProviderMapping::LifeShield.build_request(&request(), CoverageType::TermLife);

        assert_eq!(body["product_type"], "TERM");
        assert_eq!(body["applicant"]["age"], 35);
        assert_eq!(body["applicant"]["zip_code"], "10001");
        assert_eq!(body["term_years"], 20);
        assert_eq!(body["spouse_age"], 33);
        assert_eq!(body["payment_mode"], "monthly");
    }

    #[test]
    fn test_healthbridge_lists_dependents() {
        let body = ProviderMapping::HealthBridge.build_request(&request(), CoverageType::Health);

        assert_eq!(body["planType"], "medical");
        assert_eq!(body["householdSize"], 3);
        let dependents = body["dependents"].as_array().unwrap();
        assert_eq!(dependents.len(), 2);
        assert_eq!(dependents[0]["relationship"], "spouse");
        assert_eq!(dependents[1]["age"], 4);
    }

    #[test]
    fn test_homesafe_uses_pascal_case() {
        let body = ProviderMapping::HomeSafe.build_request(&request(), CoverageType::Home);

        assert_eq!(body["PolicyForm"], "HO3");
        assert_eq!(body["ZipCode"], "10001");
        assert!(body.get("zip").is_none());
    }

    #[test]
    fn test_passthrough_forwards_canonical_request() {
        let mut request = request();
        request.coverage_type = "Term Life Insurance".to_string();

        let body = ProviderMapping::Passthrough.build_request(&request, CoverageType::TermLife);

        assert_eq!(body["coverageType"], "term_life");
        assert_eq!(body["applicantAge"], 35);
        assert_eq!(body["zipCode"], "10001");
    }
}
