//! PII risk assessment for profiled columns.
//!
//! Risk is an ensemble of four signals: an ordered regex catalog over sampled
//! values, a column-name heuristic, an optional external classifier, and a
//! uniqueness signal for identifier-like text columns. The resulting level is
//! advisory, not a compliance guarantee.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::profile::{ColumnProfile, ColumnType};

/// Maximum number of sampled values examined by the regex pass.
const MAX_REGEX_SAMPLES: usize = 1000;
/// A type counts as detected when it matches more than 10% of samples.
const REGEX_DETECTION_THRESHOLD: f64 = 0.10;
/// Regex rate above which SSN/credit-card/bank-account escalate to Critical.
const CRITICAL_ESCALATION_RATE: f64 = 0.7;

const WEIGHT_REGEX: f64 = 0.5;
const WEIGHT_CLASSIFIER: f64 = 0.3;
const WEIGHT_UNIQUENESS: f64 = 0.2;

/// Kinds of personally identifiable information the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiiType {
    Ssn,
    CreditCard,
    Email,
    PhoneUs,
    PhoneIntl,
    Ipv4,
    Ipv6,
    MacAddress,
    Uuid,
    Url,
    DateOfBirth,
    ZipCode,
    UsState,
    Vin,
    Iban,
    RoutingNumber,
    Passport,
    BankAccount,
    Address,
    DriversLicense,
    /// Near-unique text column acting as a row identifier.
    Identifier,
}

impl PiiType {
    /// Types whose exposure is immediately severe.
    pub fn is_high_sensitivity(&self) -> bool {
        matches!(self, Self::Ssn | Self::CreditCard | Self::BankAccount)
    }
}

/// Advisory risk level of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PiiRiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// What to do with a column before sharing or synthesizing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    /// Drop the column entirely.
    Exclude,
    /// Keep the column but mask values.
    Mask,
    /// Replace values with realistic fakes.
    Faker,
    /// No action required.
    Safe,
}

/// Which ensemble signal produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionSource {
    Regex,
    ColumnName,
    Classifier,
    Uniqueness,
}

/// One detected PII signal on a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetection {
    pub pii_type: PiiType,
    pub source: DetectionSource,
    /// Signal confidence in [0, 1]: match rate for regex, fixed 0.3 for the
    /// name heuristic, the model score for the classifier, the unique ratio
    /// for uniqueness.
    pub confidence: f64,
}

/// The ensemble result for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPiiRisk {
    pub column: String,
    pub risk_level: PiiRiskLevel,
    pub detections: Vec<PiiDetection>,
    pub recommended_action: RecommendedAction,
}

impl ColumnPiiRisk {
    /// The detected types, regex and classifier signals first.
    pub fn detected_types(&self) -> Vec<PiiType> {
        self.detections.iter().map(|d| d.pii_type).collect()
    }
}

/// External tiny classifier mapping (column name, samples) to a PII label.
#[async_trait]
pub trait PiiClassifier: Send + Sync {
    /// Returns `(label, confidence)` or `None` when the model abstains.
    async fn classify(
        &self,
        column_name: &str,
        sample_values: &[String],
    ) -> Result<Option<(String, f64)>>;
}

struct CatalogEntry {
    pii_type: PiiType,
    regex: Regex,
}

// Ordered: each sampled value is attributed to its first matching type only.
static PII_CATALOG: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    let entry = |pii_type, pattern: &str| CatalogEntry {
        pii_type,
        regex: Regex::new(pattern).expect("static PII regex"),
    };
    vec![
        entry(PiiType::Ssn, r"^\d{3}-\d{2}-\d{4}$"),
        entry(PiiType::CreditCard, r"^\d{4}[- ]\d{4}[- ]\d{4}[- ]\d{4}$"),
        entry(PiiType::Email, r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"),
        entry(
            PiiType::PhoneUs,
            r"^(\+1[- ]?)?(\(\d{3}\)[- ]?|\d{3}[-. ])\d{3}[-. ]\d{4}$",
        ),
        entry(PiiType::PhoneIntl, r"^\+[1-9]\d{6,14}$"),
        entry(
            PiiType::Ipv4,
            r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
        ),
        entry(PiiType::Ipv6, r"^([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$"),
        entry(PiiType::MacAddress, r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$"),
        entry(
            PiiType::Uuid,
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        ),
        entry(PiiType::Url, r"^https?://[^\s/$.?#].[^\s]*$"),
        entry(
            PiiType::DateOfBirth,
            r"^(\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4})$",
        ),
        entry(PiiType::ZipCode, r"^\d{5}(-\d{4})?$"),
        entry(
            PiiType::UsState,
            r"^(A[KLRZ]|C[AOT]|D[CE]|FL|GA|HI|I[ADLN]|K[SY]|LA|M[ADEINOST]|N[CDEHJMVY]|O[HKR]|PA|RI|S[CD]|T[NX]|UT|V[AT]|W[AIVY])$",
        ),
        entry(PiiType::Vin, r"^[A-HJ-NPR-Z0-9]{17}$"),
        entry(PiiType::Iban, r"^[A-Z]{2}\d{2}[A-Z0-9]{11,30}$"),
        entry(PiiType::RoutingNumber, r"^\d{9}$"),
        entry(PiiType::Passport, r"^[A-Z]{1,2}\d{6,9}$"),
        // Plain credit card numbers fold into the generic account pattern
        // after the formatted variants above have had their chance.
        entry(PiiType::CreditCard, r"^\d{15,16}$"),
        entry(PiiType::BankAccount, r"^\d{8,17}$"),
    ]
});

static NAME_HEURISTICS: &[(&[&str], PiiType)] = &[
    (&["ssn"], PiiType::Ssn),
    (&["social", "security"], PiiType::Ssn),
    (&["credit", "card"], PiiType::CreditCard),
    (&["email"], PiiType::Email),
    (&["e_mail"], PiiType::Email),
    (&["phone"], PiiType::PhoneUs),
    (&["mobile"], PiiType::PhoneUs),
    (&["address"], PiiType::Address),
    (&["dob"], PiiType::DateOfBirth),
    (&["birth"], PiiType::DateOfBirth),
    (&["passport"], PiiType::Passport),
    (&["license"], PiiType::DriversLicense),
    (&["iban"], PiiType::Iban),
    (&["routing"], PiiType::RoutingNumber),
    (&["zip"], PiiType::ZipCode),
];

fn classifier_label_to_type(label: &str) -> Option<PiiType> {
    match label.to_lowercase().as_str() {
        "ssn" | "social_security" => Some(PiiType::Ssn),
        "credit_card" | "card_number" => Some(PiiType::CreditCard),
        "email" => Some(PiiType::Email),
        "phone" | "phone_number" => Some(PiiType::PhoneUs),
        "ip" | "ip_address" => Some(PiiType::Ipv4),
        "address" | "street_address" => Some(PiiType::Address),
        "date_of_birth" | "dob" => Some(PiiType::DateOfBirth),
        "passport" => Some(PiiType::Passport),
        "bank_account" | "account_number" => Some(PiiType::BankAccount),
        "url" => Some(PiiType::Url),
        "identifier" | "id" => Some(PiiType::Identifier),
        _ => None,
    }
}

fn action_for(level: PiiRiskLevel) -> RecommendedAction {
    match level {
        PiiRiskLevel::Critical => RecommendedAction::Exclude,
        PiiRiskLevel::High => RecommendedAction::Mask,
        PiiRiskLevel::Medium => RecommendedAction::Faker,
        PiiRiskLevel::Low | PiiRiskLevel::None => RecommendedAction::Safe,
    }
}

fn level_from_score(score: f64) -> PiiRiskLevel {
    if score >= 0.40 {
        PiiRiskLevel::High
    } else if score >= 0.20 {
        PiiRiskLevel::Medium
    } else if score >= 0.10 {
        PiiRiskLevel::Low
    } else {
        PiiRiskLevel::None
    }
}

/// Ensemble PII detector.
pub struct PiiDetector {
    classifier: Option<Arc<dyn PiiClassifier>>,
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiDetector {
    /// Detector using only the built-in regex, name, and uniqueness signals.
    pub fn new() -> Self {
        Self { classifier: None }
    }

    /// Attaches an external classifier to the ensemble.
    pub fn with_classifier(mut self, classifier: Arc<dyn PiiClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Assesses one column from its profile and sampled non-null values.
    #[instrument(skip(self, column, sample_values), fields(column = %column.name))]
    pub async fn assess(
        &self,
        column: &ColumnProfile,
        sample_values: &[String],
    ) -> Result<ColumnPiiRisk> {
        let mut detections = Vec::new();
        let mut score = 0.0f64;
        let mut level_floor = PiiRiskLevel::None;

        // 1. Regex pass: at most one catalog attribution per sampled value.
        let samples = &sample_values[..sample_values.len().min(MAX_REGEX_SAMPLES)];
        let regex_rates = regex_pass(samples);
        let mut regex_hit = false;
        for (pii_type, rate) in &regex_rates {
            if *rate > REGEX_DETECTION_THRESHOLD {
                regex_hit = true;
                detections.push(PiiDetection {
                    pii_type: *pii_type,
                    source: DetectionSource::Regex,
                    confidence: *rate,
                });
                score = score.max(WEIGHT_REGEX * rate);
                if pii_type.is_high_sensitivity() && *rate > CRITICAL_ESCALATION_RATE {
                    level_floor = level_floor.max(PiiRiskLevel::Critical);
                }
            }
        }

        // 2. Name heuristic only when the values themselves said nothing.
        if !regex_hit {
            let lower = column.name.to_lowercase();
            for (needles, pii_type) in NAME_HEURISTICS {
                if needles.iter().all(|n| lower.contains(n)) {
                    detections.push(PiiDetection {
                        pii_type: *pii_type,
                        source: DetectionSource::ColumnName,
                        confidence: 0.3,
                    });
                    score = score.max(WEIGHT_REGEX * 0.3);
                    break;
                }
            }
        }

        // 3. Optional external classifier.
        if let Some(classifier) = &self.classifier {
            if let Some((label, confidence)) =
                classifier.classify(&column.name, samples).await?
            {
                if let Some(pii_type) = classifier_label_to_type(&label) {
                    detections.push(PiiDetection {
                        pii_type,
                        source: DetectionSource::Classifier,
                        confidence,
                    });
                    score = score.max(WEIGHT_CLASSIFIER * confidence);
                }
            }
        }

        // 4. Uniqueness signal for identifier-like text columns.
        if column.inferred_type == ColumnType::Text && column.count > 0 {
            let unique_ratio = column.unique_count as f64 / column.count as f64;
            if unique_ratio > 0.9 {
                detections.push(PiiDetection {
                    pii_type: PiiType::Identifier,
                    source: DetectionSource::Uniqueness,
                    confidence: unique_ratio,
                });
                score = score.max(WEIGHT_UNIQUENESS * unique_ratio);
                let uniqueness_level = if unique_ratio > 0.99 {
                    PiiRiskLevel::High
                } else {
                    PiiRiskLevel::Medium
                };
                level_floor = level_floor.max(uniqueness_level);
            }
        }

        let risk_level = level_from_score(score).max(level_floor);
        debug!(?risk_level, score, detections = detections.len(), "pii assessment");

        Ok(ColumnPiiRisk {
            column: column.name.clone(),
            risk_level,
            detections,
            recommended_action: action_for(risk_level),
        })
    }
}

/// Runs the ordered catalog over samples; returns per-type match rates.
fn regex_pass(samples: &[String]) -> Vec<(PiiType, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut counts: std::collections::HashMap<PiiType, usize> = std::collections::HashMap::new();
    for value in samples {
        let trimmed = value.trim();
        for entry in PII_CATALOG.iter() {
            if entry.regex.is_match(trimmed) {
                *counts.entry(entry.pii_type).or_insert(0) += 1;
                break;
            }
        }
    }

    let total = samples.len() as f64;
    let mut rates: Vec<(PiiType, f64)> = counts
        .into_iter()
        .map(|(t, c)| (t, c as f64 / total))
        .collect();
    rates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_column(name: &str, count: i64, unique: i64) -> ColumnProfile {
        let mut col = ColumnProfile::minimal(name, ColumnType::Text, count);
        col.unique_count = unique;
        col
    }

    #[tokio::test]
    async fn test_email_column_detected_by_regex() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..100).map(|i| format!("user_{i}@example.com")).collect();
        let column = text_column("email", 100, 100);

        let risk = detector.assess(&column, &samples).await.unwrap();
        assert!(risk
            .detections
            .iter()
            .any(|d| d.pii_type == PiiType::Email && d.source == DetectionSource::Regex));
        assert!(risk.risk_level >= PiiRiskLevel::High);
    }

    #[tokio::test]
    async fn test_ssn_escalates_to_critical() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..100).map(|i| format!("123-45-{:04}", 6000 + i)).collect();
        let column = text_column("taxpayer", 100, 100);

        let risk = detector.assess(&column, &samples).await.unwrap();
        assert_eq!(risk.risk_level, PiiRiskLevel::Critical);
        assert_eq!(risk.recommended_action, RecommendedAction::Exclude);
    }

    #[tokio::test]
    async fn test_name_heuristic_when_values_are_opaque() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..50).map(|i| format!("token{i}")).collect();
        let column = text_column("billing_email", 50, 10);

        let risk = detector.assess(&column, &samples).await.unwrap();
        let name_hit = risk
            .detections
            .iter()
            .find(|d| d.source == DetectionSource::ColumnName)
            .expect("name heuristic should fire");
        assert_eq!(name_hit.pii_type, PiiType::Email);
        assert!((name_hit.confidence - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_uniqueness_signal_for_identifiers() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..100).map(|i| format!("opaque-token-{i}")).collect();
        let column = text_column("session_token", 100, 100);

        let risk = detector.assess(&column, &samples).await.unwrap();
        assert!(risk
            .detections
            .iter()
            .any(|d| d.pii_type == PiiType::Identifier));
        assert_eq!(risk.risk_level, PiiRiskLevel::High);
    }

    #[tokio::test]
    async fn test_moderate_uniqueness_is_medium() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..100).map(|i| format!("v{}", i % 95)).collect();
        let column = text_column("code", 100, 95);

        let risk = detector.assess(&column, &samples).await.unwrap();
        assert_eq!(risk.risk_level, PiiRiskLevel::Medium);
        assert_eq!(risk.recommended_action, RecommendedAction::Faker);
    }

    #[tokio::test]
    async fn test_benign_column() {
        let detector = PiiDetector::new();
        let samples: Vec<String> = (0..100).map(|i| format!("note {}", i % 5)).collect();
        let column = text_column("notes", 100, 5);

        let risk = detector.assess(&column, &samples).await.unwrap();
        assert_eq!(risk.risk_level, PiiRiskLevel::None);
        assert_eq!(risk.recommended_action, RecommendedAction::Safe);
    }

    #[tokio::test]
    async fn test_first_match_wins_per_value() {
        // A 9-digit number is a routing number before it is a bank account.
        let rates = regex_pass(&vec!["123456789".to_string(); 10]);
        assert_eq!(rates[0].0, PiiType::RoutingNumber);
        assert_eq!(rates.len(), 1);
    }

    struct FixedClassifier;

    #[async_trait]
    impl PiiClassifier for FixedClassifier {
        async fn classify(
            &self,
            _column_name: &str,
            _sample_values: &[String],
        ) -> Result<Option<(String, f64)>> {
            Ok(Some(("phone".to_string(), 0.9)))
        }
    }

    #[tokio::test]
    async fn test_classifier_signal_merges() {
        let detector = PiiDetector::new().with_classifier(Arc::new(FixedClassifier));
        let samples: Vec<String> = (0..20).map(|i| format!("opaque {i}")).collect();
        let column = text_column("contact", 20, 3);

        let risk = detector.assess(&column, &samples).await.unwrap();
        let hit = risk
            .detections
            .iter()
            .find(|d| d.source == DetectionSource::Classifier)
            .unwrap();
        assert_eq!(hit.pii_type, PiiType::PhoneUs);
        // 0.3 weight x 0.9 confidence = 0.27 -> Medium.
        assert_eq!(risk.risk_level, PiiRiskLevel::Medium);
    }
}
