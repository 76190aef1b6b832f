//! Explanatory text for matches, exceptions and billing questions.
//!
//! RULE: generating text never fails from the caller's point of view.
//! Any generator error is logged and replaced with the request's fallback
//! text, so a reconciliation run always completes.

use crate::config::ExplainerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ── Requests ───────────────────────────────────────────────────────

/// The facts needed to describe one reconciliation outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplanationRequest {
    MatchExplanation {
        bank_amount: f64,
        batch_amount: f64,
        batch_number: String,
    },
    MerchantFeeMemo {
        expected_amount: f64,
        actual_amount: f64,
        fee_amount: f64,
        fee_percentage: f64,
    },
    TimingDifferenceMemo {
        batch_number: String,
        amount: f64,
    },
    UnmatchedTransactionMemo {
        amount: f64,
        /// "CREDIT" or "DEBIT".
        direction: String,
    },
    BillingDispute {
        ro_details: String,
        question: String,
    },
}

const MATCH_FALLBACK: &str = "The bank transaction amount matches the deposit batch total. \
This indicates a successful deposit with no discrepancies.";
const MERCHANT_FEE_FALLBACK: &str = "A merchant fee has been deducted from the deposit. \
Debit: Merchant Fee Expense, Credit: Cash to reconcile the difference.";
const TIMING_FALLBACK: &str = "This deposit is in transit and will appear in the next bank \
statement. Monitor for clearance within 2-3 business days.";
const UNMATCHED_FALLBACK: &str = "This transaction requires manual review to determine the \
appropriate accounting treatment.";
const DISPUTE_FALLBACK: &str = "Thank you for your question. I'd be happy to help clarify your \
bill. Please contact our service manager for a detailed explanation of the charges. We're \
committed to ensuring you understand every aspect of your service.";

impl ExplanationRequest {
    pub fn prompt(&self) -> String {
        match self {
            Self::MatchExplanation {
                bank_amount,
                batch_amount,
                batch_number,
            } => format!(
                "You are an accounting AI assistant. Explain in 2-3 sentences why bank \
                 transaction of ${bank_amount:.2} matches deposit batch {batch_number} with \
                 amount ${batch_amount:.2}. Be professional and concise."
            ),
            Self::MerchantFeeMemo {
                expected_amount,
                actual_amount,
                fee_amount,
                fee_percentage,
            } => format!(
                "You are an accounting AI assistant. Write a professional accounting memo \
                 (2-3 sentences) explaining a merchant fee discrepancy. Expected deposit: \
                 ${expected_amount:.2}, Actual bank credit: ${actual_amount:.2}, Merchant fee: \
                 ${fee_amount:.2} ({fee_percentage:.2}%). Suggest the journal entry to record this."
            ),
            Self::TimingDifferenceMemo {
                batch_number,
                amount,
            } => format!(
                "You are an accounting AI assistant. Write a professional accounting memo \
                 (2-3 sentences) explaining a timing difference for deposit batch \
                 {batch_number} (${amount:.2}) that hasn't appeared in the bank feed yet. \
                 Suggest how to handle this in month-end close."
            ),
            Self::UnmatchedTransactionMemo { amount, direction } => format!(
                "You are an accounting AI assistant. Write a professional accounting memo \
                 (2-3 sentences) explaining an unmatched bank {} of ${:.2}. Suggest possible \
                 causes and how to investigate.",
                direction.to_lowercase(),
                amount.abs()
            ),
            Self::BillingDispute {
                ro_details,
                question,
            } => format!(
                "You are a professional, empathetic dealership customer service AI assistant. \
                 A customer has a question about their repair bill.\n\n\
                 Repair Order Details:\n{ro_details}\n\n\
                 Customer Question: \"{question}\"\n\n\
                 Provide a professional, helpful response (3-5 sentences) that:\n\
                 1. Addresses their concern directly and empathetically\n\
                 2. Explains the charges clearly with specific numbers\n\
                 3. Maintains a friendly, understanding tone\n\
                 4. Offers further assistance if needed\n\n\
                 Response:"
            ),
        }
    }

    pub fn fallback(&self) -> &'static str {
        match self {
            Self::MatchExplanation { .. } => MATCH_FALLBACK,
            Self::MerchantFeeMemo { .. } => MERCHANT_FEE_FALLBACK,
            Self::TimingDifferenceMemo { .. } => TIMING_FALLBACK,
            Self::UnmatchedTransactionMemo { .. } => UNMATCHED_FALLBACK,
            Self::BillingDispute { .. } => DISPUTE_FALLBACK,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::MatchExplanation { .. } => "match_explanation",
            Self::MerchantFeeMemo { .. } => "merchant_fee_memo",
            Self::TimingDifferenceMemo { .. } => "timing_difference_memo",
            Self::UnmatchedTransactionMemo { .. } => "unmatched_transaction_memo",
            Self::BillingDispute { .. } => "billing_dispute",
        }
    }
}

// ── Generators ─────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("text generation is disabled")]
    Disabled,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generator returned HTTP {0}")]
    Status(u16),

    #[error("generator response had no text")]
    EmptyResponse,
}

/// Anything that can turn a prompt into prose.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, ExplainError>;
}

/// Used when the language model is switched off, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGenerator;

impl TextGenerator for OfflineGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, ExplainError> {
        Err(ExplainError::Disabled)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Blocking client for an Ollama `/api/generate` endpoint.
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &ExplainerConfig) -> Result<Self, ExplainError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String, ExplainError> {
        log::debug!("Calling {} with model {}", self.endpoint, self.model);
        let response = self
            .http
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExplainError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json()?;
        match body.response.map(|text| text.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(ExplainError::EmptyResponse),
        }
    }
}

// ── Explainer ──────────────────────────────────────────────────────

/// Wraps a generator and substitutes fallback text on any failure.
pub struct Explainer {
    generator: Box<dyn TextGenerator>,
}

impl Explainer {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn offline() -> Self {
        Self::new(Box::new(OfflineGenerator))
    }

    /// Build from config. A disabled explainer, or one whose HTTP client
    /// cannot be built, runs offline.
    pub fn from_config(config: &ExplainerConfig) -> Self {
        if !config.enabled {
            return Self::offline();
        }
        match OllamaClient::new(config) {
            Ok(client) => Self::new(Box::new(client)),
            Err(e) => {
                log::warn!("Explainer unavailable, using fallback text: {e}");
                Self::offline()
            }
        }
    }

    pub fn explain(&self, request: &ExplanationRequest) -> String {
        match self.generator.generate(&request.prompt()) {
            Ok(text) => {
                log::debug!(
                    "Generated {} text: {}",
                    request.category(),
                    text.chars().take(100).collect::<String>()
                );
                text
            }
            Err(ExplainError::Disabled) => request.fallback().to_string(),
            Err(e) => {
                log::warn!("Falling back for {}: {e}", request.category());
                request.fallback().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        fn generate(&self, _prompt: &str) -> Result<String, ExplainError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl TextGenerator for Failing {
        fn generate(&self, _prompt: &str) -> Result<String, ExplainError> {
            Err(ExplainError::Status(503))
        }
    }

    fn timing() -> ExplanationRequest {
        ExplanationRequest::TimingDifferenceMemo {
            batch_number: "BATCH-004".into(),
            amount: 81.0,
        }
    }

    #[test]
    fn prompts_carry_formatted_facts() {
        let prompt = ExplanationRequest::MatchExplanation {
            bank_amount: 485.5,
            batch_amount: 496.8,
            batch_number: "BATCH-003".into(),
        }
        .prompt();
        assert!(prompt.contains("$485.50 matches deposit batch BATCH-003 with amount $496.80"));

        let unmatched = ExplanationRequest::UnmatchedTransactionMemo {
            amount: -25.0,
            direction: "DEBIT".into(),
        }
        .prompt();
        assert!(unmatched.contains("unmatched bank debit of $25.00"));

        let fee = ExplanationRequest::MerchantFeeMemo {
            expected_amount: 500.0,
            actual_amount: 485.5,
            fee_amount: 14.5,
            fee_percentage: 2.9,
        }
        .prompt();
        assert!(fee.contains("Merchant fee: $14.50 (2.90%)"));
    }

    #[test]
    fn each_category_has_its_own_fallback() {
        assert!(timing().fallback().contains("in transit"));
        let dispute = ExplanationRequest::BillingDispute {
            ro_details: String::new(),
            question: "Why?".into(),
        };
        assert!(dispute.fallback().starts_with("Thank you for your question."));
    }

    #[test]
    fn generator_text_is_used_when_available() {
        let explainer = Explainer::new(Box::new(Canned("In transit.")));
        assert_eq!(explainer.explain(&timing()), "In transit.");
    }

    #[test]
    fn failures_and_offline_mode_fall_back() {
        assert_eq!(Explainer::new(Box::new(Failing)).explain(&timing()), TIMING_FALLBACK);
        assert_eq!(Explainer::offline().explain(&timing()), TIMING_FALLBACK);
    }

    #[test]
    fn disabled_config_runs_offline() {
        let explainer = Explainer::from_config(&ExplainerConfig::default());
        assert_eq!(explainer.explain(&timing()), TIMING_FALLBACK);
    }
}
