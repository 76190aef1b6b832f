use crate::types::TenantContext;
use serde::{Deserialize, Serialize};

// ── Tenant ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub dealership_id: String,
    pub operator: String,
}

// ── Reconciliation ─────────────────────────────────────────────────

/// Inclusive band, in percent of the batch total, in which a shortfall
/// between batch and bank credit is treated as a processor fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantFeeConfig {
    pub min_percentage: f64,
    pub max_percentage: f64,
}

impl Default for MerchantFeeConfig {
    fn default() -> Self {
        Self {
            min_percentage: 1.5,
            max_percentage: 3.5,
        }
    }
}

/// Ledger account labels suggested on generated exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlAccountConfig {
    pub merchant_fee_expense: String,
    pub undeposited_funds: String,
    pub deposits_in_transit: String,
}

impl Default for GlAccountConfig {
    fn default() -> Self {
        Self {
            merchant_fee_expense: "6100 - Merchant Fee Expense".into(),
            undeposited_funds: "1200 - Undeposited Funds".into(),
            deposits_in_transit: "1210 - Deposits in Transit".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub exact_match_epsilon: f64,
    pub exact_match_confidence: f64,
    pub merchant_fee_confidence: f64,
    /// When set, a batch paired with one transaction is not offered to
    /// later transactions in the same run. Off by default.
    #[serde(default)]
    pub exclude_matched_batches: bool,
    #[serde(default)]
    pub gl_accounts: GlAccountConfig,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            exact_match_epsilon: 0.01,
            exact_match_confidence: 100.0,
            merchant_fee_confidence: 95.0,
            exclude_matched_batches: false,
            gl_accounts: GlAccountConfig::default(),
        }
    }
}

// ── External collaborators ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// When false no network call is attempted; fallback text is used.
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub interpreter: String,
    pub script: String,
    /// Seed for the simulated history fed to the forecaster.
    pub history_seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            interpreter: "venv/bin/python3".into(),
            script: "forecast.py".into(),
            history_seed: 42,
        }
    }
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub tenant: TenantConfig,
    pub tax_rate: f64,
    pub merchant_fee: MerchantFeeConfig,
    pub reconciliation: ReconciliationConfig,
    pub explainer: ExplainerConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DeskFile {
    tenant: TenantConfig,
    tax_rate: f64,
    #[serde(default)]
    merchant_fee: MerchantFeeConfig,
    #[serde(default)]
    reconciliation: ReconciliationConfig,
    #[serde(default)]
    explainer: ExplainerConfig,
    #[serde(default)]
    forecast: ForecastConfig,
}

impl DeskConfig {
    /// Load from `<config_dir>/desk.json`.
    /// In tests, use DeskConfig::default_test().
    pub fn load(config_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{config_dir}/desk.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: DeskFile = serde_json::from_str(&content)?;

        let fee = &file.merchant_fee;
        if fee.min_percentage > fee.max_percentage {
            anyhow::bail!(
                "merchant_fee.min_percentage ({}) exceeds max_percentage ({})",
                fee.min_percentage,
                fee.max_percentage
            );
        }

        Ok(Self {
            tenant: file.tenant,
            tax_rate: file.tax_rate,
            merchant_fee: file.merchant_fee,
            reconciliation: file.reconciliation,
            explainer: file.explainer,
            forecast: file.forecast,
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            tenant: TenantConfig {
                dealership_id: "DEALER-001".into(),
                operator: "DEMO-USER".into(),
            },
            tax_rate: 0.08,
            merchant_fee: MerchantFeeConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            explainer: ExplainerConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }

    pub fn tenant_context(&self) -> TenantContext {
        TenantContext::new(&self.tenant.dealership_id, &self.tenant.operator)
    }
}
