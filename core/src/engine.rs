//! The back-office engine: one store, one tenant, one set of collaborators.
//!
//! RULES:
//!   - Services are borrowed from the engine per call; none holds state.
//!   - Services never call each other, except the matcher raising exceptions.
//!   - Every state change is recorded in the event log by the service making it.
//!   - External collaborators (text generator, forecast process) are chosen
//!     once, at construction.

use crate::{
    bank_transaction_service::BankTransactionService,
    config::DeskConfig,
    dashboard::{dashboard_metrics, DashboardMetrics},
    deposit_batch_service::DepositBatchService,
    error::DeskResult,
    event::EventLogEntry,
    exception_service::ExceptionService,
    explain::Explainer,
    forecast::{AnalyticsService, ForecastReport, ForecastRunner, PythonForecaster},
    matcher::{ReconciliationMatcher, ReconciliationOutcome},
    receipt_service::ReceiptService,
    reconciliation_service::ReconciliationService,
    repair_order_service::RepairOrderService,
    store::DeskStore,
    types::TenantContext,
};
use chrono::NaiveDate;

pub struct DeskEngine {
    pub config: DeskConfig,
    pub tenant: TenantContext,
    store: DeskStore,
    explainer: Explainer,
    forecaster: Box<dyn ForecastRunner>,
}

impl DeskEngine {
    pub fn new(
        store: DeskStore,
        config: DeskConfig,
        explainer: Explainer,
        forecaster: Box<dyn ForecastRunner>,
    ) -> Self {
        Self {
            tenant: config.tenant_context(),
            config,
            store,
            explainer,
            forecaster,
        }
    }

    /// Wire the collaborators the config asks for and migrate the store.
    pub fn build(store: DeskStore, config: DeskConfig) -> DeskResult<Self> {
        store.migrate()?;
        let explainer = Explainer::from_config(&config.explainer);
        let forecaster = Box::new(PythonForecaster::new(&config.forecast));
        Ok(Self::new(store, config, explainer, forecaster))
    }

    /// In-memory engine with the test config and offline text generation.
    pub fn build_test() -> DeskResult<Self> {
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        let config = DeskConfig::default_test();
        let forecaster = Box::new(PythonForecaster::new(&config.forecast));
        Ok(Self::new(store, config, Explainer::offline(), forecaster))
    }

    /// Act for a different dealership or operator on the same store.
    pub fn with_tenant(mut self, tenant: TenantContext) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn store(&self) -> &DeskStore {
        &self.store
    }

    pub fn explainer(&self) -> &Explainer {
        &self.explainer
    }

    // ── Services ───────────────────────────────────────────────────

    pub fn repair_orders(&self) -> RepairOrderService<'_> {
        RepairOrderService::new(&self.store, &self.tenant, self.config.tax_rate)
    }

    pub fn receipts(&self) -> ReceiptService<'_> {
        ReceiptService::new(&self.store, &self.tenant)
    }

    pub fn deposit_batches(&self) -> DepositBatchService<'_> {
        DepositBatchService::new(&self.store, &self.tenant)
    }

    pub fn bank_transactions(&self) -> BankTransactionService<'_> {
        BankTransactionService::new(&self.store, &self.tenant)
    }

    pub fn reconciliation(&self) -> ReconciliationService<'_> {
        ReconciliationService::new(&self.store, &self.tenant)
    }

    pub fn exceptions(&self) -> ExceptionService<'_> {
        ExceptionService::new(&self.store, &self.tenant)
    }

    pub fn analytics(&self) -> AnalyticsService<'_> {
        AnalyticsService::new(self.forecaster.as_ref(), self.config.forecast.history_seed)
    }

    // ── Operations ─────────────────────────────────────────────────

    pub fn run_reconciliation(&self) -> DeskResult<ReconciliationOutcome> {
        ReconciliationMatcher::new(
            &self.store,
            &self.tenant,
            &self.config.reconciliation,
            &self.config.merchant_fee,
            &self.explainer,
        )
        .run()
    }

    pub fn dashboard(&self) -> DeskResult<DashboardMetrics> {
        dashboard_metrics(&self.store, &self.tenant)
    }

    pub fn answer_billing_question(&self, ro_id: &str, question: &str) -> DeskResult<String> {
        self.repair_orders()
            .answer_billing_question(ro_id, question, &self.explainer)
    }

    pub fn forecast_bank_transactions(&self, today: NaiveDate) -> DeskResult<ForecastReport> {
        self.analytics().forecast_bank_transactions(today)
    }

    pub fn forecast_exception_resolution(&self, today: NaiveDate) -> DeskResult<ForecastReport> {
        self.analytics().forecast_exception_resolution(today)
    }

    /// This tenant's audit trail, oldest first.
    pub fn events(&self) -> DeskResult<Vec<EventLogEntry>> {
        self.store.events_for_dealership(&self.tenant.dealership_id)
    }
}
