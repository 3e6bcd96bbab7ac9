//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use datapush_core::{
    AuditService, Clock, CompletionCallbackSink, MaskingRuleService, PushJobRepository,
    PushJobService, PushPorts, ReconcileSettings, StatusReconciler, SyncEngine, SystemClock,
    TypeMappingService,
};
use datapush_domain::{Config, DataPushError, Result};
use datapush_infra::{
    config, AuditClient, AuditMessageSender, AuditMessageWorker, AuditWorkerConfig, CallbackClient,
    DbManager, HttpClient, MaskingRuleClient, PushStatusReconciler, SqlitePushJobRepository,
    SyncEngineClient, TypeMappingClient,
};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Application context - holds all services and running workers
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub push_service: Arc<PushJobService>,
    reconciler: Mutex<PushStatusReconciler>,
    audit_worker: Mutex<AuditMessageWorker>,
    audit_sender: AuditMessageSender,
}

impl AppContext {
    /// Load configuration (environment first, then config file) and start.
    pub async fn new() -> Result<Self> {
        let config = config::load()?;
        Self::new_with_config(config).await
    }

    /// Wire every adapter, run migrations and start the background workers.
    ///
    /// Worker start failures abort construction.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.services.timeout_secs.max(1)))
            .bearer_token(config.services.api_token.clone())
            .build()?;
        let services = &config.services;

        let repository: Arc<dyn PushJobRepository> =
            Arc::new(SqlitePushJobRepository::new(Arc::clone(&db)));
        let engine: Arc<dyn SyncEngine> =
            Arc::new(SyncEngineClient::new(http.clone(), &services.sync_engine_url));
        let type_mapping: Arc<dyn TypeMappingService> =
            Arc::new(TypeMappingClient::new(http.clone(), &services.type_mapping_url));
        let masking: Arc<dyn MaskingRuleService> =
            Arc::new(MaskingRuleClient::new(http.clone(), &services.masking_url));
        let audit: Arc<dyn AuditService> =
            Arc::new(AuditClient::new(http.clone(), &services.audit_url));
        let callback: Arc<dyn CompletionCallbackSink> =
            Arc::new(CallbackClient::new(http, &services.callback_url));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let push_service = Arc::new(PushJobService::new(
            PushPorts {
                repository: Arc::clone(&repository),
                engine: Arc::clone(&engine),
                type_mapping,
                masking,
                audit,
                clock: Arc::clone(&clock),
            },
            config.tenant_id.clone(),
        ));

        let status_reconciler = Arc::new(StatusReconciler::new(
            repository,
            engine,
            callback,
            clock,
            ReconcileSettings {
                history_page_size: config.reconciler.history_page_size,
                one_shot_completion: config.reconciler.one_shot_completion,
                call_timeout: Duration::from_secs(config.reconciler.query_timeout_secs.max(1)),
            },
        ));

        let mut reconciler = PushStatusReconciler::new(status_reconciler, (&config.reconciler).into());
        reconciler.start().map_err(|err| {
            error!(error = %err, "failed to start push status reconciler");
            DataPushError::from(err)
        })?;

        let mut audit_worker =
            AuditMessageWorker::new(push_service.lifecycle(), AuditWorkerConfig::default());
        let audit_sender = audit_worker.start().map_err(|err| {
            error!(error = %err, "failed to start audit message worker");
            DataPushError::from(err)
        })?;

        info!(tenant_id = %config.tenant_id, db_path = %db.path().display(), "application context ready");

        Ok(Self {
            config,
            db,
            push_service,
            reconciler: Mutex::new(reconciler),
            audit_worker: Mutex::new(audit_worker),
            audit_sender,
        })
    }

    /// Handle for whatever transport delivers audit service messages.
    pub fn audit_sender(&self) -> AuditMessageSender {
        self.audit_sender.clone()
    }

    /// Database reachable and both workers running.
    pub async fn health_check(&self) -> Result<()> {
        self.db.health_check()?;
        if !self.reconciler.lock().await.is_running() {
            return Err(DataPushError::Internal("push status reconciler is not running".into()));
        }
        if !self.audit_worker.lock().await.is_running() {
            return Err(DataPushError::Internal("audit message worker is not running".into()));
        }
        Ok(())
    }

    /// Stop both workers. Both are always asked to stop; the first failure
    /// is returned.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down application context");

        let reconciler = self.reconciler.lock().await.stop().await;
        if let Err(err) = &reconciler {
            error!(error = %err, "push status reconciler did not stop cleanly");
        }
        let audit = self.audit_worker.lock().await.stop().await;
        if let Err(err) = &audit {
            error!(error = %err, "audit message worker did not stop cleanly");
        }

        reconciler.and(audit).map_err(DataPushError::from)
    }
}
