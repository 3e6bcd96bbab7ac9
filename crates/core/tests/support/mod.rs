//! Shared test helpers for `datapush-core` integration tests.
//!
//! In-memory fakes for every port plus request/job fixtures, so scenario
//! tests can focus on behaviour instead of wiring.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use datapush_core::{PushJobService, PushPorts, ReconcileSettings, StatusReconciler};
use datapush_domain::OneShotCompletion;

pub use fakes::{
    EngineCall, FixedClock, InMemoryPushJobRepository, MockAuditService, MockMaskingRuleService,
    MockSyncEngine, MockTypeMappingService, RecordingCallbackSink,
};

/// Every fake wired into a service and a reconciler.
pub struct Harness {
    pub repository: Arc<InMemoryPushJobRepository>,
    pub engine: Arc<MockSyncEngine>,
    pub type_mapping: Arc<MockTypeMappingService>,
    pub masking: Arc<MockMaskingRuleService>,
    pub audit: Arc<MockAuditService>,
    pub callback: Arc<RecordingCallbackSink>,
    pub clock: Arc<FixedClock>,
    pub service: PushJobService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_type_mapping(MockTypeMappingService::unavailable())
    }

    pub fn with_type_mapping(type_mapping: MockTypeMappingService) -> Self {
        let repository = Arc::new(InMemoryPushJobRepository::default());
        let engine = Arc::new(MockSyncEngine::default());
        let type_mapping = Arc::new(type_mapping);
        let masking = Arc::new(MockMaskingRuleService::default());
        let audit = Arc::new(MockAuditService::default());
        let callback = Arc::new(RecordingCallbackSink::default());
        let clock = Arc::new(FixedClock::at("2024-06-01 12:00:00"));

        let service = PushJobService::new(
            PushPorts {
                repository: repository.clone(),
                engine: engine.clone(),
                type_mapping: type_mapping.clone(),
                masking: masking.clone(),
                audit: audit.clone(),
                clock: clock.clone(),
            },
            "tenant-a",
        );

        Self { repository, engine, type_mapping, masking, audit, callback, clock, service }
    }

    pub fn reconciler(&self, policy: OneShotCompletion) -> StatusReconciler {
        self.reconciler_with_timeout(policy, Duration::from_secs(5))
    }

    pub fn reconciler_with_timeout(
        &self,
        policy: OneShotCompletion,
        call_timeout: Duration,
    ) -> StatusReconciler {
        StatusReconciler::new(
            self.repository.clone(),
            self.engine.clone(),
            self.callback.clone(),
            self.clock.clone(),
            ReconcileSettings { history_page_size: 10, one_shot_completion: policy, call_timeout },
        )
    }
}
