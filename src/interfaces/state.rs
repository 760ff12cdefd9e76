use crate::application::{
    ExportUseCase, GenerationUseCase, HierarchyUseCase, LocalEditUseCase, StoryResolutionUseCase,
    SyncUseCase, TestCaseDraftingUseCase,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::storage::TestCaseStore;
use crate::infrastructure::tracker::WorkItemTracker;
use std::sync::Arc;

pub struct AppState {
    pub resolution_use_case: StoryResolutionUseCase,
    pub generation_use_case: GenerationUseCase,
    pub local_edit_use_case: LocalEditUseCase,
    pub sync_use_case: SyncUseCase,
    pub hierarchy_use_case: HierarchyUseCase,
    pub export_use_case: ExportUseCase,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        tracker: Arc<dyn WorkItemTracker + Send + Sync>,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        store: Arc<dyn TestCaseStore + Send + Sync>,
    ) -> Self {
        Self {
            resolution_use_case: StoryResolutionUseCase::new(
                tracker.clone(),
                config.tracker.project.clone(),
                config.tracker.backlog_item_type.clone(),
            ),
            generation_use_case: GenerationUseCase::new(
                tracker.clone(),
                store.clone(),
                TestCaseDraftingUseCase::new(llm_client),
                config.llm.clone(),
                config.generation.pacing(),
            ),
            local_edit_use_case: LocalEditUseCase::new(store.clone()),
            sync_use_case: SyncUseCase::new(tracker.clone(), store.clone()),
            hierarchy_use_case: HierarchyUseCase::new(
                tracker,
                config.tracker.backlog_item_type.clone(),
            ),
            export_use_case: ExportUseCase::new(store),
        }
    }
}
