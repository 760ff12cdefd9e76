pub mod use_cases;

pub use use_cases::export::ExportUseCase;
pub use use_cases::generation::GenerationUseCase;
pub use use_cases::hierarchy::HierarchyUseCase;
pub use use_cases::local_edit::LocalEditUseCase;
pub use use_cases::story_resolution::StoryResolutionUseCase;
pub use use_cases::sync::SyncUseCase;
pub use use_cases::test_case_drafting::TestCaseDraftingUseCase;
