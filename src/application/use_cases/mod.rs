pub mod export;
pub mod generation;
pub mod hierarchy;
pub mod local_edit;
pub mod story_resolution;
pub mod sync;
pub mod test_case_drafting;

#[cfg(test)]
pub(crate) mod test_support;
