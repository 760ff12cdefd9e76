pub mod error;
pub mod language;
pub mod llm_config;
pub mod test_case;
pub mod work_item;
