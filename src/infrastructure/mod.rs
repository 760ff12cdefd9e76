pub mod config;
pub mod export;
pub mod llm_clients;
pub mod response;
pub mod security;
pub mod storage;
pub mod tracker;
