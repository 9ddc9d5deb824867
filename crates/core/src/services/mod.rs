pub mod merge_service;
pub mod price_service;
