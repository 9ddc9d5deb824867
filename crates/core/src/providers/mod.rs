pub mod gate;
pub mod registry;
pub mod traits;

// API provider implementations
pub mod alphavantage;
pub mod currency_api;
pub mod yahoo_finance;
