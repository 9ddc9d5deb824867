pub mod portfolio;
pub mod price;
pub mod quote;
pub mod table;
