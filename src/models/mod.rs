pub mod comparison;
pub mod listing;
pub mod report;
