// Resource reconciliation
pub mod provision;

// Support commands
pub mod config;
pub mod doctor;
