mod check;
mod run;
mod start;

// Backup commands
pub use run::run_once;

// Schedule commands
pub use start::run_start;

// Check commands
pub use check::run_check;
