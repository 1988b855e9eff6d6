//! Live console table for the sampling campaign.

pub mod dashboard;
pub mod layout;

pub use dashboard::{Dashboard, RenderOutcome};
pub use layout::{center_text, fit_width, format_percent, format_row, latency_cell, progress_cell};
