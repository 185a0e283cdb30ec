//! ttsurvey-report — Result reports.
//!
//! Turns stored submissions and comments into CSV exports, a JSON results
//! report, a self-contained HTML results page and plain-text summaries.

pub mod csv;
pub mod html;
pub mod report;
pub mod text;

pub use report::{analyze_cmos, CmosAnalysis, ResultsReport};
