pub mod document;
pub mod export;
pub mod pdf;

pub use document::{build_report, generate_report, PerformanceReport, ReportInput, ReportSummary};
pub use export::{export_dashboard, ExportSummary, ExportedFile};
