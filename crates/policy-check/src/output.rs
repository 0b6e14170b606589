//! JSONL rendering of a diagnostic report.

use std::io::Write;

use policy_analyzer::DiagnosticReport;

use crate::errors::AppError;

/// Writes one JSON object per report entry, in report order.
pub(crate) fn write_report<W: Write>(
    stdout: &mut W,
    report: &DiagnosticReport,
) -> Result<(), AppError> {
    for entry in report.entries() {
        let line = serde_json::to_string(&entry).map_err(AppError::EncodeReport)?;
        writeln!(stdout, "{line}").map_err(AppError::WriteReport)?;
    }
    stdout.flush().map_err(AppError::WriteReport)
}
