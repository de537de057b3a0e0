use csv::{Terminator, WriterBuilder};

use crate::error::CompanionError;
use crate::testcase::combiner::TestCaseTable;

// ============================================================================
// CSV writer
// ============================================================================

/// Render a test-case table as CSV with CRLF line endings.
///
/// The first column is the 1-based case number, matching the
/// `test_case_<n>.html` file written for each row.
pub fn render_csv(table: &TestCaseTable) -> Result<String, CompanionError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    let header = std::iter::once("case").chain(table.headers.iter().map(String::as_str));
    writer
        .write_record(header)
        .map_err(|e| CompanionError::csv("test case header", e))?;

    for (n, row) in table.rows.iter().enumerate() {
        let number = (n + 1).to_string();
        let record = std::iter::once(number.as_str())
            .chain(table.headers.iter().map(|h| row.get(h).unwrap_or("")));
        writer
            .write_record(record)
            .map_err(|e| CompanionError::csv(format!("test case {}", n + 1), e))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CompanionError::io("flushing test case CSV", e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
