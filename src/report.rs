//! Diagnostic reporting.
//!
//! Renders violations for a human and fetches the section-header dump that goes with them.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use crate::check::{PageSize, Violation};
use crate::tool::Tool;

/// Renders one violation: the offending segment and field on the first line, the sections
/// mapped to that segment on the second.
pub fn render(violation: &Violation, page_size: PageSize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "invalid segment {} ({} not aligned to {}: {:#x}): {}",
        violation.segment_index,
        violation.field,
        page_size,
        violation.raw_value,
        violation.segment,
    );
    let _ = writeln!(out, "segment sections: {}", violation.section_names.join(" "));
    out
}

/// Renders several violations, one block each, in segment order.
pub fn render_all(violations: &[Violation], page_size: PageSize) -> String {
    violations
        .iter()
        .map(|violation| render(violation, page_size))
        .collect()
}

/// Runs `objdump -w --section-headers` on `binary` and returns its output verbatim.
pub fn section_headers<S: AsRef<OsStr>>(
    objdump: &Tool,
    passthrough: &[S],
    binary: &Path,
) -> Result<String> {
    objdump.run(&["-w", "--section-headers"], passthrough, binary)
}
