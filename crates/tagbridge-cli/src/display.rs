//! Operator-facing summary of an export run.

use crate::export::ExportReport;

/// Print one export report as a short vertical card.
pub fn print_report(report: &ExportReport) {
    println!("=== {} ===", report.table);
    print_row("lines read", report.lines_read);
    print_row("blank lines", report.blank_lines);
    if report.skipped() > 0 {
        print_row("skipped (not an object)", report.skipped_not_object);
        print_row("skipped (no identifier)", report.skipped_no_identifier);
        print_row("skipped (no label)", report.skipped_no_label);
    }
    print_row("reviewed rows in table", report.reviewed_total);
    println!(
        "Wrote {} rows back to {} in {:.2}s.",
        report.updates_written, report.table, report.elapsed_secs
    );
    println!();
}

fn print_row(name: &str, value: usize) {
    println!("  {:<26} {}", name, value);
}
