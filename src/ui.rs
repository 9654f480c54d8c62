use colored::Colorize;
use reconcile::{ApplyResult, ExecuteSummary, PlannedOp};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Apply output
// ============================================================================

/// One-line description of an op's outcome, uncolored.
pub fn describe_result(op: &PlannedOp, result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => format!("{op}: up to date"),
        ApplyResult::Created { id } => format!("{op}: created {id}"),
        ApplyResult::Modified { calls: 1 } => format!("{op}: updated (1 call)"),
        ApplyResult::Modified { calls } => format!("{op}: updated ({calls} calls)"),
        ApplyResult::Removed => format!("{op}: removed"),
        ApplyResult::Failed { error } => format!("{op}: {error}"),
        ApplyResult::Skipped { reason } => format!("{op}: skipped ({reason})"),
    }
}

/// Print one op's outcome with a status marker.
pub fn op_result(op: &PlannedOp, result: &ApplyResult) {
    let line = describe_result(op, result);
    match result {
        ApplyResult::Failed { .. } => println!("  {} {}", "✗".red(), line),
        ApplyResult::Skipped { .. } => println!("  {} {}", "○".dimmed(), line.dimmed()),
        ApplyResult::NoChange => println!("  {} {}", "✓".green(), line.dimmed()),
        _ => println!("  {} {}", "✓".green(), line),
    }
}

/// Print the totals of an apply run
pub fn summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Document applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Document applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} objects created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} objects modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} objects removed", summary.removed);
    }
    if summary.unchanged > 0 {
        println!("    • {} objects unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} objects skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "objects".red());
    }
}

// ============================================================================
// Tests
// ============================================================================
