//! Colored terminal output for the treesync CLI

use console::style;
use treesync_sync::{SummaryLevel, SyncReport, SyncStatistics};
use treesync_types::SyncPolicy;

/// Print the run summary, coloring samples by level
pub fn display_report(report: &SyncReport) {
    println!();
    for line in report.render() {
        match line.level {
            SummaryLevel::Info => println!("{}", line.text),
            SummaryLevel::Warning => println!("{}", style(&line.text).yellow()),
            SummaryLevel::Error => println!("{}", style(&line.text).red()),
        }
    }

    if report.is_clean() {
        display_success("Synchronization completed");
    } else {
        display_warning("Synchronization completed with problems, see the samples above");
    }
}

/// Print the effective policy before a run
pub fn display_policy(policy: &SyncPolicy) {
    println!("{}", style("Policy:").bold().underlined());
    println!("  Dry run: {}", flag(policy.simulate));
    println!("  Delete stale entries: {}", flag(policy.delete_stale));
    println!("  Keep old versions: {}", flag(policy.preserve_old_versions));
    println!("  Compare sizes: {}", flag(policy.copy_if_sizes_differ));
    println!(
        "  Compare dates: {} (tolerance {} ms)",
        flag(policy.copy_if_dates_differ),
        policy.date_tolerance_millis
    );
    println!(
        "  Create folders only with content: {}",
        flag(policy.create_dirs_only_with_content)
    );
}

/// Print the figures recorded by the previous run
pub fn display_statistics(summary: &str, statistics: &SyncStatistics) {
    println!("{}", style("Previous run:").bold().underlined());
    if statistics.folders == 0 {
        println!("  Folders: {}", style("unknown").dim());
    } else {
        println!("  Folders: {}", style(statistics.folders).cyan());
    }
    println!("  {}", style(summary).cyan());
}

fn flag(enabled: bool) -> console::StyledObject<&'static str> {
    if enabled {
        style("yes").green()
    } else {
        style("no").dim()
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
