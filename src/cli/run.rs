//! Run command implementation

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::pipeline;
use crate::report::{write_rejects, RunSummary};

/// Per-table summary as printed after a run
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "{:<14} {:>10} {:>12} {:>8} {:>8} {:>8} {:>9}\n{}\n",
        "Table",
        "Extracted",
        "Transformed",
        "Loaded",
        "Skipped",
        "Merged",
        "Excluded",
        "-".repeat(75)
    );

    for (table, c) in &summary.tables {
        out.push_str(&format!(
            "{:<14} {:>10} {:>12} {:>8} {:>8} {:>8} {:>9}\n",
            table.as_str(),
            c.extracted,
            c.transformed,
            c.loaded,
            c.skipped,
            c.merged,
            c.excluded,
        ));
    }
    out
}

pub fn run(config: &Config) -> Result<()> {
    let source = config.oltp.endpoint().map(|e| e.describe());
    let target = config.olap.endpoint().map(|e| e.describe());
    println!(
        "📦 {} → {}\n",
        source.as_deref().unwrap_or("(invalid source)"),
        target.as_deref().unwrap_or("(invalid target)")
    );

    let summary = pipeline::run(config);

    println!("Run {}\n", summary.run_id);
    print!("{}", render_summary(&summary));
    println!();

    if let Some(path) = config.rejects_path() {
        write_rejects(&path, &summary)
            .with_context(|| format!("failed to write rejects report to {}", path.display()))?;
        println!(
            "📝 {} rejected rows written to {}",
            summary.rejections.len(),
            path.display()
        );
    } else if !summary.rejections.is_empty() {
        println!("⚠️  {} rows rejected", summary.rejections.len());
    }

    if let Some(stage) = summary.failed_stage {
        let error = summary.error.as_deref().unwrap_or("unknown error");
        bail!("{stage} stage failed: {error}");
    }

    println!("✅ Run complete!");
    Ok(())
}
