use anyhow::{Context, Result};
use clap::Parser;

use reposcan::cli::Args;
use reposcan::logging::{self, Verbosity};
use reposcan::pipeline;
use reposcan::report::render_markdown;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    let outcome = pipeline::run(&args.source, &args.scan_options())
        .with_context(|| format!("scan of {} failed", args.source))?;

    if !args.quiet {
        print!("{}", render_markdown(&outcome.report));
    }
    eprintln!(
        "{} issue(s) found; report written to {}",
        outcome.report.total_issues(),
        outcome.report_path.display()
    );

    Ok(())
}
