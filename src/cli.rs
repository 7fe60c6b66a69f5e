use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::ScanOptions;

#[derive(Parser, Debug)]
#[command(name = "reposcan")]
#[command(
    about = "Scan a repository, package, or file for suspicious code and vulnerable dependencies",
    long_about = None
)]
pub struct Args {
    /// What to scan: a git URL, a GitHub blob URL, `pypi:<name>` /
    /// `pip:<name>` / `npm:<name>`, an http(s) file URL, or a local path
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Skip the Python AST analysis
    #[arg(long)]
    pub no_ast: bool,

    /// Skip the bandit security linter
    #[arg(long)]
    pub no_bandit: bool,

    /// Skip ESLint
    #[arg(long)]
    pub no_eslint: bool,

    /// Skip the dependency audit
    #[arg(long)]
    pub no_deps: bool,

    /// Directory to write the markdown report into
    #[arg(long, value_name = "DIR", default_value = "reports")]
    pub reports_dir: PathBuf,

    /// Worker threads for plugin execution
    #[arg(short, long, value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            use_ast: !self.no_ast,
            use_bandit: !self.no_bandit,
            use_eslint: !self.no_eslint,
            use_deps: !self.no_deps,
            jobs: self.jobs.max(1),
            reports_dir: self.reports_dir.clone(),
        }
    }
}
