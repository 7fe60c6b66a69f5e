//! End-to-end scan pipeline: resolve → fetch → run plugins → aggregate →
//! write the report.
//!
//! The materialized source lives for exactly one invocation and owns any
//! ephemeral storage; it is dropped on every exit route of [`run`], which
//! is the single reclamation point.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::plugins::{
    ast::AstPlugin, bandit::BanditPlugin, deps::DependencyPlugin, eslint::EslintPlugin,
    patterns::PatternPlugin, ScanPlugin,
};
use crate::report::{self, Report};
use crate::source::{self, fetch::Fetchers, fetch::MaterializedSource};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub use_ast: bool,
    pub use_bandit: bool,
    pub use_eslint: bool,
    pub use_deps: bool,
    /// Worker-pool cap for plugin execution and per-file tool fan-out.
    pub jobs: usize,
    pub reports_dir: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            use_ast: true,
            use_bandit: true,
            use_eslint: true,
            use_deps: true,
            jobs: 4,
            reports_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub report: Report,
    pub report_path: PathBuf,
}

/// The registration-ordered plugin set for one run. The pattern plugin is
/// always on; the rest follow the options.
pub fn build_plugins(options: &ScanOptions) -> Vec<Box<dyn ScanPlugin>> {
    let mut plugins: Vec<Box<dyn ScanPlugin>> = vec![Box::new(PatternPlugin)];
    if options.use_ast {
        plugins.push(Box::new(AstPlugin));
    }
    if options.use_bandit {
        plugins.push(Box::new(BanditPlugin::default()));
    }
    if options.use_eslint {
        plugins.push(Box::new(EslintPlugin::default()));
    }
    if options.use_deps {
        plugins.push(Box::new(DependencyPlugin::default()));
    }
    plugins
}

/// Scan an already materialized source with the given plugin set.
pub fn scan_source(
    source: &MaterializedSource,
    plugins: &[Box<dyn ScanPlugin>],
    jobs: usize,
    description: &str,
) -> Report {
    let runs = crate::plugins::run_all(plugins, source, jobs);
    report::aggregate(description, &runs)
}

/// Run the whole pipeline for one input string.
///
/// Resolve and fetch failures are fatal; plugin failures degrade to empty
/// report sections. The report is always produced once the source is
/// materialized.
pub fn run(input: &str, options: &ScanOptions) -> Result<ScanOutcome> {
    let address = source::resolve(input)?;
    info!(input, address = ?address, "resolved source address");

    let fetchers = Fetchers::default();
    let materialized = fetchers.fetch(&address)?;
    info!(
        root = %materialized.root().display(),
        ephemeral = materialized.is_ephemeral(),
        "source materialized"
    );

    let plugins = build_plugins(options);
    let report = scan_source(&materialized, &plugins, options.jobs, &address.describe());
    let report_path = report::write_report(&report, &options.reports_dir)?;

    Ok(ScanOutcome {
        report,
        report_path,
    })
}
