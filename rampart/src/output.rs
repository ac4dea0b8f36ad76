use crate::cli::OutputFormat;

mod human;
pub(crate) mod json;

use rampart_core::{Config, ProgressFn, RunResult};

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config: &Config);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, result: &RunResult) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
