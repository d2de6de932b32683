//! Environment report for validating a deployment before it goes live.

use anyhow::{Result, bail};
use clap::{ArgAction, Parser};
use colored::Colorize;
use helpdesk_core::{EnvCheck, Feature, HelpdeskConfig};

#[derive(Parser, Debug)]
pub struct DoctorArgs {
    /// Fail unless these features are fully configured (model, tracker, mail, chat, docs, workflow)
    #[arg(long, value_name = "FEATURE", action = ArgAction::Append)]
    pub require: Vec<Feature>,
}

fn row(check: &EnvCheck) -> String {
    let mark = match (check.present, check.optional) {
        (true, _) => "✓".green(),
        (false, true) => "–".yellow(),
        (false, false) => "✗".red(),
    };
    let note = if check.optional && !check.present { " (optional)" } else { "" };
    format!("  {mark} {:<26} {}{note}", check.var, check.feature.as_str())
}

pub fn execute(config: &HelpdeskConfig, args: &DoctorArgs) -> Result<()> {
    println!("{}", "Environment".bold());
    for check in config.check() {
        println!("{}", row(&check));
    }
    println!("  profile: {}, redaction: {:?}", config.profile, config.redaction);

    let missing = config.missing_for(&args.require);
    if !missing.is_empty() {
        bail!("missing required configuration: {}", missing.join(", "));
    }
    if !args.require.is_empty() {
        println!("{}", "All required features are configured.".green());
    }
    Ok(())
}
