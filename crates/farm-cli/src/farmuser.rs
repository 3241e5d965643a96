//! `farmuser`: register the caller or look up an identity

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use farm_identity::{IdentityRegistry, IdentitySession};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Argument definition
#[must_use]
pub fn command() -> Command {
    Command::new("farmuser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Register your farm identity, or look one up by account id prefix")
        .arg(
            Arg::new("prefix")
                .value_name("ACCOUNT_PREFIX")
                .help("Look up the identity whose account id starts with this; registers the caller when absent"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file (default: $FARM_CONFIG)"),
        )
        .arg(
            Arg::new("account")
                .long("account")
                .value_name("ID")
                .help("Account id to register (default: $USER)"),
        )
        .arg(
            Arg::new("fallback")
                .long("fallback")
                .action(ArgAction::SetTrue)
                .help("Continue as the placeholder identity when the directory lookup fails"),
        )
        .arg(
            Arg::new("crew")
                .long("crew")
                .action(ArgAction::SetTrue)
                .conflicts_with("prefix")
                .help("Print the registry as a crew list and exit"),
        )
}

/// Run with parsed arguments, writing results to `out`
///
/// Returns the process exit code for outcomes that are not errors.
///
/// # Errors
/// Missing mount, failed directory resolution or a failed registry write.
pub fn run(matches: &ArgMatches, out: &mut impl Write) -> anyhow::Result<i32> {
    let config = crate::setup(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let registry = IdentityRegistry::new(config.directory.build(), Arc::new(config.mount.store()));

    if matches.get_flag("crew") {
        registry.check_mount()?;
        write!(out, "{}", registry.crew_list()?)?;
        return Ok(0);
    }

    let mut session = IdentitySession::new(registry, config.mount.work_root())
        .with_placeholder_fallback(matches.get_flag("fallback"));

    // Not found still exits 0; the registry logs it at warn.
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        match session.query(prefix)? {
            Some(record) => writeln!(out, "{} {}", record.account_id, record.display_name)?,
            None => writeln!(out, "no identity matches {prefix}")?,
        }
        return Ok(0);
    }

    let account = match matches.get_one::<String>("account") {
        Some(account) => account.clone(),
        None => std::env::var("USER").context("no --account given and $USER is not set")?,
    };
    if account.is_empty() {
        bail!("account id is empty");
    }

    let registration = session.register(&account)?;
    if !registration.persisted {
        tracing::warn!(account_id = %account, "identity not recorded in the registry");
    }
    for line in registration.environment.export_lines() {
        writeln!(out, "{line}")?;
    }
    Ok(0)
}
