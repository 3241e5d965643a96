//! `farm-submit`: build and spool farm jobs
//!
//! ```text
//! farm-submit [--account ID] [--config PATH] [--dry-run] ... <render|nuke|command> ...
//! ```

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use farm_core::{CommandSubmission, NukeSubmission, RenderSubmission, Resolution, Submission, Submitter};
use farm_dispatch::DispatchAction;
use std::io::Write;
use std::path::PathBuf;

/// Argument definition
#[must_use]
pub fn command() -> Command {
    Command::new("farm-submit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Submit render and shell jobs to the farm")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("account")
                .long("account")
                .value_name("ID")
                .global(true)
                .help("Account id to submit as (default: $USER)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: $FARM_CONFIG)"),
        )
        .arg(global_flag("testing", "Send to the testing tier"))
        .arg(global_flag("validate-only", "Stop after the engine validates the job"))
        .arg(global_flag("dry-run", "Use a local engine instead of the farm"))
        .arg(global_flag("print", "Print the serialized job"))
        .arg(global_flag("json", "Report the outcome as JSON"))
        .subcommand(render_command())
        .subcommand(nuke_command())
        .subcommand(
            Command::new("command")
                .about("Run one shell command on a farm worker")
                .arg(
                    Arg::new("command")
                        .value_name("COMMAND")
                        .required(true)
                        .allow_hyphen_values(true)
                        .help("Command line handed to bash -c"),
                ),
        )
}

fn global_flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).global(true).action(ArgAction::SetTrue).help(help)
}

/// `--start`, `--end` and `--by`
fn frame_args() -> [Arg; 3] {
    [
        Arg::new("start")
            .long("start")
            .value_name("N")
            .required(true)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64))
            .help("First frame"),
        Arg::new("end")
            .long("end")
            .value_name("N")
            .required(true)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64))
            .help("Last frame"),
        Arg::new("by")
            .long("by")
            .value_name("N")
            .default_value("1")
            .value_parser(value_parser!(i64))
            .help("Render every Nth frame"),
    ]
}

fn options_arg(help: &'static str) -> Arg {
    Arg::new("options")
        .long("options")
        .value_name("ARGS")
        .allow_hyphen_values(true)
        .help(help)
}

fn render_command() -> Command {
    Command::new("render")
        .about("RenderMan for Maya render of a scene")
        .arg(
            Arg::new("scene")
                .long("scene")
                .value_name("PATH")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Maya scene under user_work or project_work"),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Maya project the scene must belong to"),
        )
        .args(frame_args())
        .arg(
            Arg::new("chunk")
                .long("chunk")
                .value_name("N")
                .value_parser(value_parser!(i64))
                .help("Frames per RIB generation task (default: the whole range)"),
        )
        .arg(
            Arg::new("max-chunks")
                .long("max-chunks")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Upper bound on RIB generation tasks"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("N")
                .default_value("4")
                .value_parser(value_parser!(u32))
                .help("Render threads per frame"),
        )
        .arg(
            Arg::new("maya")
                .long("maya")
                .value_name("VERSION")
                .default_value("2016")
                .help("Maya version"),
        )
        .arg(
            Arg::new("rms")
                .long("rms")
                .value_name("VERSION")
                .default_value("20.2")
                .help("RenderMan version"),
        )
        .arg(
            Arg::new("resolution")
                .long("resolution")
                .value_name("RES")
                .default_value("720p")
                .help("720p, 1080p, 540p, 108p or fromfile"),
        )
        .arg(options_arg("Extra renderer arguments"))
        .arg(Arg::new("proxy").long("proxy").action(ArgAction::SetTrue).help("Make a proxy movie"))
}

fn nuke_command() -> Command {
    Command::new("nuke")
        .about("Nuke script render split into frame chunks")
        .arg(
            Arg::new("script")
                .long("script")
                .value_name("PATH")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Nuke script under user_work or project_work"),
        )
        .args(frame_args())
        .arg(
            Arg::new("chunks")
                .long("chunks")
                .value_name("N")
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Upper bound on render tasks"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("N")
                .default_value("4")
                .value_parser(value_parser!(u32))
                .help("Render threads per task"),
        )
        .arg(
            Arg::new("nuke")
                .long("nuke")
                .value_name("VERSION")
                .default_value("9.0v7")
                .help("Nuke version"),
        )
        .arg(options_arg("Extra Nuke arguments"))
}

/// Render submission described by the `render` arguments
///
/// # Errors
/// A scene outside a work area, outside `--project`, or a bad resolution.
pub fn render_submission(matches: &ArgMatches) -> anyhow::Result<RenderSubmission> {
    let scene = matches.get_one::<PathBuf>("scene").context("--scene is required")?;
    let start = *matches.get_one::<i64>("start").context("--start is required")?;
    let end = *matches.get_one::<i64>("end").context("--end is required")?;

    if let Some(project) = matches.get_one::<PathBuf>("project") {
        if !scene.starts_with(project) {
            bail!("scene {} is not inside project {}", scene.display(), project.display());
        }
    }

    let resolution: Resolution = matches
        .get_one::<String>("resolution")
        .map_or(Ok(Resolution::default()), |r| r.parse())?;

    let mut sub = RenderSubmission::new(scene, start, end)?
        .with_by(matches.get_one::<i64>("by").copied().unwrap_or(1))
        .with_threads(matches.get_one::<u32>("threads").copied().unwrap_or(4))
        .with_resolution(resolution)
        .testing(matches.get_flag("testing"))
        .with_proxy(matches.get_flag("proxy"));

    if let (Some(maya), Some(rms)) = (matches.get_one::<String>("maya"), matches.get_one::<String>("rms")) {
        sub = sub.with_versions(maya, rms);
    }
    if let Some(options) = matches.get_one::<String>("options") {
        sub = sub.with_options(options);
    }

    // Without --chunk the whole range goes to one RIB task.
    match matches.get_one::<i64>("chunk") {
        Some(&size) => {
            sub = sub
                .with_ribgen_size(size)
                .with_ribgen_chunks(matches.get_one::<usize>("max-chunks").copied().unwrap_or(usize::MAX));
        }
        None => {
            sub = sub.with_ribgen_chunks(matches.get_one::<usize>("max-chunks").copied().unwrap_or(1));
        }
    }
    Ok(sub)
}

/// Nuke submission described by the `nuke` arguments
///
/// # Errors
/// A script outside a work area.
pub fn nuke_submission(matches: &ArgMatches) -> anyhow::Result<NukeSubmission> {
    let script = matches.get_one::<PathBuf>("script").context("--script is required")?;
    let start = *matches.get_one::<i64>("start").context("--start is required")?;
    let end = *matches.get_one::<i64>("end").context("--end is required")?;

    let mut sub = NukeSubmission::new(script, start, end)?
        .with_by(matches.get_one::<i64>("by").copied().unwrap_or(1))
        .with_chunks(matches.get_one::<usize>("chunks").copied().unwrap_or(1))
        .with_threads(matches.get_one::<u32>("threads").copied().unwrap_or(4))
        .testing(matches.get_flag("testing"));
    if let Some(version) = matches.get_one::<String>("nuke") {
        sub = sub.with_version(version);
    }
    if let Some(options) = matches.get_one::<String>("options") {
        sub = sub.with_options(options);
    }
    Ok(sub)
}

/// Shell command submission described by the `command` arguments
///
/// # Errors
/// A missing command.
pub fn command_submission(matches: &ArgMatches) -> anyhow::Result<CommandSubmission> {
    let line = matches.get_one::<String>("command").context("a command is required")?;
    Ok(CommandSubmission::new(line).testing(matches.get_flag("testing")))
}

/// Submission for the chosen subcommand, with that subcommand's arguments
///
/// # Errors
/// An unknown subcommand or bad arguments for it.
pub fn submission(matches: &ArgMatches) -> anyhow::Result<(Box<dyn Submission>, &ArgMatches)> {
    let (name, sub_matches) = matches.subcommand().context("no submission kind given")?;
    let sub: Box<dyn Submission> = match name {
        "render" => Box::new(render_submission(sub_matches)?),
        "nuke" => Box::new(nuke_submission(sub_matches)?),
        "command" => Box::new(command_submission(sub_matches)?),
        other => bail!("unknown submission kind {other}"),
    };
    Ok((sub, sub_matches))
}

/// Run with parsed arguments, writing results to `out`
///
/// # Errors
/// Bad arguments, or the failing identity, build or dispatch step.
pub async fn run(matches: &ArgMatches, out: &mut (impl Write + Send)) -> anyhow::Result<i32> {
    // Global flags propagate into the subcommand's matches.
    let (_, args) = matches.subcommand().context("no submission kind given")?;
    let config = crate::setup(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let (sub, matches) = submission(matches)?;

    let account = match matches.get_one::<String>("account") {
        Some(account) => account.clone(),
        None => std::env::var("USER").context("no --account given and $USER is not set")?,
    };

    let dry_run = matches.get_flag("dry-run");
    let action = if matches.get_flag("validate-only") {
        DispatchAction::Validate
    } else {
        DispatchAction::Submit
    };

    let submitter = Submitter::from_config(&config, farm_core::engine(&config.dispatch, dry_run));
    let outcome = submitter.submit(sub.as_ref(), &account, action, None).await?;

    if matches.get_flag("print") {
        write!(out, "{}", outcome.built.graph)?;
    }
    let graph = &outcome.built.graph;
    if matches.get_flag("json") {
        let report = serde_json::json!({
            "title": outcome.built.job.title,
            "validated": outcome.validated,
            "job_id": outcome.job_id.as_ref().map(ToString::to_string),
            "tasks": graph.task_count,
            "commands": graph.command_count,
            "digest": graph.digest,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(0);
    }
    match &outcome.job_id {
        Some(id) => writeln!(out, "spooled job {id} ({} tasks, {} commands)", graph.task_count, graph.command_count)?,
        None => writeln!(out, "validated {} ({} tasks, digest {})", outcome.built.job.title, graph.task_count, graph.digest)?,
    }
    Ok(0)
}
