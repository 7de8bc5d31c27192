use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};

use rustyfatal::constants::{NAME_FATAL_ERROR, NAME_PRECONDITION, NAME_PRECONDITION_FAILURE};
use rustyfatal::format::setup_logger;
use rustyfatal::{fatal_error, precondition, precondition_failure, TerminationKind};

fn cli() -> Command {
    Command::new("rustyfatal-trip")
        .about("Reach a termination point with its default handler installed")
        .arg(
            Arg::new("kind")
                .value_name("KIND")
                .help("Termination point to reach")
                .value_parser([NAME_FATAL_ERROR, NAME_PRECONDITION, NAME_PRECONDITION_FAILURE])
                .required(true),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .value_name("MESSAGE")
                .help("Diagnostic message passed to the termination point")
                .default_value(""),
        )
        .arg(
            Arg::new("condition")
                .long("condition")
                .value_name("BOOL")
                .help("Condition checked by `precondition`")
                .value_parser(value_parser!(bool))
                .default_value("false"),
        )
}

fn exec(args: &ArgMatches) -> anyhow::Result<()> {
    let kind: TerminationKind = args
        .get_one::<String>("kind")
        .context("missing termination kind")?
        .parse()?;
    let message = args
        .get_one::<String>("message")
        .cloned()
        .unwrap_or_default();
    let condition = args.get_one::<bool>("condition").copied().unwrap_or(false);

    tracing::debug!(%kind, condition, "tripping termination point");

    match kind {
        TerminationKind::FatalError => fatal_error!("{}", message),
        TerminationKind::Precondition => precondition!(condition, "{}", message),
        TerminationKind::PreconditionFailure => precondition_failure!("{}", message),
    }

    println!("survived");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    setup_logger();
    exec(&cli().get_matches())
}
