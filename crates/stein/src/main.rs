use std::{ops::Range, path::PathBuf, process::ExitCode};

use ariadne::{Color, Label, Report, ReportKind};
use clap::Parser;
use stein::{parse, Config, Error, Evaluator, Fault};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
enum Cli {
    /// Evaluate a source file.
    Run {
        file: PathBuf,
        /// Maximum nesting of function applications.
        #[clap(long)]
        max_depth: Option<usize>,
    },
    /// Evaluate an expression given on the command line and print its value.
    Eval {
        source: String,
        #[clap(long)]
        max_depth: Option<usize>,
    },
    /// Print the expressions of a source file as they were parsed.
    Parse { file: PathBuf },
}

fn report(fault: &Fault, source: &str) {
    let label = fault.label.to_string();
    let span: Range<usize> = fault
        .span
        .map(|span| span.start..span.end)
        .unwrap_or(0..0);
    let message = match &fault.error {
        Error::Syntax(error) => error.kind.to_string(),
        error => error.to_string(),
    };
    let note = match &fault.expression {
        Some(expression) => format!("raised by `{}`", expression),
        None => "here".to_string(),
    };
    let result = Report::build(ReportKind::Error, label.clone(), span.start)
        .with_message(message)
        .with_label(
            Label::new((label.clone(), span))
                .with_message(note)
                .with_color(Color::Red),
        )
        .finish()
        .eprint(ariadne::sources(vec![(label, source.to_string())]));
    if let Err(error) = result {
        eprintln!("{}", fault);
        tracing::warn!(%error, "could not render the report");
    }
}

fn evaluator(max_depth: Option<usize>) -> Evaluator {
    let config = Config::from_env();
    Evaluator::with_config(match max_depth {
        Some(depth) => config.with_max_depth(depth),
        None => config,
    })
}

fn main() -> Result<ExitCode, std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("STEIN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse() {
        Cli::Run { file, max_depth } => {
            let source = std::fs::read_to_string(&file)?;
            let label = file.display().to_string();
            if let Err(fault) = evaluator(max_depth).run(&source, &label) {
                report(&fault, &source);
                return Ok(ExitCode::FAILURE);
            }
        }
        Cli::Eval { source, max_depth } => match evaluator(max_depth).run(&source, "<eval>") {
            Ok(value) => println!("{}", value.pretty_description()),
            Err(fault) => {
                report(&fault, &source);
                return Ok(ExitCode::FAILURE);
            }
        },
        Cli::Parse { file } => {
            let source = std::fs::read_to_string(&file)?;
            let label = file.display().to_string();
            match parse(&source, &label) {
                Ok(program) => {
                    for expr in program {
                        println!("{}", expr);
                    }
                }
                Err(error) => {
                    report(&Fault::from(error), &source);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
