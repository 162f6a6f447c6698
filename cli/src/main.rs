mod error_formatter;
mod formatter;
mod interactive;
mod persistence;

use anyhow::{Context, Result};
use canvass::{
    compile, Evaluator, MemoryPersistence, ResourceLimits, ResponseValue, SessionConfig,
    SurveyContext, SurveySession, Transition, Value,
};
use clap::{Parser, Subcommand};
use formatter::Formatter;
use persistence::JsonFilePersistence;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const SURVEY_EXTENSION: &str = "survey";

#[derive(Parser)]
#[command(name = "canvass")]
#[command(about = "Branching, loopable surveys from plain text.")]
#[command(
    long_about = "Canvass compiles plaintext survey definitions into question sequences.\nThe CLI checks definitions, renders question markup, evaluates conditions and runs surveys in the terminal."
)]
#[command(version)]
struct Cli {
    /// Log engine decisions to stderr (same as RUST_LOG=canvass=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile survey definitions and show their structure
    ///
    /// Directories are searched for .survey files. Exits non-zero when any
    /// definition fails to compile.
    Check {
        /// Files or directories to check
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,
        /// Only report errors
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the markup of one question or of every question
    Render {
        /// Survey definition file
        file: PathBuf,
        /// Question id to render
        #[arg(short = 'q', long)]
        question: Option<String>,
        /// Value for {@user}
        #[arg(long)]
        user: Option<String>,
    },
    /// Evaluate a condition against answers given on the command line
    ///
    /// Answers use TOKEN=value; a comma makes a checkbox list.
    ///
    /// Examples:
    ///   canvass eval "Q1 == 1" Q1=1
    ///   canvass eval "and(equals(A,1),or(equals(B,2),equals(B,3)))" A=1 B=3
    Eval {
        /// Expression to evaluate
        expression: String,
        /// Answers (format: TOKEN=value or field.QUESTION=value)
        answers: Vec<String>,
    },
    /// Advance through a survey with scripted answers and list the questions shown
    ///
    /// Answers use QUESTION=value for the question's first field or
    /// field.QUESTION=value. Soft mandates are passed; hard ones stop the walk.
    Walk {
        /// Survey definition file
        file: PathBuf,
        /// Answers (format: QUESTION=value or field.QUESTION=value)
        answers: Vec<String>,
        /// Session settings as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Take a survey interactively, saving answers to a JSON file
    ///
    /// Answers saved by an earlier run are picked up again.
    Run {
        /// Survey definition file
        file: PathBuf,
        /// Where answers are kept (default: FILE with a .answers.json extension)
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Session settings as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Respondent name, available as {@user}
        #[arg(long)]
        user: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Check { paths, quiet } => check_command(paths, *quiet),
        Commands::Render {
            file,
            question,
            user,
        } => render_command(file, question.as_deref(), user.as_deref()),
        Commands::Eval {
            expression,
            answers,
        } => eval_command(expression, answers),
        Commands::Walk {
            file,
            answers,
            config,
        } => walk_command(file, answers, config.as_deref()),
        Commands::Run {
            file,
            state,
            config,
            user,
        } => run_command(file, state.as_deref(), config.as_deref(), user.as_deref()),
    };

    if let Err(e) = result {
        if let Some(survey_err) = e.downcast_ref::<canvass::SurveyError>() {
            eprintln!("{}", error_formatter::format_error(survey_err));
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "canvass=debug" } else { "canvass=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn check_command(paths: &[PathBuf], quiet: bool) -> Result<()> {
    let files = collect_definitions(paths)?;
    if files.is_empty() {
        anyhow::bail!("No .{} files found", SURVEY_EXTENSION);
    }

    let formatter = Formatter::default();
    let mut failures = 0;
    for path in &files {
        let source_id = path.to_string_lossy().to_string();
        let definition = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match compile(&definition, &source_id, &ResourceLimits::default()) {
            Ok(sequence) => {
                if !quiet {
                    print!("{}", formatter.format_sequence(&sequence));
                    println!();
                }
            }
            Err(err) => {
                failures += 1;
                eprintln!("{}", error_formatter::format_error(&err));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} definition(s) failed to compile", failures, files.len());
    }
    println!("{} definition(s) OK", files.len());
    Ok(())
}

fn render_command(file: &Path, question: Option<&str>, user: Option<&str>) -> Result<()> {
    let (definition, source_id) = read_definition(file)?;
    let sequence = compile(&definition, &source_id, &ResourceLimits::default())?;
    let context = SurveyContext::capture(user);

    match question {
        Some(id) => {
            let record = sequence
                .get(id)
                .with_context(|| format!("Question '{}' not found", id))?;
            println!("{}", record.markup(&context));
        }
        None => {
            for record in sequence.iter() {
                let markup = record.markup(&context);
                if !markup.is_empty() {
                    println!("{}", markup);
                }
            }
        }
    }
    Ok(())
}

fn eval_command(expression: &str, answers: &[String]) -> Result<()> {
    let mut state: HashMap<String, Value> = HashMap::new();
    for (token, value) in parse_answers(answers)? {
        state.insert(token, Value::from(value));
    }
    let value = Evaluator::default().evaluate(expression, &state)?;
    println!("{}", value);
    Ok(())
}

fn walk_command(file: &Path, answers: &[String], config: Option<&Path>) -> Result<()> {
    let (definition, source_id) = read_definition(file)?;
    let config = session_config(file, config)?;
    let mut session =
        SurveySession::compile(&definition, &source_id, config, MemoryPersistence::new())?;

    let answers = parse_answers(answers)?;
    let mut shown = vec![session.start()?];
    let mut finished = false;
    loop {
        let Some(record) = session.current() else {
            break;
        };
        if record.is_terminal() {
            finished = true;
            break;
        }
        let id = record.id.clone();
        let first_field = record.fields().first().map(|f| f.key.clone());

        for (token, value) in &answers {
            let field = match token.split_once('.') {
                Some((field, question)) if question == id => Some(field.to_string()),
                None if *token == id => first_field.clone(),
                _ => None,
            };
            if let Some(field) = field {
                session.set_field(&field, value.clone())?;
            }
        }

        match session.advance_anyway()? {
            Transition::Moved { to, .. } | Transition::Terminal { at: to } => shown.push(to),
            other => {
                debug!(question = %id, "walk stopped");
                eprintln!("Stopped at {}: {}", id, Formatter::default().format_transition(&other));
                break;
            }
        }
    }

    print!("{}", Formatter::default().format_walk(&shown, finished));
    Ok(())
}

fn run_command(
    file: &Path,
    state: Option<&Path>,
    config: Option<&Path>,
    user: Option<&str>,
) -> Result<()> {
    let (definition, source_id) = read_definition(file)?;
    let mut config = session_config(file, config)?;
    if let Some(user) = user {
        config = config.with_user(user);
    }
    let state_path = state
        .map(Path::to_path_buf)
        .unwrap_or_else(|| file.with_extension("answers.json"));

    let persistence = JsonFilePersistence::new(state_path);
    println!("Saving answers to {}", persistence.path().display());
    let mut session = SurveySession::compile(&definition, &source_id, config, persistence)?;
    session.resume()?;
    interactive::run_survey(&mut session)
}

fn read_definition(file: &Path) -> Result<(String, String)> {
    let definition = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Ok((definition, file.to_string_lossy().to_string()))
}

/// Settings from `path` if given; the survey name defaults to the file stem
fn session_config(file: &Path, path: Option<&Path>) -> Result<SessionConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<SessionConfig>(&text)
                .with_context(|| format!("Invalid session settings in {}", path.display()))?
        }
        None => SessionConfig::default(),
    };
    if config.survey_name.is_empty() {
        if let Some(stem) = file.file_stem() {
            config = config.with_survey_name(stem.to_string_lossy());
        }
    }
    Ok(config)
}

/// Parse `TOKEN=value` pairs; a comma-separated value becomes a list
fn parse_answers(answers: &[String]) -> Result<Vec<(String, ResponseValue)>> {
    answers
        .iter()
        .map(|answer| {
            let (token, value) = answer
                .split_once('=')
                .with_context(|| format!("Answer '{}' should look like TOKEN=value", answer))?;
            let value = if value.contains(',') {
                ResponseValue::list(value.split(',').map(str::trim))
            } else {
                ResponseValue::scalar(value.trim())
            };
            Ok((token.trim().to_string(), value))
        })
        .collect()
}

/// Every .survey file under `paths`
fn collect_definitions(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.path().extension().and_then(|s| s.to_str()) == Some(SURVEY_EXTENSION) {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}
