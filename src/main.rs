use clap::{Parser, Subcommand};
use json_batch::{
    BatchEngine, BatchTemplate, Context, EvalOptions, Evaluator, ReplayDispatcher, Request,
    Response, SchemaNode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;
use tracing::{warn, Level};

/// Evaluate JSON schemas and run templated request batches.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace). Logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Maximum nesting depth accepted while evaluating
    #[arg(long, default_value_t = EvalOptions::default().max_depth, global = true)]
    max_depth: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a value from a schema and an input document
    Eval {
        /// Schema: a file path or inline JSON
        #[arg(long)]
        schema: String,
        /// Input document: a file path or inline JSON
        #[arg(long)]
        input: String,
    },
    /// Run a batch template against recorded responses
    Batch {
        /// Batch template: a file path or inline JSON
        #[arg(long)]
        template: String,
        /// Original request: a file path or inline JSON
        #[arg(long)]
        request: String,
        /// Array of responses returned in order: a file path or inline JSON
        #[arg(long)]
        replay: String,
    },
    /// List the functions callable from expressions
    Functions,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let evaluator = Evaluator::default().with_options(EvalOptions {
        max_depth: args.max_depth,
    });

    let out = match run(args.command, evaluator) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&out) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, evaluator: Evaluator) -> Result<Value, String> {
    match command {
        Command::Eval { schema, input } => {
            let schema: SchemaNode = load(&schema)?;
            let document: Value = load(&input)?;
            evaluator
                .evaluate(&schema, &Context::new(document))
                .map_err(|e| e.to_string())
        }
        Command::Batch {
            template,
            request,
            replay,
        } => {
            let template: BatchTemplate = load(&template)?;
            let original: Request = load(&request)?;
            let responses: Vec<Response> = load(&replay)?;
            let mut engine = BatchEngine::new(evaluator, ReplayDispatcher::new(responses));
            let response = engine
                .execute(&original, &template)
                .map_err(|e| e.to_string())?;
            let replay = engine.into_dispatcher();
            if replay.remaining() > 0 {
                warn!(
                    unused = replay.remaining(),
                    sent = replay.seen().len(),
                    "replay responses left over"
                );
            }
            serde_json::to_value(response).map_err(|e| e.to_string())
        }
        Command::Functions => Ok(Value::from(evaluator.registry().names())),
    }
}

/// Read `arg` as a file when it names one, otherwise parse it as JSON text.
fn load<T: DeserializeOwned>(arg: &str) -> Result<T, String> {
    let text = if Path::new(arg).is_file() {
        std::fs::read_to_string(arg).map_err(|e| format!("{arg}: {e}"))?
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {arg}: {e}"))
}
