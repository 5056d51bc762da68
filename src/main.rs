use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config, Editor};
use schemer::config::{
    DEFAULT_HEAP_CAPACITY, HISTORY_FILE, PROMPT, VERSION, WELCOME_MESSAGE, WELCOME_SUBTITLE,
};
use schemer::eval::Interpreter;
use schemer::printer::Printer;
use schemer::value::Value;
use std::path::PathBuf;

/// An R5RS-flavored Scheme interpreter
#[derive(Parser, Debug)]
#[command(name = "schemer")]
#[command(version = VERSION)]
#[command(about = "An R5RS-flavored Scheme with a mark-and-sweep heap")]
struct CliArgs {
    /// Script file to evaluate (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Skip loading the Scheme-level prelude
    #[arg(long = "no-prelude")]
    no_prelude: bool,

    /// Cells to reserve in the heap arena up front
    #[arg(long = "heap-capacity", value_name = "CELLS", default_value_t = DEFAULT_HEAP_CAPACITY)]
    heap_capacity: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut interp = Interpreter::with_heap_capacity(args.heap_capacity);
    if !args.no_prelude {
        if let Err(e) = interp.run_source(schemer::PRELUDE) {
            eprintln!("warning: failed to load prelude: {}", e);
        }
    }

    if let Some(script_path) = args.script {
        run_script(&script_path, &mut interp)?;
        return Ok(());
    }

    repl(&mut interp)
}

/// Evaluate every top-level datum of a script in order. Any uncaught error
/// aborts with a non-zero exit code.
fn run_script(path: &PathBuf, interp: &mut Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    interp
        .run_source(&source)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(())
}

fn repl(interp: &mut Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), FileHistory> =
        Editor::with_config(config).map_err(|e| format!("failed to initialize REPL: {}", e))?;
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                evaluate_line(interp, &line);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

/// Read and evaluate one line, printing each result. The whole line runs as
/// a rooted batch, so a `gc` datum cannot reclaim still-pending siblings.
/// Errors are reported and the REPL keeps accepting input.
fn evaluate_line(interp: &mut Interpreter, line: &str) {
    let datums = match interp.read(line) {
        Ok(datums) => datums,
        Err(e) => {
            eprintln!("error: {}", e);
            return;
        }
    };
    let outcome = interp.eval_batch(datums, |interp, value| {
        if !matches!(value, Value::Unspecified) {
            let rendered = Printer::new(&interp.heap, &interp.symbols).write(&value);
            println!("=> {}", rendered);
        }
    });
    if let Err(e) = outcome {
        eprintln!("error: {}", e);
    }
}
