use crate::error::Error;
use crate::options::print_usage;
use getopts::Options;
use inkwell::context::Context;
use jit::engine::load_ir;
use jit::{Config, Engine, Kind, TypedValue};
use std::path::{Path, PathBuf};

const USAGE: &str = "Usage: jit run [OPTIONS] [FILE]

Load a file containing textual LLVM IR, run a function that takes no arguments
using a JIT, then print the value it returns.

The value is printed according to the function's return type. Functions
returning a pointer to a boxed string (a 32 bits length followed by the
NULL terminated bytes) can be printed as a string using --string.

Integers are printed as signed integers, unless --unsigned is given. Values of
type i1 are printed as true or false.

Examples:

    jit run hello.ll                   # Run the function main
    jit run --function answer math.ll  # Run the function answer
    jit run --string hello.ll          # Print the result as a string
    jit run --unsigned math.ll         # Print an integer as unsigned";

fn format_value(
    value: &TypedValue,
    unsigned: bool,
) -> Result<String, Error> {
    let output = match value.kind() {
        Kind::String => value.string()?,
        Kind::Double | Kind::Float => format!("{:?}", value.double()?),
        Kind::Int if value.view().int_width() == 1 => {
            format!("{}", value.int(false)? == 1)
        }
        Kind::Int if unsigned => format!("{}", value.int(false)?),
        Kind::Int => format!("{}", value.int(true)? as i64),
        Kind::Pointer => format!("{:p}", value.pointer()?),
    };

    Ok(output)
}

/// Runs a function from an IR file, returning its result as formatted text.
fn run_file(
    config: &Config,
    file: &Path,
    string: bool,
    unsigned: bool,
) -> Result<String, Error> {
    let context = Context::create();
    let module = load_ir(&context, file)?;
    let engine = Engine::new(module, config)?;
    let kind =
        if string { Kind::String } else { engine.kind_of(&config.entry)? };

    // The user explicitly asked to run this file, so they're responsible for
    // it not doing anything unsafe.
    let value = unsafe { engine.run(&config.entry, kind)? };

    format_value(&value, unsigned)
}

pub(crate) fn run(arguments: &[String]) -> Result<i32, Error> {
    let mut options = Options::new();

    options.optflag("h", "help", "Show this help message");
    options.optopt("f", "function", "The function to run", "NAME");
    options.optflag(
        "s",
        "string",
        "Read the returned pointer as a boxed string",
    );
    options.optflag("u", "unsigned", "Print integers as unsigned integers");
    options.optopt(
        "O",
        "opt",
        "The optimisation level to use, from 0 to 3",
        "LEVEL",
    );

    let matches = options.parse(arguments)?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    let mut config = Config::from_env();

    if let Some(level) = matches.opt_str("opt") {
        config.opt_level = level.parse::<u8>().map_err(|_| {
            Error::from(format!("'{}' isn't a valid optimisation level", level))
        })?;
        config.verify();
    }

    if let Some(name) = matches.opt_str("function") {
        config.entry = name;
    }

    let file = if let Some(v) = matches.free.first() {
        PathBuf::from(v)
    } else {
        return Err(Error::from("you must specify a file to run".to_string()));
    };

    let output = run_file(
        &config,
        &file,
        matches.opt_present("string"),
        matches.opt_present("unsigned"),
    )?;

    println!("{}", output);
    Ok(0)
}
