use crate::command::print;
use crate::command::run;
use crate::error::Error;
use crate::options::print_usage;
use getopts::{Options, ParsingStyle};
use std::env;

const USAGE: &str = "Usage: jit [OPTIONS] [COMMAND | FILE]

Commands:

    run    Run a function from an LLVM IR file and print its result
    print  Print JIT details to STDOUT

Examples:

    jit hello.ll               # Runs the function main in hello.ll
    jit run hello.ll           # Same
    jit run --string hello.ll  # Prints the result as a boxed string
    jit run --help             # Print the help message for the run command";

pub(crate) fn run() -> Result<i32, Error> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::new();

    options.parsing_style(ParsingStyle::StopAtFirstFree);
    options.optflag("h", "help", "Show this help message");
    options.optflag("v", "version", "Print the version number");

    let matches = options.parse(&args[1..])?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    if matches.opt_present("v") {
        println!("jit {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    match matches.free.first().map(|s| s.as_str()) {
        Some("run") => run::run(&matches.free[1..]),
        Some("print") => print::run(&matches.free[1..]),
        Some(_) => run::run(&matches.free),
        None => {
            print_usage(&options, USAGE);
            Ok(0)
        }
    }
}
