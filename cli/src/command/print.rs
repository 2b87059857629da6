use crate::error::Error;
use crate::options::print_usage;
use getopts::Options;
use inkwell::targets::TargetMachine;
use jit::layout::STRING_DATA_OFFSET;
use jit::Config;

const USAGE: &str = "Usage: jit print [OPTIONS] [ARGS]

Print JIT details to STDOUT.

Available values:

    target  # Print the host's target triple (e.g. x86_64-pc-linux-gnu)
    config  # Print the configuration, including JIT_* variables
    layout  # Print the offset of the bytes in a boxed string

Examples:

    jit print target  # Print the target to STDOUT";

pub(crate) fn run(arguments: &[String]) -> Result<i32, Error> {
    let mut options = Options::new();

    options.optflag("h", "help", "Show this help message");

    let matches = options.parse(arguments)?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    match matches.free.first().map(|s| s.as_str()) {
        Some("target") => {
            let triple = TargetMachine::get_default_triple();

            println!("{}", triple.as_str().to_string_lossy());
            Ok(0)
        }
        Some("config") => {
            let config = Config::from_env();

            println!("opt_level = {}", config.opt_level);
            println!("entry = {}", config.entry);
            Ok(0)
        }
        Some("layout") => {
            println!("{}", STRING_DATA_OFFSET);
            Ok(0)
        }
        Some(val) => {
            Err(Error::from(format!("'{}' isn't a valid value to print", val)))
        }
        None => Err(Error::from(
            "You must specify a type of value to print".to_string(),
        )),
    }
}
