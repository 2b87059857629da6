use getopts::Options;

/// Prints the usage message of a command, followed by its options.
pub(crate) fn print_usage(options: &Options, brief: &str) {
    let out = options.usage_with_format(|opts| {
        let lines: Vec<String> = opts.collect();

        format!("{}\n\nOptions:\n\n{}", brief, lines.join("\n"))
    });

    println!("{}", out);
}
