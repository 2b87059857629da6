use inkwell::OptimizationLevel;
use std::env::var;

/// Sets a configuration field based on an environment variable.
macro_rules! set_from_env {
    ($config:expr, $field:ident, $key:expr, $value_type:ty) => {{
        if let Ok(raw_value) = var(concat!("JIT_", $key)) {
            if let Ok(value) = raw_value.parse::<$value_type>() {
                $config.$field = value;
            }
        };
    }};
}

/// The name of the function to run when none is specified.
const DEFAULT_ENTRY: &str = "main";

/// The highest optimisation level LLVM supports.
const MAX_OPT_LEVEL: u8 = 3;

/// Structure containing the configuration settings for the JIT engine.
pub struct Config {
    /// The LLVM optimisation level to compile code with, from 0 to 3.
    pub opt_level: u8,

    /// The name of the function to run.
    pub entry: String,
}

impl Config {
    pub fn new() -> Config {
        Config { opt_level: 0, entry: DEFAULT_ENTRY.to_string() }
    }

    pub fn from_env() -> Config {
        let mut config = Config::new();

        set_from_env!(config, opt_level, "OPT_LEVEL", u8);
        set_from_env!(config, entry, "ENTRY", String);

        config.verify();
        config
    }

    pub fn optimization_level(&self) -> OptimizationLevel {
        match self.opt_level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        }
    }

    pub fn verify(&mut self) {
        if self.opt_level > MAX_OPT_LEVEL {
            self.opt_level = MAX_OPT_LEVEL;
        }

        if self.entry.is_empty() {
            self.entry = DEFAULT_ENTRY.to_string();
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
