use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, name = "bootlogger", about = "Capture boot logs and turn SELinux denials into allow rules", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture kernel and userspace logs until boot completes
    Capture {
        /// Directory holding all log sessions
        #[arg(value_parser = parse_non_empty)]
        log_dir: String,
        /// Name of this session's directory.  It is wiped before capturing.
        dir_name: String,
        /// Run until logging is disabled instead of until boot completes.
        /// Also enabled by setting LOGGER_MODE_SYSTEM.
        #[arg(long)]
        system: bool,
    },
    /// Generate allow rules from saved logs
    Audit2allow {
        /// Log files to process.  Directories are searched recursively.
        #[arg(required(true))]
        input_file: Vec<String>,
        /// Write rules here instead of stdout
        #[arg(short)]
        out_filename: Option<String>,
        #[arg(long, value_enum)]
        color: Option<ColorArg>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Always,
    Auto,
    Never,
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err(String::from("The value must not be empty"));
    }
    Ok(value.to_string())
}
