//! Command-line definitions.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

const AFTER_HELP: &str = "\
EXAMPLES:
  smartloop login                          Log in through the browser
  smartloop login --token <TOKEN>          Log in with an existing access token
  smartloop projects create --name Docs    Create and select a project
  smartloop upload --path ~/papers         Upload documents to the selected project
  smartloop run                            Chat with the selected project
";

#[derive(Debug, Parser)]
#[command(
    name = "smartloop",
    version,
    about = "Smartloop command line interface to process documents using LLM",
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authenticate through the browser, or with a token you already have
    Login {
        /// Local port for the login callback listener
        #[arg(long)]
        port: Option<u16>,
        /// Seconds to wait for the browser to complete the login
        #[arg(long)]
        timeout: Option<u64>,
        /// Skip the browser and use this access token
        #[arg(long)]
        token: Option<String>,
    },
    /// Find out which account you are logged in with
    Whoami,
    /// Start a chat session with the selected project
    Run,
    /// Upload documents to the selected project
    Upload {
        /// Folder or file path
        #[arg(long)]
        path: PathBuf,
    },
    /// Manage projects
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Version of the cli
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsCommand {
    /// List all projects
    List,
    /// Select the default project
    Select,
    /// Create a new project and select it
    Create {
        /// The name of the project
        #[arg(long)]
        name: String,
    },
    /// Show a project's properties
    Get {
        /// Id of the project
        #[arg(long)]
        id: String,
    },
    /// Set project properties
    Set {
        /// Project id to use
        #[arg(long)]
        id: String,
        /// Temperature between 0.0 and 1.0
        #[arg(long, default_value_t = 0.3, value_parser = parse_temperature)]
        temp: f32,
        /// Enable conversation history for the LLM
        #[arg(long)]
        memory: bool,
    },
    /// Delete a project
    #[command(group(ArgGroup::new("target").required(true).args(["name", "id"])))]
    Delete {
        /// Title of the project
        #[arg(long)]
        name: Option<String>,
        /// Unique identifier of the project
        #[arg(long)]
        id: Option<String>,
    },
    /// Upload documents to a project
    Upload {
        /// Project id to use
        #[arg(long)]
        id: String,
        /// Folder or file path
        #[arg(long)]
        path: PathBuf,
    },
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0.0 and 1.0, got {value}"))
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command, ProjectsCommand, parse_temperature};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_login_overrides() {
        let cli = Cli::try_parse_from(["smartloop", "login", "--port", "5055", "--timeout", "30"])
            .expect("parse");
        match cli.command {
            Command::Login {
                port,
                timeout,
                token,
            } => {
                assert_eq!(port, Some(5055));
                assert_eq!(timeout, Some(30));
                assert!(token.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn projects_set_uses_defaults() {
        let cli = Cli::try_parse_from(["smartloop", "projects", "set", "--id", "p1"]).expect("parse");
        match cli.command {
            Command::Projects(ProjectsCommand::Set { id, temp, memory }) => {
                assert_eq!(id, "p1");
                assert!((temp - 0.3).abs() < f32::EPSILON);
                assert!(!memory);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn projects_delete_requires_name_or_id() {
        assert!(Cli::try_parse_from(["smartloop", "projects", "delete"]).is_err());
        assert!(Cli::try_parse_from(["smartloop", "projects", "delete", "--id", "p1"]).is_ok());
        assert!(Cli::try_parse_from(["smartloop", "projects", "delete", "--name", "Docs"]).is_ok());
    }

    #[test]
    fn parse_temperature_enforces_range() {
        assert_eq!(parse_temperature("0.7"), Ok(0.7));
        assert!(parse_temperature("1.5").is_err());
        assert!(parse_temperature("warm").is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["smartloop", "projects", "list", "-v"]).expect("parse");
        assert!(cli.verbose);
    }
}
