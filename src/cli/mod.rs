//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run FitNesse test suites in parallel on several servers
#[derive(Parser, Debug)]
#[command(name = "fitnesse-runner")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run FitNesse tests in parallel on several servers")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a suite and save the JUnit report
    Run(RunArgs),

    /// List the pages of a suite without running them
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Where the suite lives
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// FitNesse servers template, `{0}` is expanded to the server number,
    /// e.g. host{0}.somewhere.net:8080
    #[arg(short = 't', long)]
    pub servers_template: String,

    /// Number of FitNesse servers
    #[arg(short = 'c', long)]
    pub servers_count: usize,

    /// Suite to run, e.g. FrontPage.SuiteAcceptance
    #[arg(short, long)]
    pub suite: String,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory to save the report to
    #[arg(short = 'p', long)]
    pub results_path: Option<PathBuf>,

    /// Report file or blob name [default: tests-results.xml]
    #[arg(short = 'f', long)]
    pub file_name: Option<String>,

    /// Azure storage account to save the report to
    #[arg(short = 'a', long, requires_all = ["storage_key", "storage_container"])]
    pub storage_account: Option<String>,

    /// Azure storage account key (base64)
    #[arg(short = 'k', long, requires = "storage_account")]
    pub storage_key: Option<String>,

    /// Azure storage container name
    #[arg(short = 'r', long, requires = "storage_account")]
    pub storage_container: Option<String>,

    /// Blob service endpoint, e.g. an Azurite emulator
    /// [default: https://<account>.blob.core.windows.net]
    #[arg(long, requires = "storage_account")]
    pub storage_endpoint: Option<String>,

    /// Output format when the report is printed (xml, json, json-pretty, table, summary)
    #[arg(long, default_value = "xml")]
    pub format: String,

    /// Disable colors in table output
    #[arg(long)]
    pub no_color: bool,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds to wait for a free FitNesse server
    #[arg(long)]
    pub pool_wait_timeout: Option<u64>,

    /// Reruns of a page whose result reports failures
    #[arg(long)]
    pub failed_test_retries: Option<u32>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also show environment overrides
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Write an example configuration file
    Init {
        /// Output file
        #[arg(short, long, default_value = "fitnesse-runner.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a configuration file
    Validate {
        /// Configuration file
        path: PathBuf,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_short_flags() {
        let args = Args::parse_from([
            "fitnesse-runner",
            "run",
            "-t",
            "host{0}:8080",
            "-c",
            "3",
            "-s",
            "FrontPage.SuiteA",
            "-p",
            "out",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.target.servers_template, "host{0}:8080");
                assert_eq!(run.target.servers_count, 3);
                assert_eq!(run.target.suite, "FrontPage.SuiteA");
                assert_eq!(run.results_path, Some(PathBuf::from("out")));
                assert_eq!(run.file_name, None);
                assert_eq!(run.format, "xml");
                assert!(!run.no_color);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_storage_options_go_together() {
        let result = Args::try_parse_from([
            "fitnesse-runner",
            "run",
            "-t",
            "h:1",
            "-c",
            "1",
            "-s",
            "S",
            "-a",
            "account",
        ]);
        assert!(result.is_err());

        let args = Args::parse_from([
            "fitnesse-runner",
            "run",
            "-t",
            "h:1",
            "-c",
            "1",
            "-s",
            "S",
            "-a",
            "account",
            "-k",
            "a2V5",
            "-r",
            "results",
        ]);
        match args.command {
            Command::Run(run) => assert_eq!(run.storage_container.as_deref(), Some("results")),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_missing_suite_is_rejected() {
        let result = Args::try_parse_from(["fitnesse-runner", "list", "-t", "h{0}:1", "-c", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_and_no_color() {
        let args = Args::parse_from([
            "fitnesse-runner",
            "-q",
            "run",
            "-t",
            "h:1",
            "-c",
            "1",
            "-s",
            "S",
            "--format",
            "table",
            "--no-color",
        ]);
        assert!(args.quiet);
        match args.command {
            Command::Run(run) => assert!(run.no_color),
            _ => panic!("Expected Run command"),
        }

        let result = Args::try_parse_from(["fitnesse-runner", "-q", "-v", "config", "env"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_show() {
        let args = Args::parse_from(["fitnesse-runner", "-v", "config", "show", "--env"]);
        assert!(args.verbose);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Show { env, format, .. },
            }) => {
                assert!(env);
                assert_eq!(format, "yaml");
            }
            _ => panic!("Expected Config Show command"),
        }
    }
}
