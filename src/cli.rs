//! CLI module - Command-line interface definitions and handlers

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::backends::engine::{default_jobs, EngineCommand, ExecOptions};
use crate::backends::scan::ScanOptions;
use crate::core::render::{OutputFormat, RenderConfig};
use crate::flows::evaluate::ProviderConfig;

/// yq-provider - report container images pinned to the `latest` tag.
#[derive(Parser, Debug)]
#[command(name = "yq-provider")]
#[command(
    author,
    version,
    about,
    long_about = r#"yq-provider scans the YAML manifests under ROOT, asks a yq-compatible engine for
the first container image of every pod template, and reports each image tagged
`latest` as an incident (file URI + line number).

Each command prints a ResultSet in the selected format (default: jsonl).

Output formats:
- jsonl: one JSON object per line (best for piping into tools)
- json: a single JSON array
- md: human-friendly Markdown

Examples:
    yq-provider evaluate --condition condition.yaml
    echo 'k8sResourceMatched: {key: image, value: latest}' | yq-provider evaluate
    yq-provider scan --root deploy
    yq-provider query --key image
    yq-provider doctor
"#
)]
pub struct Cli {
    /// Root directory holding the manifests.
    #[arg(
        long,
        global = true,
        default_value = ".",
        value_name = "ROOT",
        long_help = "Root directory holding the manifests (defaults to the current directory).\n\n\
Every .yaml and .yml file below it is a candidate. Paths in scan output are relative\n\
to this root; incident URIs are absolute file:// URIs."
    )]
    pub root: PathBuf,

    /// Output format (jsonl/json/md).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format for ResultSet.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)\n\n\
Tip: Prefer jsonl when you want stable, line-oriented output for piping."
    )]
    pub format: String,

    /// Quiet mode (errors only on stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Only log errors to stderr. Results are still printed to stdout.\n\n\
YQ_PROVIDER_LOG, when set, overrides this flag."
    )]
    pub quiet: bool,

    /// Verbose mode (more diagnostics).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Log debug diagnostics (engine spawns, exits, per-file record counts) to stderr.\n\n\
YQ_PROVIDER_LOG, when set, overrides this flag."
    )]
    pub verbose: bool,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(
        long,
        global = true,
        long_help = "Pretty-print JSON and JSONL output with indentation for human readability.\n\n\
Has no effect on md format."
    )]
    pub pretty: bool,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub scan: ScanArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Query engine settings
#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Query engine executable.
    #[arg(
        long = "engine",
        global = true,
        env = "YQ_PROVIDER_ENGINE",
        default_value = "yq",
        value_name = "PROGRAM",
        long_help = "Query engine executable (name on PATH or a path).\n\n\
The engine reads one manifest on stdin, receives the query expression as its last\n\
argument, and must print the image (`<name>:<tag>`, e.g. `nginx:latest`) then its line\n\
number for every document, documents separated by `---` (yq v4 behavior). The tag is\n\
the text after the first `:`, taken as is."
    )]
    pub program: PathBuf,

    /// Arguments placed before the query expression.
    #[arg(
        long = "engine-arg",
        global = true,
        default_value = "eval",
        value_name = "ARG",
        allow_hyphen_values = true,
        long_help = "Argument passed to the engine before the query expression. Repeat for\n\
several arguments; the default is a single `eval`."
    )]
    pub args: Vec<String>,

    /// Per-invocation timeout in seconds.
    #[arg(
        long,
        global = true,
        env = "YQ_PROVIDER_TIMEOUT",
        default_value_t = 30,
        value_name = "SECS",
        long_help = "Kill an engine invocation that runs longer than this many seconds.\n\n\
The file is then treated like any other failed file and contributes no records."
    )]
    pub timeout: u64,

    /// Maximum engine processes running at once.
    #[arg(
        long,
        global = true,
        env = "YQ_PROVIDER_JOBS",
        value_name = "N",
        long_help = "Maximum number of engine processes running at once.\n\n\
Defaults to the number of available CPUs. Every manifest is still queried exactly once;\n\
lower this when the open-file limit is tight."
    )]
    pub jobs: Option<usize>,
}

impl EngineArgs {
    /// Engine template; `NO_COLOR` keeps ANSI codes out of the parsed output
    pub fn command(&self) -> EngineCommand {
        EngineCommand::new(self.program.clone())
            .with_args(self.args.iter())
            .with_env("NO_COLOR", "1")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs).max(1)
    }
}

/// Walker settings
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Skip hidden files and directories (dotfiles).
    #[arg(
        long,
        global = true,
        long_help = "Skip hidden files and directories (dotfiles).\n\n\
By default, hidden entries are scanned."
    )]
    pub skip_hidden: bool,

    /// Honor .gitignore and other ignore rules.
    #[arg(
        long,
        global = true,
        long_help = "Respect ignore files (.gitignore, .ignore, global ignores).\n\n\
By default, every manifest under ROOT is scanned."
    )]
    pub respect_ignore: bool,
}

impl ScanArgs {
    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            skip_hidden: self.skip_hidden,
            respect_ignore: self.respect_ignore,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a condition and report `latest` image incidents.
    #[command(
        long_about = "Read a condition (YAML) from --condition or stdin, query every manifest\n\
under ROOT and emit one incident item per distinct (file, line) whose image tag is\n\
`latest`, followed by a summary item.\n\n\
A malformed condition fails before any file is read. Files the engine cannot\n\
process are logged and skipped.\n\n\
Examples:\n\
  yq-provider evaluate --condition condition.yaml\n\
  yq-provider evaluate < condition.yaml\n"
    )]
    Evaluate {
        /// Condition file (`-` or omitted reads stdin).
        #[arg(long, value_name = "FILE")]
        condition: Option<PathBuf>,
    },

    /// List the candidate manifests under ROOT.
    #[command(
        long_about = "Enumerate every .yaml and .yml file under ROOT and emit one file item per\n\
manifest. Output is sorted for stability.\n\n\
Examples:\n\
  yq-provider scan\n\
  yq-provider scan --skip-hidden --respect-ignore\n"
    )]
    Scan,

    /// Print the raw records the engine returns for a key path.
    #[command(
        long_about = "Run the engine over every manifest for a container key path and emit one\n\
record item per document, without the `latest` filter or deduplication.\n\n\
Examples:\n\
  yq-provider query\n\
  yq-provider query --key name\n"
    )]
    Query {
        /// Key path segments below the first container.
        #[arg(long = "key", value_name = "SEGMENT", default_value = "image")]
        key: Vec<String>,
    },

    /// Check that the query engine is available.
    #[command(
        long_about = "Check whether the configured engine is discoverable on PATH (or exists at\n\
the given path).\n\n\
Example:\n\
  yq-provider doctor\n"
    )]
    Doctor,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    // Parse output format
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);

    // Get absolute root path
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let template = cli.engine.command();
    let scan = cli.scan.options();

    match cli.command {
        Commands::Evaluate { condition } => {
            let config = ProviderConfig {
                timeout: cli.engine.timeout(),
                jobs: cli.engine.jobs(),
                scan,
                ..ProviderConfig::new(root, template)
            };
            crate::flows::evaluate::run_evaluate(config, condition.as_deref(), render_config)
        }

        Commands::Scan => crate::backends::scan::run_scan(&root, scan, render_config),

        Commands::Query { key } => {
            let options = ExecOptions {
                timeout: cli.engine.timeout(),
                jobs: cli.engine.jobs(),
                ..ExecOptions::default()
            };
            crate::backends::aggregate::run_query(
                &root,
                &key,
                &template,
                scan,
                &options,
                render_config,
            )
        }

        Commands::Doctor => crate::backends::doctor::run_doctor(&template, render_config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["yq-provider", "scan"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.format, "jsonl");
        assert!(!cli.scan.options().skip_hidden);
        assert!(!cli.scan.options().respect_ignore);
    }

    #[test]
    fn test_engine_args_build_template() {
        let cli = Cli::try_parse_from([
            "yq-provider",
            "evaluate",
            "--engine",
            "sh",
            "--engine-arg",
            "fake.sh",
            "--timeout",
            "5",
        ])
        .unwrap();

        let command = cli.engine.command();
        assert_eq!(command.program(), std::path::Path::new("sh"));
        assert_eq!(command.args(), ["fake.sh".to_string()]);
        assert_eq!(cli.engine.timeout(), Duration::from_secs(5));
        assert_eq!(
            command,
            EngineCommand::new("sh")
                .with_args(["fake.sh"])
                .with_env("NO_COLOR", "1")
        );
    }

    #[test]
    fn test_query_key_segments() {
        let cli = Cli::try_parse_from(["yq-provider", "query", "--key", "name"]).unwrap();
        match cli.command {
            Commands::Query { key } => assert_eq!(key, vec!["name".to_string()]),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["yq-provider", "query"]).unwrap();
        match cli.command {
            Commands::Query { key } => assert_eq!(key, vec!["image".to_string()]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_condition_flag() {
        let cli =
            Cli::try_parse_from(["yq-provider", "evaluate", "--condition", "c.yaml"]).unwrap();
        match cli.command {
            Commands::Evaluate { condition } => {
                assert_eq!(condition, Some(PathBuf::from("c.yaml")))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_jobs_flag() {
        let cli = Cli::try_parse_from(["yq-provider", "--jobs", "2", "scan"]).unwrap();
        assert_eq!(cli.engine.jobs(), 2);

        let cli = Cli::try_parse_from(["yq-provider", "--jobs", "0", "scan"]).unwrap();
        assert_eq!(cli.engine.jobs(), 1);

        let cli = Cli::try_parse_from(["yq-provider", "scan"]).unwrap();
        assert_eq!(cli.engine.jobs(), default_jobs());
    }

    #[test]
    fn test_engine_help_documents_unspaced_image() {
        use clap::CommandFactory;

        let mut command = Cli::command();
        let help = command.render_long_help().to_string();
        assert!(help.contains("`nginx:latest`"));
        assert!(!help.contains("<key>: <value>"));
    }
}
