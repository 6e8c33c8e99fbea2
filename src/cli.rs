use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "reddit-persona", version, about = "Collect a Reddit user's activity and profile it")]
pub struct Cli {
    /// Configuration file (defaults to ./persona.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a user's activity and write the export document
    Collect {
        /// Profile URL, e.g. https://www.reddit.com/user/<name>/
        profile_url: String,
    },
    /// Run the analysis passes over an export and write the report
    Analyze {
        export: PathBuf,
        /// Also rewrite the export with per-item emotion scores
        #[arg(long)]
        annotate: bool,
    },
    /// Embed an export into the retrieval index
    Index { export: PathBuf },
    /// Search a user's indexed activity
    Query {
        username: String,
        question: String,
        /// Number of hits (defaults to index.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Collect, analyze and index in one go
    Run {
        profile_url: String,
        #[arg(long)]
        skip_index: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from([
            "reddit-persona",
            "--config",
            "custom.toml",
            "query",
            "someone",
            "what do they like?",
            "-k",
            "5",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Command::Query { ref username, k: Some(5), .. } if username == "someone"
        ));

        let cli = Cli::parse_from(["reddit-persona", "run", "https://www.reddit.com/user/x", "--skip-index"]);
        assert!(matches!(cli.command, Command::Run { skip_index: true, .. }));
    }
}
