//! CLI argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "seeker")]
#[command(about = "Interactive search with real-time streamed answers")]
#[command(
    long_about = "Seeker - conversational search in your terminal\n\n\
USAGE:\n  \
  seeker                         # Start the interactive prompt\n  \
  seeker \"your question\"         # Ask once, stream the answer, exit\n  \
  seeker -r <session_id>         # Resume a saved session\n\n\
Inside the prompt, type /help for the available commands."
)]
#[command(version)]
pub struct Cli {
    /// Question to ask in one-shot mode (omit for the interactive prompt)
    pub query: Option<String>,

    /// Model to use for this run (overrides the config file)
    #[arg(long)]
    pub model: Option<String>,

    /// Path to the configuration file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Resume a saved session by id
    #[arg(short = 'r', long = "resume")]
    pub resume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_interactive() {
        let cli = Cli::parse_from(["seeker"]);
        assert!(cli.query.is_none());
        assert!(cli.resume.is_none());
    }

    #[test]
    fn test_one_shot_query() {
        let cli = Cli::parse_from(["seeker", "what is rust"]);
        assert_eq!(cli.query.as_deref(), Some("what is rust"));
    }

    #[test]
    fn test_resume_flag() {
        let cli = Cli::parse_from(["seeker", "-r", "abc123"]);
        assert_eq!(cli.resume.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_model_override() {
        let cli = Cli::parse_from(["seeker", "--model", "sonar"]);
        assert_eq!(cli.model.as_deref(), Some("sonar"));
    }
}
