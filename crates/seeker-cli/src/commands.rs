//! Slash-command parsing
//!
//! The prompt loop hands any input starting with `/` to this parser; the
//! resulting command maps onto discrete core operations in `app.rs`. The
//! core itself never sees command tokens.

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// Clear the conversation history
    Clear,
    /// Save the current session, optionally under a name
    Save(Option<String>),
    /// Pick a saved session to load
    Load,
    /// List saved sessions
    Sessions,
    /// Switch models
    Model,
    /// Set the system prompt
    System,
    /// Show available commands
    Help,
    /// Exit the CLI
    Exit,
}

/// `(token, description)` pairs for the help listing
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("/new", "Start new conversation"),
    ("/clear", "Clear conversation history"),
    ("/save [name]", "Save current session"),
    ("/load", "Load previous session"),
    ("/sessions", "List saved sessions"),
    ("/model", "Switch model"),
    ("/system", "Set system prompt"),
    ("/help", "Show available commands"),
    ("/exit", "Exit the CLI"),
];

impl SlashCommand {
    /// Parse a `/command [arg]` token; `Err` carries the unknown token
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parts = input.trim().splitn(2, char::is_whitespace);
        let token = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        match token.as_str() {
            "/new" => Ok(Self::New),
            "/clear" => Ok(Self::Clear),
            "/save" => Ok(Self::Save(arg)),
            "/load" => Ok(Self::Load),
            "/sessions" => Ok(Self::Sessions),
            "/model" => Ok(Self::Model),
            "/system" => Ok(Self::System),
            "/help" => Ok(Self::Help),
            "/exit" => Ok(Self::Exit),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(SlashCommand::parse("/new"), Ok(SlashCommand::New));
        assert_eq!(SlashCommand::parse("/exit"), Ok(SlashCommand::Exit));
        assert_eq!(SlashCommand::parse("/HELP"), Ok(SlashCommand::Help));
    }

    #[test]
    fn test_parse_save_with_name() {
        assert_eq!(
            SlashCommand::parse("/save my-research"),
            Ok(SlashCommand::Save(Some("my-research".to_string())))
        );
        assert_eq!(SlashCommand::parse("/save"), Ok(SlashCommand::Save(None)));
        assert_eq!(SlashCommand::parse("/save   "), Ok(SlashCommand::Save(None)));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(SlashCommand::parse("/bogus"), Err("/bogus".to_string()));
    }

    #[test]
    fn test_every_help_entry_parses() {
        for (token, _) in COMMAND_HELP {
            let bare = token.split_whitespace().next().unwrap();
            assert!(SlashCommand::parse(bare).is_ok(), "{bare} failed to parse");
        }
    }
}
