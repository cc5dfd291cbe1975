//! Terminal output helpers

use colored::Colorize;
use seeker_core::SendWarning;
use seeker_core::session::SessionSummary;
use std::io::Write;

/// Print the welcome banner
pub fn welcome(model: &str) {
    println!();
    println!("{}", "Seeker".bold().blue());
    println!("Interactive search with real-time streamed answers");
    println!("{}", format!("Model: {model}").dimmed());
    println!("{}", "Type /help for available commands".dimmed());
    println!();
}

/// Print one streamed increment without a trailing newline
pub fn increment(chunk: &str) {
    print!("{chunk}");
    let _ = std::io::stdout().flush();
}

/// Print an informational message
pub fn info(message: &str) {
    println!("{}", message.green());
}

/// Print a dimmed status message
pub fn status(message: &str) {
    println!("{}", message.dimmed());
}

/// Print a warning
pub fn warning(message: &str) {
    println!("{}", format!("Warning: {message}").yellow());
}

/// Print a send warning from the core
pub fn send_warning(warning: &SendWarning) {
    self::warning(&warning.to_string());
}

/// Print an error
pub fn error(message: &str) {
    eprintln!("{}", format!("Error: {message}").red());
}

/// Print the saved-session listing
pub fn session_list(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No saved sessions found.".yellow());
        return;
    }

    println!();
    println!("{}", "Saved Sessions:".bold());
    for session in sessions {
        println!(
            "  {} - {} turns - {}",
            session.id.cyan(),
            session.turn_count,
            session.preview.dimmed()
        );
    }
    println!();
}

/// Print the command help listing
pub fn help() {
    println!();
    println!("{}", "Available Commands:".bold());
    for (token, description) in crate::commands::COMMAND_HELP {
        println!("  {} - {description}", token.cyan());
    }
    println!();
}
