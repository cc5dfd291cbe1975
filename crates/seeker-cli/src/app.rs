//! Interactive application loop
//!
//! Wires the context manager, transport, and session store together and
//! drives the prompt loop. All conversation semantics live in the core; this
//! layer only reads input, dispatches slash commands, and displays
//! increments as they arrive.

use crate::args::Cli;
use crate::commands::SlashCommand;
use crate::console;
use anyhow::Context;
use dialoguer::{Input, Select};
use seeker_core::config::{SeekerConfig, default_config_path};
use seeker_core::context::ContextManager;
use seeker_core::llm::{AVAILABLE_MODELS, SearchTransport, SonarClient};
use seeker_core::SeekerResult;
use seeker_core::session::{LocalSessionStore, SessionStore};
use std::sync::Arc;

/// The assembled application
pub struct App {
    config: SeekerConfig,
    client: Arc<SonarClient>,
    manager: ContextManager,
    store: LocalSessionStore,
}

impl App {
    /// Build the application from CLI arguments and the config file
    pub async fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli
            .config_file
            .clone()
            .unwrap_or_else(default_config_path);
        let mut config = SeekerConfig::load(&config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?;

        if let Some(model) = &cli.model {
            config.model = model.clone();
        }

        let api_key = config.resolve_api_key()?;
        let client = Arc::new(SonarClient::new(
            api_key,
            &config.model,
            config.output_token_limit,
        )?);

        let transport: Arc<dyn SearchTransport> = client.clone();
        let mut manager = ContextManager::new(transport, config.budget());
        manager.set_system_prompt(&config.system_prompt)?;

        let store = LocalSessionStore::new(&config.session_dir);

        let mut app = Self {
            config,
            client,
            manager,
            store,
        };

        if let Some(id) = &cli.resume {
            app.load_session(id).await?;
            console::info(&format!("Resumed session: {id}"));
        }

        Ok(app)
    }

    /// One-shot mode: ask a single question, stream the answer, exit
    pub async fn run_query(&mut self, query: &str) -> anyhow::Result<()> {
        self.chat(query).await;
        Ok(())
    }

    /// Interactive mode: the prompt loop
    pub async fn run_interactive(&mut self) -> anyhow::Result<()> {
        console::welcome(&self.client.model());

        loop {
            let Some(input) = self.read_input() else {
                // stdin closed
                self.auto_save_if_enabled().await;
                console::status("Goodbye!");
                break;
            };

            let input = input.trim().to_string();
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                match self.handle_command(&input).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => console::error(&e.to_string()),
                }
            } else {
                self.chat(&input).await;
            }
        }

        Ok(())
    }

    /// Read one line from the prompt; `None` means stdin is gone
    fn read_input(&self) -> Option<String> {
        let result = Input::<String>::new()
            .with_prompt("❯")
            .allow_empty(true)
            .interact_text();

        match result {
            Ok(line) => Some(line),
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => {
                console::status("Use /exit to quit.");
                Some(String::new())
            }
            Err(_) => None,
        }
    }

    /// Send one message and stream the response to the terminal
    ///
    /// Ctrl-C while streaming cancels the exchange; the next prompt works
    /// normally.
    async fn chat(&mut self, message: &str) {
        let warnings = match self.manager.send(message).await {
            Ok(warnings) => warnings,
            Err(e) => {
                console::error(&e.to_string());
                return;
            }
        };
        for warning in &warnings {
            console::send_warning(warning);
        }

        println!();
        loop {
            let pulled = tokio::select! {
                result = self.manager.next_increment() => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            };

            match pulled {
                None => {
                    if let Err(e) = self.manager.cancel() {
                        console::error(&e.to_string());
                    }
                    println!();
                    console::status("Response cancelled.");
                    break;
                }
                Some(Ok(Some(chunk))) => console::increment(&chunk),
                Some(Ok(None)) => {
                    println!();
                    println!();
                    break;
                }
                Some(Err(e)) => {
                    println!();
                    console::error(&e.to_string());
                    if let Some(partial) = e.partial_text() {
                        tracing::debug!(chars = partial.len(), "discarded partial response");
                    }
                    break;
                }
            }
        }
    }

    /// Dispatch one slash command; `Ok(false)` exits the loop
    async fn handle_command(&mut self, input: &str) -> anyhow::Result<bool> {
        let command = match SlashCommand::parse(input) {
            Ok(command) => command,
            Err(unknown) => {
                console::warning(&format!("Unknown command: {unknown}"));
                console::status("Type /help for available commands.");
                return Ok(true);
            }
        };

        match command {
            SlashCommand::New => {
                self.reset_conversation()?;
                console::info("Started new conversation.");
            }
            SlashCommand::Clear => {
                self.reset_conversation()?;
                console::info("Conversation history cleared.");
            }
            SlashCommand::Save(name) => {
                self.save_session(name).await?;
            }
            SlashCommand::Load => {
                self.pick_and_load_session().await?;
            }
            SlashCommand::Sessions => {
                let sessions = self.store.list().await?;
                console::session_list(&sessions);
            }
            SlashCommand::Model => {
                self.pick_model()?;
            }
            SlashCommand::System => {
                self.edit_system_prompt()?;
            }
            SlashCommand::Help => console::help(),
            SlashCommand::Exit => {
                self.auto_save_if_enabled().await;
                console::status("Goodbye!");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Clear the log and re-seed the system prompt
    fn reset_conversation(&mut self) -> SeekerResult<()> {
        self.manager.clear()?;
        self.manager.set_system_prompt(&self.config.system_prompt)
    }

    async fn save_session(&mut self, name: Option<String>) -> anyhow::Result<()> {
        if self.manager.current_log().non_system_len() == 0 {
            console::status("Nothing to save yet.");
            return Ok(());
        }

        let mut snapshot = self.manager.export_snapshot(self.client.model());
        if let Some(name) = name {
            snapshot.id = name;
        }
        let id = self.store.save(&snapshot).await?;
        console::info(&format!("Session saved as {id}"));
        Ok(())
    }

    async fn pick_and_load_session(&mut self) -> anyhow::Result<()> {
        let sessions = self.store.list().await?;
        if sessions.is_empty() {
            console::warning("No saved sessions found.");
            return Ok(());
        }

        let items: Vec<String> = sessions
            .iter()
            .map(|s| format!("{} ({} turns) - {}", s.id, s.turn_count, s.preview))
            .collect();

        let Some(index) = Select::new()
            .with_prompt("Select session to load")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            return Ok(());
        };

        let id = sessions[index].id.clone();
        self.load_session(&id).await?;
        console::info(&format!("Loaded session: {id}"));
        Ok(())
    }

    async fn load_session(&mut self, id: &str) -> anyhow::Result<()> {
        let snapshot = self.store.load(id).await?;
        self.manager.load_snapshot(snapshot)?;
        Ok(())
    }

    fn pick_model(&mut self) -> anyhow::Result<()> {
        let current = self.client.model();
        let default = AVAILABLE_MODELS
            .iter()
            .position(|m| *m == current)
            .unwrap_or(0);

        let Some(index) = Select::new()
            .with_prompt("Select model")
            .items(AVAILABLE_MODELS)
            .default(default)
            .interact_opt()?
        else {
            return Ok(());
        };

        let model = AVAILABLE_MODELS[index];
        self.client.set_model(model)?;
        self.config.model = model.to_string();
        console::info(&format!("Model switched to {model}"));
        Ok(())
    }

    fn edit_system_prompt(&mut self) -> anyhow::Result<()> {
        let prompt: String = Input::new()
            .with_prompt("Enter system prompt")
            .with_initial_text(self.config.system_prompt.clone())
            .interact_text()?;

        self.manager.set_system_prompt(&prompt)?;
        self.config.system_prompt = prompt;
        console::info("System prompt updated.");
        Ok(())
    }

    async fn auto_save_if_enabled(&mut self) {
        if !self.config.auto_save || self.manager.current_log().non_system_len() == 0 {
            return;
        }
        match self.save_session(None).await {
            Ok(()) => {}
            Err(e) => console::error(&format!("auto-save failed: {e}")),
        }
    }
}
