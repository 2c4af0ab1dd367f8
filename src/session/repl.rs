//! Interactive terminal front end for a haiku session

use anyhow::{anyhow, Result};
use colored::Colorize;
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::generator::HaikuGenerator;
use super::state::{Haiku, HaikuSession};
use crate::utils::fallback::FallbackTable;
use crate::utils::haiku_types::HAIKU_LINES;
use crate::utils::haiku_utils::{preview, timestamp_utc_secs_to_str};

/// One parsed line of user input
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Generate(String),
    Regenerate,
    Show,
    Edit,
    History,
    Select(usize),
    Help,
    Quit,
    Invalid(String),
}

enum CommandResult {
    Continue,
    Quit,
}

/// Parse one trimmed, non-empty input line.  History numbers are 1-based.
pub fn parse_command(input: &str) -> Command {
    if !input.starts_with('/') {
        return Command::Generate(input.to_string());
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    let cmd = parts.first().copied().unwrap_or("");
    match cmd {
        "/regen" | "/r" => Command::Regenerate,
        "/show" | "/s" => Command::Show,
        "/edit" | "/e" => Command::Edit,
        "/history" => Command::History,
        "/select" => match parts.get(1).and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n >= 1 => Command::Select(n),
            _ => Command::Invalid("Usage: /select N (see /history for numbers)".to_string()),
        },
        "/help" | "/h" => Command::Help,
        "/quit" | "/q" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command: {}", other)),
    }
}

/// Interactive haiku session
pub struct SessionRepl {
    session: HaikuSession,
    generator: Box<dyn HaikuGenerator>,
}

impl SessionRepl {
    pub fn new(generator: Box<dyn HaikuGenerator>) -> Self {
        Self {
            session: HaikuSession::new(),
            generator,
        }
    }

    /// Run the main loop until /quit or Ctrl+D
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| anyhow!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", "俳句>".bright_magenta()));
            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.handle_command(parse_command(input), &mut rl).await? {
                        CommandResult::Continue => continue,
                        CommandResult::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(anyhow!("Readline error: {}", err));
                }
            }
        }

        println!("再见!");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command, rl: &mut DefaultEditor) -> Result<CommandResult> {
        match command {
            Command::Generate(theme) => {
                self.session.set_theme(theme);
                self.generate().await;
            }
            Command::Regenerate => self.generate().await,
            Command::Show => match self.session.current() {
                Some(h) => print_haiku(h),
                None => println!("{}", "No haiku yet. Type a theme to create one.".dimmed()),
            },
            Command::Edit => self.edit(rl)?,
            Command::History => self.print_history(),
            Command::Select(n) => match self.session.select_from_history(n - 1) {
                Ok(h) => print_haiku(h),
                Err(e) => println!("{} {}", "!".red(), e),
            },
            Command::Help => self.print_help(),
            Command::Quit => return Ok(CommandResult::Quit),
            Command::Invalid(msg) => {
                println!("{} {}", "?".yellow(), msg);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        Ok(CommandResult::Continue)
    }

    async fn generate(&mut self) {
        println!("{}", "创作中 ···".dimmed());
        match self.session.generate(self.generator.as_ref()).await {
            Ok(h) => {
                info!("Session generated haiku {} for theme {}", h.id, h.theme);
                print_haiku(h);
            }
            Err(e) => println!("{} {}", "!".red(), e),
        }
    }

    // ---------------------------------------------------------------------------
    // edit:
    // ---------------------------------------------------------------------------
    /** Walk through the three lines pre-filled with their current text, then
     * ask whether to keep the changes.  Ctrl+C or Ctrl+D cancels.  A blank
     * answer keeps the existing line.
     */
    fn edit(&mut self, rl: &mut DefaultEditor) -> Result<()> {
        debug!("edit: session state {:?}", self.session.state());
        let lines = match self.session.start_edit() {
            Ok(h) => h.lines.clone(),
            Err(e) => {
                println!("{} {}", "!".red(), e);
                return Ok(());
            }
        };

        for (i, line) in lines.iter().enumerate() {
            let prompt = format!("  {}/{}> ", i + 1, HAIKU_LINES);
            match rl.readline_with_initial(&prompt, (line.as_str(), "")) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        self.session.edit_line(i + 1, text)?;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.session.cancel_edit();
                    println!("{}", "Edit canceled.".dimmed());
                    return Ok(());
                }
                Err(err) => {
                    self.session.cancel_edit();
                    return Err(anyhow!("Readline error: {}", err));
                }
            }
        }

        let answer = rl.readline("Save changes? [y/N] ").unwrap_or_default();
        if matches!(answer.trim(), "y" | "Y" | "yes") {
            let saved = self.session.save_edit()?;
            println!("{}", "Saved.".green());
            print_haiku(saved);
        } else {
            self.session.cancel_edit();
            println!("{}", "Edit canceled.".dimmed());
        }
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "俳句 Haiku Generator".bright_cyan().bold());
        println!("五 · 七 · 五");
        println!("Generating with: {}", self.generator.describe());
        println!("Type a theme to create a haiku, {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Create a haiku for that theme", "<theme>".yellow());
        println!("  {:14} Create another haiku for the current theme", "/regen".yellow());
        println!("  {:14} Show the current haiku", "/show".yellow());
        println!("  {:14} Edit the current haiku", "/edit".yellow());
        println!("  {:14} List recent haiku, newest first", "/history".yellow());
        println!("  {:14} Make history entry N current", "/select N".yellow());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit", "/quit".yellow());
        println!();
        println!("{} {}", "Themes with canned poems:".bright_cyan(), FallbackTable::shared().themes().join(" "));
        println!();
    }

    fn print_history(&self) {
        if self.session.history_len() == 0 {
            println!("{}", "No history yet.".dimmed());
            return;
        }

        let current_id = self.session.current().map(|h| h.id);
        println!();
        println!("{}", "History:".bright_cyan());
        for (i, h) in self.session.history().enumerate() {
            let marker = if Some(h.id) == current_id { "*" } else { " " };
            println!(
                "{} {:>2}. {} {} {}",
                marker,
                i + 1,
                preview(&h.theme, 8).bright_green(),
                preview(&h.lines[0], 12),
                timestamp_utc_secs_to_str(h.timestamp).dimmed()
            );
        }
        println!();
    }
}

fn print_haiku(h: &Haiku) {
    println!();
    for line in &h.lines {
        println!("    {}", line.bright_white());
    }
    println!("    {}", format!("[{}] {}", h.theme, timestamp_utc_secs_to_str(h.timestamp)).dimmed());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_theme() {
        assert_eq!(parse_command("春天"), Command::Generate("春天".to_string()));
        assert_eq!(parse_command("spring rain"), Command::Generate("spring rain".to_string()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_command("/regen"), Command::Regenerate);
        assert_eq!(parse_command("/show"), Command::Show);
        assert_eq!(parse_command("/edit"), Command::Edit);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/select 3"), Command::Select(3));
        assert_eq!(parse_command("/q"), Command::Quit);
        assert_eq!(parse_command("/help"), Command::Help);
    }

    #[test]
    fn test_bad_commands() {
        assert!(matches!(parse_command("/select"), Command::Invalid(_)));
        assert!(matches!(parse_command("/select 0"), Command::Invalid(_)));
        assert!(matches!(parse_command("/select x"), Command::Invalid(_)));
        assert!(matches!(parse_command("/nope"), Command::Invalid(_)));
    }
}
