//! Hidden secret entry on the terminal

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Error, Result};

pub trait SecretPrompt {
    fn read_secret(&self, prompt: &str) -> Result<String>;
}

/// Reads from the controlling terminal without echo. Falls back to a plain
/// line read when stdin is not a terminal (pipes, CI).
pub struct TerminalPrompt;

/// Restores cooked mode on every exit path
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl SecretPrompt for TerminalPrompt {
    fn read_secret(&self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        if !io::stdin().is_terminal() {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            return Ok(line.trim_end_matches(['\r', '\n']).to_string());
        }

        let mut secret = String::new();
        {
            enable_raw_mode()?;
            let _guard = RawModeGuard;
            loop {
                if let Event::Key(k) = event::read()? {
                    if k.kind != KeyEventKind::Press {
                        continue;
                    }
                    match (k.code, k.modifiers) {
                        // Raw mode swallows SIGINT; treat Ctrl-C as the interrupt it would have been
                        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => {
                            println!("\r");
                            return Err(Error::Interrupted);
                        }
                        (KeyCode::Enter, _) => break,
                        (KeyCode::Backspace, _) => {
                            secret.pop();
                        }
                        (KeyCode::Char(c), _) => secret.push(c),
                        _ => {}
                    }
                }
            }
        }
        println!();
        Ok(secret)
    }
}
