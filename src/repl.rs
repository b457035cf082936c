//! Line-oriented REPL.
//!
//! Each line is compiled and run on its own; an error on one line never
//! ends the session.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::Options;
use crate::Session;

const HISTORY_FILE: &str = ".loxbc_history";
const PROMPT: &str = "> ";

/// What the loop should do after a meta command.
enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    session: Session,
    history: Vec<String>,
    history_file: Option<PathBuf>,
}

impl Repl {
    /// A REPL that loads and saves `~/.loxbc_history`.
    pub fn new(options: Options) -> Self {
        let mut repl = Self {
            session: Session::new(options).with_highlighted_errors(true),
            history: Vec::new(),
            history_file: Some(Self::get_history_path()),
        };
        repl.load_history();
        repl
    }

    /// A REPL that keeps no history on disk.
    pub fn without_history(options: Options) -> Self {
        Self {
            session: Session::new(options),
            history: Vec::new(),
            history_file: None,
        }
    }

    fn get_history_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(HISTORY_FILE)
        } else {
            PathBuf::from(HISTORY_FILE)
        }
    }

    fn load_history(&mut self) {
        let Some(path) = &self.history_file else {
            return;
        };
        if let Ok(content) = std::fs::read_to_string(path) {
            self.history.extend(
                content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string),
            );
        }
    }

    fn save_history(&self) {
        let Some(path) = &self.history_file else {
            return;
        };
        let mut content = self.history.join("\n");
        content.push('\n');
        if let Err(err) = std::fs::write(path, content) {
            log::debug!("could not save history to {}: {}", path.display(), err);
        }
    }

    /// Lines entered so far, including any loaded from disk.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Run against the process's stdin, stdout and stderr.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        self.run_with(stdin.lock(), &mut stdout, &mut stderr)
    }

    /// Read lines from `input` until end of input or `.exit`.
    pub fn run_with<R: BufRead>(
        &mut self,
        mut input: R,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.to_string());

            if line.starts_with('.') {
                match self.handle_command(line, out)? {
                    Flow::Continue => continue,
                    Flow::Exit => break,
                }
            }

            self.session.interpret(line, out, err);
            out.flush()?;
        }

        self.save_history();
        Ok(())
    }

    fn handle_command(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        match line {
            ".exit" | ".quit" => return Ok(Flow::Exit),
            ".help" => self.cmd_help(out)?,
            ".trace" => {
                let options = self.session.options_mut();
                options.trace_execution = !options.trace_execution;
                writeln!(out, "Execution trace {}.", on_off(options.trace_execution))?;
            }
            ".code" => {
                let options = self.session.options_mut();
                options.print_code = !options.print_code;
                writeln!(out, "Bytecode dump {}.", on_off(options.print_code))?;
            }
            _ => writeln!(
                out,
                "Unknown command: {}. Type .help for available commands.",
                line
            )?,
        }
        Ok(Flow::Continue)
    }

    fn cmd_help(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Enter an expression to evaluate it.")?;
        writeln!(out)?;
        writeln!(out, "Commands:")?;
        writeln!(out, "  .help         Show this help message")?;
        writeln!(out, "  .trace        Toggle the execution trace")?;
        writeln!(out, "  .code         Toggle the bytecode dump")?;
        writeln!(out, "  .exit, .quit  Leave the REPL")
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session(input: &str) -> (String, String, Repl) {
        let mut repl = Repl::without_history(Options::default());
        let mut out = Vec::new();
        let mut err = Vec::new();
        repl.run_with(input.as_bytes(), &mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
            repl,
        )
    }

    #[test]
    fn test_evaluates_each_line() {
        let (out, err, _) = session("1 + 2\n!nil\n");
        assert_eq!(out, "> 3\n> true\n> \n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_errors_do_not_end_session() {
        let (out, err, _) = session("1 +\n-false\n4\n");
        assert_eq!(out, "> > > 4\n> \n");
        assert_eq!(
            err,
            "[line 1] Error at end: Expect expression.\n\
             [line 1] Error: Operand must be a number.\n"
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let (out, _, repl) = session("\n   \n5\n");
        assert_eq!(out, "> > > 5\n> \n");
        assert_eq!(repl.history(), &["5".to_string()]);
    }

    #[test]
    fn test_exit_command() {
        let (out, _, _) = session(".exit\n1\n");
        assert_eq!(out, "> ");
    }

    #[test]
    fn test_command_with_surrounding_whitespace() {
        let (out, _, repl) = session("  .exit  \n1\n");
        assert_eq!(out, "> ");
        assert_eq!(repl.history(), &[".exit".to_string()]);
    }

    #[test]
    fn test_toggle_commands() {
        let (out, _, _) = session(".code\n1\n");
        assert!(out.contains("Bytecode dump on."));
        assert!(out.contains("== code =="));

        let (out, _, _) = session(".trace\n.trace\n");
        assert!(out.contains("Execution trace on."));
        assert!(out.contains("Execution trace off."));
    }

    #[test]
    fn test_unknown_command() {
        let (out, _, _) = session(".bogus\n");
        assert!(out.contains("Unknown command: .bogus."));
    }

    #[test]
    fn test_help() {
        let (out, _, _) = session(".help\n");
        assert!(out.contains(".trace"));
        assert!(out.contains(".exit, .quit"));
    }
}
