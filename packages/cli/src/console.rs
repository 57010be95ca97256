// ABOUTME: Renders console events for a terminal
// ABOUTME: Program output goes to stdout, diagnostics to stderr

use colored::*;
use tutor_engine::ConsoleEvent;

/// Text to print and the stream it belongs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Stdout(String),
    Stderr(String),
}

/// Terminal rendering of one event; status changes and resets print nothing
pub fn render(event: &ConsoleEvent) -> Option<Rendered> {
    match event {
        ConsoleEvent::Output { text, append: true } => Some(Rendered::Stdout(text.clone())),
        ConsoleEvent::Output {
            text,
            append: false,
        } => Some(Rendered::Stdout(format!("\r{}", text))),
        ConsoleEvent::InputRequested { prompt } => Some(Rendered::Stdout(prompt.clone())),
        ConsoleEvent::Figure(data) => Some(Rendered::Stderr(format!(
            "{} {} bytes of image data",
            "[figure]".cyan(),
            data.len()
        ))),
        ConsoleEvent::Error(message) => {
            Some(Rendered::Stderr(format!("{} {}", "Error:".red().bold(), message)))
        }
        ConsoleEvent::Status(_) | ConsoleEvent::Cleared | ConsoleEvent::InputResolved => None,
    }
}
