//! Titled console panels for the human watching a run.
//!
//! Panels go to stderr so stdout stays reserved for streamed model output and
//! the final refined deliverable.

use crossterm::style::{Color, Stylize};

/// Colour of a panel's frame and title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Info => Color::Blue,
            Tone::Success => Color::Green,
            Tone::Warning => Color::Yellow,
            Tone::Error => Color::Red,
        }
    }
}

const RULE_WIDTH: usize = 60;

/// Plain-text panel layout, one frame character per line prefix.
fn render_lines(title: &str, body: &str, subtitle: Option<&str>) -> Vec<String> {
    let rule = "─".repeat(RULE_WIDTH.saturating_sub(title.chars().count() + 4));
    let mut lines = vec![format!("╭─ {title} {rule}")];
    for line in body.lines() {
        lines.push(format!("│ {line}"));
    }
    if body.is_empty() {
        lines.push("│".to_string());
    }
    match subtitle {
        Some(sub) => lines.push(format!("╰─ {sub}")),
        None => lines.push(format!("╰{}", "─".repeat(RULE_WIDTH))),
    }
    lines
}

/// Print a panel to stderr.
pub fn panel(title: &str, body: &str, tone: Tone) {
    print_panel(title, body, None, tone);
}

/// Print a panel with a footer line (e.g. "Sending task to sub-agent").
pub fn panel_with_subtitle(title: &str, body: &str, subtitle: &str, tone: Tone) {
    print_panel(title, body, Some(subtitle), tone);
}

fn print_panel(title: &str, body: &str, subtitle: Option<&str>, tone: Tone) {
    let color = tone.color();
    let lines = render_lines(title, body, subtitle);
    let last = lines.len() - 1;
    for (i, line) in lines.into_iter().enumerate() {
        if i == 0 {
            eprintln!("{}", line.bold().with(color));
        } else if i == last {
            eprintln!("{}", line.with(color));
        } else {
            // Colour only the frame character, not the body text.
            let rest = line.strip_prefix('│').unwrap_or(&line).to_string();
            eprintln!("{}{}", "│".with(color), rest);
        }
    }
}

/// One-line warning in the console (not a panel).
pub fn warn_line(message: &str) {
    eprintln!("{} {message}", "Warning:".bold().with(Color::Yellow));
}
