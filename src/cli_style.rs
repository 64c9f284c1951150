use crate::notifications::Notification;
use crate::optimizer::OptimizationResult;
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use indicatif::ProgressStyle;
use std::fmt::Write as _;
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const PURPLE: Color = Color::Rgb {
        r: 180,
        g: 100,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const BLUE: Color = Color::Rgb {
        r: 100,
        g: 149,
        b: 237,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const SINGLE_VERTICAL: &str = "│";

    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";

    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";

    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        box_chars::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

pub fn print_info(message: &str) {
    println!(
        " {} {}",
        "ℹ".with(colors::BLUE).bold(),
        message.with(colors::BLUE)
    );
}

/// Show a notification the way a tooltip or dialog would in a GUI host.
pub fn print_notification(notification: &Notification) {
    let text = format!("{}: {}", notification.title(), notification.body());
    match notification {
        Notification::Started { .. } => print_info(&text),
        Notification::Busy { .. } | Notification::Cancelled { .. } => print_warning(&text),
        Notification::Succeeded { listing, .. } => {
            print_success(&text);
            if !listing.is_empty() {
                println!();
                println!("{}", listing);
                println!();
            }
        }
        Notification::Failed { .. } | Notification::DependencyMissing { .. } => {
            print_error(&text)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Section Headers
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let width: usize = 60;
    let title_len = title.width();
    let padding = width.saturating_sub(title_len + 4) / 2;

    println!();
    print!("{}", box_chars::ROUND_TOP_LEFT.with(colors::CYAN));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(padding)
            .with(colors::CYAN)
    );
    print!(
        " {} ",
        title.with(colors::CYAN).bold().attribute(Attribute::Italic)
    );
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(width.saturating_sub(title_len + 4 + padding))
            .with(colors::CYAN)
    );
    println!("{}", box_chars::ROUND_TOP_RIGHT.with(colors::CYAN));
}

pub fn print_section_footer() {
    print!("{}", box_chars::ROUND_BOTTOM_LEFT.with(colors::CYAN));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL.repeat(60).with(colors::CYAN)
    );
    println!("{}", box_chars::ROUND_BOTTOM_RIGHT.with(colors::CYAN));
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

/// Detailed view of one stored result.
pub fn print_result(result: &OptimizationResult) {
    print_section_header(&result.deck_name);
    print_key_value("Target", &result.target.to_string());
    print_key_value(
        "Weights",
        &result
            .weights
            .iter()
            .map(|w| format!("{:.4}", w))
            .collect::<Vec<_>>()
            .join(", "),
    );
    print_key_value("Requested retention", &result.request_retention.to_string());
    print_key_value(
        "Retention searched",
        if result.is_not_optimized { "no" } else { "yes" },
    );
    print_key_value(
        "Maximum interval",
        &result.tunables.maximum_interval.to_string(),
    );
    print_key_value("Easy bonus", &result.tunables.easy_bonus.to_string());
    print_key_value("Hard interval", &result.tunables.hard_interval.to_string());
    if let Some(computed_at) = &result.computed_at {
        print_key_value("Computed at", computed_at);
    }
    print_section_footer();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Progress Bar
// ═══════════════════════════════════════════════════════════════════════════════

pub fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg:<24} [{bar:40.cyan/magenta}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Display
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        let col_widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            col_widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.col_widths.len() {
                self.col_widths[i] = self.col_widths[i].max(cell.width());
            }
        }
        self.rows.push(row);
    }

    fn border(&self, out: &mut String, left: &str, junction: &str, right: &str) {
        let _ = write!(out, "{}", left.with(colors::CYAN));
        for (i, width) in self.col_widths.iter().enumerate() {
            let _ = write!(
                out,
                "{}",
                box_chars::SINGLE_HORIZONTAL
                    .repeat(width + 2)
                    .with(colors::CYAN)
            );
            if i + 1 < self.col_widths.len() {
                let _ = write!(out, "{}", junction.with(colors::CYAN));
            }
        }
        let _ = writeln!(out, "{}", right.with(colors::CYAN));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.border(
            &mut out,
            box_chars::ROUND_TOP_LEFT,
            box_chars::T_TOP,
            box_chars::ROUND_TOP_RIGHT,
        );

        let _ = write!(out, "{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
        for (i, header) in self.headers.iter().enumerate() {
            let padding = self.col_widths[i].saturating_sub(header.width());
            let _ = write!(
                out,
                " {}{} {}",
                header.clone().with(colors::CYAN).bold(),
                " ".repeat(padding),
                box_chars::SINGLE_VERTICAL.with(colors::CYAN)
            );
        }
        out.push('\n');

        self.border(&mut out, box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);

        for row in &self.rows {
            let _ = write!(out, "{}", box_chars::SINGLE_VERTICAL.with(colors::CYAN));
            for (i, width) in self.col_widths.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let padding = width.saturating_sub(cell.width());
                let _ = write!(
                    out,
                    " {}{} {}",
                    cell.with(colors::WHITE),
                    " ".repeat(padding),
                    box_chars::SINGLE_VERTICAL.with(colors::CYAN)
                );
            }
            out.push('\n');
        }

        self.border(
            &mut out,
            box_chars::ROUND_BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::ROUND_BOTTOM_RIGHT,
        );
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

/// Summary table of stored results, one row per target.
pub fn results_table<'a>(results: impl Iterator<Item = &'a OptimizationResult>) -> TableBuilder {
    let mut table = TableBuilder::new(vec!["Target", "Deck", "Retention", "Searched", "Computed at"]);
    for result in results {
        table.add_row(vec![
            result.target.to_string(),
            result.deck_name.clone(),
            format!("{:.2}", result.request_retention),
            if result.is_not_optimized { "no" } else { "yes" }.to_string(),
            result.computed_at.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}
