//! Terminal input and output
//!
//! The interactive flow talks to the user only through [`Console`], so it can
//! be driven by a scripted implementation in tests.

use std::io::{self, BufRead, Write};

use crate::api::ServerDescriptor;

const BANNER: &str = r"
 _     _       _     _ __     ______  _   _
| |   (_) __ _| |__ | |\ \   / /  _ \| \ | |
| |   | |/ _` | '_ \| __\ \ / /| |_) |  \| |
| |___| | (_| | | | | |_ \ V / |  __/| |\  |
|_____|_|\__, |_| |_|\__| \_/  |_|   |_| \_|
         |___/
";

pub trait Console {
    fn banner(&self);
    /// Progress line, prefixed `[-]`
    fn info(&self, message: &str);
    /// Success line, prefixed `[!]`
    fn success(&self, message: &str);
    /// Failure line, prefixed `[/]`
    fn error(&self, message: &str);
    /// Raw text, printed as is
    fn print(&self, text: &str);
    fn read_line(&self, prompt: &str) -> io::Result<String>;
    /// Read a line without echoing it
    fn read_password(&self, prompt: &str) -> io::Result<String>;
}

pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn banner(&self) {
        println!("{}", BANNER);
    }

    fn info(&self, message: &str) {
        println!("[-] {}", message);
    }

    fn success(&self, message: &str) {
        println!("[!] {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("[/] {}", message);
    }

    fn print(&self, text: &str) {
        print!("{}", text);
    }

    fn read_line(&self, prompt: &str) -> io::Result<String> {
        print!("[!] {}", prompt);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn read_password(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("[!] {}", prompt))
    }
}

/// Render servers as a table numbered from 0 in snapshot order
pub fn render_server_table(servers: &[ServerDescriptor]) -> String {
    let headers = ["ID", "Country", "Name", "Status", "Type"];
    let rows: Vec<[String; 5]> = servers
        .iter()
        .enumerate()
        .map(|(id, server)| {
            [
                id.to_string(),
                server.country_name.clone(),
                server.server_name.clone(),
                if server.status { "Online" } else { "Offline" }.to_string(),
                server.server_type.to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let format_row = |cells: &[&str]| {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(widths.iter()) {
            line.push_str(&format!(" {:<width$} |", cell, width = width));
        }
        line.push('\n');
        line
    };

    let mut table = String::new();
    table.push_str(&separator);
    table.push_str(&format_row(&headers));
    table.push_str(&separator);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        table.push_str(&format_row(&cells));
    }
    table.push_str(&separator);
    table
}
