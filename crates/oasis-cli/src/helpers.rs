//! CLI output helpers.

use colored::Colorize;

/// Print the REPL banner.
pub fn print_banner() {
    println!();
    println!("{}", "Oasis — personal assistant".cyan().bold());
    println!("{}", "type 'exit' or Ctrl-D to quit".dimmed());
    println!();
}

/// Print an assistant response.
pub fn print_response(response: &str) {
    println!();
    println!("{} {response}", "Oasis:".green().bold());
    println!();
}

/// Print a transient thinking indicator.
pub fn print_thinking() {
    print!("{}", "thinking…".dimmed());
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

/// Clear the thinking indicator line.
pub fn clear_thinking() {
    print!("\r          \r");
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
