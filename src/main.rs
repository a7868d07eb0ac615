use std::process::exit;

use colored::Colorize;

fn main() {
    if let Err(e) = plotdesk::app::run_cli() {
        eprintln!("{} {}", "error:".red().bold(), e);
        exit(1);
    }
}
