//! # CLI Output Helpers
//!
//! Centralized output formatting for consistent CLI messages.

use console::{style, StyledObject};

use box_lib::Reply;

/// Output icons
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✅";
    pub const ERROR: &'static str = "❌";
    pub const WARNING: &'static str = "⚡";
    pub const INFO: &'static str = "●";
}

pub fn icon_success() -> StyledObject<&'static str> {
    style(Icons::SUCCESS).green().bold()
}

pub fn icon_error() -> StyledObject<&'static str> {
    style(Icons::ERROR).red().bold()
}

pub fn icon_warning() -> StyledObject<&'static str> {
    style(Icons::WARNING).yellow().bold()
}

pub fn icon_info() -> StyledObject<&'static str> {
    style(Icons::INFO).cyan().bold()
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!(" {}{}", icon_success(), msg);
}

/// Print an error message to stderr
pub fn print_error(msg: impl std::fmt::Display) {
    eprintln!(" {}Error: {}", icon_error(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!(" {}{}", icon_warning(), msg);
}

pub fn print_info(msg: &str) {
    println!(" {} {}", icon_info(), msg);
}

/// Print a server reply; returns whether it reported success
pub fn print_reply(reply: &Reply) -> bool {
    match reply {
        Reply::Hello(hello) => {
            let versions: Vec<String> = hello.versions.iter().map(|v| v.to_string()).collect();
            print_success(&format!("HELLO {} (versions {})", hello.status, versions.join(", ")));
        }
        Reply::Status(status) if reply.is_ok() => print_success(&status.message),
        Reply::Status(status) => print_warning(&format!("{} {}", status.status, status.message)),
        Reply::Object(object) => {
            print_info(&format!(
                "{} ({}, {} bytes)",
                style(&object.queue).bold(),
                object.content_type,
                object.data.len()
            ));
            println!("{}", String::from_utf8_lossy(&object.data));
        }
    }
    reply.is_ok()
}

/// Colour scheme for `--help`
pub fn styles() -> clap::builder::Styles {
    use clap::builder::styling::AnsiColor;

    clap::builder::Styles::styled()
        .usage(AnsiColor::BrightCyan.on_default().bold())
        .header(AnsiColor::BrightCyan.on_default().bold())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
        .valid(AnsiColor::BrightGreen.on_default())
        .invalid(AnsiColor::BrightRed.on_default())
}
