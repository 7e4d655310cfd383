//! Terminal rendering for compile/validate diagnostics.

use colored::*;
use pipeforge_core::errors::CompileError;

/// Print a `CompileError`'s rendered message, with the top line in red and
/// nested aggregate children dimmed.
pub fn print_error(err: &CompileError) {
    eprintln!();
    for (i, line) in err.to_string().lines().enumerate() {
        if i == 0 {
            eprintln!("{} {}", "error:".red().bold(), line);
        } else {
            eprintln!("{}", line.dimmed());
        }
    }
    eprintln!();
}

pub fn print_success(message: &str) {
    println!("{} {}", "ok:".green().bold(), message);
}
