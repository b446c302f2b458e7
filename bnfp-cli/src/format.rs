//! Status line output

use owo_colors::{OwoColorize, Stream};
use std::path::PathBuf;

use crate::Args;

/// Outcome tag of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    Warn,
}

impl Status {
    fn tag(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
        }
    }
}

/// Print an `[OK]` / `[WARN]` line on stdout
pub(crate) fn println_status(args: &Args, status: Status, text: &str) {
    let tag = status.tag();
    if args.no_color {
        println!("{} {}", tag, text);
        return;
    }
    let tag = match status {
        Status::Ok => tag
            .if_supports_color(Stream::Stdout, |t| t.green())
            .to_string(),
        Status::Warn => tag
            .if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string(),
    };
    println!("{} {}", tag, text);
}

/// Print one `[OK] Wrote <path>` line per written file
pub(crate) fn print_written(args: &Args, paths: &[PathBuf]) {
    for path in paths {
        println_status(args, Status::Ok, &format!("Wrote {}", path.display()));
    }
}

/// Print an error line on stderr
pub(crate) fn eprintln_colored(args: &Args, text: &str) {
    if args.no_color {
        eprintln!("{}", text);
    } else {
        eprintln!("{}", text.if_supports_color(Stream::Stderr, |t| t.red()));
    }
}
