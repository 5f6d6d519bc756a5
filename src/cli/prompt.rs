//! Blocking terminal prompts for the interactive commands.

use std::io::{self, BufRead, Write};

use crate::feedbin::FeedOption;

/// Asks a yes/no question. An empty answer takes `default`; end of input is "no".
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        write!(output, "{question} {hint} ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please answer y or n.")?,
        }
    }
}

/// Lists the options numbered from 1 and returns the chosen index.
///
/// `None` when the input ends or the answer is not a listed number.
pub fn choose_feed<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    options: &[FeedOption],
) -> io::Result<Option<usize>> {
    writeln!(output, "Multiple feeds found. Please choose one:")?;
    for (i, option) in options.iter().enumerate() {
        writeln!(output, "{}. {option}", i + 1)?;
    }
    write!(output, "Which feed number would you like to subscribe to? ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(line
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=options.len()).contains(n))
        .map(|n| n - 1))
}
