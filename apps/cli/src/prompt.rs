//! Yes/no questions on the terminal.

use std::io::{BufRead, Write};

/// Asks `question` on stderr and reads the answer from stdin.
///
/// An empty answer, an unrecognized answer or end of input all mean
/// `default`.
pub async fn confirm(question: String, default: bool) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || {
        ask(
            &question,
            default,
            &mut std::io::stdin().lock(),
            &mut std::io::stderr(),
        )
    })
    .await?
}

fn ask(
    question: &str,
    default: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    write!(output, "{question} {hint} ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(default);
    }
    Ok(parse_answer(&line).unwrap_or(default))
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
