use std::io::{self, BufRead, Write};

use crossterm::event::{Event, KeyEventKind};

use crate::pipeline::{ItemOutcome, ProgressEvent, ProgressSink, RunSummary};

/// Plain per-item console reporting; one line per pipeline event.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", event.message);
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("Processed {} catalog rows", summary.items.len());
    let counts = [
        ("zip archives", ItemOutcome::Zipped),
        ("videos tagged", ItemOutcome::VideoTagged),
        ("EXIF tagged", ItemOutcome::ExifTagged),
        ("PNG tagged", ItemOutcome::PngTagged),
        ("sidecars (no tagger)", ItemOutcome::SidecarUnsupported),
        ("sidecars (tag error)", ItemOutcome::SidecarError),
        ("fetch failures", ItemOutcome::FetchFailed),
        ("skipped", ItemOutcome::Skipped),
    ];
    for (label, outcome) in counts {
        let count = summary.count(outcome);
        if count > 0 {
            println!("  {label}: {count}");
        }
    }
}

/// Holds the console open until a keypress, so a double-clicked run doesn't
/// vanish before the operator reads the final status.
pub fn wait_for_ack() -> io::Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "\nPress any key to close...")?;
    stdout.flush()?;

    // Raw mode needs a real terminal. With stdin piped or redirected, a
    // plain line read holds the window open without failing the run.
    if crossterm::terminal::enable_raw_mode().is_err() {
        return ack_from_line(&mut io::stdin().lock());
    }
    let result = loop {
        match crossterm::event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
            Ok(_) => continue,
            Err(err) => break Err(err),
        }
    };
    crossterm::terminal::disable_raw_mode()?;
    println!();
    result
}

fn ack_from_line(input: &mut impl BufRead) -> io::Result<()> {
    let mut line = String::new();
    input.read_line(&mut line).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ack_consumes_one_line() {
        let mut input = io::Cursor::new(b"anything\n".to_vec());
        ack_from_line(&mut input).unwrap();
    }

    #[test]
    fn line_ack_accepts_closed_input() {
        // EOF on stdin (e.g. </dev/null) must not fail the run.
        let mut input = io::Cursor::new(Vec::new());
        ack_from_line(&mut input).unwrap();
    }
}
