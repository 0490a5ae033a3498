//! Output formatting for search results

use crate::query::SearchMatch;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print matches as `path:page:offset: text`, grouped per document when
/// heading mode is on
pub fn print_matches(matches: &[SearchMatch], color: bool, heading: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    let mut current_file: Option<&std::path::Path> = None;

    for m in matches {
        let is_new_file = current_file.map(|p| p != m.path).unwrap_or(true);

        if is_new_file {
            if heading {
                if current_file.is_some() {
                    writeln!(stdout)?;
                }
                stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
                writeln!(stdout, "{}", m.path.display())?;
                stdout.reset()?;
            }
            current_file = Some(&m.path);
        }

        if !heading {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(stdout, "{}", m.path.display())?;
            stdout.reset()?;
            write!(stdout, ":")?;
        }

        // Page and offset
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{}", m.page_index + 1)?;
        stdout.reset()?;
        write!(stdout, ":")?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{}", m.start_offset)?;
        stdout.reset()?;
        write!(stdout, ": ")?;

        // The matched text itself
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        writeln!(stdout, "{}", m.matched_text)?;
        stdout.reset()?;
    }

    Ok(())
}

/// Print only matching document paths (for -l flag)
pub fn print_files_only(matches: &[SearchMatch]) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let mut seen_files = std::collections::HashSet::new();

    for m in matches {
        if seen_files.insert(m.path.clone()) {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            writeln!(stdout, "{}", m.path.display())?;
            stdout.reset()?;
        }
    }

    Ok(())
}

/// Print match count per document (for -c flag)
pub fn print_match_counts(matches: &[SearchMatch]) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let mut counts: std::collections::HashMap<&std::path::Path, usize> =
        std::collections::HashMap::new();

    for m in matches {
        *counts.entry(&m.path).or_insert(0) += 1;
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    for (path, count) in sorted {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "{}", path.display())?;
        stdout.reset()?;
        write!(stdout, ":")?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(stdout, "{}", count)?;
        stdout.reset()?;
    }

    Ok(())
}
