//! Colored terminal output for pipeline commands

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Status line marker: symbol, color, whether the text is colored too
#[derive(Clone, Copy)]
struct Marker {
    symbol: &'static str,
    color: Color,
    color_text: bool,
}

const SUCCESS: Marker = Marker {
    symbol: "✓",
    color: Color::Green,
    color_text: false,
};

const WARNING: Marker = Marker {
    symbol: "⚠",
    color: Color::Yellow,
    color_text: true,
};

const FAILURE: Marker = Marker {
    symbol: "✗",
    color: Color::Red,
    color_text: true,
};

/// Writes progress to stdout and failures to stderr
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.quiet)
    }
}

impl OutputManager {
    /// Create an output manager; `quiet` silences everything but errors
    pub fn new(quiet: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            quiet,
        }
    }

    /// `✓ message`
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.marked_stdout(SUCCESS, message)
    }

    /// `⚠ message`, in yellow
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.marked_stdout(WARNING, message)
    }

    /// `✗ message` on stderr, shown even in quiet mode
    pub fn error(&self, message: &str) {
        let stderr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = stderr.buffer();
        if write_marked(&mut buffer, FAILURE, message).is_err() || stderr.print(&buffer).is_err() {
            println!("{} {}", FAILURE.symbol, message);
        }
    }

    /// Sub-item under the previous line
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.plain(&format!("    {}", message))
    }

    /// Plain line
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        self.plain(message)
    }

    fn plain(&self, line: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.stdout.buffer();
        writeln!(&mut buffer, "{}", line)?;
        self.stdout.print(&buffer)
    }

    fn marked_stdout(&self, marker: Marker, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.stdout.buffer();
        write_marked(&mut buffer, marker, message)?;
        self.stdout.print(&buffer)
    }
}

fn write_marked(buffer: &mut Buffer, marker: Marker, message: &str) -> std::io::Result<()> {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(marker.color));

    buffer.set_color(spec.clone().set_bold(true))?;
    write!(buffer, "{}", marker.symbol)?;
    buffer.reset()?;

    if marker.color_text {
        buffer.set_color(&spec)?;
    }
    writeln!(buffer, " {}", message)?;
    buffer.reset()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(marker: Marker, message: &str) -> String {
        let mut buffer = Buffer::no_color();
        write_marked(&mut buffer, marker, message).expect("write");
        String::from_utf8(buffer.into_inner()).expect("utf8")
    }

    #[test]
    fn test_markers_without_color() {
        assert_eq!(rendered(SUCCESS, "attached"), "✓ attached\n");
        assert_eq!(rendered(WARNING, "missing 1 asset"), "⚠ missing 1 asset\n");
        assert_eq!(rendered(FAILURE, "linux: linker error"), "✗ linux: linker error\n");
    }

    #[test]
    fn test_quiet_suppresses_progress() {
        let output = OutputManager::new(true);
        assert!(output.success("hidden").is_ok());
        assert!(output.println("hidden").is_ok());
    }
}
