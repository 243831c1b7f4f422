//! Console progress spinner.

use std::io::{self, Write};

/// Braille frames cycled while waiting.
pub const GLYPHS: [char; 7] = ['⢄', '⢂', '⢁', '⡁', '⡈', '⡐', '⡠'];

/// Backspace over the previous frame, then draw the next one.
const ERASE: &str = "\x08\x08";

/// Cycles through [`GLYPHS`], one frame per poll tick.
#[derive(Debug, Default)]
pub struct Spinner {
    index: usize,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the next frame and flush.
    pub fn tick<W: Write>(&mut self, console: &mut W) -> io::Result<()> {
        write!(console, "{}{} ", ERASE, GLYPHS[self.index])?;
        console.flush()?;
        self.index = (self.index + 1) % GLYPHS.len();
        Ok(())
    }

    /// Erase the last frame and end the line.
    pub fn clear<W: Write>(console: &mut W) -> io::Result<()> {
        writeln!(console, "{} ", ERASE)?;
        console.flush()
    }
}
