//! Human-readable transcript of a session.

use std::io::Write;

use crate::error::Result;

const WIDTH: usize = 80;

/// `label` centred in a line of `fill`, 80 columns wide.
pub fn separator(label: &str, fill: char) -> String {
    let label = format!(" {} ", label);
    let remaining = WIDTH.saturating_sub(label.chars().count()).max(2);
    let left = remaining / 2;
    let right = remaining - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        label,
        fill.to_string().repeat(right)
    )
}

pub struct Transcript<W: Write> {
    out: W,
}

impl<W: Write + Send> Transcript<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn heading(&mut self, label: &str) -> Result<()> {
        writeln!(self.out, "{}\n", separator(label, '-'))?;
        Ok(())
    }

    pub fn iteration(&mut self, index: usize) -> Result<()> {
        writeln!(self.out, "{}\n", separator(&format!("ITERATION {}", index), '='))?;
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    /// Streamed text goes out as it arrives; a failing sink does not stop
    /// the stream.
    pub fn token(&mut self, token: &str) {
        let _ = self.out.write_all(token.as_bytes());
        let _ = self.out.flush();
    }

    pub fn end_stream(&mut self) -> Result<()> {
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_is_centred_and_80_wide() {
        let line = separator("THINKING", '-');
        assert_eq!(line.chars().count(), 80);
        assert!(line.starts_with(&format!("{} THINKING ", "-".repeat(35))));
        assert!(line.ends_with('-'));

        let odd = separator("END", '=');
        assert_eq!(odd.chars().count(), 80);
        assert_eq!(odd.find(" END "), Some(37));
    }

    #[test]
    fn test_transcript_writes_in_order() {
        let mut transcript = Transcript::new(Vec::new());
        transcript.iteration(0).unwrap();
        transcript.token("hel");
        transcript.token("lo");
        transcript.end_stream().unwrap();

        let text = String::from_utf8(transcript.into_inner()).unwrap();
        assert!(text.starts_with(&separator("ITERATION 0", '=')));
        assert!(text.ends_with("\n\nhello\n"));
    }
}
