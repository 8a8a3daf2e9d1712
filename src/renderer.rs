use percept_core::RatingField;
use percept_experiment::DisplaySignal;
use std::io::{self, Write};

/// Draws display signals as plain terminal text.
pub struct TerminalRenderer<W: Write> {
    out: W,
    scale_max: u8,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, scale_max: u8) -> Self {
        Self { out, scale_max }
    }

    pub fn render(&mut self, signal: &DisplaySignal) -> io::Result<()> {
        match signal {
            DisplaySignal::Fixation { trial, total } => {
                writeln!(self.out)?;
                writeln!(self.out, "[{trial}/{total}]")?;
                writeln!(self.out, "        +")?;
            }
            DisplaySignal::Stimulus { path } => {
                writeln!(self.out, "  image: {path}")?;
            }
            DisplaySignal::RatingForm { submit_enabled: false } => {
                let fields: Vec<&str> = RatingField::ALL.iter().map(|f| f.name()).collect();
                writeln!(self.out, "Rate the image 1-{} on: {}", self.scale_max, fields.join(" "))?;
                writeln!(
                    self.out,
                    "  enter six numbers, or field=value pairs followed by `submit`"
                )?;
            }
            DisplaySignal::RatingForm { submit_enabled: true } => {
                writeln!(self.out, "  all answered, `submit` when ready")?;
            }
            DisplaySignal::AttentionQuestion { options } => {
                writeln!(self.out, "Which kind of picture did you just see?")?;
                for (i, option) in options.iter().enumerate() {
                    writeln!(self.out, "  {}) {}", i + 1, option)?;
                }
            }
            DisplaySignal::Break { seconds_remaining } => {
                writeln!(
                    self.out,
                    "Take a break ({seconds_remaining}s). Press Enter to continue early."
                )?;
            }
            DisplaySignal::Rest => {
                writeln!(self.out, "  ...")?;
            }
            DisplaySignal::Rejected { reason } => {
                writeln!(self.out, "  ! {reason}")?;
            }
            DisplaySignal::Finished { route } => {
                writeln!(self.out)?;
                writeln!(self.out, "All done, thank you! Continue at {route}")?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn out(&self) -> &W {
        &self.out
    }

    pub fn note(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "  ({text})")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percept_experiment::Rejection;

    fn rendered(signal: DisplaySignal) -> String {
        let mut buf = Vec::new();
        TerminalRenderer::new(&mut buf, 7).render(&signal).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn attention_options_are_numbered() {
        let text = rendered(DisplaySignal::AttentionQuestion {
            options: vec!["people".into(), "food".into()],
        });
        assert!(text.contains("1) people"));
        assert!(text.contains("2) food"));
    }

    #[test]
    fn rejection_shows_the_prompt() {
        let text = rendered(DisplaySignal::Rejected {
            reason: Rejection::NoSelection,
        });
        assert!(text.contains("please select an option"));
    }

    #[test]
    fn rating_prompt_lists_every_field() {
        let text = rendered(DisplaySignal::RatingForm { submit_enabled: false });
        assert!(text.contains("1-7"));
        assert!(text.contains("moral_disgust"));
        assert!(text.contains("visual_appeal"));
    }

    #[test]
    fn progress_is_shown_on_fixation() {
        let text = rendered(DisplaySignal::Fixation { trial: 3, total: 20 });
        assert!(text.contains("[3/20]"));
    }
}
