use anyhow::Result;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

impl<C: Confirm + ?Sized> Confirm for Box<C> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        (**self).confirm(prompt)
    }
}

pub fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Writes the prompt to `output` and reads one answer line from `input`.
/// End of input counts as a "no".
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptConfirm<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        Ok(is_affirmative(&answer))
    }
}

/// Answers every prompt the same way, for `--yes` runs.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_affirmative() {
        for yes in ["y", "Y", "yes", "YES", " Yes \n"] {
            assert!(is_affirmative(yes), "{:?} should confirm", yes);
        }
        for no in ["", "n", "no", "yep", "ye", "y es", "sure"] {
            assert!(!is_affirmative(no), "{:?} should decline", no);
        }
    }

    #[test]
    fn test_prompt_confirm_reads_one_line() {
        let mut output = Vec::new();
        let mut confirm = PromptConfirm::new(Cursor::new("yes\nno\n"), &mut output);

        assert!(confirm.confirm("Re-sync these 2 weeks? (y/n): ").unwrap());
        assert!(!confirm.confirm("Again? ").unwrap());
        drop(confirm);

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Re-sync these 2 weeks? (y/n): Again? "
        );
    }

    #[test]
    fn test_end_of_input_declines() {
        let mut confirm = PromptConfirm::new(Cursor::new(""), Vec::new());
        assert!(!confirm.confirm("Proceed? ").unwrap());
    }
}
