// Output-matching responders for interactive prompts

use regex::Regex;

/// Answers an interactive prompt by watching a child's output.
///
/// Each responder tracks how far into the stream it has already scanned, so a
/// given occurrence of the prompt is answered exactly once no matter how many
/// times the accumulated output is re-submitted.
#[derive(Debug, Clone)]
pub struct Responder {
    pattern: Regex,
    response: String,
    /// Byte offset into the stream up to which matches were already answered
    index: usize,
}

impl Responder {
    /// Create a responder from a regex pattern and the text to send back
    pub fn new(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            response: response.into(),
            index: 0,
        })
    }

    /// Pattern source, for logging
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Scan the full stream seen so far and return one response per new match
    pub fn submit(&mut self, stream: &str) -> Vec<String> {
        // Stream shrank (new run with the same responder): start over
        if self.index > stream.len() || !stream.is_char_boundary(self.index) {
            self.index = 0;
        }

        let mut responses = Vec::new();
        let mut end = self.index;
        for found in self.pattern.find_iter(&stream[self.index..]) {
            responses.push(self.response.clone());
            end = self.index + found.end();
        }
        self.index = end;
        responses
    }

    /// Forget what was already answered
    pub fn reset(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responds_once_per_match() {
        let mut responder = Responder::new(r"Continue\? \(Y/N\)", "y\n").unwrap();

        assert!(responder.submit("Loading...").is_empty());
        let stream = "Loading...\nContinue? (Y/N)";
        assert_eq!(responder.submit(stream), vec!["y\n".to_string()]);
        // Same stream again: already answered
        assert!(responder.submit(stream).is_empty());
    }

    #[test]
    fn test_answers_each_new_occurrence() {
        let mut responder = Responder::new(r"\(Y/N\)", "y\n").unwrap();
        let first = "one (Y/N)";
        assert_eq!(responder.submit(first).len(), 1);

        let second = "one (Y/N) y\ntwo (Y/N) three (Y/N)";
        assert_eq!(responder.submit(second).len(), 2);
    }

    #[test]
    fn test_prompt_split_across_chunks() {
        let mut responder = Responder::new(r"Continue\? \(Y/N\)", "y\n").unwrap();
        assert!(responder.submit("Continue? (Y").is_empty());
        assert_eq!(responder.submit("Continue? (Y/N)").len(), 1);
    }

    #[test]
    fn test_reset_after_shorter_stream() {
        let mut responder = Responder::new("go", "ok").unwrap();
        assert_eq!(responder.submit("let's go now").len(), 1);
        // A new, shorter stream means a fresh run
        assert_eq!(responder.submit("go").len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Responder::new("(unclosed", "y").is_err());
    }
}
