/// Character and word counts shown under the input panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        Self {
            chars: text.chars().count(),
            words: text.split_whitespace().count(),
        }
    }

    pub fn chars_label(&self) -> String {
        format!("Chars: {}", self.chars)
    }

    pub fn words_label(&self) -> String {
        format!("Words: {}", self.words)
    }
}
