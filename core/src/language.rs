use std::collections::HashMap;

/// Lookup of known language codes. Injected everywhere a component
/// needs language knowledge so tests can substitute synthetic tables.
pub trait LanguageLookup {
    fn contains(&self, code: &str) -> bool;
    fn label(&self, code: &str) -> Option<&str>;
}

pub struct TableLanguageLookup {
    entries: HashMap<String, String>,
}

impl TableLanguageLookup {
    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(code, label)| (code.to_ascii_lowercase(), label.to_string()))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_entries(&[
            ("ar", "Arabic"),
            ("cs", "Czech"),
            ("da", "Danish"),
            ("de", "German"),
            ("el", "Greek"),
            ("en", "English"),
            ("en-GB", "English (United Kingdom)"),
            ("en-US", "English (United States)"),
            ("es", "Spanish"),
            ("fi", "Finnish"),
            ("fr", "French"),
            ("fr-CA", "French (Canada)"),
            ("he", "Hebrew"),
            ("hi", "Hindi"),
            ("hu", "Hungarian"),
            ("id", "Indonesian"),
            ("it", "Italian"),
            ("ja", "Japanese"),
            ("ko", "Korean"),
            ("nb", "Norwegian Bokmål"),
            ("nl", "Dutch"),
            ("pl", "Polish"),
            ("pt", "Portuguese"),
            ("pt-BR", "Portuguese (Brazil)"),
            ("ro", "Romanian"),
            ("ru", "Russian"),
            ("sk", "Slovak"),
            ("sv", "Swedish"),
            ("th", "Thai"),
            ("tr", "Turkish"),
            ("uk", "Ukrainian"),
            ("vi", "Vietnamese"),
            ("zh", "Chinese"),
            ("zh-CN", "Chinese (Simplified)"),
            ("zh-TW", "Chinese (Traditional)"),
        ])
    }
}

impl LanguageLookup for TableLanguageLookup {
    fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(&code.to_ascii_lowercase())
    }

    fn label(&self, code: &str) -> Option<&str> {
        self.entries
            .get(&code.to_ascii_lowercase())
            .map(|label| label.as_str())
    }
}
