use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("第[零一二三四五六七八九十百千万0-9]+[章节回]").expect("chapter heading pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub name: String,
    pub content: String,
    /// Character count of `content`.
    pub word_count: usize,
}

impl Chapter {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            word_count: content.chars().count(),
            content,
        }
    }
}

/// Splits a document into chapters at every `第…章/节/回` heading.
///
/// Each chapter runs from its heading up to the next one and is trimmed of
/// surrounding whitespace. A document without headings becomes a single
/// untrimmed chapter called `fallback`.
pub fn segment(text: &str, fallback: &str) -> Vec<Chapter> {
    let headings = HEADING.find_iter(text).collect::<Vec<_>>();

    if headings.is_empty() {
        return vec![Chapter::new(fallback, text)];
    }

    headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            let end = headings.get(i + 1).map_or(text.len(), |next| next.start());
            Chapter::new(heading.as_str(), text[heading.start()..end].trim())
        })
        .collect()
}

/// Display name for a picked file: its file name without the final extension.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
