//! The line store: the transcript with its page furniture removed.
//!
//! Raw run transcripts are page-oriented; headers, footers, blank lines
//! and page breaks carry no data and are stripped once, up front. Each
//! surviving line keeps its original 1-based position for diagnostics.

/// One kept transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    /// 1-based position in the raw transcript.
    pub number: usize,
    pub text: String,
}

/// Immutable ordered sequence of data-bearing lines.
#[derive(Debug, Default)]
pub struct LineStore {
    lines: Vec<LineRecord>,
}

/// Substring every page header carries.
const PAGE_HEADER: &str = "TUNNEL VENTILATION SIMULATION";

fn is_footer(line: &str) -> bool {
    let t = line.trim();
    match t.strip_prefix("PAGE") {
        Some(rest) => {
            let rest = rest.trim();
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn is_page_furniture(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('\u{c}')
        || line.contains(PAGE_HEADER)
        || is_footer(line)
}

impl LineStore {
    /// Build a store from raw transcript text, stripping non-data lines.
    pub fn from_text(raw: &str) -> Self {
        let lines = raw
            .lines()
            .enumerate()
            .filter(|(_, text)| !is_page_furniture(text))
            .map(|(i, text)| LineRecord {
                number: i + 1,
                text: text.to_string(),
            })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LineRecord> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineRecord> {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_furniture_keeps_numbers() {
        let raw = "\u{c}  TUNNEL VENTILATION SIMULATION  RUN 7\n\
                   \n\
                   DATA ONE\n\
                   DATA TWO\n\
                   \u{c}          PAGE  2\n\
                   DATA THREE\n";
        let store = LineStore::from_text(raw);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0).unwrap().number, 3);
        assert_eq!(store.get(0).unwrap().text, "DATA ONE");
        assert_eq!(store.get(2).unwrap().number, 6);
    }

    #[test]
    fn test_footer_detection() {
        assert!(is_footer("                         PAGE  14"));
        assert!(!is_footer("   PAGE LAYOUT DATA"));
        assert!(!is_footer("   SEGMENT   101"));
    }

    #[test]
    fn test_separator_lines_are_kept() {
        let raw = format!("A\n{}\nB\n", "-".repeat(100));
        let store = LineStore::from_text(&raw);
        assert_eq!(store.len(), 3);
    }
}
