use std::sync::LazyLock;

use regex::Regex;

use crate::track::Track;

static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{(.+?)\}").ok());

const NEW_LINE: &str = "new_line";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder {
        /// Original text including braces, written back when unmatched
        token: String,
        key: String,
        max_len: Option<usize>,
    },
}

/// Parsed `{field[:maxLength]}` template.
///
/// Parsing happens once per template string; rendering only walks the
/// cached segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            segments: parse(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lowercased field identifiers referenced by the template
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { key, .. } => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `track` fields.
    ///
    /// Without a track only `{new_line}` is expanded. Placeholders without a
    /// value are kept verbatim.
    pub fn render(&self, track: Option<&Track>) -> String {
        let mut output = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder { key, .. } if key == NEW_LINE => output.push('\n'),
                Segment::Placeholder {
                    token,
                    key,
                    max_len,
                } => match track.and_then(|track| track.get(key)) {
                    Some(value) => output.push_str(&truncate(value, *max_len)),
                    None => output.push_str(token),
                },
            }
        }
        output
    }
}

fn parse(source: &str) -> Vec<Segment> {
    let Some(regex) = PLACEHOLDER.as_ref() else {
        return vec![Segment::Literal(source.to_string())];
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for captures in regex.captures_iter(source) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(source[last..whole.start()].to_string()));
        }

        let inner = inner.as_str();
        let (key, max_len) = match inner.rsplit_once(':') {
            Some((key, len)) => match len.trim().parse::<usize>() {
                Ok(len) => (key, Some(len)),
                Err(_) => (inner, None),
            },
            None => (inner, None),
        };
        segments.push(Segment::Placeholder {
            token: whole.as_str().to_string(),
            key: key.trim().to_lowercase(),
            max_len,
        });
        last = whole.end();
    }
    if last < source.len() {
        segments.push(Segment::Literal(source[last..].to_string()));
    }
    segments
}

fn truncate(value: &str, max_len: Option<usize>) -> String {
    match max_len {
        Some(max) if max > 0 && value.chars().count() > max => {
            let mut cut: String = value.chars().take(max).collect();
            cut.push_str(ELLIPSIS);
            cut
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Field;

    fn foo_bar() -> Track {
        Track::builder()
            .field(Field::Title, "Foo")
            .field(Field::Artist, "Bar")
            .build()
    }

    #[test]
    fn test_basic_substitution() {
        let template = Template::new("{title} - {artist}");
        assert_eq!(template.render(Some(&foo_bar())), "Foo - Bar");
    }

    #[test]
    fn test_truncation() {
        let template = Template::new("{title:2}");
        assert_eq!(template.render(Some(&foo_bar())), "Fo...");

        let template = Template::new("{title:3}|{title:10}");
        assert_eq!(template.render(Some(&foo_bar())), "Foo|Foo");

        // Zero means no limit
        let template = Template::new("{title:0}");
        assert_eq!(template.render(Some(&foo_bar())), "Foo");
    }

    #[test]
    fn test_truncation_counts_chars() {
        let track = Track::builder().field(Field::Title, "日本語の曲").build();
        assert_eq!(
            Template::new("{title:3}").render(Some(&track)),
            "日本語..."
        );
    }

    #[test]
    fn test_case_insensitive_keys() {
        let template = Template::new("{TITLE} by {Artists}");
        assert_eq!(template.render(Some(&foo_bar())), "Foo by Bar");
    }

    #[test]
    fn test_unmatched_placeholder_is_verbatim() {
        let template = Template::new("{title} {lyrics} {weird:x}");
        assert_eq!(
            template.render(Some(&foo_bar())),
            "Foo {lyrics} {weird:x}"
        );
    }

    #[test]
    fn test_new_line() {
        let template = Template::new("{title}{new_line}{artist}");
        assert_eq!(template.render(Some(&foo_bar())), "Foo\nBar");

        let placeholder = Template::new("Nothing{new_line}playing {title}");
        assert_eq!(placeholder.render(None), "Nothing\nplaying {title}");
    }

    #[test]
    fn test_placeholders_are_cached() {
        let template = Template::new("{Title} - {artist:5}{new_line}");
        let keys: Vec<&str> = template.placeholders().collect();
        assert_eq!(keys, vec!["title", "artist", "new_line"]);
        assert_eq!(template.source(), "{Title} - {artist:5}{new_line}");
    }

    #[test]
    fn test_plain_text() {
        let template = Template::new("no placeholders here");
        assert_eq!(template.render(Some(&foo_bar())), "no placeholders here");
        assert_eq!(Template::new("").render(None), "");
    }
}
