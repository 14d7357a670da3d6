//! Line-oriented text format used by [`super::FileStorage`].
//!
//! ```text
//! # window geometry
//! width=1024
//! title="Main \"editor\" window"   # shown in the title bar
//! maximized=false
//! scale=1.25
//! ```
//!
//! One `name=value` record per line, optionally followed by a `# comment`.
//! Lines without `=` are comment text; they belong to the setting that
//! follows them, and whatever comment text follows the last setting is kept
//! as a trailing block.  Records keep their on-disk order, so loading and
//! saving an unmodified document reproduces the same bytes.
//!
//! Value encoding by type:
//!
//! | Type                 | On disk                                           |
//! |----------------------|---------------------------------------------------|
//! | string / variant     | double-quoted; `\\`, `\n`, `\r` and `\"` escaped |
//! | bool                 | `true` / `false`                                  |
//! | signed / unsigned / float | the number, unquoted                         |

use crate::domain::name::normalize;
use crate::domain::type_tag::TypeTag;
use crate::domain::value::{escape, parse_bool, unquote};

/// One setting line plus the comment text attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Name as written on disk (lookups are case-insensitive).
    pub name: String,
    /// Decoded value.
    pub value: String,
    pub type_tag: TypeTag,
    /// Comment lines (verbatim, blank lines included) preceding the setting.
    pub comment_lines: Vec<String>,
    /// Comment after the value on the same line, starting with `#`.
    pub inline_comment: String,
    /// The value was an unquoted word on disk and is written back unquoted
    /// while it stays one.
    pub bare: bool,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            type_tag,
            comment_lines: Vec::new(),
            inline_comment: String::new(),
            bare: false,
        }
    }
}

/// A parsed settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Settings in on-disk order.
    pub records: Vec<FileRecord>,
    /// Comment lines after the last setting.
    pub trailing: Vec<String>,
}

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Setting(FileRecord),
    Comment(String),
}

impl Document {
    /// Parses a whole file.
    ///
    /// When a name occurs twice the later line wins; it replaces the earlier
    /// record in place and its preceding comment lines move on to the next
    /// setting.
    pub fn parse(text: &str) -> Self {
        let mut doc = Document::default();
        let mut pending: Vec<String> = Vec::new();

        for raw in text.lines() {
            match parse_line(raw) {
                Line::Comment(comment) => pending.push(comment),
                Line::Setting(mut record) => {
                    let existing = doc
                        .records
                        .iter()
                        .position(|r| normalize(&r.name) == normalize(&record.name));
                    match existing {
                        Some(pos) => {
                            let earlier = &mut doc.records[pos];
                            earlier.value = record.value;
                            earlier.type_tag = record.type_tag;
                            earlier.inline_comment = record.inline_comment;
                            earlier.bare = record.bare;
                        }
                        None => {
                            record.comment_lines = std::mem::take(&mut pending);
                            doc.records.push(record);
                        }
                    }
                }
            }
        }

        doc.trailing = pending;
        doc
    }

    /// Renders the document back to text, one line per record or comment
    /// line, each terminated by `\n`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            for comment in &record.comment_lines {
                out.push_str(comment);
                out.push('\n');
            }
            out.push_str(&record.name);
            out.push('=');
            out.push_str(&render_value(record));
            if !record.inline_comment.is_empty() {
                out.push(' ');
                out.push_str(&record.inline_comment);
            }
            out.push('\n');
        }
        for comment in &self.trailing {
            out.push_str(comment);
            out.push('\n');
        }
        out
    }
}

/// Parses one line of a settings file.
pub fn parse_line(line: &str) -> Line {
    let (content, comment) = split_comment(line);
    let Some((name, raw_value)) = content.split_once('=') else {
        return Line::Comment(line.to_string());
    };
    let name = name.trim();
    if name.is_empty() {
        return Line::Comment(line.to_string());
    }

    let raw_value = raw_value.trim();
    let (value, type_tag, bare) = match unquote(raw_value) {
        Some(text) => (text, TypeTag::String, false),
        None => {
            let type_tag = infer_type(raw_value);
            (raw_value.to_string(), type_tag, true)
        }
    };

    let mut record = FileRecord::new(name, value, type_tag);
    record.inline_comment = comment.to_string();
    record.bare = bare;
    Line::Setting(record)
}

/// Splits a line into its content and a trailing `#` comment.
///
/// The line is scanned from its end; the scan stops at the first unescaped
/// `"`, so a `#` inside a quoted value is never taken for a comment.  The
/// returned comment starts with `#` and is empty when there is none.
pub fn split_comment(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut cut = None;
    let mut i = bytes.len();
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b'#' => cut = Some(i),
            b'"' if !is_escaped(bytes, i) => break,
            _ => {}
        }
    }
    match cut {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    }
}

/// An odd run of backslashes right before `pos` escapes the byte at `pos`.
fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let backslashes = bytes[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    backslashes % 2 == 1
}

/// Infers the type of an unquoted value.
pub fn infer_type(value: &str) -> TypeTag {
    let inferred = match value {
        "true" | "false" => return TypeTag::Bool,
        v if v.starts_with('-') => TypeTag::Signed,
        v if v.starts_with(|c: char| c.is_ascii_digit()) => TypeTag::Unsigned,
        // Anything else is a string; enum labels land here too.
        _ => return TypeTag::String,
    };
    if value.contains('.') {
        TypeTag::Float
    } else {
        inferred
    }
}

/// Encodes the value of `record` for writing.
///
/// Values are only written unquoted when they read back as the same type;
/// anything else falls back to a quoted string so a line can never be
/// corrupted by its value.
pub fn render_value(record: &FileRecord) -> String {
    let value = record.value.as_str();
    match record.type_tag.storage_kind() {
        TypeTag::Bool => match parse_bool(value) {
            Some(true) => "true".to_string(),
            Some(false) => "false".to_string(),
            None => quote(value),
        },
        kind if kind.is_numeric() => {
            if is_plain_number(value) {
                value.to_string()
            } else {
                quote(value)
            }
        }
        _ if record.bare && is_bare_word(value) => value.to_string(),
        _ => quote(value),
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

fn is_plain_number(value: &str) -> bool {
    !value.is_empty()
        && infer_type(value).is_numeric()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\\'))
}

fn is_bare_word(value: &str) -> bool {
    infer_type(value) == TypeTag::String
        && !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(line: &str) -> FileRecord {
        match parse_line(line) {
            Line::Setting(record) => record,
            Line::Comment(c) => panic!("expected a setting, got comment {c:?}"),
        }
    }

    // ── split_comment ─────────────────────────────────────────────────────────

    #[test]
    fn test_split_comment_strips_trailing_comment() {
        assert_eq!(split_comment("x=5 # five"), ("x=5 ", "# five"));
    }

    #[test]
    fn test_split_comment_ignores_hash_inside_quotes() {
        assert_eq!(
            split_comment(r#"y="hi # not a comment""#),
            (r#"y="hi # not a comment""#, "")
        );
    }

    #[test]
    fn test_split_comment_after_quoted_value() {
        assert_eq!(
            split_comment(r#"y="a#b" # real"#),
            (r#"y="a#b" "#, "# real")
        );
    }

    #[test]
    fn test_split_comment_skips_escaped_quote() {
        assert_eq!(split_comment(r#"x=1 # a \" b"#), ("x=1 ", r#"# a \" b"#));
    }

    #[test]
    fn test_split_comment_takes_first_hash_of_comment() {
        assert_eq!(split_comment("x=1 # a # b"), ("x=1 ", "# a # b"));
    }

    // ── parse_line ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_line_infers_types() {
        assert_eq!(setting("a=5").type_tag, TypeTag::Unsigned);
        assert_eq!(setting("a=-5").type_tag, TypeTag::Signed);
        assert_eq!(setting("a=2.5").type_tag, TypeTag::Float);
        assert_eq!(setting("a=-0.5").type_tag, TypeTag::Float);
        assert_eq!(setting("a=true").type_tag, TypeTag::Bool);
        assert_eq!(setting("a=false").type_tag, TypeTag::Bool);
        assert_eq!(setting("a=red").type_tag, TypeTag::String);
        assert_eq!(setting(r#"a="5""#).type_tag, TypeTag::String);
    }

    #[test]
    fn test_parse_line_splits_on_first_equals_and_trims() {
        let record = setting("  url = http://x/?a=b  ");
        assert_eq!(record.name, "url");
        assert_eq!(record.value, "http://x/?a=b");
        assert!(record.bare);
    }

    #[test]
    fn test_parse_line_unescapes_quoted_value() {
        let record = setting(r#"msg="line\nnext \"q\" \\""#);
        assert_eq!(record.value, "line\nnext \"q\" \\");
        assert!(!record.bare);
    }

    #[test]
    fn test_parse_line_keeps_inline_comment() {
        let record = setting("port=8080   # listen port");
        assert_eq!(record.value, "8080");
        assert_eq!(record.inline_comment, "# listen port");
    }

    #[test]
    fn test_lines_without_equals_are_comments() {
        assert_eq!(parse_line("# header"), Line::Comment("# header".to_string()));
        assert_eq!(parse_line(""), Line::Comment(String::new()));
        assert_eq!(parse_line("=orphan"), Line::Comment("=orphan".to_string()));
        assert_eq!(
            parse_line("# a=b in a comment"),
            Line::Comment("# a=b in a comment".to_string())
        );
    }

    #[test]
    fn test_empty_quoted_string_is_a_string() {
        let record = setting(r#"name="""#);
        assert_eq!(record.value, "");
        assert_eq!(record.type_tag, TypeTag::String);
    }

    // ── Document ──────────────────────────────────────────────────────────────

    #[test]
    fn test_document_attaches_comments_to_next_setting() {
        // Arrange
        let text = "# first\n\n# second\nx=1\ny=2 # inline\n# tail\n";

        // Act
        let doc = Document::parse(text);

        // Assert
        assert_eq!(doc.records.len(), 2);
        assert_eq!(doc.records[0].comment_lines, vec!["# first", "", "# second"]);
        assert!(doc.records[1].comment_lines.is_empty());
        assert_eq!(doc.records[1].inline_comment, "# inline");
        assert_eq!(doc.trailing, vec!["# tail"]);
    }

    #[test]
    fn test_document_renders_canonical_text_unchanged() {
        let text = "# header\nwidth=1024\ntitle=\"Main \\\"editor\\\"\" # bar\nmode=fast\n\n# tail\n";
        let doc = Document::parse(text);
        assert_eq!(doc.render(), text);
    }

    #[test]
    fn test_document_duplicate_name_replaces_in_place() {
        let doc = Document::parse("a=1\nb=2\n# moved\nA=3\nc=4\n");
        let names: Vec<_> = doc.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(doc.records[0].value, "3");
        assert_eq!(doc.records[2].comment_lines, vec!["# moved"]);
    }

    #[test]
    fn test_document_duplicate_detection_folds_non_ascii_case() {
        let doc = Document::parse("Ärger=1\närger=2\n");
        assert_eq!(doc.records.len(), 1);
        assert_eq!(doc.records[0].name, "Ärger");
        assert_eq!(doc.records[0].value, "2");
    }

    #[test]
    fn test_document_without_settings_keeps_comments() {
        let doc = Document::parse("# only\n# comments\n");
        assert!(doc.records.is_empty());
        assert_eq!(doc.render(), "# only\n# comments\n");
    }

    // ── render_value ──────────────────────────────────────────────────────────

    #[test]
    fn test_render_value_by_type() {
        assert_eq!(render_value(&FileRecord::new("a", "hi", TypeTag::String)), "\"hi\"");
        assert_eq!(render_value(&FileRecord::new("a", "hi", TypeTag::Variant)), "\"hi\"");
        assert_eq!(render_value(&FileRecord::new("a", "1", TypeTag::Bool)), "true");
        assert_eq!(render_value(&FileRecord::new("a", "false", TypeTag::Bool)), "false");
        assert_eq!(render_value(&FileRecord::new("a", "-3", TypeTag::Signed)), "-3");
        assert_eq!(render_value(&FileRecord::new("a", "1.5", TypeTag::Float)), "1.5");
        assert_eq!(
            render_value(&FileRecord::new("a", "red", TypeTag::enumeration("color"))),
            "\"red\""
        );
    }

    #[test]
    fn test_render_value_quotes_values_that_would_not_read_back() {
        assert_eq!(
            render_value(&FileRecord::new("a", "not a number", TypeTag::Unsigned)),
            "\"not a number\""
        );
        assert_eq!(render_value(&FileRecord::new("a", "maybe", TypeTag::Bool)), "\"maybe\"");
    }

    #[test]
    fn test_render_value_keeps_bare_words_bare() {
        let mut record = FileRecord::new("mode", "fast", TypeTag::String);
        record.bare = true;
        assert_eq!(render_value(&record), "fast");

        record.value = "two words".to_string();
        assert_eq!(render_value(&record), "\"two words\"");
    }
}
