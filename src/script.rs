use crate::error::{ShortreelError, ShortreelResult};

/// One heading/body pair in reading order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// One video's worth of source material. Constructed once per record,
/// immutable thereafter.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentBlock {
    pub title: String,
    pub sections: Vec<Section>,
    pub image_ref: Option<String>,
    pub audio_hint: Option<String>,
    pub output_id: Option<String>,
    pub short_title: Option<String>,
}

const MARKER_CHARS: [char; 5] = ['=', '-', '*', '#', '~'];

const KEY_TITLE: &str = "TITLE:";
const KEY_IMAGE: &str = "IMAGE:";
const KEY_OUTPUT: &str = "OUTPUT_FILENAME:";
const KEY_SHORT_TITLE: &str = "YOUTUBE_SHORT_TITLE:";
const KEY_BG_MUSIC: &str = "BG_MUSIC:";

#[derive(Debug, Default)]
struct RawHeader {
    title: String,
    image: String,
    output: String,
    short_title: String,
    bg_music: String,
}

/// Ordered field extractors tried in priority order; the first key prefix
/// that matches wins the line.
const FIELD_EXTRACTORS: [(&str, fn(&mut RawHeader, &str)); 5] = [
    (KEY_TITLE, |h, v| h.title = v.to_string()),
    (KEY_IMAGE, |h, v| h.image = v.to_string()),
    (KEY_OUTPUT, |h, v| h.output = v.to_string()),
    (KEY_SHORT_TITLE, |h, v| h.short_title = v.to_string()),
    (KEY_BG_MUSIC, |h, v| h.bg_music = v.to_string()),
];

fn marker_run(line: &str) -> Option<usize> {
    let line = line.trim();
    let mut chars = line.chars();
    let first = chars.next()?;
    if !MARKER_CHARS.contains(&first) {
        return None;
    }
    if chars.any(|c| c != first) {
        return None;
    }
    Some(line.chars().count())
}

/// A line of six-or-more repeated marker characters ends one block and
/// starts the next.
fn is_block_separator(line: &str) -> bool {
    marker_run(line).is_some_and(|n| n >= 6)
}

/// A short marker run inside a block closes the header area.
fn is_closing_marker(line: &str) -> bool {
    marker_run(line).is_some_and(|n| (3..6).contains(&n))
}

fn try_extract_header(header: &mut RawHeader, line: &str) -> bool {
    for (key, apply) in FIELD_EXTRACTORS {
        if let Some(rest) = line.strip_prefix(key) {
            apply(header, rest.trim());
            return true;
        }
    }
    false
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Parse a whole script document into blocks. Per-block failures (a missing
/// TITLE) are reported in place so one bad record never hides its siblings;
/// empty segments between separators are skipped silently.
pub fn parse_document(text: &str) -> Vec<ShortreelResult<ContentBlock>> {
    let mut segments: Vec<Vec<&str>> = vec![Vec::new()];
    for line in text.lines() {
        if is_block_separator(line) {
            segments.push(Vec::new());
        } else if let Some(seg) = segments.last_mut() {
            seg.push(line);
        }
    }

    let mut out = Vec::new();
    for seg in segments {
        match parse_block(&seg) {
            Ok(None) => {}
            Ok(Some(block)) => out.push(Ok(block)),
            Err(e) => out.push(Err(e)),
        }
    }
    out
}

fn parse_block(lines: &[&str]) -> ShortreelResult<Option<ContentBlock>> {
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Ok(None);
    }

    let mut header = RawHeader::default();
    let mut body_start = lines.len();
    let mut in_header = true;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_header {
            if trimmed.is_empty() {
                continue;
            }
            if is_closing_marker(trimmed) {
                body_start = idx + 1;
                in_header = false;
                continue;
            }
            if try_extract_header(&mut header, trimmed) {
                continue;
            }
            // First unrecognized non-blank line starts the body.
            body_start = idx;
            in_header = false;
        }
    }

    if header.title.is_empty() {
        return Err(ShortreelError::missing_field(
            "TITLE header is required for every block",
        ));
    }

    let sections = parse_sections(&lines[body_start.min(lines.len())..]);

    Ok(Some(ContentBlock {
        title: header.title,
        sections,
        image_ref: non_empty(header.image),
        audio_hint: non_empty(header.bg_music),
        output_id: non_empty(header.output),
        short_title: non_empty(header.short_title),
    }))
}

/// Body lines become sections at blank-line or heading-pattern boundaries.
fn parse_sections(lines: &[&str]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if let Some(sec) = current.take() {
                sections.push(sec);
            }
            continue;
        }

        if let Some((heading, inline)) = split_heading(trimmed) {
            if let Some(sec) = current.take() {
                sections.push(sec);
            }
            current = Some(Section {
                heading: heading.to_string(),
                body: inline.to_string(),
            });
            continue;
        }

        match &mut current {
            Some(sec) => {
                if !sec.body.is_empty() {
                    sec.body.push('\n');
                }
                sec.body.push_str(trimmed);
            }
            None => {
                current = Some(Section {
                    heading: String::new(),
                    body: trimmed.to_string(),
                });
            }
        }
    }

    if let Some(sec) = current.take() {
        sections.push(sec);
    }
    sections
}

/// Recognize `Heading:` lines (and the inline `Heading: body` form, where the
/// heading is short and free of sentence punctuation).
fn split_heading(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once(':')?;
    let head = head.trim();
    if head.is_empty() || head.len() > 40 || head.contains('.') {
        return None;
    }
    if head.split_whitespace().count() > 4 {
        return None;
    }
    Some((head, rest.trim()))
}

#[derive(Debug, serde::Deserialize)]
struct RawRecord {
    #[serde(rename = "TITLE", default)]
    title: String,
    #[serde(rename = "IMAGE", default)]
    image: String,
    #[serde(rename = "OUTPUT_FILENAME", default)]
    output: String,
    #[serde(rename = "YOUTUBE_SHORT_TITLE", default)]
    short_title: String,
    #[serde(rename = "BG_MUSIC", default)]
    bg_music: String,
    #[serde(default)]
    content: serde_json::Map<String, serde_json::Value>,
}

/// Parse the JSON input form: either a bare array of records, or an object
/// whose first array member holds the records. The `content` object's key
/// order is the reading order.
pub fn parse_json(text: &str) -> ShortreelResult<Vec<ShortreelResult<ContentBlock>>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ShortreelError::Other(anyhow::anyhow!("parse script JSON: {e}")))?;

    let records = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                serde_json::Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                ShortreelError::Other(anyhow::anyhow!(
                    "script JSON object contains no record array"
                ))
            })?,
        _ => {
            return Err(ShortreelError::Other(anyhow::anyhow!(
                "script JSON must be an array or an object holding one"
            )));
        }
    };

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        out.push(block_from_json(record));
    }
    Ok(out)
}

fn block_from_json(record: serde_json::Value) -> ShortreelResult<ContentBlock> {
    let raw: RawRecord = serde_json::from_value(record)
        .map_err(|e| ShortreelError::Other(anyhow::anyhow!("parse script record: {e}")))?;

    if raw.title.is_empty() {
        return Err(ShortreelError::missing_field(
            "TITLE is required for every record",
        ));
    }

    let sections = raw
        .content
        .into_iter()
        .map(|(heading, body)| Section {
            heading,
            body: match body {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        })
        .collect();

    Ok(ContentBlock {
        title: raw.title,
        sections,
        image_ref: non_empty(raw.image),
        audio_hint: non_empty(raw.bg_music),
        output_id: non_empty(raw.output),
        short_title: non_empty(raw.short_title),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
TITLE: Mesh (Aries)
IMAGE: mesh.jpg
OUTPUT_FILENAME: mesh.mp4
YOUTUBE_SHORT_TITLE: Mesh today
---
Love:
A calm day for the heart.

Career:
Push the big task first.
Then rest.
==========
TITLE: Vrushabh (Taurus)
Money: Savings grow slowly.
";

    #[test]
    fn parses_headers_and_sections() {
        let blocks = parse_document(DOC);
        assert_eq!(blocks.len(), 2);

        let b0 = blocks[0].as_ref().unwrap();
        assert_eq!(b0.title, "Mesh (Aries)");
        assert_eq!(b0.image_ref.as_deref(), Some("mesh.jpg"));
        assert_eq!(b0.output_id.as_deref(), Some("mesh.mp4"));
        assert_eq!(b0.short_title.as_deref(), Some("Mesh today"));
        assert_eq!(b0.audio_hint, None);
        assert_eq!(b0.sections.len(), 2);
        assert_eq!(b0.sections[0].heading, "Love");
        assert_eq!(b0.sections[0].body, "A calm day for the heart.");
        assert_eq!(b0.sections[1].heading, "Career");
        assert_eq!(b0.sections[1].body, "Push the big task first.\nThen rest.");

        let b1 = blocks[1].as_ref().unwrap();
        assert_eq!(b1.title, "Vrushabh (Taurus)");
        assert_eq!(b1.sections.len(), 1);
        assert_eq!(b1.sections[0].heading, "Money");
        assert_eq!(b1.sections[0].body, "Savings grow slowly.");
    }

    #[test]
    fn missing_title_fails_that_block_only() {
        let doc = "IMAGE: a.jpg\nLove: ok\n======\nTITLE: B\nLuck: fine\n";
        let blocks = parse_document(doc);
        assert_eq!(blocks.len(), 2);
        assert!(matches!(
            blocks[0],
            Err(ShortreelError::MissingRequiredField(_))
        ));
        assert_eq!(blocks[1].as_ref().unwrap().title, "B");
    }

    #[test]
    fn empty_segments_are_skipped() {
        let doc = "======\n\n======\nTITLE: Only\n======\n   \n";
        let blocks = parse_document(doc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_ref().unwrap().title, "Only");
    }

    #[test]
    fn body_without_heading_becomes_untitled_section() {
        let doc = "TITLE: T\nJust a plain paragraph of body text\nwith two lines.\n";
        let blocks = parse_document(doc);
        let b = blocks[0].as_ref().unwrap();
        assert_eq!(b.sections.len(), 1);
        assert_eq!(b.sections[0].heading, "");
        assert!(b.sections[0].body.starts_with("Just a plain"));
    }

    #[test]
    fn long_or_sentence_lines_are_not_headings() {
        assert!(split_heading("This is clearly a sentence. With: a colon").is_none());
        assert!(split_heading("One two three four five six: x").is_none());
        assert_eq!(split_heading("Love: warm"), Some(("Love", "warm")));
        assert_eq!(split_heading("Career:"), Some(("Career", "")));
    }

    #[test]
    fn json_records_preserve_section_order() {
        let json = r#"{
            "date": "2026-08-25",
            "rashifal": [
                {
                    "TITLE": "Mesh (Aries)",
                    "IMAGE": "mesh.jpg",
                    "OUTPUT_FILENAME": "mesh.mp4",
                    "content": { "Zeal": "high", "Money": "steady", "Advice": "slow down" }
                },
                { "IMAGE": "no-title.jpg" }
            ]
        }"#;

        let blocks = parse_json(json).unwrap();
        assert_eq!(blocks.len(), 2);

        let b0 = blocks[0].as_ref().unwrap();
        let headings: Vec<&str> = b0.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, ["Zeal", "Money", "Advice"]);

        assert!(matches!(
            blocks[1],
            Err(ShortreelError::MissingRequiredField(_))
        ));
    }
}
