//! Metadata sniffing
//!
//! Collector output carries a small `meta` object next to the potentially huge
//! `data` array. Streaming writers emit it last, buffered writers first, so the
//! sniffer looks at the last [`SNIFF_WINDOW`] bytes, then at the first
//! [`SNIFF_WINDOW`] bytes, and pattern-matches the fields out of the raw text.
//! The document is never parsed here; the windows need not be valid JSON.

use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Bytes inspected at each end of the file
pub const SNIFF_WINDOW: u64 = 300;

static TYPE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"type.?:\s?"(\w*)""#).expect("valid type pattern"));
static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""count.?:\s?(\d+)"#).expect("valid count pattern"));
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""version.?:\s?(\d+)"#).expect("valid version pattern"));

/// Classification of a data file. `None` means the field could not be matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// Entity kind tag, e.g. `users` or `azure`
    pub kind: Option<String>,
    /// Record count declared by the collector; informational only
    pub count: Option<u64>,
    pub version: Option<u32>,
}

impl Meta {
    /// Both the kind and the count were found
    pub fn is_usable(&self) -> bool {
        self.kind.is_some() && self.count.is_some()
    }

    pub fn kind_or_unknown(&self) -> &str {
        self.kind.as_deref().unwrap_or("unknown")
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={}", self.kind_or_unknown())?;
        match self.count {
            Some(count) => write!(f, " count={}", count)?,
            None => write!(f, " count=unknown")?,
        }
        match self.version {
            Some(version) => write!(f, " version={}", version),
            None => write!(f, " version=unknown"),
        }
    }
}

/// Which end of the file a window was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Head,
    Tail,
}

/// Classify the file at `path` from its tail window, falling back to its head
///
/// Never fails: unreadable files produce an all-unknown [`Meta`].
pub fn sniff(path: &Path) -> Meta {
    match sniff_file(path) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read metadata window");
            Meta::default()
        },
    }
}

fn sniff_file(path: &Path) -> std::io::Result<Meta> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let tail_start = size.saturating_sub(SNIFF_WINDOW);
    let tail = read_window(&mut file, tail_start, SNIFF_WINDOW)?;
    let meta = parse_window(&tail, Window::Tail);
    if meta.is_usable() {
        debug!(path = %path.display(), %meta, "Metadata found in tail window");
        return Ok(meta);
    }

    let head = read_window(&mut file, 0, SNIFF_WINDOW)?;
    let meta = parse_window(&head, Window::Head);
    debug!(path = %path.display(), %meta, "Metadata taken from head window");
    Ok(meta)
}

fn read_window(file: &mut File, start: u64, len: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn parse_window(bytes: &[u8], window: Window) -> Meta {
    // A window can start or end in the middle of a multi-byte character
    let text = String::from_utf8_lossy(bytes);

    Meta {
        kind: capture(&TYPE_PATTERN, &text, window).map(str::to_string),
        count: capture(&COUNT_PATTERN, &text, window).and_then(|c| c.parse().ok()),
        version: capture(&VERSION_PATTERN, &text, window).and_then(|v| v.parse().ok()),
    }
}

// `meta` closes the tail window and opens the head window, so the match
// nearest to that end wins.
fn capture<'t>(pattern: &Regex, text: &'t str, window: Window) -> Option<&'t str> {
    let mut matches = pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));
    match window {
        Window::Head => matches.next(),
        Window::Tail => matches.last(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn padding(records: usize) -> String {
        let record = r#"{"ObjectIdentifier":"S-1-5-21-1000","Properties":{"name":"PADDING"}}"#;
        vec![record; records].join(",")
    }

    #[test]
    fn test_meta_at_end_is_read_from_tail() {
        let doc = format!(
            r#"{{"data":[{}],"meta":{{"methods":0,"type":"users","count":12,"version":5}}}}"#,
            padding(20)
        );
        let file = write_temp(&doc);

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("users"));
        assert_eq!(meta.count, Some(12));
        assert_eq!(meta.version, Some(5));
    }

    #[test]
    fn test_meta_at_start_falls_back_to_head() {
        let doc = format!(
            r#"{{"meta":{{"type":"computers","count":3,"version":4}},"data":[{}]}}"#,
            padding(20)
        );
        let file = write_temp(&doc);

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("computers"));
        assert_eq!(meta.count, Some(3));
        assert_eq!(meta.version, Some(4));
    }

    #[test]
    fn test_head_fallback_keeps_unmatched_fields_unknown() {
        let doc = format!(r#"{{"meta":{{"type":"groups"}},"data":[{}]}}"#, padding(20));
        let file = write_temp(&doc);

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("groups"));
        assert_eq!(meta.count, None);
        assert_eq!(meta.version, None);
    }

    #[test]
    fn test_tail_pair_wins_over_head() {
        // Head carries a different type; the tail pair must short-circuit
        let doc = format!(
            r#"{{"meta":{{"type":"groups","count":1}},"data":[{}],"meta2":{{"type":"users","count":7}}}}"#,
            padding(20)
        );
        let file = write_temp(&doc);

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("users"));
        assert_eq!(meta.count, Some(7));
    }

    #[test]
    fn test_small_file_uses_whole_file() {
        let file = write_temp(r#"{"data":[],"meta":{"type":"domains","count":0}}"#);

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("domains"));
        assert_eq!(meta.count, Some(0));
    }

    #[test]
    fn test_missing_file_is_unknown() {
        let meta = sniff(Path::new("/definitely/not/here.json"));
        assert_eq!(meta, Meta::default());
        assert_eq!(meta.to_string(), "type=unknown count=unknown version=unknown");
    }

    #[test]
    fn test_window_cut_inside_multibyte_character() {
        let mut bytes = "é".repeat(400).into_bytes();
        bytes.extend_from_slice(br#"],"meta":{"type":"ous","count":2}}"#);
        // Drop one byte so the tail window starts mid-character
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes[1..]).unwrap();

        let meta = sniff(file.path());
        assert_eq!(meta.kind.as_deref(), Some("ous"));
        assert_eq!(meta.count, Some(2));
    }
}
