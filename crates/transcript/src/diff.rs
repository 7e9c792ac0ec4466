//! Unified diff parsing.
//!
//! Splits multi-file diff text into per-file sections and counts added and
//! removed lines inside hunks. Header lines (`diff --git`, `index`, `---`,
//! `+++`, mode lines) never count. Also assigns old/new line numbers for
//! display.

/// One file section of a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    /// The section's raw text, headers included
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Header,
    Hunk,
    Context,
    Addition,
    Deletion,
    /// `\ No newline at end of file` and similar markers
    Meta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedLine {
    pub kind: DiffLineKind,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    /// Header line that also opens a new file section
    FileStart,
    Header,
    Hunk,
    Context,
    Addition,
    Deletion,
    Meta,
}

/// Classify each line, tracking whether we are inside a hunk.
///
/// A file section opens on `diff --git`, or on a `--- ` line directly
/// followed by `+++ ` when we are not already in a header block. Text with
/// no `@@` markers at all is treated as one bare hunk.
fn classify(lines: &[&str]) -> Vec<LineClass> {
    let has_hunks = lines.iter().any(|l| l.starts_with("@@"));
    let mut in_hunk = !has_hunks;
    let mut in_header = false;
    let mut out = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let next_is_plus = lines.get(i + 1).is_some_and(|n| n.starts_with("+++ "));

        if line.starts_with("diff --git ") {
            in_hunk = !has_hunks;
            in_header = true;
            out.push(LineClass::FileStart);
            continue;
        }
        if line.starts_with("--- ") && next_is_plus {
            in_hunk = !has_hunks;
            out.push(if in_header {
                LineClass::Header
            } else {
                LineClass::FileStart
            });
            in_header = true;
            continue;
        }
        if line.starts_with("@@") {
            in_hunk = true;
            in_header = false;
            out.push(LineClass::Hunk);
            continue;
        }

        let class = if !in_hunk || (!has_hunks && line.starts_with("+++ ")) {
            LineClass::Header
        } else {
            in_header = false;
            match line.as_bytes().first() {
                Some(b'+') => LineClass::Addition,
                Some(b'-') => LineClass::Deletion,
                Some(b'\\') => LineClass::Meta,
                _ => LineClass::Context,
            }
        };
        out.push(class);
    }
    out
}

fn strip_prefix_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.split('\t').next().unwrap_or(raw);
    if raw == "/dev/null" || raw.is_empty() {
        return None;
    }
    Some(raw.strip_prefix(prefix).unwrap_or(raw).to_string())
}

#[derive(Default)]
struct Section {
    new_path: Option<String>,
    old_path: Option<String>,
    git_path: Option<String>,
    additions: usize,
    deletions: usize,
    raw: String,
}

impl Section {
    fn finish(self) -> Option<FileDiff> {
        let path = self.new_path.or(self.old_path).or(self.git_path)?;
        Some(FileDiff {
            path,
            additions: self.additions,
            deletions: self.deletions,
            raw: self.raw,
        })
    }
}

/// Parse multi-file unified diff text, preserving file order.
///
/// Sections with no recoverable path are dropped.
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let lines: Vec<&str> = text.lines().collect();
    let classes = classify(&lines);

    let mut files = Vec::new();
    let mut current: Option<Section> = None;

    for (line, class) in lines.iter().zip(classes) {
        if class == LineClass::FileStart {
            if let Some(section) = current.take().and_then(Section::finish) {
                files.push(section);
            }
        }
        let section = current.get_or_insert_with(Section::default);
        section.raw.push_str(line);
        section.raw.push('\n');

        match class {
            LineClass::FileStart | LineClass::Header => {
                if let Some(rest) = line.strip_prefix("diff --git ") {
                    section.git_path = rest
                        .rsplit_once(" b/")
                        .map(|(_, b)| b.to_string())
                        .or_else(|| rest.split_whitespace().last().map(str::to_string));
                } else if let Some(rest) = line.strip_prefix("--- ") {
                    section.old_path = strip_prefix_path(rest, "a/");
                } else if let Some(rest) = line.strip_prefix("+++ ") {
                    section.new_path = strip_prefix_path(rest, "b/");
                } else if let Some(rest) = line.strip_prefix("rename to ") {
                    section.new_path = Some(rest.trim().to_string());
                }
            }
            LineClass::Addition => section.additions += 1,
            LineClass::Deletion => section.deletions += 1,
            _ => {}
        }
    }

    if let Some(section) = current.and_then(Section::finish) {
        files.push(section);
    }
    files
}

/// Count `(additions, deletions)` across all of `text`.
///
/// Works on full multi-file diffs, bare hunks, and `+`/`-` prefixed text
/// with no hunk headers at all.
pub fn count_changes(text: &str) -> (usize, usize) {
    let lines: Vec<&str> = text.lines().collect();
    classify(&lines)
        .into_iter()
        .fold((0, 0), |(a, d), class| match class {
            LineClass::Addition => (a + 1, d),
            LineClass::Deletion => (a, d + 1),
            _ => (a, d),
        })
}

/// `@@ -a,b +c,d @@` -> `(a, c)`
fn hunk_starts(line: &str) -> Option<(u32, u32)> {
    let body = line.strip_prefix("@@")?.trim_start();
    let mut parts = body.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let start = |range: &str| range.split(',').next()?.parse::<u32>().ok();
    Some((start(old)?, start(new)?))
}

/// Number diff lines for display: context lines carry both numbers,
/// additions only the new one, deletions only the old one.
pub fn number_lines(text: &str) -> Vec<NumberedLine> {
    let lines: Vec<&str> = text.lines().collect();
    let classes = classify(&lines);
    let (mut old, mut new) = (1u32, 1u32);

    lines
        .iter()
        .zip(classes)
        .map(|(line, class)| {
            let (kind, old_line, new_line) = match class {
                LineClass::Hunk => {
                    if let Some((o, n)) = hunk_starts(line) {
                        old = o;
                        new = n;
                    }
                    (DiffLineKind::Hunk, None, None)
                }
                LineClass::Context => {
                    let numbers = (Some(old), Some(new));
                    old = old.saturating_add(1);
                    new = new.saturating_add(1);
                    (DiffLineKind::Context, numbers.0, numbers.1)
                }
                LineClass::Addition => {
                    let number = new;
                    new = new.saturating_add(1);
                    (DiffLineKind::Addition, None, Some(number))
                }
                LineClass::Deletion => {
                    let number = old;
                    old = old.saturating_add(1);
                    (DiffLineKind::Deletion, Some(number), None)
                }
                LineClass::Meta => (DiffLineKind::Meta, None, None),
                LineClass::FileStart | LineClass::Header => (DiffLineKind::Header, None, None),
            };
            NumberedLine {
                kind,
                old_line,
                new_line,
                text: line.to_string(),
            }
        })
        .collect()
}

/// True when `text` looks like diff output rather than raw file content.
pub fn looks_like_diff(text: &str) -> bool {
    text.lines()
        .any(|l| l.starts_with("@@") || l.starts_with("diff --git ") || l.starts_with("+++ "))
}
