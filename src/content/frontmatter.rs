//! Front-matter parsing

use indexmap::IndexMap;

use super::Value;

/// Delimiter line that opens and closes the metadata block
const DELIMITER: &str = "---";

/// Why a front-matter block could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatterError {
    /// 1-based line in the source text
    pub line: usize,
    pub message: String,
}

/// Metadata block parsed from the head of a content unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub metadata: IndexMap<String, Value>,
}

impl FrontMatter {
    /// Split `content` into metadata and body.
    ///
    /// Text that does not start with a `---` line has no front matter and is
    /// returned whole as the body.
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let (first, mut rest) = split_line(content);
        if first.trim_end() != DELIMITER {
            return Ok((FrontMatter::default(), content));
        }

        let block_start = content.len() - rest.len();
        let mut block_end = None;
        while !rest.is_empty() {
            let line_start = content.len() - rest.len();
            let (line, next) = split_line(rest);
            if line.trim_end() == DELIMITER {
                block_end = Some((line_start, next));
                break;
            }
            rest = next;
        }

        let Some((end, body)) = block_end else {
            return Err(FrontMatterError {
                line: 1,
                message: "opening `---` has no matching closing `---`".to_string(),
            });
        };

        let block = &content[block_start..end];
        let metadata = parse_block(block)?;
        Ok((FrontMatter { metadata }, body))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Parse the YAML between the delimiters into a mapping
fn parse_block(block: &str) -> Result<IndexMap<String, Value>, FrontMatterError> {
    if block.trim().is_empty() {
        return Ok(IndexMap::new());
    }

    check_top_level_keys(block)?;

    match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Map(map)) => Ok(map),
        Ok(Value::Null) => Ok(IndexMap::new()),
        Ok(_) => Err(FrontMatterError {
            line: 2,
            message: "front matter must be a list of `key: value` lines".to_string(),
        }),
        Err(e) => Err(FrontMatterError {
            // Block line 1 is source line 2
            line: e.location().map(|l| l.line() + 1).unwrap_or(2),
            message: e.to_string(),
        }),
    }
}

/// Reject lines at column zero that are neither `key:` lines nor comments,
/// and keys that appear twice.
fn check_top_level_keys(block: &str) -> Result<(), FrontMatterError> {
    let mut seen: Vec<&str> = Vec::new();
    for (i, line) in block.lines().enumerate() {
        let line_no = i + 2;
        if line.trim().is_empty() || line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.starts_with('#') || trimmed.starts_with("- ") || trimmed == "-" {
            continue;
        }
        let Some(key) = top_level_key(trimmed) else {
            return Err(FrontMatterError {
                line: line_no,
                message: format!("expected `key: value`, found `{}`", trimmed),
            });
        };
        if seen.contains(&key) {
            return Err(FrontMatterError {
                line: line_no,
                message: format!("duplicate key `{}`", key),
            });
        }
        seen.push(key);
    }
    Ok(())
}

/// The key of a `key: value` or `key:` line
fn top_level_key(line: &str) -> Option<&str> {
    let line = line.trim_end();
    let (key, after) = if let Some(quoted) = line.strip_prefix('"') {
        let close = quoted.find('"')?;
        (&quoted[..close], &quoted[close + 1..])
    } else if let Some(quoted) = line.strip_prefix('\'') {
        let close = quoted.find('\'')?;
        (&quoted[..close], &quoted[close + 1..])
    } else {
        let colon = line.find(':')?;
        (line[..colon].trim_end(), &line[colon..])
    };
    let after = after.strip_prefix(':')?;
    if key.is_empty() || !(after.is_empty() || after.starts_with(' ') || after.starts_with('\t')) {
        return None;
    }
    Some(key)
}

/// Split off the first line, returning it without its line ending
fn split_line(s: &str) -> (&str, &str) {
    match s.find('\n') {
        Some(pos) => (s[..pos].trim_end_matches('\r'), &s[pos + 1..]),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Hello World
date: 2024-01-15 10:30:00
tags:
  - rust
  - teaching
draft: false
weight: 3
---

This is the content.
"#;

        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.get("title"), Some(&Value::from("Hello World")));
        assert_eq!(fm.get("date"), Some(&Value::from("2024-01-15 10:30:00")));
        assert_eq!(
            fm.get("tags"),
            Some(&Value::from(vec!["rust".to_string(), "teaching".to_string()]))
        );
        assert_eq!(fm.get("draft"), Some(&Value::Bool(false)));
        assert_eq!(fm.get("weight"), Some(&Value::Integer(3)));
        assert_eq!(body, "\nThis is the content.\n");
    }

    #[test]
    fn test_bracketed_list() {
        let (fm, _) = FrontMatter::parse("---\ntags: [a, b]\n---\nbody").unwrap();
        assert_eq!(
            fm.get("tags"),
            Some(&Value::from(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_no_frontmatter() {
        let content = "Just some text\n---\nwith a rule";
        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert!(fm.metadata.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_leading_blank_line_is_not_frontmatter() {
        let content = "\n---\ntitle: x\n---\n";
        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert!(fm.metadata.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_empty_block() {
        let (fm, body) = FrontMatter::parse("---\n---\nbody").unwrap();
        assert!(fm.metadata.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_crlf_line_endings() {
        let (fm, body) = FrontMatter::parse("---\r\ntitle: Win\r\n---\r\nbody\r\n").unwrap();
        assert_eq!(fm.get("title"), Some(&Value::from("Win")));
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_unclosed_block() {
        let err = FrontMatter::parse("---\ntitle: Hello\n\nbody").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("closing"));
    }

    #[test]
    fn test_invalid_line() {
        let err = FrontMatter::parse("---\ntitle: Hello\nthis is prose\n---\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("this is prose"));
    }

    #[test]
    fn test_duplicate_key() {
        let err = FrontMatter::parse("---\ntitle: A\ntitle: B\n---\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("duplicate key `title`"));
    }

    #[test]
    fn test_url_value_is_a_string() {
        let (fm, _) =
            FrontMatter::parse("---\nredirect: https://example.com/a\n---\n").unwrap();
        assert_eq!(
            fm.get("redirect"),
            Some(&Value::from("https://example.com/a"))
        );
    }

    #[test]
    fn test_nested_mapping() {
        let (fm, _) = FrontMatter::parse("---\nauthor:\n  name: Ada\n  email: a@b.c\n---\n")
            .unwrap();
        let author = fm.get("author").unwrap();
        assert_eq!(author.get("name"), Some(&Value::from("Ada")));
    }
}
