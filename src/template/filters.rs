//! Output filters
//!
//! Every filter is a pure function of its input, its arguments, and the
//! site settings captured in [`Filters`]. Input a filter cannot use is
//! returned unchanged.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::cmp::Ordering;

use crate::config::SiteConfig;
use crate::content::markdown::render_plain;
use crate::content::Value;
use crate::helpers::{
    absolute_url, date_xml, format_date, html_escape, parse_date, relative_url, slugify,
    strip_html, truncate, truncate_words, url_encode, xml_escape,
};

/// Names accepted after `|`
pub const FILTER_NAMES: [&str; 34] = [
    "absolute_url",
    "append",
    "capitalize",
    "date",
    "date_to_string",
    "date_to_xmlschema",
    "default",
    "downcase",
    "escape",
    "first",
    "join",
    "jsonify",
    "last",
    "markdownify",
    "number_of_words",
    "prepend",
    "relative_url",
    "remove",
    "replace",
    "reverse",
    "size",
    "slugify",
    "sort",
    "split",
    "strip",
    "strip_html",
    "strip_newlines",
    "truncate",
    "truncatewords",
    "uniq",
    "upcase",
    "url_encode",
    "where",
    "xml_escape",
];

pub fn is_known(name: &str) -> bool {
    FILTER_NAMES.contains(&name)
}

/// Site settings the filters depend on
#[derive(Debug, Clone)]
pub struct Filters {
    pub tz: Tz,
    pub url: String,
    pub baseurl: String,
    pub date_format: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            url: "http://localhost".to_string(),
            baseurl: String::new(),
            date_format: "%b %-d, %Y".to_string(),
        }
    }
}

impl Filters {
    pub fn from_config(config: &SiteConfig) -> anyhow::Result<Self> {
        Ok(Self {
            tz: config.tz()?,
            url: config.url.clone(),
            baseurl: config.baseurl.clone(),
            date_format: config.date_format.clone(),
        })
    }

    /// Apply filter `name` to `input`
    pub fn apply(&self, name: &str, input: Value, args: &[Value]) -> Value {
        let arg_text = |i: usize| args.get(i).map(Value::to_output_string);

        match name {
            "date" => {
                let format = arg_text(0).unwrap_or_else(|| self.date_format.clone());
                match self.to_date(&input).and_then(|date| format_date(&date, &format)) {
                    Some(text) => Value::String(text),
                    None => input,
                }
            }
            "date_to_xmlschema" => match self.to_date(&input) {
                Some(date) => Value::String(date_xml(&date)),
                None => input,
            },
            "date_to_string" => match self.to_date(&input) {
                Some(date) => Value::String(date.format("%d %b %Y").to_string()),
                None => input,
            },

            "truncate" => {
                let length = args.first().and_then(Value::as_usize).unwrap_or(50);
                let omission = arg_text(1).unwrap_or_else(|| "...".to_string());
                map_text(input, |s| truncate(s, length, &omission))
            }
            "truncatewords" => {
                let count = args.first().and_then(Value::as_usize).unwrap_or(15);
                let omission = arg_text(1).unwrap_or_else(|| "...".to_string());
                map_text(input, |s| truncate_words(s, count, &omission))
            }
            "strip_html" => map_text(input, strip_html),
            "strip_newlines" => map_text(input, |s| s.replace(['\r', '\n'], "")),
            "escape" => map_text(input, html_escape),
            "xml_escape" => map_text(input, xml_escape),
            "url_encode" => map_text(input, url_encode),
            "upcase" => map_text(input, str::to_uppercase),
            "downcase" => map_text(input, str::to_lowercase),
            "capitalize" => map_text(input, capitalize),
            "strip" => map_text(input, |s| s.trim().to_string()),
            "slugify" => map_text(input, slugify),
            "markdownify" => map_text(input, render_plain),

            "append" => {
                let suffix = arg_text(0).unwrap_or_default();
                map_text(input, |s| format!("{}{}", s, suffix))
            }
            "prepend" => {
                let prefix = arg_text(0).unwrap_or_default();
                map_text(input, |s| format!("{}{}", prefix, s))
            }
            "replace" => match (arg_text(0), arg_text(1)) {
                (Some(from), to) if !from.is_empty() => {
                    map_text(input, |s| s.replace(&from, &to.unwrap_or_default()))
                }
                _ => input,
            },
            "remove" => match arg_text(0) {
                Some(pattern) if !pattern.is_empty() => map_text(input, |s| s.replace(&pattern, "")),
                _ => input,
            },

            "split" => match &input {
                Value::String(s) => {
                    let sep = arg_text(0).unwrap_or_else(|| " ".to_string());
                    let parts: Vec<Value> = if sep.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    };
                    Value::List(parts)
                }
                _ => input,
            },
            "join" => match &input {
                Value::List(items) => {
                    let sep = arg_text(0).unwrap_or_else(|| " ".to_string());
                    Value::String(
                        items
                            .iter()
                            .map(Value::to_output_string)
                            .collect::<Vec<_>>()
                            .join(&sep),
                    )
                }
                _ => input,
            },
            "size" => Value::Integer(input.len() as i64),
            "first" => match input {
                Value::List(items) => items.into_iter().next().unwrap_or_default(),
                other => other,
            },
            "last" => match input {
                Value::List(items) => items.into_iter().last().unwrap_or_default(),
                other => other,
            },
            "reverse" => match input {
                Value::List(mut items) => {
                    items.reverse();
                    Value::List(items)
                }
                other => other,
            },
            "sort" => match input {
                Value::List(mut items) => {
                    let key = arg_text(0);
                    items.sort_by(|a, b| match &key {
                        Some(key) => compare_nulls_last(
                            a.get(key).unwrap_or(&Value::Null),
                            b.get(key).unwrap_or(&Value::Null),
                        ),
                        None => compare_nulls_last(a, b),
                    });
                    Value::List(items)
                }
                other => other,
            },
            "uniq" => match input {
                Value::List(items) => {
                    let mut seen: Vec<Value> = Vec::with_capacity(items.len());
                    for item in items {
                        if !seen.iter().any(|s| s.loose_eq(&item)) {
                            seen.push(item);
                        }
                    }
                    Value::List(seen)
                }
                other => other,
            },
            "where" => match (input, arg_text(0)) {
                (Value::List(items), Some(key)) => {
                    let wanted = args.get(1);
                    Value::List(
                        items
                            .into_iter()
                            .filter(|item| field_matches(item.get(&key), wanted))
                            .collect(),
                    )
                }
                (other, _) => other,
            },
            "default" => {
                if input.is_truthy() {
                    input
                } else {
                    args.first().cloned().unwrap_or_default()
                }
            }
            "number_of_words" => match &input {
                Value::List(_) | Value::Map(_) => input,
                other => Value::Integer(other.to_output_string().split_whitespace().count() as i64),
            },
            "jsonify" => Value::String(serde_json::to_string(&input).unwrap_or_default()),
            "relative_url" => match input {
                Value::Null => Value::Null,
                other => map_text(other, |s| relative_url(&self.baseurl, s)),
            },
            "absolute_url" => match input {
                Value::Null => Value::Null,
                other => map_text(other, |s| absolute_url(&self.url, &self.baseurl, s)),
            },
            _ => input,
        }
    }

    /// Dates arrive as strings in any supported format, or as Unix seconds
    fn to_date(&self, value: &Value) -> Option<DateTime<Tz>> {
        match value {
            Value::String(s) => parse_date(s, self.tz),
            Value::Integer(secs) => self.tz.timestamp_opt(*secs, 0).single(),
            _ => None,
        }
    }
}

/// Apply `f` to scalar input; `Null` counts as the empty string
fn map_text<F>(input: Value, f: F) -> Value
where
    F: FnOnce(&str) -> String,
{
    let text = match &input {
        Value::Null => String::new(),
        Value::List(_) | Value::Map(_) => return input,
        scalar => scalar.scalar_string().unwrap_or_default(),
    };
    Value::String(f(&text))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn compare_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp_loose(b).unwrap_or(Ordering::Equal),
    }
}

/// `where` matching: equality, membership for list fields, or truthiness
/// when no value is given
fn field_matches(field: Option<&Value>, wanted: Option<&Value>) -> bool {
    let Some(field) = field else {
        return false;
    };
    match wanted {
        None => field.is_truthy(),
        Some(wanted) => match field {
            Value::List(items) => items.iter().any(|item| item.loose_eq(wanted)),
            other => other.loose_eq(wanted),
        },
    }
}
