// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! An ordered, case-insensitive multimap of HTTP header names and values.

use smallvec::SmallVec;

/// Headers are small in the common case; eight pairs stay inline.
type HeaderPairs = SmallVec<[(String, String); 8]>;

/// An immutable ordered list of HTTP header name/value pairs.
///
/// Lookups are case-insensitive on the name. Order (including the relative
/// order of repeated names) is preserved exactly as built, because it is
/// significant on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    pairs: HeaderPairs,
}

impl Headers {
    #[must_use]
    pub fn builder() -> HeadersBuilder { HeadersBuilder::default() }

    /// The last value for `name`, or `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(pair_name, _)| pair_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value for `name`, in wire order.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(pair_name, _)| pair_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize { self.pairs.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The `Content-Length` value, or −1 when absent or malformed.
    #[must_use]
    pub fn content_length(&self) -> i64 {
        self.get("Content-Length")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(-1)
    }

    /// True if `Transfer-Encoding: chunked` applies to the message carrying
    /// these headers.
    #[must_use]
    pub fn is_chunked_transfer(&self) -> bool {
        self.get("Transfer-Encoding")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("chunked"))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(
            self.pairs
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }
}

/// Builds [`Headers`], preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct HeadersBuilder {
    pairs: HeaderPairs,
}

impl HeadersBuilder {
    #[must_use]
    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Add a raw `Name: Value` line from the wire, leniently: the split is
    /// at the first `:` past position zero, the value is trimmed of leading
    /// whitespace, and a line with no `:` at all becomes a nameless value.
    pub(crate) fn add_lenient_line(&mut self, line: &str) {
        match line[1.min(line.len())..].find(':') {
            Some(index) => {
                let split_at = index + 1;
                let name = &line[..split_at];
                let value = line[split_at + 1..].trim_start_matches([' ', '\t']);
                self.pairs.push((name.to_owned(), value.to_owned()));
            }
            None => {
                let value = line.strip_prefix(':').unwrap_or(line);
                self.pairs.push((String::new(), value.to_owned()));
            }
        }
    }

    #[must_use]
    pub fn build(self) -> Headers {
        Headers {
            pairs: self.pairs,
        }
    }
}
