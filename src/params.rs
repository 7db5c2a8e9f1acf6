// Query parameters of the export API
//
// The API expects `key=value;` pairs instead of the usual `&` separated query.
// A list parameter repeats its key once per value.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Vec<String>)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single value, replacing any previous value of `key`.
    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.set_all(key, std::iter::once(value))
    }

    pub fn set_all<I, V>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key.to_string(), values)),
        }
        self
    }

    /// Sets `key=a` when `enabled`, and leaves the key out otherwise.
    pub fn flag(&mut self, key: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.set(key, "a");
        }
        self
    }

    /// Sets `key=a` or `key=n`.
    pub fn yes_no(&mut self, key: &str, value: bool) -> &mut Self {
        self.set(key, if value { "a" } else { "n" })
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends every entry of `other` after the entries of `self`.
    pub fn extend(&mut self, other: &Params) -> &mut Self {
        for (key, values) in &other.entries {
            self.set_all(key, values);
        }
        self
    }

    pub fn serialize(&self) -> String {
        let mut builder = String::new();
        for (key, values) in &self.entries {
            for value in values {
                builder.push_str(&escape(key));
                builder.push('=');
                builder.push_str(&escape(value));
                builder.push(';');
            }
        }
        builder
    }

    /// Same as [`Params::serialize`] with the value of `key` masked, for logs.
    pub fn redacted(&self, key: &str) -> String {
        let mut copy = self.clone();
        if copy.get(key).is_some() {
            copy.set(key, "***");
        }
        copy.serialize()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// Separators of the query string must not appear raw inside keys or values;
// everything else is percent-encoded by the URL itself.
fn escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['%', ';', '&', '=', '#', '+']) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ';' => escaped.push_str("%3B"),
            '&' => escaped.push_str("%26"),
            '=' => escaped.push_str("%3D"),
            '#' => escaped.push_str("%23"),
            '+' => escaped.push_str("%2B"),
            _ => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}
