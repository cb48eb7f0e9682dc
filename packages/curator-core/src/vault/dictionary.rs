//! Typed access to YAML key/value data: document front matter and query
//! configuration blocks.

use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    values: Mapping,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML mapping. Blank input and `null` give an empty dictionary;
    /// any other non-mapping document is an error.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(values) => Ok(Self { values }),
            Value::Null => Ok(Self::new()),
            other => Err(<serde_yaml::Error as serde::de::Error>::custom(format!(
                "expected a mapping, found {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        if self.values.is_empty() {
            return Ok(String::new());
        }
        serde_yaml::to_string(&self.values)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().filter_map(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn integer_or(&self, key: &str, default: i64) -> i64 {
        self.integer(key).unwrap_or(default)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.bool(key).unwrap_or(default)
    }

    /// A list of strings; a single scalar counts as a list of one.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(_) => self.string(key).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        let text = self.string(key)?;
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.values.insert(Value::String(key.into()), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// A copy of `self` with every entry of `updates` written over it.
    pub fn merged_with(&self, updates: &Dictionary) -> Dictionary {
        let mut merged = self.clone();
        for (key, value) in &updates.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let dict = Dictionary::from_yaml(
            "title: Notes\nlevel: 3\nlevel_text: '4'\nrecurse: yes\ntags: [a, b]\nsingle: x\ndate: 2023-05-17\n",
        )
        .unwrap();

        assert_eq!(dict.string("title").as_deref(), Some("Notes"));
        assert_eq!(dict.integer("level"), Some(3));
        assert_eq!(dict.integer("level_text"), Some(4));
        assert_eq!(dict.string("level").as_deref(), Some("3"));
        assert!(dict.bool_or("recurse", false));
        assert_eq!(dict.strings("tags"), vec!["a", "b"]);
        assert_eq!(dict.strings("single"), vec!["x"]);
        assert_eq!(dict.strings("missing"), Vec::<String>::new());
        assert_eq!(dict.date("date"), NaiveDate::from_ymd_opt(2023, 5, 17));
        assert_eq!(dict.integer_or("missing", 7), 7);
    }

    #[test]
    fn test_blank_and_invalid_input() {
        assert!(Dictionary::from_yaml("").unwrap().is_empty());
        assert!(Dictionary::from_yaml("  \n").unwrap().is_empty());
        assert!(Dictionary::from_yaml("~").unwrap().is_empty());
        assert!(Dictionary::from_yaml("just a string").is_err());
        assert!(Dictionary::from_yaml("key: [unclosed").is_err());
    }

    #[test]
    fn test_merge_is_order_insensitive_for_equality() {
        let existing = Dictionary::from_yaml("a: 1\nb: 2\n").unwrap();
        let mut updates = Dictionary::new();
        updates.insert("a", 1);

        assert_eq!(existing.merged_with(&updates), existing);

        updates.insert("c", "new");
        let merged = existing.merged_with(&updates);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.string("c").as_deref(), Some("new"));
    }

    #[test]
    fn test_to_yaml() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.to_yaml().unwrap(), "");

        dict.insert("backlinks", 2);
        assert_eq!(dict.to_yaml().unwrap(), "backlinks: 2\n");
    }
}
