//! Retained raw YAML subtrees and small shared YAML decode helpers (spec §3
//! `RawNode`, §9 "Retained raw subtrees with late binding").
//!
//! `serde_yaml::Value` already resolves anchors/aliases into their referent
//! content while parsing (it is built on `unsafe-libyaml`, which expands
//! aliases transparently), so the explicit alias-walk-and-clear the original
//! Go implementation performs (`resolveAliases` in `yaml.go`) has no
//! separate counterpart here — a deliberate deviation, recorded in
//! `DESIGN.md`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An opaque retained YAML subtree, held by value (`serde_yaml::Value` is
/// cheaply clonable) and consumed — never mutated — by instantiators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawNode(pub serde_yaml::Value);

impl RawNode {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(self.0.clone())
    }
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_yaml::Value::deserialize(deserializer).map(RawNode)
    }
}

impl Serialize for RawNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// A list field that accepts either a single scalar or a sequence (spec §3,
/// e.g. `requires`, `context`, docker `entrypoint`/`command`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMore {
            One(String),
            Many(Vec<String>),
        }
        Ok(match OneOrMore::deserialize(deserializer)? {
            OneOrMore::One(s) => StringList(vec![s]),
            OneOrMore::Many(v) => StringList(v),
        })
    }
}

impl Serialize for StringList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.0.len() == 1 {
            self.0[0].serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl From<Vec<String>> for StringList {
    fn from(v: Vec<String>) -> Self {
        StringList(v)
    }
}

impl IntoIterator for StringList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_list_accepts_scalar() {
        let list: StringList = serde_yaml::from_str("requires").unwrap();
        assert_eq!(list.0, vec!["requires".to_string()]);
    }

    #[test]
    fn string_list_accepts_sequence() {
        let list: StringList = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(list.0, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn string_list_serializes_single_as_scalar() {
        let list = StringList(vec!["only".to_string()]);
        let yaml = serde_yaml::to_string(&list).unwrap();
        assert_eq!(yaml.trim(), "only");
    }
}
