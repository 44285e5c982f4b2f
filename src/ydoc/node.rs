//! Comment-preserving YAML document model.
//!
//! Every entry carries its own comment anchors: full lines above it
//! (`leading`) and the trailing comment on its own line (`inline`). Because
//! comments travel with entries, value updates and list splices preserve
//! them without any bookkeeping.

/// Quoting style of a scalar, preserved across rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar.
    Literal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

impl Scalar {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            style: ScalarStyle::Plain,
        }
    }
}

/// A sequence entry with its comment anchors.
#[derive(Clone, Debug, PartialEq)]
pub struct SeqItem {
    pub leading: Vec<String>,
    pub value: YamlValue,
    pub inline: Option<String>,
}

impl SeqItem {
    pub fn new(value: YamlValue) -> Self {
        Self {
            leading: Vec::new(),
            value,
            inline: None,
        }
    }
}

/// A mapping entry with its comment anchors.
#[derive(Clone, Debug, PartialEq)]
pub struct MapEntry {
    pub leading: Vec<String>,
    pub key: String,
    pub value: YamlValue,
    pub inline: Option<String>,
}

impl MapEntry {
    pub fn new(key: impl Into<String>, value: YamlValue) -> Self {
        Self {
            leading: Vec::new(),
            key: key.into(),
            value,
            inline: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub items: Vec<SeqItem>,
    pub flow: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mapping {
    pub entries: Vec<MapEntry>,
    pub flow: bool,
}

impl Mapping {
    pub fn get(&self, key: &str) -> Option<&YamlValue> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut YamlValue> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key)
            .map(|e| &mut e.value)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut MapEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum YamlValue {
    Scalar(Scalar),
    Sequence(Sequence),
    Mapping(Mapping),
}

impl YamlValue {
    pub fn plain(value: impl Into<String>) -> Self {
        YamlValue::Scalar(Scalar::plain(value))
    }

    pub fn empty_mapping() -> Self {
        YamlValue::Mapping(Mapping {
            entries: Vec::new(),
            flow: false,
        })
    }

    pub fn empty_sequence() -> Self {
        YamlValue::Sequence(Sequence {
            items: Vec::new(),
            flow: false,
        })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            YamlValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            YamlValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            YamlValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            YamlValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            YamlValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Shorthand: the `name` key of a mapping value.
    pub fn name(&self) -> Option<&str> {
        self.as_mapping()?.get("name")?.as_str()
    }

    /// Convert a serde value (e.g. element data reconstructed from XML)
    /// into a comment-free document value.
    pub fn from_serde(value: &serde_yaml::Value) -> YamlValue {
        match value {
            serde_yaml::Value::Null => YamlValue::plain(""),
            serde_yaml::Value::Bool(b) => YamlValue::plain(b.to_string()),
            serde_yaml::Value::Number(n) => YamlValue::plain(n.to_string()),
            serde_yaml::Value::String(s) => YamlValue::plain(s.clone()),
            serde_yaml::Value::Sequence(items) => YamlValue::Sequence(Sequence {
                items: items
                    .iter()
                    .map(|v| SeqItem::new(YamlValue::from_serde(v)))
                    .collect(),
                flow: false,
            }),
            serde_yaml::Value::Mapping(map) => YamlValue::Mapping(Mapping {
                entries: map
                    .iter()
                    .filter_map(|(k, v)| {
                        k.as_str()
                            .map(|key| MapEntry::new(key, YamlValue::from_serde(v)))
                    })
                    .collect(),
                flow: false,
            }),
            serde_yaml::Value::Tagged(tagged) => YamlValue::from_serde(&tagged.value),
        }
    }

    /// Every comment line reachable from this value, for preservation
    /// checks.
    pub fn collect_comments(&self, out: &mut Vec<String>) {
        match self {
            YamlValue::Scalar(_) => {}
            YamlValue::Sequence(seq) => {
                for item in &seq.items {
                    out.extend(item.leading.iter().filter(|l| l.starts_with('#')).cloned());
                    if let Some(inline) = &item.inline {
                        out.push(inline.clone());
                    }
                    item.value.collect_comments(out);
                }
            }
            YamlValue::Mapping(map) => {
                for entry in &map.entries {
                    out.extend(entry.leading.iter().filter(|l| l.starts_with('#')).cloned());
                    if let Some(inline) = &entry.inline {
                        out.push(inline.clone());
                    }
                    entry.value.collect_comments(out);
                }
            }
        }
    }
}

/// A parsed document: body plus comments outside any entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub leading: Vec<String>,
    pub body: YamlValue,
    pub trailing: Vec<String>,
}

impl Document {
    pub fn comments(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .leading
            .iter()
            .filter(|l| l.starts_with('#'))
            .cloned()
            .collect();
        self.body.collect_comments(&mut out);
        out.extend(self.trailing.iter().filter(|l| l.starts_with('#')).cloned());
        out
    }
}
