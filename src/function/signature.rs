use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BindError;
use crate::hashing::HashAlgorithm;

/// A declared parameter, optionally with a default value.
#[derive(Debug, Clone, PartialEq)]
pub struct Param<V> {
    name: String,
    default: Option<V>,
}

impl<V> Param<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&V> {
        self.default.as_ref()
    }
}

/// Describes a memoizable function.
///
/// `name` must be unique among the functions wrapped by one cacher (a module
/// path works well). `source` is the text the function identity is hashed
/// from: pass the function's source (for instance via `stringify!` or
/// `include_str!`) or any descriptor that changes whenever the function's
/// behaviour does, such as `"parse_config@v3"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature<V> {
    name: String,
    source: String,
    params: Vec<Param<V>>,
}

impl<V> FunctionSignature<V> {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            params: Vec::new(),
        }
    }

    /// Add a required parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Add a parameter that falls back to `default` when not supplied.
    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<V>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[Param<V>] {
        &self.params
    }

    /// Hex digest of the descriptor text.
    pub fn identity(&self, algorithm: HashAlgorithm) -> String {
        algorithm.digest_hex(self.source.as_bytes())
    }
}

impl<V: Clone> FunctionSignature<V> {
    /// Bind positional and keyword arguments to the declared parameters,
    /// filling every omitted parameter with its default.
    pub fn bind(&self, args: CallArgs<V>) -> Result<BoundArguments<V>, BindError> {
        if args.positional.len() > self.params.len() {
            return Err(BindError::TooManyPositional {
                function: self.name.clone(),
                expected: self.params.len(),
                found: args.positional.len(),
            });
        }

        let mut slots: Vec<Option<V>> = Vec::with_capacity(self.params.len());
        slots.extend(args.positional.into_iter().map(Some));
        slots.resize_with(self.params.len(), || None);

        for (name, value) in args.keyword {
            let Some(index) = self.params.iter().position(|param| param.name == name) else {
                return Err(BindError::UnknownKeyword {
                    function: self.name.clone(),
                    name,
                });
            };
            if slots[index].is_some() {
                return Err(BindError::Duplicate {
                    function: self.name.clone(),
                    name,
                });
            }
            slots[index] = Some(value);
        }

        self.params
            .iter()
            .zip(slots)
            .map(|(param, slot)| {
                slot.or_else(|| param.default.clone())
                    .map(|value| (param.name.clone(), value))
                    .ok_or_else(|| BindError::Missing {
                        function: self.name.clone(),
                        name: param.name.clone(),
                    })
            })
            .collect()
    }
}

/// Arguments for one call, before binding.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs<V> {
    positional: Vec<V>,
    keyword: Vec<(String, V)>,
}

impl<V> CallArgs<V> {
    pub fn new() -> Self {
        Self {
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<V>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<V>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

impl<V> Default for CallArgs<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<Vec<V>> for CallArgs<V> {
    fn from(positional: Vec<V>) -> Self {
        Self {
            positional,
            keyword: Vec::new(),
        }
    }
}

/// Parameter name to value for one call, in declaration order, defaults
/// included.
///
/// Equality is key-value equality and ignores order. Serialized as a map.
#[derive(Debug, Clone)]
pub struct BoundArguments<V> {
    entries: Vec<(String, V)>,
}

impl<V> BoundArguments<V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }
}

impl<V> FromIterator<(String, V)> for BoundArguments<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<V: PartialEq> PartialEq for BoundArguments<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<V: Serialize> Serialize for BoundArguments<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for BoundArguments<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = BoundArguments<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(BoundArguments { entries })
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
