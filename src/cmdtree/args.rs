//! Binding of argv tokens to a resolved target's flags and positionals.
//!
//! The parser only knows what the loader registered: the target's effective
//! flag set and its positional list. Values are kept as strings; actions
//! interpret them.

use crate::error::ArgumentError;
use crate::model::{FlagDefault, PositionalSpec};
use crate::tree::EffectiveFlags;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A bound flag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl From<&FlagDefault> for FlagValue {
    fn from(default: &FlagDefault) -> Self {
        match default {
            FlagDefault::Bool(b) => FlagValue::Bool(*b),
            FlagDefault::Text(s) => FlagValue::Text(s.clone()),
            FlagDefault::List(items) => FlagValue::List(items.clone()),
        }
    }
}

/// The outcome of parsing argv for one target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedArgs {
    /// Normalized argv (binary name stripped), untouched.
    argv: Vec<String>,
    flags: BTreeMap<String, FlagValue>,
    #[serde(skip)]
    specified: BTreeSet<String>,
    positionals: BTreeMap<String, Vec<String>>,
}

impl ParsedArgs {
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Whether the user typed the flag (or its inverse), as opposed to it
    /// carrying its default.
    pub fn is_specified(&self, name: &str) -> bool {
        self.specified.contains(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.flags.get(name) {
            Some(FlagValue::Text(s)) => Some(s),
            Some(FlagValue::List(items)) => items.last().map(String::as_str),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(FlagValue::Bool(true)))
    }

    pub fn get_list(&self, name: &str) -> Vec<String> {
        match self.flags.get(name) {
            Some(FlagValue::List(items)) => items.clone(),
            Some(FlagValue::Text(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn positional(&self, name: &str) -> Option<&str> {
        self.positionals
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn positional_values(&self, name: &str) -> &[String] {
        self.positionals
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flags the user actually typed, for display.
    pub fn specified_flags(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.flags
            .iter()
            .filter(|(name, _)| self.specified.contains(*name))
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn positionals(&self) -> &BTreeMap<String, Vec<String>> {
        &self.positionals
    }
}

pub struct ArgParser<'a, 't> {
    flags: &'a EffectiveFlags<'t>,
    positionals: &'a [PositionalSpec],
}

impl<'a, 't> ArgParser<'a, 't> {
    pub fn new(flags: &'a EffectiveFlags<'t>, positionals: &'a [PositionalSpec]) -> Self {
        Self { flags, positionals }
    }

    /// Binds `tokens` (argv minus the command path) and keeps `argv` for the
    /// action.
    pub fn parse(&self, tokens: &[String], argv: &[String]) -> Result<ParsedArgs, ArgumentError> {
        let mut parsed = ParsedArgs {
            argv: argv.to_vec(),
            ..ParsedArgs::default()
        };
        let mut loose: Vec<String> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            if token == "--" {
                loose.extend(tokens[i..].iter().cloned());
                break;
            }

            if token.starts_with("--") && token.len() > 2 {
                let (name, inline) = match token.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (token.as_str(), None),
                };
                let Some(flag) = self.flags.get(name) else {
                    unknown.push(token.clone());
                    continue;
                };
                let spec = flag.spec;

                if spec.switch {
                    if let Some(target) = &spec.inverse_of {
                        if inline.is_some() {
                            return Err(ArgumentError::UnexpectedValue {
                                flag: name.to_string(),
                            });
                        }
                        parsed.set(target, FlagValue::Bool(false));
                        continue;
                    }
                    let value = match inline {
                        None => true,
                        Some(raw) => parse_bool(name, raw)?,
                    };
                    parsed.set(name, FlagValue::Bool(value));
                    continue;
                }

                let value = match inline {
                    Some(raw) => raw.to_string(),
                    None => match tokens.get(i) {
                        Some(next) if !next.starts_with("--") => {
                            i += 1;
                            next.clone()
                        }
                        _ => {
                            return Err(ArgumentError::ExpectedValue {
                                flag: name.to_string(),
                            })
                        }
                    },
                };

                if let Some(choices) = &spec.choices {
                    if !choices.iter().any(|c| *c == value) {
                        return Err(ArgumentError::InvalidChoice {
                            flag: name.to_string(),
                            value,
                            choices: choices.clone(),
                        });
                    }
                }

                if spec.repeated {
                    parsed.push(name, value);
                } else {
                    parsed.set(name, FlagValue::Text(value));
                }
                continue;
            }

            if token.starts_with('-') && token.len() > 1 && !looks_numeric(token) {
                unknown.push(token.clone());
                continue;
            }

            loose.push(token.clone());
        }

        if let Some(first) = unknown.first() {
            let bare = first.split('=').next().unwrap_or(first);
            let suggestion = suggest_similar(bare, self.flags.visible_names());
            return Err(ArgumentError::Unrecognized {
                arguments: unknown,
                suggestion,
            });
        }

        let leftover = self.bind_positionals(&loose, &mut parsed)?;
        if !leftover.is_empty() {
            return Err(ArgumentError::Unrecognized {
                arguments: leftover,
                suggestion: None,
            });
        }

        for flag in self.flags.iter() {
            let spec = flag.spec;
            if spec.inverse_of.is_some() {
                continue;
            }
            if spec.required && !parsed.specified.contains(&spec.name) {
                return Err(ArgumentError::MissingFlag {
                    flag: spec.name.clone(),
                });
            }
            if !parsed.flags.contains_key(&spec.name) {
                if let Some(default) = &spec.default {
                    parsed
                        .flags
                        .insert(spec.name.clone(), FlagValue::from(default));
                }
            }
        }

        Ok(parsed)
    }

    /// Greedy left to right, leaving each later positional its minimum.
    fn bind_positionals(
        &self,
        tokens: &[String],
        parsed: &mut ParsedArgs,
    ) -> Result<Vec<String>, ArgumentError> {
        let mut index = 0;
        for (k, spec) in self.positionals.iter().enumerate() {
            let remaining = tokens.len() - index;
            let reserved: usize = self.positionals[k + 1..]
                .iter()
                .map(|later| later.cardinality.min())
                .sum();
            let available = remaining.saturating_sub(reserved);
            let take = match spec.cardinality.max() {
                Some(max) => available.min(max),
                None => available,
            };
            if take < spec.cardinality.min() {
                return Err(ArgumentError::MissingPositional {
                    name: spec.name.clone(),
                });
            }
            if take > 0 {
                parsed
                    .positionals
                    .insert(spec.name.clone(), tokens[index..index + take].to_vec());
            }
            index += take;
        }
        Ok(tokens[index..].to_vec())
    }
}

impl ParsedArgs {
    fn set(&mut self, name: &str, value: FlagValue) {
        self.specified.insert(name.to_string());
        self.flags.insert(name.to_string(), value);
    }

    fn push(&mut self, name: &str, value: String) {
        self.specified.insert(name.to_string());
        match self.flags.entry(name.to_string()).or_insert_with(|| FlagValue::List(Vec::new())) {
            FlagValue::List(items) => items.push(value),
            other => *other = FlagValue::List(vec![value]),
        }
    }
}

fn parse_bool(flag: &str, raw: &str) -> Result<bool, ArgumentError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ArgumentError::InvalidBool {
            flag: flag.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn looks_numeric(token: &str) -> bool {
    token[1..].parse::<f64>().is_ok()
}

/// Closest candidate within edit distance 2, first one wins on ties.
pub fn suggest_similar<'c, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'c str>,
{
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let distance = strsim::levenshtein(input, candidate);
        if distance == 0 || distance > 2 {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}
