//! Command and environment descriptors.

use serde::Deserialize;
use vellum_parser::ArgShape;

/// The action tag a descriptor carries. The document model dispatches scan
/// callbacks on this tag; dictionaries may define extra actions (such as
/// `tikzpath`) that implementations register bespoke callbacks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Reads another source file; the descriptor's `filename` template
    /// turns the argument into a path.
    Input,
    Begin,
    End,
    /// Sectioning command; `heading_level` gives the outline depth.
    Heading,
    Label,
    Ref,
    Cite,
    Bibitem,
    Math,
    Endmath,
    /// A dictionary-defined extension action.
    Extension(String),
}

// Known tags map to their variant; anything else is an extension
// action, so dictionaries can introduce new tags without a code change.
impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "input" => Action::Input,
            "begin" => Action::Begin,
            "end" => Action::End,
            "heading" => Action::Heading,
            "label" => Action::Label,
            "ref" => Action::Ref,
            "cite" => Action::Cite,
            "bibitem" => Action::Bibitem,
            "math" => Action::Math,
            "endmath" => Action::Endmath,
            _ => Action::Extension(tag),
        })
    }
}

/// The delimiter kind of a formal argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgSpecKind {
    Mandatory,
    Optional,
    Star,
    Literal,
}

/// One formal argument of a command or environment signature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArgSpec {
    pub kind: ArgSpecKind,
    /// Display name, e.g. `title` or `reference`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    /// The delimiter text for `literal` arguments.
    #[serde(default)]
    pub literal: Option<String>,
    /// Non-empty marks this argument as a key=value list.
    #[serde(default)]
    pub keys: Vec<KeySpec>,
}

impl ArgSpec {
    /// The parser-level shape of this argument.
    pub fn shape(&self) -> ArgShape {
        match self.kind {
            ArgSpecKind::Mandatory => ArgShape::Group,
            ArgSpecKind::Optional => ArgShape::Bracket,
            ArgSpecKind::Star => ArgShape::Star,
            ArgSpecKind::Literal => {
                ArgShape::Literal(self.literal.clone().unwrap_or_default())
            }
        }
    }

    pub fn is_key_value(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Display name with a positional fallback.
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1))
    }

    pub fn key(&self, name: &str) -> Option<&KeySpec> {
        self.keys.iter().find(|key| key.name == name)
    }
}

/// A key inside a key=value argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeySpec {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    /// Enumerated values, when the key takes a closed set.
    #[serde(default)]
    pub values: Vec<ValueSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValueSpec {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A command descriptor, looked up by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
    /// Filled from the dictionary key at module load.
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub action: Option<Action>,
    /// Outline depth for `heading` commands.
    #[serde(default)]
    pub heading_level: Option<u8>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub doc: Option<String>,
    /// A symbol or brief type shown next to the name, e.g. `α` for `\alpha`.
    #[serde(default)]
    pub detail: Option<String>,
    /// Filename template for `input`-class commands, e.g. `%s.tex`.
    #[serde(default)]
    pub filename: Option<String>,
}

impl Command {
    pub fn shapes(&self) -> Vec<ArgShape> {
        self.args.iter().map(ArgSpec::shape).collect()
    }

    /// Index of the first mandatory argument, where the filename of an
    /// `input`-class command or the key of a `label`-class command lives.
    pub fn first_mandatory(&self) -> Option<usize> {
        self.args
            .iter()
            .position(|arg| arg.kind == ArgSpecKind::Mandatory)
    }
}

/// An environment descriptor. The signature describes the arguments that
/// follow `\begin{name}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Environment {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl Environment {
    pub fn shapes(&self) -> Vec<ArgShape> {
        self.args.iter().map(ArgSpec::shape).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parses_known_and_extension_tags() {
        #[derive(Deserialize)]
        struct Probe {
            action: Action,
        }
        let known: Probe = toml::from_str(r#"action = "heading""#).unwrap();
        assert_eq!(known.action, Action::Heading);
        let extension: Probe = toml::from_str(r#"action = "tikzpath""#).unwrap();
        assert_eq!(extension.action, Action::Extension("tikzpath".into()));
    }

    #[test]
    fn arg_spec_shape_mapping() {
        let spec: ArgSpec = toml::from_str(r#"kind = "optional""#).unwrap();
        assert_eq!(spec.shape(), vellum_parser::ArgShape::Bracket);
        let lit: ArgSpec =
            toml::from_str(r#"kind = "literal"
literal = "*""#)
                .unwrap();
        assert_eq!(lit.shape(), vellum_parser::ArgShape::Literal("*".into()));
    }

    #[test]
    fn first_mandatory_skips_leading_optionals() {
        let cmd: Command = toml::from_str(
            r#"
action = "input"
filename = "%s.sty"
args = [
    { kind = "optional", name = "options" },
    { kind = "mandatory", name = "package" },
]
"#,
        )
        .unwrap();
        assert_eq!(cmd.first_mandatory(), Some(1));
    }
}
