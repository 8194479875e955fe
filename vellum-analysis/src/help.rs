//! Hover and signature help, assembled from the context stack.

use crate::context::{local_scan, Frame, FrameData};
use crate::manuscript::Manuscript;
use vellum_data::{Action, ArgSpec, ArgSpecKind, Command, Environment};

/// A help record for the construct under the caret.
#[derive(Debug, Clone, PartialEq)]
pub struct Help {
    /// Display name: command, environment, key, or value.
    pub text: String,
    /// A symbol or brief type, e.g. `α` for `\alpha`.
    pub detail: Option<String>,
    pub doc: Option<String>,
    pub signature: Option<SignatureInfo>,
    /// 1-based index of the active argument, when the caret sits inside
    /// an argument slot.
    pub arg: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    /// Rendered form, e.g. `\section*[toc title]{title}`.
    pub label: String,
    pub parameters: Vec<ParamInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub label: String,
    pub doc: Option<String>,
}

/// Walk the context stack at `pos` for the innermost frame carrying
/// renderable information. Absent when the caret sits in plain text or
/// in constructs the dictionary knows nothing about.
pub fn get_help(ms: &Manuscript, pos: usize) -> Option<Help> {
    let innermost = local_scan(ms, pos);
    for frame in innermost.chain() {
        match &frame.data {
            FrameData::Value { text, key, spec } => {
                let value_doc = spec.as_ref().and_then(|v| v.doc.clone());
                let key_doc = key.as_ref().and_then(|k| k.doc.clone());
                if value_doc.is_none() && key_doc.is_none() {
                    continue;
                }
                return Some(Help {
                    text: text.clone(),
                    detail: key.as_ref().map(|k| k.name.clone()),
                    doc: value_doc.or(key_doc),
                    signature: None,
                    arg: None,
                });
            }
            FrameData::Key { name, spec } => {
                let Some(spec) = spec else { continue };
                return Some(Help {
                    text: name.clone(),
                    detail: None,
                    doc: spec.doc.clone(),
                    signature: None,
                    arg: None,
                });
            }
            FrameData::Argument { index, spec, text } => {
                if let Some(help) = argument_help(frame, *index, spec.as_ref(), text) {
                    return Some(help);
                }
            }
            FrameData::Command { name, desc } => {
                let Some(desc) = desc else { continue };
                return Some(command_help(name, desc, None));
            }
            FrameData::Environment { name, desc } => {
                let Some(desc) = desc else { continue };
                return Some(environment_help(name, desc, None));
            }
            FrameData::Root => return None,
        }
    }
    None
}

/// Help for a caret inside an argument slot: signature help on the
/// owning command or environment, with domain-specific hover text for
/// reference-class arguments.
fn argument_help(
    frame: &Frame,
    index: usize,
    spec: Option<&ArgSpec>,
    text: &str,
) -> Option<Help> {
    let owner = frame.parent.as_deref()?;
    match &owner.data {
        FrameData::Command { name, desc } => {
            let desc = desc.as_ref()?;
            // Hovering a reference shows the referenced name itself.
            if matches!(desc.action, Some(Action::Ref) | Some(Action::Cite)) && !text.trim().is_empty()
            {
                let what = match desc.action {
                    Some(Action::Cite) => "citation key",
                    _ => "label",
                };
                return Some(Help {
                    text: text.trim().to_string(),
                    detail: Some(what.to_string()),
                    doc: spec.and_then(|s| s.doc.clone()),
                    signature: Some(command_signature(name, &desc.args)),
                    arg: Some(index + 1),
                });
            }
            Some(command_help(name, desc, Some(index + 1)))
        }
        FrameData::Environment { name, desc } => {
            let desc = desc.as_ref()?;
            Some(environment_help(name, desc, Some(index + 1)))
        }
        _ => None,
    }
}

fn command_help(name: &str, desc: &Command, arg: Option<usize>) -> Help {
    Help {
        text: format!("\\{}", name),
        detail: desc.detail.clone(),
        doc: desc.doc.clone(),
        signature: (!desc.args.is_empty()).then(|| command_signature(name, &desc.args)),
        arg,
    }
}

fn environment_help(name: &str, desc: &Environment, arg: Option<usize>) -> Help {
    Help {
        text: name.to_string(),
        detail: desc.detail.clone().or_else(|| Some("environment".to_string())),
        doc: desc.doc.clone(),
        signature: (!desc.args.is_empty())
            .then(|| render_signature(&format!("\\begin{{{}}}", name), &desc.args)),
        arg,
    }
}

fn command_signature(name: &str, args: &[ArgSpec]) -> SignatureInfo {
    render_signature(&format!("\\{}", name), args)
}

/// Render a signature: `\name*[optional]{mandatory}`. Parameter labels
/// are the bare display names, so clients can highlight them as
/// substrings of the label.
fn render_signature(head: &str, args: &[ArgSpec]) -> SignatureInfo {
    let mut label = head.to_string();
    let mut parameters = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let display = arg.display_name(index);
        match arg.kind {
            ArgSpecKind::Mandatory => label.push_str(&format!("{{{}}}", display)),
            ArgSpecKind::Optional => label.push_str(&format!("[{}]", display)),
            ArgSpecKind::Star => label.push('*'),
            ArgSpecKind::Literal => {
                label.push_str(arg.literal.as_deref().unwrap_or(""));
            }
        }
        parameters.push(ParamInfo {
            label: display,
            doc: arg.doc.clone(),
        });
    }
    SignatureInfo { label, parameters }
}
