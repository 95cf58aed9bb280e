//! Keyboard bindings.
//!
//! A key map entry is a comma-separated list of alternatives; each
//! alternative is a space-separated sequence of chords such as `ctrl+s`,
//! `shift+?` or `g g`. Presses are collected per template and matched
//! against the end of that history.

use crate::error::RuntimeError;
use crate::template::Template;
use dom_tree::{Document, Event, ListenerOptions};
use smol_str::SmolStr;
use std::fmt;

/// Presses remembered for sequence matching.
pub(crate) const HISTORY_LIMIT: usize = 8;

/// One key with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    /// Lowercased key name, as in `KeyboardEvent.key`.
    pub key: SmolStr,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

fn alias(key: &str) -> SmolStr {
    let lower = key.to_lowercase();
    let canonical = match lower.as_str() {
        "esc" => "escape",
        "space" | "spacebar" => " ",
        "plus" => "+",
        "comma" => ",",
        "up" => "arrowup",
        "down" => "arrowdown",
        "left" => "arrowleft",
        "right" => "arrowright",
        "return" => "enter",
        "del" => "delete",
        "ins" => "insert",
        other => other,
    };
    SmolStr::new(canonical)
}

fn is_modifier_key(key: &str) -> bool {
    matches!(
        key,
        "shift" | "control" | "ctrl" | "alt" | "altgraph" | "meta" | "os" | "capslock"
    )
}

/// Shift is implied by printable symbols and cannot be matched reliably.
fn ignores_shift(key: &str) -> bool {
    let mut chars = key.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if !c.is_alphanumeric() && c != ' ')
}

impl KeyChord {
    /// Parses `mod+mod+key`. A trailing `+` after a separator (`ctrl++`)
    /// names the plus key.
    pub fn parse(spec: &str) -> Result<Self, RuntimeError> {
        let invalid = |message: &str| RuntimeError::InvalidKeyBinding {
            spec: spec.to_string(),
            message: message.to_string(),
        };
        let (modifiers, key) = if spec == "+" {
            ("", "+")
        } else if let Some(modifiers) = spec.strip_suffix("++") {
            (modifiers, "+")
        } else {
            match spec.rsplit_once('+') {
                Some((modifiers, key)) => (modifiers, key),
                None => ("", spec),
            }
        };
        if key.is_empty() {
            return Err(invalid("missing key"));
        }
        let mut chord = KeyChord {
            key: alias(key),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        };
        for modifier in modifiers.split('+').filter(|m| !m.is_empty()) {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                "meta" | "cmd" | "command" | "super" => chord.meta = true,
                _ => return Err(invalid(&format!("unknown modifier `{modifier}`"))),
            }
        }
        if is_modifier_key(&chord.key) {
            return Err(invalid("a modifier cannot be the key"));
        }
        Ok(chord)
    }

    /// The chord of a keydown event, or `None` for modifier presses and
    /// events without a key.
    pub fn from_event(event: &Event) -> Option<Self> {
        let key = event.key.as_deref()?;
        let key = alias(key);
        if is_modifier_key(&key) {
            return None;
        }
        Some(KeyChord {
            key,
            ctrl: event.modifiers.ctrl,
            shift: event.modifiers.shift,
            alt: event.modifiers.alt,
            meta: event.modifiers.meta,
        })
    }

    /// Whether a pressed chord satisfies this one.
    pub fn matches(&self, pressed: &KeyChord) -> bool {
        self.key == pressed.key
            && self.ctrl == pressed.ctrl
            && self.alt == pressed.alt
            && self.meta == pressed.meta
            && (self.shift == pressed.shift || ignores_shift(&self.key))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "ctrl+"),
            (self.alt, "alt+"),
            (self.shift, "shift+"),
            (self.meta, "meta+"),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        match self.key.as_str() {
            " " => f.write_str("space"),
            key => f.write_str(key),
        }
    }
}

/// A parsed key map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub alternatives: Vec<Vec<KeyChord>>,
}

impl KeyBinding {
    /// Parses `alt, alt` where each alternative is a chord sequence.
    pub fn parse(spec: &str) -> Result<Self, RuntimeError> {
        let alternatives = spec
            .split(',')
            .map(|alternative| {
                let sequence = alternative
                    .split_whitespace()
                    .map(KeyChord::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                if sequence.is_empty() {
                    return Err(RuntimeError::InvalidKeyBinding {
                        spec: spec.to_string(),
                        message: "empty alternative".to_string(),
                    });
                }
                Ok(sequence)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    /// Whether the end of `history` completes one of the alternatives.
    pub fn matches(&self, history: &[KeyChord]) -> bool {
        self.alternatives.iter().any(|sequence| {
            sequence.len() <= history.len()
                && sequence
                    .iter()
                    .zip(&history[history.len() - sequence.len()..])
                    .all(|(expected, pressed)| expected.matches(pressed))
        })
    }
}

/// What a key handler receives.
pub struct KeyArgs<'a> {
    pub template: &'a Template,
    pub document: &'a Document,
    pub event: &'a mut Event,
    /// The chord that completed the binding.
    pub chord: KeyChord,
}

/// Listens for keydown on the document on behalf of `template`.
pub(crate) fn bind_keys(template: &Template) {
    if template.definition().keys.is_empty() {
        return;
    }
    let Some(doc) = template.document() else {
        return;
    };
    let weak = template.downgrade();
    let options = ListenerOptions {
        owner: Some(template.id().get()),
        ..ListenerOptions::default()
    };
    doc.add_listener(doc.root(), "keydown", options, move |doc, event| {
        if let Some(template) = weak.upgrade() {
            handle_key(&template, doc, event);
        }
    });
}

fn handle_key(template: &Template, doc: &Document, event: &mut Event) {
    let Some(chord) = KeyChord::from_event(event) else {
        return;
    };
    let history = template.push_key(chord.clone());
    let definition = template.definition().clone();
    let Some((_, handler)) = definition
        .keys
        .iter()
        .find(|(binding, _)| binding.matches(&history))
    else {
        return;
    };
    template.clear_keys();
    tracing::trace!(template = %template.name(), %chord, "key binding matched");
    let mut args = KeyArgs {
        template,
        document: doc,
        event,
        chord,
    };
    if handler(&mut args) == Some(false) {
        args.event.prevent_default();
    }
}
