//! Style description objects and CSS text generation.
//!
//! A style value is a nested map: plain declarations, pseudo-class or
//! descendant blocks (keys containing `&` or starting with `:`), at-rules
//! (keys starting with `@`), and a `@keyframes`/`animation` pair that
//! synthesizes a uniquely named keyframes block (`@self` in the animation
//! value refers to the generated name).
//!
//! A multi-step value (ordered sequence of objects) stages a transition:
//! step 0 applies synchronously, later steps apply one per animation frame.

use std::cell::Cell;
use std::collections::BTreeMap;

/// One entry in a style object.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleEntry {
    /// Literal CSS value text.
    Str(String),
    /// Numeric value; gets a `px` unit unless the property is unitless.
    Num(f64),
    /// Nested block: pseudo-class, descendant selector, at-rule, keyframes.
    Nested(StyleObject),
}

impl From<&str> for StyleEntry {
    fn from(v: &str) -> Self {
        StyleEntry::Str(v.to_string())
    }
}

impl From<String> for StyleEntry {
    fn from(v: String) -> Self {
        StyleEntry::Str(v)
    }
}

impl From<f64> for StyleEntry {
    fn from(v: f64) -> Self {
        StyleEntry::Num(v)
    }
}

impl From<i64> for StyleEntry {
    fn from(v: i64) -> Self {
        StyleEntry::Num(v as f64)
    }
}

impl From<i32> for StyleEntry {
    fn from(v: i32) -> Self {
        StyleEntry::Num(v as f64)
    }
}

impl From<StyleObject> for StyleEntry {
    fn from(v: StyleObject) -> Self {
        StyleEntry::Nested(v)
    }
}

/// An ordered map of style declarations and nested blocks.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StyleObject {
    entries: BTreeMap<String, StyleEntry>,
}

impl StyleObject {
    pub fn new() -> Self {
        StyleObject::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<StyleEntry>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<StyleEntry>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&StyleEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry needs a generated class: pseudo-class or nested
    /// block keys, or nested object values.
    pub fn has_pseudo_or_nested(&self) -> bool {
        self.entries.iter().any(|(key, value)| {
            key.starts_with(':')
                || key.starts_with('&')
                || matches!(value, StyleEntry::Nested(_))
        })
    }

    /// Whether a top-level `transition` declaration is present.
    pub fn has_transition(&self) -> bool {
        self.entries.contains_key("transition")
    }

    /// Whether an inline `@keyframes` block is declared.
    pub fn has_keyframes(&self) -> bool {
        self.entries.contains_key("@keyframes")
    }

    /// Merge several objects into one; later entries win.
    pub fn merged(objects: &[StyleObject]) -> StyleObject {
        let mut out = StyleObject::new();
        for object in objects {
            for (key, value) in object.entries.iter() {
                out.entries.insert(key.clone(), value.clone());
            }
        }
        out
    }

    /// Split into the plain-value portion (written via the style attribute,
    /// which arms transitions more reliably) and the nested/keyframes
    /// portion (written via stylesheet rule insertion).
    pub fn separate(&self) -> (Option<StyleObject>, Option<StyleObject>) {
        let mut plain: Option<StyleObject> = None;
        let mut nested: Option<StyleObject> = None;
        let has_keyframes = self.has_keyframes();
        for (key, value) in self.entries.iter() {
            let goes_nested = matches!(value, StyleEntry::Nested(_))
                || key == "@keyframes"
                || (key == "animation" && has_keyframes);
            let target = if goes_nested { &mut nested } else { &mut plain };
            target
                .get_or_insert_with(StyleObject::new)
                .entries
                .insert(key.clone(), value.clone());
        }
        (plain, nested)
    }
}

/// A style attribute value: one object, or an ordered staging sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    Object(StyleObject),
    Steps(Vec<StyleObject>),
}

impl StyleValue {
    /// View as an ordered step list (a single object is one step).
    pub fn steps(&self) -> Vec<StyleObject> {
        match self {
            StyleValue::Object(object) => vec![object.clone()],
            StyleValue::Steps(steps) => steps.clone(),
        }
    }

    pub fn any_pseudo_or_nested(&self) -> bool {
        self.steps().iter().any(StyleObject::has_pseudo_or_nested)
    }

    pub fn any_transition(&self) -> bool {
        self.steps().iter().any(StyleObject::has_transition)
    }

    pub fn any_keyframes(&self) -> bool {
        self.steps().iter().any(StyleObject::has_keyframes)
    }

    /// Whether this value must route through the style engine rather than
    /// plain attribute assignment.
    pub fn needs_style_engine(&self) -> bool {
        self.any_pseudo_or_nested() || self.any_transition() || self.any_keyframes()
    }
}

impl From<StyleObject> for StyleValue {
    fn from(object: StyleObject) -> Self {
        StyleValue::Object(object)
    }
}

impl From<Vec<StyleObject>> for StyleValue {
    fn from(steps: Vec<StyleObject>) -> Self {
        StyleValue::Steps(steps)
    }
}

// =============================================================================
// CSS text generation
// =============================================================================

/// Properties whose numeric values carry no unit.
const UNITLESS: &[&str] = &[
    "opacity", "z-index", "flex", "flex-grow", "flex-shrink", "font-weight", "line-height",
    "order", "zoom",
];

/// camelCase to kebab-case (`backgroundColor` -> `background-color`).
pub fn kebab(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Stringify one declaration value, adding a `px` unit to bare numbers
/// unless the property is unitless.
pub fn stringify_style_value(key: &str, entry: &StyleEntry) -> String {
    match entry {
        StyleEntry::Str(value) => value.clone(),
        StyleEntry::Num(value) => {
            let text = if value.fract() == 0.0 {
                format!("{}", *value as i64)
            } else {
                format!("{value}")
            };
            if UNITLESS.contains(&kebab(key).as_str()) {
                text
            } else {
                format!("{text}px")
            }
        }
        StyleEntry::Nested(_) => String::new(),
    }
}

/// Flat declarations of an object as `prop:value;` lines. Nested entries
/// are skipped; callers split them off first.
pub fn stringify_declarations(object: &StyleObject) -> String {
    object
        .iter()
        .filter(|(_, entry)| !matches!(entry, StyleEntry::Nested(_)))
        .map(|(key, entry)| format!("{}:{};", kebab(key), stringify_style_value(key, entry)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inline (style-attribute) form of the flat declarations.
pub fn inline_declarations(object: &StyleObject) -> String {
    object
        .iter()
        .filter(|(_, entry)| !matches!(entry, StyleEntry::Nested(_)))
        .map(|(key, entry)| format!("{}:{}", kebab(key), stringify_style_value(key, entry)))
        .collect::<Vec<_>>()
        .join(";")
}

thread_local! {
    static ANIMATION_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_animation_name() -> String {
    ANIMATION_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        format!("animation-gen{id}")
    })
}

/// Reset the generated-animation-name counter (for tests).
pub fn reset_animation_names() {
    ANIMATION_COUNTER.with(|counter| counter.set(0));
}

fn stringify_keyframes(object: &StyleObject) -> String {
    object
        .iter()
        .filter_map(|(key, entry)| match entry {
            StyleEntry::Nested(frame) => {
                Some(format!("{key} {{\n{}\n}}", stringify_declarations(frame)))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn generate_inline_animation(selector: &str, keyframes: Option<&StyleEntry>, animation: Option<&StyleEntry>) -> Vec<String> {
    let mut rules = Vec::new();
    let mut animation_name = String::new();
    if let Some(StyleEntry::Nested(frames)) = keyframes {
        animation_name = next_animation_name();
        rules.push(format!(
            "@keyframes {animation_name} {{\n{}\n}}",
            stringify_keyframes(frames)
        ));
    }
    if let Some(entry) = animation {
        let value = stringify_style_value("animation", entry).replace("@self", &animation_name);
        rules.push(format!("{selector} {{\nanimation:{value};\n}}"));
    }
    rules
}

/// Generate the CSS rule texts for `object` under `selector`.
///
/// Returns one string per rule: the base declaration block, any generated
/// keyframes/animation rules, then nested blocks (at-rules wrap their
/// nested rules; `&` keys substitute the selector; other keys become
/// descendant selectors).
pub fn generate_style_content(selector: &str, object: &StyleObject) -> Vec<String> {
    let mut plain = StyleObject::new();
    let mut nested: Vec<(String, StyleObject)> = Vec::new();
    let mut keyframes: Option<StyleEntry> = None;
    let mut animation: Option<StyleEntry> = None;
    let has_keyframes = object.has_keyframes();

    for (key, entry) in object.iter() {
        if key == "@keyframes" {
            keyframes = Some(entry.clone());
        } else if key == "animation" && has_keyframes {
            animation = Some(entry.clone());
        } else if let StyleEntry::Nested(inner) = entry {
            nested.push((key.to_string(), inner.clone()));
        } else {
            plain.set(key, entry.clone());
        }
    }

    let mut rules = Vec::new();
    if !plain.is_empty() {
        rules.push(format!("{selector} {{\n{}\n}}", stringify_declarations(&plain)));
    }
    rules.extend(generate_inline_animation(selector, keyframes.as_ref(), animation.as_ref()));

    for (key, inner) in nested {
        if key.starts_with('@') {
            let inner_rules = generate_style_content(selector, &inner).join("\n");
            rules.push(format!("{key} {{\n{inner_rules}\n}}"));
        } else {
            let nested_selector = if key.contains('&') {
                key.replace('&', selector)
            } else {
                format!("{selector} {key}")
            };
            rules.extend(generate_style_content(&nested_selector, &inner));
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_conversion() {
        assert_eq!(kebab("backgroundColor"), "background-color");
        assert_eq!(kebab("width"), "width");
    }

    #[test]
    fn test_numeric_px_and_unitless() {
        assert_eq!(stringify_style_value("width", &StyleEntry::Num(100.0)), "100px");
        assert_eq!(stringify_style_value("opacity", &StyleEntry::Num(0.5)), "0.5");
        assert_eq!(stringify_style_value("zIndex", &StyleEntry::Num(3.0)), "3");
    }

    #[test]
    fn test_plain_rule_generation() {
        let style = StyleObject::new().with("width", 100).with("color", "red");
        let rules = generate_style_content(".x", &style);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0], ".x {\ncolor:red;\nwidth:100px;\n}");
    }

    #[test]
    fn test_pseudo_class_nesting() {
        let style = StyleObject::new()
            .with("color", "red")
            .with("&:hover", StyleObject::new().with("color", "blue"));
        assert!(style.has_pseudo_or_nested());
        let rules = generate_style_content(".x", &style);
        assert_eq!(rules.len(), 2);
        assert!(rules[1].starts_with(".x:hover {"));
        assert!(rules[1].contains("color:blue;"));
    }

    #[test]
    fn test_descendant_selector_nesting() {
        let style = StyleObject::new().with("li", StyleObject::new().with("margin", 4));
        let rules = generate_style_content(".x", &style);
        assert_eq!(rules[0], ".x li {\nmargin:4px;\n}");
    }

    #[test]
    fn test_at_rule_wrapping() {
        let style = StyleObject::new().with(
            "@media (max-width: 600px)",
            StyleObject::new().with("display", "none"),
        );
        let rules = generate_style_content(".x", &style);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].starts_with("@media (max-width: 600px) {"));
        assert!(rules[0].contains(".x {\ndisplay:none;\n}"));
    }

    #[test]
    fn test_keyframes_synthesis() {
        reset_animation_names();
        let style = StyleObject::new()
            .with(
                "@keyframes",
                StyleObject::new()
                    .with("from", StyleObject::new().with("opacity", 0.0))
                    .with("to", StyleObject::new().with("opacity", 1.0)),
            )
            .with("animation", "@self 1s ease-in");
        assert!(style.has_keyframes());

        let rules = generate_style_content(".x", &style);
        assert_eq!(rules.len(), 2);
        assert!(rules[0].starts_with("@keyframes animation-gen0 {"));
        assert!(rules[0].contains("from {\nopacity:0;\n}"));
        assert!(rules[1].contains("animation:animation-gen0 1s ease-in;"));
    }

    #[test]
    fn test_separate_splits_nested_from_plain() {
        let style = StyleObject::new()
            .with("width", 10)
            .with("&:hover", StyleObject::new().with("width", 20));
        let (plain, nested) = style.separate();
        assert_eq!(plain.unwrap().keys().collect::<Vec<_>>(), vec!["width"]);
        assert_eq!(nested.unwrap().keys().collect::<Vec<_>>(), vec!["&:hover"]);
    }

    #[test]
    fn test_steps_value() {
        let value = StyleValue::Steps(vec![
            StyleObject::new().with("opacity", 0.0),
            StyleObject::new().with("opacity", 1.0).with("transition", "opacity 0.3s"),
        ]);
        assert_eq!(value.steps().len(), 2);
        assert!(value.any_transition());
        assert!(value.needs_style_engine());
    }

    #[test]
    fn test_merged_later_wins() {
        let merged = StyleObject::merged(&[
            StyleObject::new().with("width", 10).with("color", "red"),
            StyleObject::new().with("width", 20),
        ]);
        assert_eq!(merged.get("width"), Some(&StyleEntry::Num(20.0)));
        assert_eq!(merged.get("color"), Some(&StyleEntry::Str("red".to_string())));
    }
}
