//! Stylesheet registry - generated ids, staged updates, transition lookup.
//!
//! Process-scoped (thread-local) cache of generated stylesheets. Static
//! style sources at the same structural tree position share one sheet
//! across instances; reactive sources get a private per-element sheet.
//! Entries are never evicted; [`reset_style_state`] exists for tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::dom::Node;
use crate::host::HostPathEntry;
use crate::schedule::{next_frames, FrameCallback};
use crate::style::object::{
    generate_style_content, inline_declarations, reset_animation_names, StyleValue,
};

struct StyleSheetData {
    rules: RefCell<Vec<String>>,
}

/// A generated stylesheet. Cheap to clone; rule text is shared.
#[derive(Clone)]
pub struct StyleSheet {
    data: Rc<StyleSheetData>,
}

impl StyleSheet {
    fn new() -> Self {
        StyleSheet {
            data: Rc::new(StyleSheetData {
                rules: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Replace the whole rule set.
    pub fn replace(&self, rules: Vec<String>) {
        *self.data.rules.borrow_mut() = rules;
    }

    /// Append one rule.
    pub fn insert_rule(&self, rule: String) {
        self.data.rules.borrow_mut().push(rule);
    }

    pub fn rules(&self) -> Vec<String> {
        self.data.rules.borrow().clone()
    }

    pub fn text(&self) -> String {
        self.data.rules.borrow().join("\n")
    }
}

thread_local! {
    static SHEETS: RefCell<HashMap<String, StyleSheet>> = RefCell::new(HashMap::new());
    static ELEMENT_IDS: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

/// Derive the stylesheet id for a style source.
///
/// A static source shares its id with every instance at the same structural
/// position (host path + element path). A reactive source gets a private id
/// keyed by the live element, remembered for that element's lifetime.
pub fn style_sheet_id(
    host_path: &[HostPathEntry],
    element_path: &[usize],
    reactive_el: Option<&Node>,
) -> String {
    if let Some(el) = reactive_el {
        return ELEMENT_IDS.with(|ids| {
            ids.borrow_mut()
                .entry(el.id())
                .or_insert_with(|| format!("gen-el{}", el.id()))
                .clone()
        });
    }
    let ancestry = host_path
        .iter()
        .map(|entry| {
            let position = entry
                .element_path
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("_");
            match &entry.component {
                Some(name) => format!("{name}{position}"),
                None => position,
            }
        })
        .collect::<Vec<_>>()
        .join("-");
    let position = element_path
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("_");
    format!("gen-{ancestry}-{position}")
}

fn sheet_entry(id: &str) -> StyleSheet {
    SHEETS.with(|sheets| {
        sheets
            .borrow_mut()
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(sheet = %id, "creating stylesheet");
                StyleSheet::new()
            })
            .clone()
    })
}

/// Look up a generated stylesheet by id.
pub fn get_sheet(id: &str) -> Option<StyleSheet> {
    SHEETS.with(|sheets| sheets.borrow().get(id).cloned())
}

/// Number of live generated stylesheets.
pub fn sheet_count() -> usize {
    SHEETS.with(|sheets| sheets.borrow().len())
}

/// Apply a style value to `el`.
///
/// Step 0 replaces the sheet's rules synchronously, forcing a reflow when
/// the step declares a transition. Later steps run one per animation
/// frame: the nested portion goes through rule insertion, the plain
/// portion through the style attribute (which arms transitions more
/// reliably), reflowing after any transition step. `done` fires once every
/// step has been applied; with a single step that is synchronous.
pub fn update(
    host_path: &[HostPathEntry],
    element_path: &[usize],
    value: &StyleValue,
    el: &Node,
    is_static: bool,
    done: Box<dyn FnOnce()>,
) {
    let steps = value.steps();
    if steps.is_empty() {
        done();
        return;
    }

    let id = style_sheet_id(host_path, element_path, if is_static { None } else { Some(el) });
    let sheet = sheet_entry(&id);
    let selector = format!(".{id}");
    el.add_class(&id);

    sheet.replace(generate_style_content(&selector, &steps[0]));
    if steps[0].has_transition() {
        el.force_reflow();
    }

    let staged: Vec<FrameCallback> = steps[1..]
        .iter()
        .cloned()
        .map(|step| {
            let el = el.clone();
            let sheet = sheet.clone();
            let selector = selector.clone();
            Box::new(move |_time: u64| {
                let (plain, nested) = step.separate();
                if let Some(nested) = nested {
                    for rule in generate_style_content(&selector, &nested) {
                        sheet.insert_rule(rule);
                    }
                }
                if let Some(plain) = plain {
                    el.set_attribute("style", &inline_declarations(&plain));
                }
                if step.has_transition() {
                    el.force_reflow();
                }
            }) as FrameCallback
        })
        .collect();
    next_frames(staged, move || done());
}

fn declaration_values(text: &str, property: &str) -> Vec<String> {
    let needle = format!("{property}:");
    let mut values = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find(&needle) {
        // Skip longer property names sharing the prefix.
        let before = &rest[..at];
        let boundary = before
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_alphanumeric() && c != '-')
            .unwrap_or(true);
        let after = &rest[at + needle.len()..];
        if boundary {
            let value = after.split([';', '}', '\n']).next().unwrap_or("").trim();
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
        rest = after;
    }
    values
}

fn element_style_text(el: &Node) -> String {
    let mut text = el.get_attribute("style").unwrap_or_default();
    if let Some(classes) = el.get_attribute("class") {
        for class in classes.split_whitespace() {
            if let Some(sheet) = get_sheet(class) {
                text.push('\n');
                text.push_str(&sheet.text());
            }
        }
    }
    text
}

/// Properties named by `transition` declarations affecting `el`, gathered
/// from its inline style and its generated sheets. Computed-style stand-in
/// for exit-animation detection.
pub fn transition_properties(el: &Node) -> Vec<String> {
    let text = element_style_text(el);
    let mut properties = Vec::new();
    for value in declaration_values(&text, "transition") {
        for segment in value.split(',') {
            if let Some(property) = segment.split_whitespace().next() {
                if !properties.iter().any(|p| p == property) {
                    properties.push(property.to_string());
                }
            }
        }
    }
    properties
}

/// Whether an `animation` declaration affects `el`.
pub fn has_animation(el: &Node) -> bool {
    !declaration_values(&element_style_text(el), "animation").is_empty()
}

/// Drop all generated sheets and element associations (for tests).
pub fn reset_style_state() {
    SHEETS.with(|sheets| sheets.borrow_mut().clear());
    ELEMENT_IDS.with(|ids| ids.borrow_mut().clear());
    reset_animation_names();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{advance_frame, pending_frames, reset_frames};
    use crate::style::object::StyleObject;
    use std::cell::Cell;

    fn path(component: Option<&str>, element_path: &[usize]) -> HostPathEntry {
        HostPathEntry {
            component: component.map(|c| c.to_string()),
            element_path: element_path.to_vec(),
        }
    }

    #[test]
    fn test_static_sources_share_an_id() {
        reset_style_state();
        let host_path = [path(Some("App"), &[0]), path(None, &[1, 2])];
        let a = style_sheet_id(&host_path, &[0, 1], None);
        let b = style_sheet_id(&host_path, &[0, 1], None);
        assert_eq!(a, b);
        assert_eq!(a, "gen-App0-1_2-0_1");
    }

    #[test]
    fn test_reactive_sources_get_private_ids() {
        reset_style_state();
        let host_path = [path(None, &[0])];
        let el1 = Node::element("div");
        let el2 = Node::element("div");
        let a = style_sheet_id(&host_path, &[0], Some(&el1));
        let b = style_sheet_id(&host_path, &[0], Some(&el2));
        assert_ne!(a, b);
        // Stable for one element.
        assert_eq!(a, style_sheet_id(&host_path, &[0], Some(&el1)));
    }

    #[test]
    fn test_single_step_applies_synchronously() {
        reset_style_state();
        reset_frames();
        let el = Node::element("div");
        let host_path = [path(None, &[0])];
        let done = Rc::new(Cell::new(false));
        let done_clone = done.clone();

        let value = StyleValue::Object(StyleObject::new().with("width", 100));
        update(&host_path, &[0], &value, &el, true, Box::new(move || done_clone.set(true)));

        assert!(done.get());
        assert_eq!(pending_frames(), 0);
        let id = style_sheet_id(&host_path, &[0], None);
        assert!(el.has_class(&id));
        assert!(get_sheet(&id).unwrap().text().contains("width:100px;"));
        assert_eq!(el.reflow_count(), 0);
    }

    #[test]
    fn test_transition_step_forces_reflow() {
        reset_style_state();
        reset_frames();
        let el = Node::element("div");
        let host_path = [path(None, &[0])];
        let value = StyleValue::Object(
            StyleObject::new().with("opacity", 0.0).with("transition", "opacity 0.3s"),
        );
        update(&host_path, &[0], &value, &el, true, Box::new(|| {}));
        assert_eq!(el.reflow_count(), 1);
    }

    #[test]
    fn test_multi_step_stages_across_frames() {
        reset_style_state();
        reset_frames();
        let el = Node::element("div");
        let host_path = [path(None, &[0])];
        let done = Rc::new(Cell::new(false));
        let done_clone = done.clone();

        let value = StyleValue::Steps(vec![
            StyleObject::new().with("opacity", 0.0),
            StyleObject::new()
                .with("opacity", 1.0)
                .with("transition", "opacity 0.3s")
                .with("&:hover", StyleObject::new().with("opacity", 0.5)),
        ]);
        update(&host_path, &[0], &value, &el, false, Box::new(move || done_clone.set(true)));

        // Step 0 applied, step 1 waiting for a frame.
        let id = style_sheet_id(&host_path, &[0], Some(&el));
        assert!(get_sheet(&id).unwrap().text().contains("opacity:0;"));
        assert!(!done.get());
        assert_eq!(pending_frames(), 1);

        advance_frame();
        assert!(done.get());
        assert_eq!(el.get_attribute("style").unwrap(), "opacity:1;transition:opacity 0.3s");
        assert!(get_sheet(&id).unwrap().text().contains(":hover"));
        assert_eq!(el.reflow_count(), 1, "reflow after the transition step");
    }

    #[test]
    fn test_transition_property_lookup() {
        reset_style_state();
        let el = Node::element("div");
        el.set_attribute("style", "transition:opacity 0.3s, width 1s;opacity:0");
        assert_eq!(transition_properties(&el), vec!["opacity", "width"]);
        assert!(!has_animation(&el));
    }

    #[test]
    fn test_transition_lookup_through_sheets() {
        reset_style_state();
        let el = Node::element("div");
        let host_path = [path(None, &[0])];
        let value = StyleValue::Object(
            StyleObject::new().with("transition", "height 1s"),
        );
        update(&host_path, &[0], &value, &el, true, Box::new(|| {}));
        assert_eq!(transition_properties(&el), vec!["height"]);
    }
}
