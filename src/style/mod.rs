//! Style engine - nested style objects, CSS generation, staged updates.

pub mod manager;
pub mod object;

pub use manager::{
    get_sheet, has_animation, reset_style_state, sheet_count, style_sheet_id,
    transition_properties, update, StyleSheet,
};
pub use object::{
    generate_style_content, inline_declarations, kebab, reset_animation_names,
    stringify_declarations, stringify_style_value, StyleEntry, StyleObject, StyleValue,
};
