//! Preserve-container predicates.
//!
//! Some sites carry fixed/floating action widgets (call buttons, WhatsApp
//! bubbles, footer contact bars) whose references must survive every removal
//! policy: they are passed through with wrapper-unwrapping only, never
//! neutralized. Each known container is a named, independently testable
//! predicate so the open-ended heuristic set stays out of the core rewrite
//! logic.

/// One preserve-container heuristic.
#[derive(Debug, Clone, Copy)]
pub struct PreserveContainer {
    /// Stable name for logs and tests.
    pub name: &'static str,
    id_fragment: Option<&'static str>,
    class_fragment: Option<&'static str>,
}

impl PreserveContainer {
    /// Whether an element with these id/class attributes is this container.
    #[must_use]
    pub fn matches(&self, id: Option<&str>, class: Option<&str>) -> bool {
        if let (Some(fragment), Some(id)) = (self.id_fragment, id)
            && id.to_lowercase().contains(fragment)
        {
            return true;
        }
        if let (Some(fragment), Some(class)) = (self.class_fragment, class)
            && class.to_lowercase().contains(fragment)
        {
            return true;
        }
        false
    }
}

/// The registered preserve containers.
pub const PRESERVE_CONTAINERS: &[PreserveContainer] = &[
    PreserveContainer {
        name: "footer_contact_widget",
        id_fragment: Some("sp-footeredu"),
        class_fragment: None,
    },
    PreserveContainer {
        name: "floating_button_group",
        id_fragment: None,
        class_fragment: Some("botonesflotantes"),
    },
];

/// Whether any registered container matches.
#[must_use]
pub fn is_preserve_container(id: Option<&str>, class: Option<&str>) -> bool {
    PRESERVE_CONTAINERS
        .iter()
        .any(|container| container.matches(id, class))
}
