//! Answerable-field counting over rendered markup

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static FORM_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(input|textarea|select)\b([^>]*)>").expect("valid control regex")
});
static NAME_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bname="([^"]*)""#).expect("valid name regex"));
static ID_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid="([^"]*)""#).expect("valid id regex"));
static TYPE_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\btype="([^"]*)""#).expect("valid type regex"));

/// Number of distinct named controls, not counting submit and hidden ones
pub fn count_fields(markup: &str) -> usize {
    let mut names = BTreeSet::new();
    for control in FORM_CONTROL.captures_iter(markup) {
        let attributes = &control[2];
        let control_type = TYPE_ATTRIBUTE
            .captures(attributes)
            .map(|c| c[1].to_ascii_lowercase());
        if matches!(control_type.as_deref(), Some("submit" | "hidden" | "button")) {
            continue;
        }
        let key = NAME_ATTRIBUTE
            .captures(attributes)
            .or_else(|| ID_ATTRIBUTE.captures(attributes))
            .map(|c| c[1].to_string());
        if let Some(key) = key {
            names.insert(key);
        }
    }
    names.len()
}
