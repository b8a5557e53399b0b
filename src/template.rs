//! Templated datasource expressions
//!
//! Datasource fields may contain `${path}` expressions that are resolved
//! against the component being monitored. Supported paths:
//!
//! - `here/id` - the component id (falls back to the device id)
//! - `here/<prop>` - a component property
//! - `dev/id`, `device/id` - the device id
//! - `dev/<prop>`, `device/<prop>` - a device property
//!
//! Resolution is explicit: callers pass a [`TemplateContext`] every time.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::datasource::ConfigError;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([^}]*?)\s*\}").unwrap_or_else(|e| panic!("invalid template pattern: {e}"))
});

/// Values available to template expressions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub device_id: String,
    pub component_id: Option<String>,
    pub component_properties: BTreeMap<String, String>,
    pub device_properties: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    pub fn with_component(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }

    pub fn with_component_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.component_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_device_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.device_properties.insert(key.into(), value.into());
        self
    }

    fn lookup(&self, path: &str) -> Option<&str> {
        let (root, attribute) = path.split_once('/')?;

        match (root, attribute) {
            ("here", "id") => Some(self.component_id.as_deref().unwrap_or(&self.device_id)),
            ("here", prop) => self.component_properties.get(prop).map(String::as_str),
            ("dev" | "device", "id") => Some(&self.device_id),
            ("dev" | "device", prop) => self.device_properties.get(prop).map(String::as_str),
            _ => None,
        }
    }
}

/// Substitute every `${...}` expression in `expression`.
///
/// Plain strings are returned unchanged.
pub fn resolve(expression: &str, context: &TemplateContext) -> Result<String, ConfigError> {
    let mut unresolved = None;

    let resolved = EXPRESSION.replace_all(expression, |caps: &Captures| {
        let path = &caps[1];
        match context.lookup(path) {
            Some(value) => value.to_string(),
            None => {
                unresolved.get_or_insert_with(|| caps[0].to_string());
                String::new()
            }
        }
    });

    match unresolved {
        Some(expression) => Err(ConfigError::UnresolvedTemplate { expression }),
        None => Ok(resolved.into_owned()),
    }
}
