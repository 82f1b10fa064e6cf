//! Module export objects

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Renders a component's markup from its props
pub type RenderFn = dyn Fn(&Value) -> String + Send + Sync;

/// A component class exported by a module
#[derive(Clone)]
pub struct ComponentClass {
    /// Exported class name
    pub name: String,
    /// Module that defined the class, stamped at publication
    pub factory: Option<String>,
    render: Arc<RenderFn>,
}

impl ComponentClass {
    /// Create an unstamped component class
    pub fn new(name: impl Into<String>, render: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            factory: None,
            render: Arc::new(render),
        }
    }

    /// Render markup for `props`
    pub fn render(&self, props: &Value) -> String {
        (self.render)(props)
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

/// One exported binding
#[derive(Debug, Clone)]
pub enum ExportValue {
    /// Plain data
    Value(Value),
    /// A component class
    Component(ComponentClass),
}

impl From<Value> for ExportValue {
    fn from(value: Value) -> Self {
        ExportValue::Value(value)
    }
}

impl From<ComponentClass> for ExportValue {
    fn from(class: ComponentClass) -> Self {
        ExportValue::Component(class)
    }
}

/// The published exports of one module, in definition order
#[derive(Debug, Clone, Default)]
pub struct Exports {
    entries: IndexMap<String, ExportValue>,
}

impl Exports {
    /// Create an empty export object
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a binding
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ExportValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look a binding up
    pub fn get(&self, name: &str) -> Option<&ExportValue> {
        self.entries.get(name)
    }

    /// Look a plain-data binding up
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name)? {
            ExportValue::Value(value) => Some(value),
            ExportValue::Component(_) => None,
        }
    }

    /// Look a component binding up
    pub fn component(&self, name: &str) -> Option<&ComponentClass> {
        match self.entries.get(name)? {
            ExportValue::Component(class) => Some(class),
            ExportValue::Value(_) => None,
        }
    }

    /// All bindings, in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is exported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `module` as the factory of every exported component
    pub(crate) fn stamp(&mut self, module: &str) {
        for value in self.entries.values_mut() {
            if let ExportValue::Component(class) = value {
                class.factory = Some(module.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_lookups() {
        let mut exports = Exports::new();
        exports.insert("answer", json!(42));
        exports.insert("Card", ComponentClass::new("Card", |props| format!("<div>{}</div>", props["title"])));

        assert_eq!(exports.value("answer"), Some(&json!(42)));
        assert!(exports.component("answer").is_none());
        assert_eq!(exports.component("Card").unwrap().render(&json!({"title": "hi"})), "<div>\"hi\"</div>");
        assert_eq!(exports.len(), 2);
    }

    #[test]
    fn test_stamp_marks_components_only() {
        let mut exports = Exports::new();
        exports.insert("Card", ComponentClass::new("Card", |_| String::new()));
        exports.insert("data", json!([1, 2]));
        exports.stamp("app/ui/card");

        assert_eq!(exports.component("Card").unwrap().factory.as_deref(), Some("app/ui/card"));
        assert_eq!(exports.value("data"), Some(&json!([1, 2])));
    }
}
