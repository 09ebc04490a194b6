//! Resolved route parameters.

use indexmap::IndexMap;
use serde::Serialize;

/// A single bound parameter value.
///
/// Dynamic segments bind one string; catch-all segments bind the ordered
/// list of segments they consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Bound by a `[name]` segment
    Single(String),
    /// Bound by a `[...name]` or `[[...name]]` segment
    Many(Vec<String>),
}

impl ParamValue {
    /// The single bound string, if this is a dynamic binding.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s),
            Self::Many(_) => None,
        }
    }

    /// The bound segment list, if this is a catch-all binding.
    pub fn as_many(&self) -> Option<&[String]> {
        match self {
            Self::Single(_) => None,
            Self::Many(v) => Some(v),
        }
    }
}

/// Ordered mapping from parameter name to bound value.
///
/// Insertion order follows descent order through the route tree, so outer
/// parameters come before inner ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteParams {
    entries: IndexMap<String, ParamValue>,
}

impl RouteParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a parameter, overwriting any previous binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.insert(name.into(), value);
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.get(name)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate bindings in descent order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_descent_order() {
        let mut params = RouteParams::new();
        params.insert("team", ParamValue::Single("acme".into()));
        params.insert("slug", ParamValue::Many(vec!["a".into(), "b".into()]));

        let names: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["team", "slug"]);
    }

    #[test]
    fn serializes_single_and_many_untagged() {
        let mut params = RouteParams::new();
        params.insert("id", ParamValue::Single("7".into()));
        params.insert("rest", ParamValue::Many(vec!["x".into(), "y".into()]));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["rest"][1], "y");
    }
}
