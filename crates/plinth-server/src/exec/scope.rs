//! Isolated module scope for handler execution.
//!
//! Handler modules see only what the scope exposes: the environment map and
//! the client-env filter. There is no ambient filesystem or network access;
//! anything else arrives through the injected collaborators.

use std::collections::{BTreeMap, HashMap};

/// Execution scope handed to the module loader.
#[derive(Debug, Clone)]
pub struct ModuleScope {
    env: HashMap<String, String>,
    public_prefix: String,
}

impl ModuleScope {
    /// Create a scope over the given environment.
    pub fn new(env: HashMap<String, String>, public_prefix: impl Into<String>) -> Self {
        Self {
            env,
            public_prefix: public_prefix.into(),
        }
    }

    /// Full environment, visible to server-side handler code only.
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// One environment variable.
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// The subset of the environment that may reach the client: only names
    /// starting with the public prefix, sorted for stable serialization.
    pub fn client_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter(|(name, _)| name.starts_with(&self.public_prefix))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Script that installs the client-visible environment as a `process`
    /// shim. Server-only variables never appear here.
    pub fn client_env_script(&self) -> String {
        let env = serde_json::to_string(&self.client_env())
            .unwrap_or_else(|_| "{}".to_string());
        format!("globalThis.process = globalThis.process || {{}};\nglobalThis.process.env = {env};\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ModuleScope {
        let mut env = HashMap::new();
        env.insert("NEXT_PUBLIC_API_URL".to_string(), "https://api".to_string());
        env.insert("NEXT_PUBLIC_FLAG".to_string(), "on".to_string());
        env.insert("DATABASE_URL".to_string(), "postgres://secret".to_string());
        ModuleScope::new(env, "NEXT_PUBLIC_")
    }

    #[test]
    fn client_env_filters_by_prefix() {
        let client = scope().client_env();
        assert_eq!(client.len(), 2);
        assert!(client.contains_key("NEXT_PUBLIC_API_URL"));
        assert!(!client.contains_key("DATABASE_URL"));
    }

    #[test]
    fn server_side_env_is_unfiltered() {
        let scope = scope();
        assert_eq!(scope.env_var("DATABASE_URL"), Some("postgres://secret"));
    }

    #[test]
    fn client_env_script_never_leaks_private_vars() {
        let script = scope().client_env_script();
        assert!(script.contains("NEXT_PUBLIC_API_URL"));
        assert!(!script.contains("DATABASE_URL"));
        assert!(!script.contains("postgres://secret"));
    }
}
