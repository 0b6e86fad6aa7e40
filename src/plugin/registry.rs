use super::Plugin;
use crate::document::DocType;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no plugin registered for doctype {0}")]
    UnknownDoctype(DocType),
}

/// Registry mapping document types to the plugins that own them
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<DocType, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `plugin` for `doctype`; a later registration replaces an earlier one
    pub fn register(&mut self, doctype: DocType, plugin: Arc<dyn Plugin>) {
        if self.plugins.insert(doctype.clone(), plugin).is_some() {
            tracing::debug!("Replacing plugin for {}", doctype);
        }
    }

    /// Registers `plugin` under the doctype it reports
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.register(plugin.doctype(), plugin);
    }

    pub fn resolve(&self, doctype: &DocType) -> Result<Arc<dyn Plugin>, RegistryError> {
        self.plugins
            .get(doctype)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDoctype(doctype.clone()))
    }

    pub fn doctypes(&self) -> Vec<DocType> {
        self.plugins.keys().cloned().collect()
    }

    /// All registered plugins, in doctype order
    pub fn plugins(&self) -> impl Iterator<Item = (&DocType, &Arc<dyn Plugin>)> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
