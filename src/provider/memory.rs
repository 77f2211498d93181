use std::collections::BTreeMap;

use super::{CursorProvider, ProviderError, Registration};
use crate::model::names;

/// One call made against a [`MemoryProvider`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Register(String),
    Unregister(String),
    SetScale(f32),
    UnregisterAllCore,
    ActivateCore(u32),
}

/// In-process registration table.
///
/// Stands in for the OS in tests and `--dry-run`: keeps a baseline of
/// "system" cursors, records every call and can be told to reject the Nth
/// registration.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    registered: BTreeMap<String, Registration>,
    system: BTreeMap<String, Registration>,
    scale: f32,
    calls: Vec<ProviderCall>,
    register_attempts: usize,
    fail_on: Option<usize>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            registered: BTreeMap::new(),
            system: BTreeMap::new(),
            scale: 1.0,
            calls: Vec::new(),
            register_attempts: 0,
            fail_on: None,
        }
    }

    /// Provider whose live table and baseline both hold `cursors`.
    pub fn with_system_cursors(cursors: impl IntoIterator<Item = (String, Registration)>) -> Self {
        let system: BTreeMap<_, _> = cursors.into_iter().collect();
        Self {
            registered: system.clone(),
            system,
            ..Self::new()
        }
    }

    /// Rejects the `n`th registration attempt from now on (1-based).
    pub fn fail_register_on(&mut self, n: usize) {
        self.register_attempts = 0;
        self.fail_on = Some(n);
    }

    pub fn registration(&self, name: &str) -> Option<&Registration> {
        self.registered.get(name)
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &str> {
        self.registered.keys().map(String::as_str)
    }

    pub fn calls(&self) -> &[ProviderCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn register_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ProviderCall::Register(_)))
            .count()
    }
}

impl CursorProvider for MemoryProvider {
    fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    fn register(&mut self, name: &str, registration: &Registration) -> Result<(), ProviderError> {
        self.register_attempts += 1;
        self.calls.push(ProviderCall::Register(name.to_string()));
        if self.fail_on == Some(self.register_attempts) {
            return Err(ProviderError::Rejected {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.registered.insert(name.to_string(), registration.clone());
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        self.calls.push(ProviderCall::Unregister(name.to_string()));
        self.registered.remove(name);
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn set_scale(&mut self, scale: f32) -> Result<(), ProviderError> {
        self.calls.push(ProviderCall::SetScale(scale));
        self.scale = scale;
        Ok(())
    }

    fn snapshot(&self, name: &str) -> Option<Registration> {
        self.registered.get(name).cloned()
    }

    fn unregister_all_core(&mut self) -> Result<(), ProviderError> {
        self.calls.push(ProviderCall::UnregisterAllCore);
        self.registered.retain(|name, _| !names::is_core_cursor(name));
        Ok(())
    }

    fn activate_core_cursor(&mut self, index: u32) -> Result<(), ProviderError> {
        self.calls.push(ProviderCall::ActivateCore(index));
        let name = names::core_cursor_identifier(index);
        if let Some(registration) = self.system.get(&name) {
            self.registered.insert(name, registration.clone());
        }
        Ok(())
    }
}
