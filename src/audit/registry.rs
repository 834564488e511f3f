//! Per-entity audit registration.
//!
//! The registry is assembled once at startup and never changes afterwards; it is
//! shared behind an `Arc` and exposes no mutating methods.

use std::collections::HashMap;

use crate::config::AuditConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRegistration {
    pub table: String,
    /// Table name written to the ledger.
    pub audit_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AuditRegistry {
    entries: HashMap<String, EntityRegistration>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, EntityRegistration>,
}

impl RegistryBuilder {
    /// Registers an audited entity. A later registration of the same table replaces the earlier one.
    pub fn audited(mut self, table: &str, audit_name: Option<&str>) -> Self {
        self.insert(table, audit_name, true);
        self
    }

    /// Registers an entity whose mutations are never audited.
    pub fn unaudited(mut self, table: &str) -> Self {
        self.insert(table, None, false);
        self
    }

    fn insert(&mut self, table: &str, audit_name: Option<&str>, enabled: bool) {
        let registration = EntityRegistration {
            table: table.to_string(),
            audit_name: audit_name.unwrap_or(table).to_string(),
            enabled,
        };
        self.entries.insert(table.to_string(), registration);
    }

    pub fn build(self) -> AuditRegistry {
        AuditRegistry { entries: self.entries }
    }
}

impl AuditRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn from_config(cfg: &AuditConfig) -> Self {
        cfg.entities
            .iter()
            .fold(Self::builder(), |b, e| {
                if e.enabled {
                    b.audited(&e.table, e.audit_name.as_deref())
                } else {
                    b.unaudited(&e.table)
                }
            })
            .build()
    }

    pub fn get(&self, table: &str) -> Option<&EntityRegistration> {
        self.entries.get(table)
    }

    pub fn is_registered(&self, table: &str) -> bool {
        self.entries.contains_key(table)
    }

    /// Unregistered tables are not audited.
    pub fn is_enabled(&self, table: &str) -> bool {
        self.entries.get(table).is_some_and(|e| e.enabled)
    }

    /// Registered entities, and how many of them are audited.
    pub fn counts(&self) -> (usize, usize) {
        let audited = self.entries.values().filter(|e| e.enabled).count();
        (self.entries.len(), audited)
    }
}
