use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use wavecore::{Manifest, RegistryError, Unit, UnitError, UnitId, UnitSpec};

/// Fixed set of units for a run, in registration order
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: Vec<Arc<dyn Unit>>,
    index: HashMap<UnitId, usize>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from units, rejecting duplicate ids
    pub fn from_units<I>(units: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn Unit>>,
    {
        let mut registry = Self::new();
        for unit in units {
            registry.register(unit)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, unit: Arc<dyn Unit>) -> Result<(), RegistryError> {
        let id = unit.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateUnit(id));
        }
        tracing::debug!(unit_id = %id, dependencies = ?unit.dependencies(), "Registering unit");
        self.index.insert(id, self.units.len());
        self.units.push(unit);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Unit>> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn dependencies(&self, id: &str) -> Option<&[UnitId]> {
        self.get(id).map(|u| u.dependencies())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Unit>> {
        self.units.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.id())
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.units.iter().map(|u| (u.id(), u.dependencies())))
            .finish()
    }
}

/// Factory trait for creating units from manifest entries
pub trait UnitFactory: Send + Sync {
    /// Create a unit for the given manifest entry
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError>;

    /// Unit type identifier (e.g. "text.keywords")
    fn unit_type(&self) -> &str;

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata::default()
    }
}

/// Metadata about a unit type
#[derive(Debug, Clone)]
pub struct UnitMetadata {
    pub description: String,
    pub category: String,
    pub config: Vec<ConfigField>,
}

impl Default for UnitMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            config: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigField {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ConfigField {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Catalog of available unit types
#[derive(Default)]
pub struct UnitCatalog {
    factories: HashMap<String, Arc<dyn UnitFactory>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn UnitFactory>) {
        let unit_type = factory.unit_type().to_string();
        tracing::info!("Registering unit type: {}", unit_type);
        self.factories.insert(unit_type, factory);
    }

    /// Create a unit instance from a manifest entry
    pub fn create_unit(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, RegistryError> {
        let factory = self
            .factories
            .get(&spec.unit_type)
            .ok_or_else(|| RegistryError::UnknownUnitType(spec.unit_type.clone()))?;

        factory.create(spec).map_err(|source| RegistryError::Creation {
            unit: spec.id.clone(),
            source,
        })
    }

    /// Instantiate every unit of a manifest into a registry
    pub fn build_registry(&self, manifest: &Manifest) -> Result<UnitRegistry, RegistryError> {
        let mut registry = UnitRegistry::new();
        for spec in &manifest.units {
            registry.register(self.create_unit(spec)?)?;
        }
        Ok(registry)
    }

    /// Registered unit types, sorted
    pub fn list_unit_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, unit_type: &str) -> Option<UnitMetadata> {
        self.factories.get(unit_type).map(|f| f.metadata())
    }
}
