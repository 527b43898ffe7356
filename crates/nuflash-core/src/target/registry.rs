//! Target lookup by name or identity

use super::{ChipFamily, DeviceId, TargetDefinition, N76E003};
use crate::error::{Error, Result};

/// Targets compiled into the binary
static BUILTIN_TARGETS: &[TargetDefinition] = &[N76E003];

/// Immutable set of target definitions
///
/// Names are unique ignoring case and so are `(family, device id)` pairs.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<TargetDefinition>,
}

impl TargetRegistry {
    /// Registry of the built-in targets
    pub fn builtin() -> Self {
        Self {
            targets: BUILTIN_TARGETS.to_vec(),
        }
    }

    /// Build a registry, rejecting duplicate names or identities
    pub fn from_definitions<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = TargetDefinition>,
    {
        let mut targets: Vec<TargetDefinition> = Vec::new();
        for def in definitions {
            if targets.iter().any(|t| t.name.eq_ignore_ascii_case(def.name)) {
                return Err(Error::DuplicateTarget(format!(
                    "name '{}' registered twice",
                    def.name
                )));
            }
            if targets
                .iter()
                .any(|t| t.family == def.family && t.device_id == def.device_id)
            {
                return Err(Error::DuplicateTarget(format!(
                    "ID {}:{} registered twice",
                    def.family, def.device_id
                )));
            }
            targets.push(def);
        }
        Ok(Self { targets })
    }

    /// Find a target by name, ignoring case
    pub fn by_name(&self, name: &str) -> Option<&TargetDefinition> {
        self.targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Find a target by name, or fail with [`Error::UnknownTarget`]
    pub fn require(&self, name: &str) -> Result<&TargetDefinition> {
        self.by_name(name)
            .ok_or_else(|| Error::UnknownTarget(name.to_string()))
    }

    /// Find a target by chip family and device ID
    pub fn by_id(&self, family: ChipFamily, device_id: DeviceId) -> Option<&TargetDefinition> {
        self.targets
            .iter()
            .find(|t| t.family == family && t.device_id == device_id)
    }

    /// All targets in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.targets.iter()
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_consistent() {
        let checked = TargetRegistry::from_definitions(BUILTIN_TARGETS.iter().cloned()).unwrap();
        assert_eq!(checked.len(), TargetRegistry::builtin().len());
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let registry = TargetRegistry::builtin();
        assert_eq!(registry.by_name("n76e003").unwrap().name, "N76E003");
        assert_eq!(registry.by_name("N76E003").unwrap().device_id, DeviceId::N76E003);
        assert!(registry.by_name("N76E616").is_none());
        assert!(matches!(
            registry.require("N76E616"),
            Err(Error::UnknownTarget(name)) if name == "N76E616"
        ));
    }

    #[test]
    fn test_lookup_by_id() {
        let registry = TargetRegistry::builtin();
        let target = registry
            .by_id(ChipFamily::N76E003, DeviceId::N76E003)
            .unwrap();
        assert_eq!(target.program_memory_size, 12 * 1024);
        assert!(registry.by_id(ChipFamily(0x321), DeviceId::N76E003).is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut other = N76E003;
        other.name = "n76E003";
        other.device_id = DeviceId(0x1234);
        assert!(matches!(
            TargetRegistry::from_definitions([N76E003, other]),
            Err(Error::DuplicateTarget(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut other = N76E003;
        other.name = "N76E003-clone";
        assert!(matches!(
            TargetRegistry::from_definitions([N76E003, other]),
            Err(Error::DuplicateTarget(_))
        ));
    }

    #[test]
    fn test_distinct_targets_accepted() {
        let mut other = N76E003;
        other.name = "N76E885";
        other.device_id = DeviceId(0x2150);
        let registry = TargetRegistry::from_definitions([N76E003, other]).unwrap();
        assert_eq!(registry.iter().count(), 2);
    }
}
