//! Aggregation of everything the project's components declare they need.
//!
//! Each category keeps one string set per requesting component type, so an
//! identifier is unique within a type but may legitimately repeat across
//! types; consumers deduplicate at read time. The only removals are the
//! explicit archive claim and the companion permission stripping performed
//! during manifest synthesis.

use std::collections::{BTreeMap, BTreeSet};

/// Typed value of one permission-constraint attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintValue {
    Number(u32),
    Flags(BTreeSet<String>),
}

impl ConstraintValue {
    pub fn flags<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConstraintValue::Flags(values.into_iter().map(Into::into).collect())
    }
}

/// A `(permission, attribute, value)` triple contributed by one component.
/// Constraints sharing a `(permission, attribute)` pair are combined by an
/// attribute-specific reducer before the manifest is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionConstraint {
    pub permission: String,
    pub attribute: String,
    pub value: ConstraintValue,
}

type TypeSets = BTreeMap<String, BTreeSet<String>>;

fn insert(sets: &mut TypeSets, component: &str, value: impl Into<String>) {
    sets.entry(component.to_string())
        .or_default()
        .insert(value.into());
}

fn union(sets: &TypeSets) -> BTreeSet<&str> {
    sets.values()
        .flat_map(|set| set.iter().map(String::as_str))
        .collect()
}

/// Mutable per-build aggregate of component and extension requirements.
#[derive(Debug, Default)]
pub struct ComponentRequirements {
    permissions: TypeSets,
    libraries: TypeSets,
    native_libraries: TypeSets,
    assets: TypeSets,
    broadcast_receivers: TypeSets,
    services: TypeSets,
    content_providers: TypeSets,
    metadata: TypeSets,
    queries: TypeSets,
    /// Resource file path (e.g. `values/colors.xml`) to raw XML snippet.
    custom_resources: BTreeMap<String, String>,
    min_sdks: BTreeMap<String, u32>,
    constraints: Vec<PermissionConstraint>,
}

impl ComponentRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_permission(&mut self, component: &str, permission: impl Into<String>) {
        insert(&mut self.permissions, component, permission);
    }

    pub fn add_library(&mut self, component: &str, library: impl Into<String>) {
        insert(&mut self.libraries, component, library);
    }

    pub fn add_native_library(&mut self, component: &str, library: impl Into<String>) {
        insert(&mut self.native_libraries, component, library);
    }

    pub fn add_asset(&mut self, component: &str, asset: impl Into<String>) {
        insert(&mut self.assets, component, asset);
    }

    pub fn add_broadcast_receiver(&mut self, component: &str, receiver: impl Into<String>) {
        insert(&mut self.broadcast_receivers, component, receiver);
    }

    pub fn add_service(&mut self, component: &str, service: impl Into<String>) {
        insert(&mut self.services, component, service);
    }

    pub fn add_content_provider(&mut self, component: &str, provider: impl Into<String>) {
        insert(&mut self.content_providers, component, provider);
    }

    pub fn add_metadata(&mut self, component: &str, entry: impl Into<String>) {
        insert(&mut self.metadata, component, entry);
    }

    pub fn add_query(&mut self, component: &str, package: impl Into<String>) {
        insert(&mut self.queries, component, package);
    }

    /// Register a custom resource snippet to be written into the resource
    /// tree before merging. The last writer for a given path wins.
    pub fn add_custom_resource(&mut self, path: impl Into<String>, xml: impl Into<String>) {
        self.custom_resources.insert(path.into(), xml.into());
    }

    /// Record the minimum platform level one component requires.
    pub fn add_min_sdk(&mut self, component: &str, min_sdk: u32) {
        let entry = self.min_sdks.entry(component.to_string()).or_insert(min_sdk);
        *entry = (*entry).max(min_sdk);
    }

    pub fn add_permission_constraint(&mut self, constraint: PermissionConstraint) {
        self.constraints.push(constraint);
    }

    /// Deduplicated union of all declared permissions.
    pub fn permissions(&self) -> BTreeSet<&str> {
        union(&self.permissions)
    }

    /// All declared libraries with their requesting component type, in
    /// deterministic (type, name) order. Duplicate names across types are
    /// preserved here; classpath assembly dedups while keeping first wins.
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.libraries
            .iter()
            .flat_map(|(ty, set)| set.iter().map(move |name| (ty.as_str(), name.as_str())))
    }

    pub fn native_libraries(&self) -> BTreeSet<&str> {
        union(&self.native_libraries)
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assets
            .iter()
            .flat_map(|(ty, set)| set.iter().map(move |name| (ty.as_str(), name.as_str())))
    }

    pub fn broadcast_receivers(&self) -> BTreeSet<&str> {
        union(&self.broadcast_receivers)
    }

    pub fn services(&self) -> BTreeSet<&str> {
        union(&self.services)
    }

    pub fn content_providers(&self) -> BTreeSet<&str> {
        union(&self.content_providers)
    }

    pub fn metadata(&self) -> BTreeSet<&str> {
        union(&self.metadata)
    }

    pub fn queries(&self) -> BTreeSet<&str> {
        union(&self.queries)
    }

    pub fn custom_resources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_resources
            .iter()
            .map(|(path, xml)| (path.as_str(), xml.as_str()))
    }

    pub fn constraints(&self) -> &[PermissionConstraint] {
        &self.constraints
    }

    /// Maximum of the project's declared minimum and every component's.
    pub fn effective_min_sdk(&self, project_min: u32) -> u32 {
        self.min_sdks
            .values()
            .copied()
            .fold(project_min, u32::max)
    }

    /// Claim every library whose name ends in `suffix`, removing it from the
    /// generic library set. Each claimed name appears once in the result even
    /// when several component types requested it; an already-claimed item is
    /// never handed out again within the build.
    pub fn claim_archive_libraries(&mut self, suffix: &str) -> Vec<String> {
        let mut claimed = Vec::new();
        let mut seen = BTreeSet::new();

        for set in self.libraries.values_mut() {
            let archives: Vec<String> = set
                .iter()
                .filter(|name| name.ends_with(suffix))
                .cloned()
                .collect();

            for name in archives {
                set.remove(&name);
                if seen.insert(name.clone()) {
                    claimed.push(name);
                }
            }
        }

        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_unique_per_type_but_repeat_across_types() {
        let mut reqs = ComponentRequirements::new();
        reqs.add_permission("Texting", "android.permission.SEND_SMS");
        reqs.add_permission("Texting", "android.permission.SEND_SMS");
        reqs.add_permission("PhoneCall", "android.permission.SEND_SMS");

        assert_eq!(reqs.permissions().len(), 1);
        assert_eq!(reqs.permissions.len(), 2);
    }

    #[test]
    fn claim_removes_archives_and_dedups_across_types() {
        let mut reqs = ComponentRequirements::new();
        reqs.add_library("Map", "osmdroid.aar");
        reqs.add_library("Navigation", "osmdroid.aar");
        reqs.add_library("Map", "geometry.jar");

        let claimed = reqs.claim_archive_libraries(".aar");
        assert_eq!(claimed, vec!["osmdroid.aar".to_string()]);

        // Archives are gone from the generic set, plain jars stay.
        let remaining: Vec<_> = reqs.libraries().collect();
        assert_eq!(remaining, vec![("Map", "geometry.jar")]);

        // Second claim finds nothing.
        assert!(reqs.claim_archive_libraries(".aar").is_empty());
    }

    #[test]
    fn effective_min_sdk_is_max_of_all() {
        let mut reqs = ComponentRequirements::new();
        reqs.add_min_sdk("Bluetooth", 21);
        reqs.add_min_sdk("WebViewer", 19);

        assert_eq!(reqs.effective_min_sdk(7), 21);
        assert_eq!(reqs.effective_min_sdk(30), 30);
    }
}
