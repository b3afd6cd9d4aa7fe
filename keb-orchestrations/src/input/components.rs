use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use keb_models::KymaComponent;
use serde::{Deserialize, Serialize};

use super::Error;

pub const KIALI: &str = "Kiali";
pub const TRACING: &str = "Tracing";
pub const BACKUP_INIT: &str = "BackupInit";
pub const BACKUP: &str = "Backup";
pub const KNATIVE_PROVISIONER_NATSS: &str = "KnativeProvisionerNatss";
pub const NATSS_STREAMING: &str = "NatssStreaming";

#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionalComponent {
    /// Kyma components removed when this optional component is disabled
    components: Vec<String>,
    /// Whether tenants may ask to keep it
    selectable: bool,
}

/// Registry of optional components and the Kyma components each one maps to.
///
/// Every registered optional component is disabled unless the tenant asked to
/// keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalComponents {
    registry: BTreeMap<String, OptionalComponent>,
}

impl Default for OptionalComponents {
    fn default() -> Self {
        Self::new()
            .with_selectable(KIALI, &["kiali"])
            .with_selectable(TRACING, &["tracing"])
            .with_internal(BACKUP_INIT, &["backup-init"])
            .with_internal(BACKUP, &["backup"])
            .with_internal(KNATIVE_PROVISIONER_NATSS, &["knative-provisioner-natss"])
            .with_internal(NATSS_STREAMING, &["nats-streaming"])
    }
}

impl OptionalComponents {
    pub fn new() -> Self {
        Self {
            registry: BTreeMap::new(),
        }
    }

    /// Register an optional component tenants can opt into.
    pub fn with_selectable(self, name: &str, components: &[&str]) -> Self {
        self.with(name, components, true)
    }

    /// Register an optional component that is always disabled.
    pub fn with_internal(self, name: &str, components: &[&str]) -> Self {
        self.with(name, components, false)
    }

    fn with(mut self, name: &str, components: &[&str], selectable: bool) -> Self {
        self.registry.insert(
            name.to_string(),
            OptionalComponent {
                components: components.iter().map(|c| c.to_string()).collect(),
                selectable,
            },
        );
        self
    }

    pub fn is_selectable(&self, name: &str) -> bool {
        self.registry.get(name).map(|c| c.selectable).unwrap_or(false)
    }

    pub fn selectable(&self) -> impl Iterator<Item = &str> {
        self.registry
            .iter()
            .filter(|(_, c)| c.selectable)
            .map(|(name, _)| name.as_str())
    }

    /// Names of every registered optional component not in `keep`, in name order.
    pub fn components_to_disable(&self, keep: &[String]) -> Vec<String> {
        self.registry
            .keys()
            .filter(|name| !keep.iter().any(|k| k == *name))
            .cloned()
            .collect()
    }

    /// Return `components` without the ones mapped to `to_disable`, keeping order.
    pub fn disable(
        &self,
        components: &[KymaComponent],
        to_disable: &[String],
    ) -> Result<Vec<KymaComponent>, Error> {
        let mut removed = BTreeSet::new();
        for name in to_disable {
            let optional = self
                .registry
                .get(name)
                .ok_or_else(|| Error::UnknownComponent(name.clone()))?;
            removed.extend(optional.components.iter().map(String::as_str));
        }

        Ok(components
            .iter()
            .filter(|c| !removed.contains(c.component.as_str()))
            .cloned()
            .collect())
    }
}

/// Kyma component lists per release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentLists {
    pub default_version: String,
    pub versions: BTreeMap<String, Vec<KymaComponent>>,
}

impl ComponentLists {
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let lists: ComponentLists = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse component list: {}", e)))?;
        if !lists.versions.contains_key(&lists.default_version) {
            return Err(Error::Config(format!(
                "component list has no entry for default version {}",
                lists.default_version
            )));
        }
        Ok(lists)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    pub fn components(&self, version: &str) -> Result<&[KymaComponent], Error> {
        self.versions
            .get(version)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnsupportedKymaVersion(version.to_string()))
    }

    /// Kyma 1.10 managed component list.
    pub fn builtin() -> Self {
        let components = [
            ("cluster-essentials", "kyma-system"),
            ("testing", "kyma-system"),
            ("istio-kyma-patch", "istio-system"),
            ("knative-serving-init", "knative-serving"),
            ("knative-serving", "knative-serving"),
            ("knative-eventing", "knative-eventing"),
            ("dex", "kyma-system"),
            ("ory", "kyma-system"),
            ("api-gateway", "kyma-system"),
            ("rafter", "kyma-system"),
            ("service-catalog", "kyma-system"),
            ("service-catalog-addons", "kyma-system"),
            ("helm-broker", "kyma-system"),
            ("nats-streaming", "natss"),
            ("core", "kyma-system"),
            ("knative-provisioner-natss", "knative-eventing"),
            ("event-bus", "kyma-system"),
            ("application-connector", "kyma-integration"),
            ("backup-init", "kyma-system"),
            ("backup", "kyma-system"),
            ("logging", "kyma-system"),
            ("kiali", "kyma-system"),
            ("tracing", "kyma-system"),
            ("monitoring", "kyma-system"),
            ("compass-runtime-agent", "compass-system"),
        ]
        .iter()
        .map(|(c, ns)| KymaComponent::new(*c, *ns))
        .collect();

        let default_version = "1.10.0".to_string();
        Self {
            versions: BTreeMap::from([(default_version.clone(), components)]),
            default_version,
        }
    }
}
