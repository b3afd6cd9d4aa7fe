use std::sync::Arc;

use keb_models::{
    ClusterConfig, Credential, KymaComponent, KymaConfig, ProvisionRuntimeInput,
    ProvisioningParameters, ProvisioningParametersDto, RuntimeInput,
};

use super::provider::{apply_overrides, ProviderOverrides};
use super::{ComponentLists, Error, OptionalComponents, Plan, PlanCatalog};

/// Kyma release the runtime is installed with.
#[derive(Debug, Clone, Copy)]
pub struct KymaRelease<'a> {
    pub version: &'a str,
    pub components: &'a [KymaComponent],
}

/// Build the provisioner request from a plan, tenant parameters and an assigned credential.
///
/// Tenant fields left unset keep the plan default. The result depends on the
/// arguments only.
pub fn compose(
    plan: &Plan,
    params: &ProvisioningParametersDto,
    credential: &Credential,
    release: KymaRelease<'_>,
    components_to_disable: &[String],
    optional: &OptionalComponents,
) -> Result<ProvisionRuntimeInput, Error> {
    if credential.hyperscaler_type != plan.provider {
        return Err(Error::CredentialMismatch {
            credential: credential.name.clone(),
            expected: plan.provider,
            actual: credential.hyperscaler_type,
        });
    }

    let defaults = &plan.defaults;
    let mut provider_specific_config = defaults.provider_config.clone();
    apply_overrides(
        &mut provider_specific_config,
        &ProviderOverrides {
            region: params.region.as_deref(),
            zones: params.zones.as_deref(),
        },
    );

    let cluster_config = ClusterConfig {
        kubernetes_version: defaults.kubernetes_version.clone(),
        node_count: params.node_count.unwrap_or(defaults.node_count),
        volume_size_gb: params.volume_size_gb.unwrap_or(defaults.volume_size_gb),
        machine_type: params
            .machine_type
            .clone()
            .unwrap_or_else(|| defaults.machine_type.clone()),
        region: params.region.clone().unwrap_or_else(|| defaults.region.clone()),
        disk_type: defaults.disk_type.clone(),
        worker_cidr: defaults.worker_cidr.clone(),
        auto_scaler_min: params.auto_scaler_min.unwrap_or(defaults.auto_scaler_min),
        auto_scaler_max: params.auto_scaler_max.unwrap_or(defaults.auto_scaler_max),
        max_surge: params.max_surge.unwrap_or(defaults.max_surge),
        max_unavailable: params.max_unavailable.unwrap_or(defaults.max_unavailable),
        target_secret: credential.name.clone(),
        provider_specific_config,
    };

    Ok(ProvisionRuntimeInput {
        runtime_input: RuntimeInput {
            name: params.name.clone(),
            description: None,
        },
        cluster_config,
        kyma_config: KymaConfig {
            version: release.version.to_string(),
            components: optional.disable(release.components, components_to_disable)?,
        },
    })
}

/// Check tenant parameters against what the plan allows.
pub fn validate_parameters(
    plan: &Plan,
    params: &ProvisioningParametersDto,
    optional: &OptionalComponents,
) -> Result<(), Error> {
    let invalid = |msg: String| Err(Error::InvalidParameters(msg));

    if params.name.trim().is_empty() {
        return invalid("name is required".to_string());
    }
    if let Some(region) = &params.region {
        if !plan.regions.is_empty() && !plan.regions.contains(region) {
            return invalid(format!("region {} is not available in plan {}", region, plan.name));
        }
    }
    if let Some(machine_type) = &params.machine_type {
        if !plan.machine_types.is_empty() && !plan.machine_types.contains(machine_type) {
            return invalid(format!(
                "machine type {} is not available in plan {}",
                machine_type, plan.name
            ));
        }
    }
    for (field, value) in [
        ("nodeCount", params.node_count),
        ("volumeSizeGb", params.volume_size_gb),
        ("autoScalerMin", params.auto_scaler_min),
        ("autoScalerMax", params.auto_scaler_max),
    ] {
        if matches!(value, Some(v) if v < 1) {
            return invalid(format!("{} must be at least 1", field));
        }
    }
    for (field, value) in [("maxSurge", params.max_surge), ("maxUnavailable", params.max_unavailable)] {
        if matches!(value, Some(v) if v < 0) {
            return invalid(format!("{} must not be negative", field));
        }
    }
    let min = params.auto_scaler_min.unwrap_or(plan.defaults.auto_scaler_min);
    let max = params.auto_scaler_max.unwrap_or(plan.defaults.auto_scaler_max);
    if min > max {
        return invalid(format!(
            "autoScalerMin ({}) must not exceed autoScalerMax ({})",
            min, max
        ));
    }
    if let Some(component) = params.components.iter().find(|c| !optional.is_selectable(c)) {
        return invalid(format!(
            "component {} is not one of: {}",
            component,
            optional.selectable().collect::<Vec<_>>().join(", ")
        ));
    }
    Ok(())
}

/// Composer bound to the broker's plan catalog and component lists.
#[derive(Debug, Clone)]
pub struct Composer {
    catalog: Arc<PlanCatalog>,
    components: Arc<ComponentLists>,
    optional: Arc<OptionalComponents>,
    on_demand_versions: bool,
}

impl Composer {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        components: Arc<ComponentLists>,
        optional: Arc<OptionalComponents>,
    ) -> Self {
        Self {
            catalog,
            components,
            optional,
            on_demand_versions: false,
        }
    }

    /// Let tenants pick the Kyma version through `kymaVersion`.
    pub fn with_on_demand_versions(mut self, enabled: bool) -> Self {
        self.on_demand_versions = enabled;
        self
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn optional_components(&self) -> &OptionalComponents {
        &self.optional
    }

    pub fn on_demand_versions(&self) -> bool {
        self.on_demand_versions
    }

    /// Kyma version a request resolves to.
    pub fn kyma_version<'a>(&'a self, params: &'a ProvisioningParametersDto) -> &'a str {
        match &params.kyma_version {
            Some(version) if self.on_demand_versions => version,
            _ => &self.components.default_version,
        }
    }

    /// [`validate_parameters`] plus a check that the resolved Kyma version has a component list.
    pub fn validate(&self, plan: &Plan, params: &ProvisioningParametersDto) -> Result<(), Error> {
        validate_parameters(plan, params, &self.optional)?;
        self.components.components(self.kyma_version(params))?;
        Ok(())
    }

    pub fn compose(
        &self,
        params: &ProvisioningParameters,
        credential: &Credential,
    ) -> Result<ProvisionRuntimeInput, Error> {
        let plan = self
            .catalog
            .get(&params.plan_id)
            .ok_or_else(|| Error::UnknownPlan(params.plan_id.clone()))?;
        let version = self.kyma_version(&params.parameters);
        let release = KymaRelease {
            version,
            components: self.components.components(version)?,
        };
        let to_disable = self
            .optional
            .components_to_disable(&params.parameters.components);

        compose(plan, &params.parameters, credential, release, &to_disable, &self.optional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{AWS_PLAN_ID, AZURE_PLAN_ID, GCP_PLAN_ID, KIALI};
    use keb_models::{ErsContext, HyperscalerType};

    fn test_components() -> Vec<KymaComponent> {
        vec![
            KymaComponent::new("cluster-essentials", "kyma-system"),
            KymaComponent::new("core", "kyma-system"),
            KymaComponent::new("backup", "kyma-system"),
            KymaComponent::new("kiali", "kyma-system"),
            KymaComponent::new("tracing", "kyma-system"),
        ]
    }

    fn release(components: &[KymaComponent]) -> KymaRelease<'_> {
        KymaRelease {
            version: "1.10.0",
            components,
        }
    }

    fn credential(name: &str, hyperscaler_type: HyperscalerType) -> Credential {
        Credential {
            name: name.to_string(),
            hyperscaler_type,
            tenant_name: Some("e8f7ec0a-0cd6-41f0-905d-5d1efa9fb6c4".to_string()),
        }
    }

    fn compose_golden(plan_id: &str, params: &ProvisioningParametersDto, cred: &Credential) -> serde_json::Value {
        let catalog = PlanCatalog::builtin();
        let optional = OptionalComponents::default();
        let components = test_components();
        let to_disable = optional.components_to_disable(&params.components);
        let input = compose(
            catalog.get(plan_id).unwrap(),
            params,
            cred,
            release(&components),
            &to_disable,
            &optional,
        )
        .unwrap();
        serde_json::to_value(input).unwrap()
    }

    fn fixture(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_azure_golden() {
        let params = ProvisioningParametersDto {
            name: "cluster-testing".to_string(),
            ..Default::default()
        };
        let actual = compose_golden(AZURE_PLAN_ID, &params, &credential("azure-secret-1", HyperscalerType::Azure));

        assert_eq!(actual, fixture(include_str!("../../testdata/azure_runtime_input.json")));
    }

    #[test]
    fn test_gcp_golden() {
        let params = ProvisioningParametersDto {
            name: "gcp-cluster".to_string(),
            region: Some("us-east4".to_string()),
            node_count: Some(5),
            auto_scaler_max: Some(10),
            components: vec![KIALI.to_string()],
            ..Default::default()
        };
        let actual = compose_golden(GCP_PLAN_ID, &params, &credential("gcp-secret-7", HyperscalerType::Gcp));

        assert_eq!(actual, fixture(include_str!("../../testdata/gcp_runtime_input.json")));
    }

    #[test]
    fn test_aws_golden() {
        let params = ProvisioningParametersDto {
            name: "aws-cluster".to_string(),
            machine_type: Some("m5.xlarge".to_string()),
            volume_size_gb: Some(80),
            max_surge: Some(2),
            max_unavailable: Some(0),
            ..Default::default()
        };
        let actual = compose_golden(AWS_PLAN_ID, &params, &credential("aws-secret-3", HyperscalerType::Aws));

        assert_eq!(actual, fixture(include_str!("../../testdata/aws_runtime_input.json")));
    }

    #[test]
    fn test_compose_is_byte_for_byte_deterministic() {
        let params = ProvisioningParametersDto {
            name: "cluster-testing".to_string(),
            region: Some("europe-west3".to_string()),
            components: vec!["Tracing".to_string()],
            ..Default::default()
        };
        let cred = credential("gcp-secret-1", HyperscalerType::Gcp);

        let first = serde_json::to_string(&compose_golden(GCP_PLAN_ID, &params, &cred)).unwrap();
        for _ in 0..10 {
            let again = serde_json::to_string(&compose_golden(GCP_PLAN_ID, &params, &cred)).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_unset_fields_keep_defaults_and_set_fields_override() {
        let catalog = PlanCatalog::builtin();
        let plan = catalog.get(AZURE_PLAN_ID).unwrap();
        let components = test_components();
        let optional = OptionalComponents::default();
        let cred = credential("azure-secret-1", HyperscalerType::Azure);

        let params = ProvisioningParametersDto {
            name: "c".to_string(),
            node_count: Some(7),
            ..Default::default()
        };
        let cluster = compose(plan, &params, &cred, release(&components), &[], &optional)
            .unwrap()
            .cluster_config;

        assert_eq!(cluster.node_count, 7);
        assert_eq!(cluster.machine_type, plan.defaults.machine_type);
        assert_eq!(cluster.region, plan.defaults.region);
        assert_eq!(cluster.volume_size_gb, plan.defaults.volume_size_gb);
        assert_eq!(cluster.auto_scaler_min, plan.defaults.auto_scaler_min);
        assert_eq!(cluster.auto_scaler_max, plan.defaults.auto_scaler_max);
        assert_eq!(cluster.max_surge, plan.defaults.max_surge);
        assert_eq!(cluster.max_unavailable, plan.defaults.max_unavailable);
        assert_eq!(cluster.provider_specific_config, plan.defaults.provider_config);
        assert_eq!(cluster.target_secret, "azure-secret-1");
    }

    #[test]
    fn test_credential_for_other_provider_is_rejected() {
        let catalog = PlanCatalog::builtin();
        let components = test_components();
        let err = compose(
            catalog.get(AZURE_PLAN_ID).unwrap(),
            &ProvisioningParametersDto {
                name: "c".to_string(),
                ..Default::default()
            },
            &credential("gcp-secret-1", HyperscalerType::Gcp),
            release(&components),
            &[],
            &OptionalComponents::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::CredentialMismatch { .. }));
    }

    #[test]
    fn test_unknown_disable_name_fails_composition() {
        let catalog = PlanCatalog::builtin();
        let components = test_components();
        let err = compose(
            catalog.get(GCP_PLAN_ID).unwrap(),
            &ProvisioningParametersDto {
                name: "c".to_string(),
                ..Default::default()
            },
            &credential("gcp-secret-1", HyperscalerType::Gcp),
            release(&components),
            &["Grafana".to_string()],
            &OptionalComponents::default(),
        )
        .unwrap_err();

        assert_eq!(err, Error::UnknownComponent("Grafana".to_string()));
    }

    fn composer(on_demand: bool) -> Composer {
        let mut lists = ComponentLists::builtin();
        lists
            .versions
            .insert("1.11.0".to_string(), vec![KymaComponent::new("core", "kyma-system")]);
        Composer::new(
            Arc::new(PlanCatalog::builtin()),
            Arc::new(lists),
            Arc::new(OptionalComponents::default()),
        )
        .with_on_demand_versions(on_demand)
    }

    fn provisioning_parameters(kyma_version: Option<&str>) -> ProvisioningParameters {
        ProvisioningParameters {
            plan_id: GCP_PLAN_ID.to_string(),
            service_id: keb_models::KYMA_SERVICE_ID.to_string(),
            ers_context: ErsContext::default(),
            parameters: ProvisioningParametersDto {
                name: "c".to_string(),
                kyma_version: kyma_version.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_kyma_version_ignored_unless_on_demand() {
        let params = provisioning_parameters(Some("1.11.0"));
        let cred = credential("gcp-secret-1", HyperscalerType::Gcp);

        let fixed = composer(false).compose(&params, &cred).unwrap();
        assert_eq!(fixed.kyma_config.version, "1.10.0");

        let on_demand = composer(true).compose(&params, &cred).unwrap();
        assert_eq!(on_demand.kyma_config.version, "1.11.0");
        assert_eq!(on_demand.kyma_config.components.len(), 1);
    }

    #[test]
    fn test_composer_disables_unkept_optional_components() {
        let input = composer(false)
            .compose(&provisioning_parameters(None), &credential("gcp-secret-1", HyperscalerType::Gcp))
            .unwrap();

        let names: Vec<_> = input.kyma_config.components.iter().map(|c| c.component.as_str()).collect();
        assert!(!names.contains(&"kiali"));
        assert!(!names.contains(&"tracing"));
        assert!(!names.contains(&"backup"));
        assert!(names.contains(&"core"));
    }

    #[test]
    fn test_composer_rejects_unknown_plan() {
        let mut params = provisioning_parameters(None);
        params.plan_id = "nope".to_string();
        let err = composer(false)
            .compose(&params, &credential("gcp-secret-1", HyperscalerType::Gcp))
            .unwrap_err();

        assert_eq!(err, Error::UnknownPlan("nope".to_string()));
    }

    #[test]
    fn test_validation() {
        let catalog = PlanCatalog::builtin();
        let plan = catalog.get(AZURE_PLAN_ID).unwrap();
        let optional = OptionalComponents::default();
        let base = ProvisioningParametersDto {
            name: "cluster-testing".to_string(),
            ..Default::default()
        };

        assert!(validate_parameters(plan, &base, &optional).is_ok());

        let cases = [
            ProvisioningParametersDto { name: " ".to_string(), ..base.clone() },
            ProvisioningParametersDto { region: Some("mars-1".to_string()), ..base.clone() },
            ProvisioningParametersDto { machine_type: Some("n1-standard-4".to_string()), ..base.clone() },
            ProvisioningParametersDto { node_count: Some(0), ..base.clone() },
            ProvisioningParametersDto { auto_scaler_min: Some(5), ..base.clone() },
            ProvisioningParametersDto { max_unavailable: Some(-1), ..base.clone() },
            ProvisioningParametersDto { components: vec!["Backup".to_string()], ..base.clone() },
        ];
        for params in cases {
            assert!(
                matches!(validate_parameters(plan, &params, &optional), Err(Error::InvalidParameters(_))),
                "{:?} should be rejected",
                params
            );
        }
    }
}
