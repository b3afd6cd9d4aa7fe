use keb_models::ProviderSpecificConfig;

/// Tenant overrides that only a provider knows how to apply.
pub(crate) struct ProviderOverrides<'a> {
    /// Region, if the tenant chose one
    pub region: Option<&'a str>,
    pub zones: Option<&'a [String]>,
}

/// Apply provider-only overrides on top of the plan's provider defaults.
///
/// An empty zone list counts as no zones given.
pub(crate) fn apply_overrides(config: &mut ProviderSpecificConfig, overrides: &ProviderOverrides<'_>) {
    let zones = overrides.zones.filter(|zones| !zones.is_empty());
    match config {
        ProviderSpecificConfig::Azure(azure) => {
            if let Some(zones) = zones {
                azure.zones = zones.to_vec();
            }
        }
        ProviderSpecificConfig::Gcp(gcp) => match (zones, overrides.region) {
            (Some(zones), _) => gcp.zones = zones.to_vec(),
            (None, Some(region)) => gcp.zones = gcp_zones(region),
            (None, None) => {}
        },
        ProviderSpecificConfig::Aws(aws) => match (zones, overrides.region) {
            (Some(zones), _) => aws.zone = zones[0].clone(),
            (None, Some(region)) => aws.zone = format!("{}a", region),
            (None, None) => {}
        },
    }
}

fn gcp_zones(region: &str) -> Vec<String> {
    ["a", "b", "c"]
        .iter()
        .map(|suffix| format!("{}-{}", region, suffix))
        .collect()
}
