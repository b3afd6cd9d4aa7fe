use super::{instance_lookup, Error, InstanceDetails, KymaEnvironmentBroker};

impl KymaEnvironmentBroker {
    pub async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetails, Error> {
        let instance = self
            .storage
            .instances()
            .get_by_id(instance_id)
            .await
            .map_err(|e| instance_lookup(instance_id, e))?;

        let parameters = serde_json::from_str(&instance.provisioning_parameters).map_err(|source| {
            Error::CorruptParameters {
                instance_id: instance_id.to_string(),
                source,
            }
        })?;

        Ok(InstanceDetails {
            service_id: instance.service_id,
            plan_id: instance.plan_id,
            dashboard_url: instance.dashboard_url,
            parameters,
        })
    }
}
