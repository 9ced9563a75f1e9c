/// Multicast DNS settings.
#[derive(Clone, Debug)]
pub struct MdnsConfig {
    /// Service type browsed and registered, fully qualified.
    pub service_type: String,

    /// Host name announced with records, derived from the instance if unset.
    pub host_name: Option<String>,
}

impl MdnsConfig {
    /// Set the service type.
    #[must_use]
    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = service_type.into();
        self
    }

    /// Set the announced host name, it must end in `.local.`.
    #[must_use]
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            service_type: topicmesh_discovery::SERVICE_TYPE.to_string(),
            host_name: None,
        }
    }
}
