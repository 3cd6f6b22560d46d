use std::sync::Arc;
use crate::{
    api::middleware::cors::AllowedOrigins,
    config::Settings,
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub allowed_origins: Arc<AllowedOrigins>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        settings: &Settings,
    ) -> Self {
        Self {
            service_context,
            allowed_origins: Arc::new(AllowedOrigins::new(&settings.cors.allowed_origins)),
        }
    }
}
