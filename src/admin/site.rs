use crate::admin::changeform::CompositeEditController;
use crate::admin::collaborators::AdminResponse;
use crate::admin::error::AdminError;
use crate::admin::nested::NestedCompositeEditController;
use crate::admin::request::AdminRequest;
use std::collections::HashMap;
use std::sync::Arc;

/// An add/change screen the site can route requests to
#[async_trait::async_trait]
pub trait ChangeFormView: Send + Sync {
    fn entity(&self) -> &str;

    async fn changeform_view(&self, request: &AdminRequest, object_id: Option<&str>)
        -> Result<AdminResponse, AdminError>;
}

#[async_trait::async_trait]
impl ChangeFormView for CompositeEditController {
    fn entity(&self) -> &str {
        &self.schema().name
    }

    async fn changeform_view(
        &self,
        request: &AdminRequest,
        object_id: Option<&str>,
    ) -> Result<AdminResponse, AdminError> {
        CompositeEditController::changeform_view(self, request, object_id).await
    }
}

#[async_trait::async_trait]
impl ChangeFormView for NestedCompositeEditController {
    fn entity(&self) -> &str {
        &self.base().schema().name
    }

    async fn changeform_view(
        &self,
        request: &AdminRequest,
        object_id: Option<&str>,
    ) -> Result<AdminResponse, AdminError> {
        NestedCompositeEditController::changeform_view(self, request, object_id).await
    }
}

/// Edit screens registered under the lowercase entity name used in URLs
#[derive(Clone, Default)]
pub struct AdminSite {
    site_header: String,
    views: HashMap<String, Arc<dyn ChangeFormView>>,
}

impl AdminSite {
    pub fn new(site_header: &str) -> Self {
        Self {
            site_header: site_header.to_string(),
            views: HashMap::new(),
        }
    }

    pub fn register(&mut self, view: Arc<dyn ChangeFormView>) {
        self.views.insert(view.entity().to_lowercase(), view);
    }

    pub fn site_header(&self) -> &str {
        &self.site_header
    }

    pub fn get(&self, url_name: &str) -> Option<Arc<dyn ChangeFormView>> {
        self.views.get(&url_name.to_lowercase()).cloned()
    }

    pub fn url_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.views.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
