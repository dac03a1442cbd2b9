use crate::admin::inline::InlineFormSetView;
use crate::admin::media::Media;
use crate::admin::request::{AdminRequest, ADD_ANOTHER_VAR, CONTINUE_VAR, SAVE_AS_NEW_VAR, TO_FIELD_VAR};
use crate::forms::{value_to_raw, FormView};
use crate::model::{ChangeMessage, EntitySchema, Id, Record, UserContext, PK_FIELD};
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Decides whether an actor may add or change records of an entity
pub trait PermissionChecker: Send + Sync {
    fn has_add_permission(&self, user: &UserContext, schema: &EntitySchema) -> bool;
    /// `record` is `None` when the looked-up row does not exist
    fn has_change_permission(&self, user: &UserContext, schema: &EntitySchema, record: Option<&Record>) -> bool;
}

/// Grants `add_<entity>` / `change_<entity>` codenames; superusers pass
#[derive(Debug, Clone, Copy, Default)]
pub struct CodenamePermissions;

impl PermissionChecker for CodenamePermissions {
    fn has_add_permission(&self, user: &UserContext, schema: &EntitySchema) -> bool {
        user.has_perm(&format!("add_{}", schema.name.to_lowercase()))
    }

    fn has_change_permission(&self, user: &UserContext, schema: &EntitySchema, _record: Option<&Record>) -> bool {
        user.has_perm(&format!("change_{}", schema.name.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Addition,
    Change,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub action: LogAction,
    pub user_id: String,
    pub entity: String,
    pub object_id: Option<Id>,
    pub object_repr: String,
    pub change_message: ChangeMessage,
    pub action_time: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(action: LogAction, user: &UserContext, record: &Record, object_repr: String, message: ChangeMessage) -> Self {
        Self {
            action,
            user_id: user.user_id.clone(),
            entity: record.entity.clone(),
            object_id: record.id.clone(),
            object_repr,
            change_message: message,
            action_time: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_addition(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()>;
    async fn log_change(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()>;
}

/// Keeps entries in process, newest last
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    fn push(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

#[async_trait::async_trait]
impl AuditLog for MemoryAuditLog {
    async fn log_addition(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()> {
        self.push(LogEntry::new(LogAction::Addition, user, record, repr.to_string(), message.clone()));
        Ok(())
    }

    async fn log_change(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()> {
        self.push(LogEntry::new(LogAction::Change, user, record, repr.to_string(), message.clone()));
        Ok(())
    }
}

/// Writes entries to the application log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditLog;

#[async_trait::async_trait]
impl AuditLog for LogAuditLog {
    async fn log_addition(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()> {
        info!(
            "audit: {} added {} {:?} \"{}\" {}",
            user.user_id,
            record.entity,
            record.id,
            repr,
            message.to_json_string()
        );
        Ok(())
    }

    async fn log_change(&self, user: &UserContext, record: &Record, repr: &str, message: &ChangeMessage) -> Result<()> {
        info!(
            "audit: {} changed {} {:?} \"{}\" {}",
            user.user_id,
            record.entity,
            record.id,
            repr,
            message.to_json_string()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFormTemplate {
    Add,
    Change,
}

impl ChangeFormTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeFormTemplate::Add => "admin/add_form.html",
            ChangeFormTemplate::Change => "admin/change_form.html",
        }
    }
}

/// Everything the renderer needs to draw the combined edit screen
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub title: String,
    pub site_header: String,
    pub entity: String,
    pub object_id: Option<String>,
    pub original: Option<Record>,
    pub is_add: bool,
    pub is_popup: bool,
    pub to_field: Option<String>,
    pub show_save: bool,
    pub show_save_and_continue: bool,
    pub form: FormView,
    pub inline_formsets: Vec<InlineFormSetView>,
    pub media: Media,
    /// Every error message of the parent form and all form sets
    pub errors: Vec<String>,
    pub template: ChangeFormTemplate,
}

/// Outcome of an edit screen request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AdminResponse {
    Redirect { location: String, message: String },
    Rendered { template: String, context: Box<RenderContext> },
    /// Closes a popup, handing the saved key back to the opener
    Popup { value: String, repr: String },
}

impl AdminResponse {
    pub fn context(&self) -> Option<&RenderContext> {
        match self {
            AdminResponse::Rendered { context, .. } => Some(context),
            _ => None,
        }
    }
}

pub trait ScreenRenderer: Send + Sync {
    fn render(&self, context: RenderContext) -> Result<AdminResponse>;
}

/// Hands the context to the HTTP layer, which serializes it as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ScreenRenderer for JsonRenderer {
    fn render(&self, context: RenderContext) -> Result<AdminResponse> {
        Ok(AdminResponse::Rendered {
            template: context.template.name().to_string(),
            context: Box::new(context),
        })
    }
}

pub trait ResponseBuilder: Send + Sync {
    fn response_add(&self, request: &AdminRequest, schema: &EntitySchema, record: &Record) -> AdminResponse;
    fn response_change(&self, request: &AdminRequest, schema: &EntitySchema, record: &Record) -> AdminResponse;
}

/// Redirects after a save the way the admin buttons expect
#[derive(Debug, Clone)]
pub struct RedirectResponses {
    url_root: String,
}

impl Default for RedirectResponses {
    fn default() -> Self {
        Self::new("/admin")
    }
}

impl RedirectResponses {
    pub fn new(url_root: &str) -> Self {
        Self {
            url_root: url_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn changelist_url(&self, schema: &EntitySchema) -> String {
        format!("{}/{}/", self.url_root, schema.name.to_lowercase())
    }

    pub fn add_url(&self, schema: &EntitySchema) -> String {
        format!("{}/{}/add", self.url_root, schema.name.to_lowercase())
    }

    pub fn change_url(&self, schema: &EntitySchema, record: &Record) -> String {
        format!(
            "{}/{}/{}/change",
            self.url_root,
            schema.name.to_lowercase(),
            record.id.as_deref().unwrap_or_default()
        )
    }

    fn popup(&self, request: &AdminRequest, schema: &EntitySchema, record: &Record) -> AdminResponse {
        let value = match request.param(TO_FIELD_VAR) {
            Some(field) if !field.is_empty() && field != PK_FIELD => {
                record.get(field).map(value_to_raw).unwrap_or_default()
            }
            _ => record.id.clone().unwrap_or_default(),
        };
        AdminResponse::Popup {
            value,
            repr: schema.display(record),
        }
    }
}

impl ResponseBuilder for RedirectResponses {
    fn response_add(&self, request: &AdminRequest, schema: &EntitySchema, record: &Record) -> AdminResponse {
        if request.is_popup() {
            return self.popup(request, schema, record);
        }
        let added = format!(
            "The {} \"{}\" was added successfully.",
            schema.verbose_name,
            schema.display(record)
        );

        if request.post.contains(CONTINUE_VAR) || request.post.contains(SAVE_AS_NEW_VAR) {
            AdminResponse::Redirect {
                location: self.change_url(schema, record),
                message: format!("{} You may edit it again below.", added),
            }
        } else if request.post.contains(ADD_ANOTHER_VAR) {
            AdminResponse::Redirect {
                location: self.add_url(schema),
                message: format!("{} You may add another {} below.", added, schema.verbose_name),
            }
        } else {
            AdminResponse::Redirect {
                location: self.changelist_url(schema),
                message: added,
            }
        }
    }

    fn response_change(&self, request: &AdminRequest, schema: &EntitySchema, record: &Record) -> AdminResponse {
        if request.is_popup() {
            return self.popup(request, schema, record);
        }
        let changed = format!(
            "The {} \"{}\" was changed successfully.",
            schema.verbose_name,
            schema.display(record)
        );

        if request.post.contains(CONTINUE_VAR) {
            AdminResponse::Redirect {
                location: self.change_url(schema, record),
                message: format!("{} You may edit it again below.", changed),
            }
        } else if request.post.contains(ADD_ANOTHER_VAR) {
            AdminResponse::Redirect {
                location: self.add_url(schema),
                message: format!("{} You may add another {} below.", changed, schema.verbose_name),
            }
        } else {
            AdminResponse::Redirect {
                location: self.changelist_url(schema),
                message: changed,
            }
        }
    }
}

/// The external services an edit controller calls out to
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionChecker>,
    pub audit_log: Arc<dyn AuditLog>,
    pub renderer: Arc<dyn ScreenRenderer>,
    pub responses: Arc<dyn ResponseBuilder>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            permissions: Arc::new(CodenamePermissions),
            audit_log: Arc::new(LogAuditLog),
            renderer: Arc::new(JsonRenderer),
            responses: Arc::new(RedirectResponses::default()),
        }
    }
}

impl Collaborators {
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = audit_log;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ScreenRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_responses(mut self, responses: Arc<dyn ResponseBuilder>) -> Self {
        self.responses = responses;
        self
    }
}
