use crate::admin::collaborators::{AdminResponse, ChangeFormTemplate, Collaborators, RenderContext};
use crate::admin::error::AdminError;
use crate::admin::inline::{bind_inline, InlineController, InlineFormSetView, InlineType, PrefixAllocator};
use crate::admin::media::Media;
use crate::admin::nested::{formset_errors, NestedGroup, NestedInlines};
use crate::admin::request::{AdminRequest, TO_FIELD_VAR};
use crate::admin::resolver::{MetadataCache, ReverseFieldResolver};
use crate::admin::reverse::{FormOverrides, RequestFieldHook, ReverseField, ReverseFieldController};
use crate::forms::{
    ChildSave, FormSet, FormSpec, FormValidator, InlineFormSet, ModelForm, SavedRow, SingleChildFormSet,
};
use crate::model::{ChangeEntry, ChangeMessage, EntitySchema, QueryDict, Record, SchemaRegistry, PK_FIELD};
use crate::store::{RecordQuery, RecordStore, StoreTransaction};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// How the edit screen of one parent entity is put together
#[derive(Clone)]
pub struct AdminOptions {
    /// Single-valued references whose targets are edited inline
    pub inline_reverse: Vec<ReverseField>,
    pub inline_type: InlineType,
    pub inlines: Vec<Arc<dyn InlineController>>,
    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub validators: Vec<Arc<dyn FormValidator>>,
    pub media: Media,
    pub site_header: String,
    pub reverse_field_hook: Option<RequestFieldHook>,
}

impl Default for AdminOptions {
    fn default() -> Self {
        Self {
            inline_reverse: Vec::new(),
            inline_type: InlineType::Stacked,
            inlines: Vec::new(),
            fields: None,
            exclude: Vec::new(),
            validators: Vec::new(),
            media: Media::default(),
            site_header: "Administration".to_string(),
            reverse_field_hook: None,
        }
    }
}

impl AdminOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reverse(mut self, field: impl Into<ReverseField>) -> Self {
        self.inline_reverse.push(field.into());
        self
    }

    pub fn inline(mut self, controller: Arc<dyn InlineController>) -> Self {
        self.inlines.push(controller);
        self
    }

    pub fn with_inline_type(mut self, inline_type: InlineType) -> Self {
        self.inline_type = inline_type;
        self
    }

    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn FormValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }

    pub fn with_site_header(mut self, site_header: &str) -> Self {
        self.site_header = site_header.to_string();
        self
    }

    pub fn with_reverse_field_hook(mut self, hook: RequestFieldHook) -> Self {
        self.reverse_field_hook = Some(hook);
        self
    }
}

/// A form set bound for one request, tagged with the controller that
/// built it. Reverse entries always come first, in declaration order.
pub enum BoundInline {
    Reverse {
        controller: Arc<ReverseFieldController>,
        formset: SingleChildFormSet,
        nested: Vec<NestedGroup>,
    },
    Ordinary {
        controller: Arc<dyn InlineController>,
        formset: InlineFormSet,
        nested: Vec<NestedGroup>,
    },
}

impl BoundInline {
    pub fn formset(&self) -> &dyn FormSet {
        match self {
            BoundInline::Reverse { formset, .. } => formset as &dyn FormSet,
            BoundInline::Ordinary { formset, .. } => formset,
        }
    }

    pub fn nested(&self) -> &[NestedGroup] {
        match self {
            BoundInline::Reverse { nested, .. } | BoundInline::Ordinary { nested, .. } => nested.as_slice(),
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, BoundInline::Reverse { .. })
    }

    pub fn display_label(&self) -> &str {
        match self {
            BoundInline::Reverse { controller, .. } => controller.display_label(),
            BoundInline::Ordinary { controller, .. } => controller.display_label(),
        }
    }

    fn view(&self, nesting: Option<&dyn NestedInlines>) -> InlineFormSetView {
        let view = match self {
            BoundInline::Reverse { controller, formset, .. } => InlineFormSetView::new(
                controller.display_label(),
                controller.display_label_plural(),
                controller.template(),
                controller.media(),
                formset,
            ),
            BoundInline::Ordinary { controller, formset, .. } => InlineFormSetView::new(
                controller.display_label(),
                controller.display_label_plural(),
                controller.template(),
                controller.media(),
                formset,
            ),
        };
        match nesting {
            Some(nesting) => view.with_nested(nesting.views(self.nested())),
            None => view,
        }
    }
}

/// Transient aggregate of everything bound for one request
pub struct CompositeSubmission {
    pub parent_form: ModelForm,
    pub inlines: Vec<BoundInline>,
    pub is_add: bool,
}

impl CompositeSubmission {
    /// The parent form and every form set, nested ones included, must pass
    pub fn is_valid(&self, nesting: Option<&dyn NestedInlines>) -> bool {
        self.parent_form.is_valid()
            && self.inlines.iter().all(|inline| {
                inline.formset().is_valid()
                    && nesting.map_or(true, |nesting| nesting.is_valid(inline.formset(), inline.nested()))
            })
    }

    pub fn errors(&self, nesting: Option<&dyn NestedInlines>) -> Vec<String> {
        let mut errors: Vec<String> = self.parent_form.errors().values().flatten().cloned().collect();
        for inline in &self.inlines {
            errors.extend(formset_errors(inline.formset()));
            if let Some(nesting) = nesting {
                errors.extend(nesting.errors(inline.formset(), inline.nested()));
            }
        }
        errors
    }
}

/// Rows one inline wrote, for the change message
#[derive(Debug, Clone)]
pub struct InlineChanges {
    pub name: String,
    pub child_entity: String,
    pub rows: Vec<SavedRow>,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub parent: Record,
    pub changes: Vec<InlineChanges>,
}

/// Add/change screen of a parent entity whose single-valued references
/// are edited inline and saved together with the parent
pub struct CompositeEditController {
    schema: EntitySchema,
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RecordStore>,
    reverse: Vec<Arc<ReverseFieldController>>,
    inlines: Vec<Arc<dyn InlineController>>,
    fields: Option<Vec<String>>,
    exclude: Vec<String>,
    validators: Vec<Arc<dyn FormValidator>>,
    media: Media,
    site_header: String,
    collaborators: Collaborators,
}

impl CompositeEditController {
    /// Resolve every declared reverse field. A field that is not a
    /// single-valued reference fails here, never per request.
    pub fn new(
        entity: &str,
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        cache: &MetadataCache,
        options: AdminOptions,
        collaborators: Collaborators,
    ) -> Result<Self, AdminError> {
        let schema = registry
            .get(entity)
            .cloned()
            .ok_or_else(|| AdminError::UnknownEntity(entity.to_string()))?;
        let resolver = ReverseFieldResolver::new(Arc::clone(&registry));

        let mut exclude = options.exclude;
        let mut reverse = Vec::new();
        for declared in options.inline_reverse {
            let spec = cache.resolve(&resolver, entity, &declared.name)?;
            let child = registry
                .get(&spec.child_entity)
                .cloned()
                .ok_or_else(|| AdminError::UnknownEntity(spec.child_entity.clone()))?;

            let mut controller = ReverseFieldController::new(Arc::clone(&spec), child, options.inline_type);
            if let Some(form) = declared.form {
                controller = controller.with_form(form);
            }
            if let Some(hook) = &options.reverse_field_hook {
                controller = controller.with_field_hook(Arc::clone(hook));
            }
            if !exclude.contains(&spec.field_name) {
                exclude.push(spec.field_name.clone());
            }
            reverse.push(Arc::new(controller));
        }

        info!(
            "Edit screen for {}: reverse fields [{}], {} inline(s)",
            entity,
            reverse.iter().map(|c| c.field_name()).collect::<Vec<_>>().join(", "),
            options.inlines.len()
        );

        Ok(Self {
            schema,
            registry,
            store,
            reverse,
            inlines: options.inlines,
            fields: options.fields,
            exclude,
            validators: options.validators,
            media: options.media,
            site_header: options.site_header,
            collaborators,
        })
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn reverse_controllers(&self) -> &[Arc<ReverseFieldController>] {
        &self.reverse
    }

    /// Parent fields hidden from the generic form, reverse fields included
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn to_field_allowed(&self, to_field: &str) -> bool {
        self.schema.is_lookup_field(to_field)
    }

    pub fn get_form_spec(&self, _request: &AdminRequest) -> FormSpec {
        FormSpec::for_entity(&self.schema, self.fields.as_deref(), &self.exclude, None)
            .with_validators(self.validators.clone())
    }

    /// Look the parent up by primary key, or by the `to_field` column
    pub async fn get_object(&self, object_id: &str, to_field: Option<&str>) -> Result<Option<Record>, AdminError> {
        match to_field {
            Some(field) if field != PK_FIELD => {
                let query = RecordQuery::by_field(
                    &self.schema.name,
                    field,
                    serde_json::Value::String(object_id.to_string()),
                );
                Ok(self.store.filter_records(&query).await?.into_iter().next())
            }
            _ => Ok(self.store.get_record(&self.schema.name, &object_id.to_string()).await?),
        }
    }

    /// Query parameters naming parent form fields prefill the add form
    pub fn get_changeform_initial_data(&self, request: &AdminRequest, spec: &FormSpec) -> QueryDict {
        request
            .get
            .iter()
            .filter(|(key, _)| spec.fields.iter().any(|field| field.name == *key))
            .collect()
    }

    pub async fn changeform_view(
        &self,
        request: &AdminRequest,
        object_id: Option<&str>,
    ) -> Result<AdminResponse, AdminError> {
        self.changeform_view_with(request, object_id, None).await
    }

    pub async fn changeform_view_with(
        &self,
        request: &AdminRequest,
        object_id: Option<&str>,
        nesting: Option<&dyn NestedInlines>,
    ) -> Result<AdminResponse, AdminError> {
        let to_field = request
            .param(TO_FIELD_VAR)
            .filter(|field| !field.is_empty())
            .map(str::to_string);
        if let Some(field) = &to_field {
            if !self.to_field_allowed(field) {
                warn!("Rejected _to_field={} on {}", field, self.schema.name);
                return Err(AdminError::DisallowedToField(field.clone()));
            }
        }

        let object_id = if request.is_save_as_new() { None } else { object_id };
        let add = object_id.is_none();
        let permissions = &self.collaborators.permissions;

        let original = match object_id {
            None => {
                if !permissions.has_add_permission(&request.user, &self.schema) {
                    return Err(AdminError::PermissionDenied);
                }
                None
            }
            Some(id) => {
                let found = self.get_object(id, to_field.as_deref()).await?;
                if !permissions.has_change_permission(&request.user, &self.schema, found.as_ref()) {
                    return Err(AdminError::PermissionDenied);
                }
                Some(found.ok_or_else(|| AdminError::NotFound {
                    name: self.schema.verbose_name.clone(),
                    key: id.to_string(),
                })?)
            }
        };
        debug!(
            "{} {} {} for {}",
            request.method,
            if add { "add" } else { "change" },
            self.schema.name,
            request.user.user_id
        );

        let spec = Arc::new(self.get_form_spec(request));
        let submission = if request.is_post() {
            let instance = original
                .clone()
                .unwrap_or_else(|| Record::new(&self.schema.name));
            let parent_form = ModelForm::bound(spec, instance, None, &request.post, false);
            let inlines = self
                .create_formsets(request, parent_form.instance(), Some(&request.post), nesting)
                .await?;
            let mut submission = CompositeSubmission {
                parent_form,
                inlines,
                is_add: add,
            };

            if submission.is_valid(nesting) {
                return self.save_submission(request, &mut submission, nesting).await;
            }
            info!(
                "Submission for {} rejected with {} error(s)",
                self.schema.name,
                submission.errors(nesting).len()
            );
            submission
        } else {
            let parent_form = match &original {
                None => {
                    let initial = self.get_changeform_initial_data(request, &spec);
                    ModelForm::unbound(spec, Record::new(&self.schema.name), None, &initial)
                }
                Some(record) => ModelForm::unbound(spec, record.clone(), None, &QueryDict::new()),
            };
            let inlines = self
                .create_formsets(request, parent_form.instance(), None, nesting)
                .await?;
            CompositeSubmission {
                parent_form,
                inlines,
                is_add: add,
            }
        };

        self.render_change_form(request, &submission, original, object_id, to_field, nesting)
    }

    /// Bind reverse form sets first, in declaration order, then ordinary
    /// inlines, all against the in-memory `parent`
    async fn create_formsets(
        &self,
        request: &AdminRequest,
        parent: &Record,
        data: Option<&QueryDict>,
        nesting: Option<&dyn NestedInlines>,
    ) -> Result<Vec<BoundInline>, AdminError> {
        let mut prefixes = PrefixAllocator::new();
        let mut bound = Vec::new();

        for controller in &self.reverse {
            let prefix = prefixes.allocate(controller.field_name());
            let formset = controller
                .build(
                    self.store.as_ref(),
                    request,
                    Some(parent),
                    &prefix,
                    data,
                    &FormOverrides::default(),
                )
                .await?;
            let nested = match nesting {
                Some(nesting) => {
                    nesting
                        .bind_nested(self.store.as_ref(), request, controller.child_entity(), &formset, data)
                        .await?
                }
                None => Vec::new(),
            };
            bound.push(BoundInline::Reverse {
                controller: Arc::clone(controller),
                formset,
                nested,
            });
        }

        for controller in &self.inlines {
            let prefix = prefixes.allocate(&controller.default_prefix());
            let formset = bind_inline(self.store.as_ref(), controller.as_ref(), request, parent, &prefix, data).await?;
            let nested = match nesting {
                Some(nesting) => {
                    nesting
                        .bind_nested(self.store.as_ref(), request, controller.child_entity(), &formset, data)
                        .await?
                }
                None => Vec::new(),
            };
            bound.push(BoundInline::Ordinary {
                controller: Arc::clone(controller),
                formset,
                nested,
            });
        }

        Ok(bound)
    }

    async fn save_submission(
        &self,
        request: &AdminRequest,
        submission: &mut CompositeSubmission,
        nesting: Option<&dyn NestedInlines>,
    ) -> Result<AdminResponse, AdminError> {
        let outcome = self.persist(&request.user.user_id, submission, nesting).await?;
        let message = self.construct_change_message(&submission.parent_form, &outcome.changes, submission.is_add);
        let repr = self.schema.display(&outcome.parent);

        let audit = &self.collaborators.audit_log;
        let logged = if submission.is_add {
            audit.log_addition(&request.user, &outcome.parent, &repr, &message).await
        } else {
            audit.log_change(&request.user, &outcome.parent, &repr, &message).await
        };
        // The save is already committed at this point
        if let Err(err) = logged {
            error!("Audit log write for {} {:?} failed: {:#}", self.schema.name, outcome.parent.id, err);
        }

        let responses = &self.collaborators.responses;
        Ok(if submission.is_add {
            responses.response_add(request, &self.schema, &outcome.parent)
        } else {
            responses.response_change(request, &self.schema, &outcome.parent)
        })
    }

    /// Run every write of the submission in one transaction
    async fn persist(
        &self,
        user_id: &str,
        submission: &mut CompositeSubmission,
        nesting: Option<&dyn NestedInlines>,
    ) -> Result<SaveOutcome, AdminError> {
        let mut tx = self.store.begin().await?;

        match self.save_all(tx.as_mut(), user_id, submission, nesting).await {
            Ok(outcome) => {
                tx.commit().await.map_err(AdminError::TransactionAborted)?;
                info!("Committed {} {:?}", self.schema.name, outcome.parent.id);
                Ok(outcome)
            }
            Err(err) => {
                error!("Saving {} failed, rolling back: {:#}", self.schema.name, err);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed: {:#}", rollback_err);
                }
                Err(AdminError::TransactionAborted(err))
            }
        }
    }

    /// Reverse children first so their keys land on the parent, then the
    /// parent, then ordinary inlines pointing at the saved parent
    async fn save_all(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: &str,
        submission: &mut CompositeSubmission,
        nesting: Option<&dyn NestedInlines>,
    ) -> anyhow::Result<SaveOutcome> {
        let mut parent = submission.parent_form.instance().clone();
        let mut changes = Vec::new();

        for inline in submission.inlines.iter_mut() {
            let BoundInline::Reverse {
                controller,
                formset,
                nested,
            } = inline
            else {
                continue;
            };

            match formset.save(&mut *tx, user_id).await? {
                ChildSave::Saved(row) => {
                    if let Some(child_id) = &row.record().id {
                        parent.set_reference(controller.back_reference_field(), child_id);
                        debug!(
                            "{}.{} now points at {} {}",
                            self.schema.name,
                            controller.back_reference_field(),
                            controller.child_entity(),
                            child_id
                        );
                    }
                    changes.push(InlineChanges {
                        name: controller.display_label().to_string(),
                        child_entity: controller.child_entity().to_string(),
                        rows: vec![row],
                    });
                }
                ChildSave::NoChildToSave => {
                    debug!("Nothing to save for {}.{}", self.schema.name, controller.field_name());
                }
            }

            if let Some(nesting) = nesting {
                nesting.save_nested(&mut *tx, user_id, &*formset, nested).await?;
            }
        }

        parent.touch(user_id);
        tx.save_record(&mut parent).await?;
        *submission.parent_form.instance_mut() = parent.clone();

        for inline in submission.inlines.iter_mut() {
            let BoundInline::Ordinary {
                controller,
                formset,
                nested,
            } = inline
            else {
                continue;
            };

            let rows = formset.save(&mut *tx, &parent, user_id).await?;
            if let Some(nesting) = nesting {
                nesting.save_nested(&mut *tx, user_id, &*formset, nested).await?;
            }
            if !rows.is_empty() {
                changes.push(InlineChanges {
                    name: controller.display_label().to_string(),
                    child_entity: controller.child_entity().to_string(),
                    rows,
                });
            }
        }

        Ok(SaveOutcome { parent, changes })
    }

    pub fn construct_change_message(&self, form: &ModelForm, changes: &[InlineChanges], add: bool) -> ChangeMessage {
        let mut message = ChangeMessage::default();
        if add {
            message.push(ChangeEntry::Added {
                name: None,
                object: None,
            });
        } else {
            let fields = form.changed_data();
            if !fields.is_empty() {
                message.push(ChangeEntry::Changed {
                    name: None,
                    object: None,
                    fields,
                });
            }
        }

        for change in changes {
            let child = self.registry.get(&change.child_entity);
            for row in &change.rows {
                let object = child
                    .map(|schema| schema.display(row.record()))
                    .unwrap_or_else(|| change.child_entity.clone());
                message.push(match row {
                    SavedRow::Added { .. } => ChangeEntry::Added {
                        name: Some(change.name.clone()),
                        object: Some(object),
                    },
                    SavedRow::Changed { fields, .. } => ChangeEntry::Changed {
                        name: Some(change.name.clone()),
                        object: Some(object),
                        fields: fields.clone(),
                    },
                    SavedRow::Deleted { .. } => ChangeEntry::Deleted {
                        name: change.name.clone(),
                        object,
                    },
                });
            }
        }
        message
    }

    fn render_change_form(
        &self,
        request: &AdminRequest,
        submission: &CompositeSubmission,
        original: Option<Record>,
        object_id: Option<&str>,
        to_field: Option<String>,
        nesting: Option<&dyn NestedInlines>,
    ) -> Result<AdminResponse, AdminError> {
        let add = submission.is_add;
        let inline_formsets: Vec<InlineFormSetView> =
            submission.inlines.iter().map(|inline| inline.view(nesting)).collect();
        let media = inline_formsets
            .iter()
            .fold(self.media.clone(), |media, view| media.merge(&view.media));
        let errors = if submission.parent_form.is_bound() {
            submission.errors(nesting)
        } else {
            Vec::new()
        };

        let mut context = RenderContext {
            title: format!("{} {}", if add { "Add" } else { "Change" }, self.schema.verbose_name),
            site_header: self.site_header.clone(),
            entity: self.schema.name.clone(),
            object_id: object_id.map(str::to_string),
            original,
            is_add: add,
            is_popup: request.is_popup(),
            to_field,
            show_save: true,
            show_save_and_continue: true,
            form: submission.parent_form.view(),
            inline_formsets,
            media,
            errors,
            template: if add {
                ChangeFormTemplate::Add
            } else {
                ChangeFormTemplate::Change
            },
        };

        // A failed "save as new" keeps add semantics but shows the change
        // screen without the plain save buttons
        if request.is_save_as_new() {
            context.show_save = false;
            context.show_save_and_continue = false;
            context.template = ChangeFormTemplate::Change;
        }

        self.collaborators
            .renderer
            .render(context)
            .map_err(AdminError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::collaborators::MemoryAuditLog;
    use crate::model::{FieldDef, UserContext};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::new()
                .with(EntitySchema::new("Address", vec![FieldDef::string("street").required()]).with_display_field("street"))
                .with(EntitySchema::new(
                    "Person",
                    vec![
                        FieldDef::string("name").required(),
                        FieldDef::string("code").unique(),
                        FieldDef::one_to_one("home_addr", "Address"),
                    ],
                )),
        )
    }

    fn controller(store: &MemoryStore, audit: Arc<MemoryAuditLog>) -> CompositeEditController {
        CompositeEditController::new(
            "Person",
            registry(),
            Arc::new(store.clone()),
            &MetadataCache::new(),
            AdminOptions::new().reverse("home_addr"),
            Collaborators::default().with_audit_log(audit),
        )
        .unwrap()
    }

    #[test]
    fn test_reverse_fields_join_the_exclude_list() {
        let store = MemoryStore::new();
        let controller = controller(&store, Arc::new(MemoryAuditLog::new()));
        assert_eq!(controller.exclude(), ["home_addr".to_string()]);

        let request = AdminRequest::get(UserContext::default(), QueryDict::new());
        assert_eq!(controller.get_form_spec(&request).field_names(), vec!["name", "code"]);
    }

    #[test]
    fn test_construction_fails_on_non_reference() {
        let store = MemoryStore::new();
        let result = CompositeEditController::new(
            "Person",
            registry(),
            Arc::new(store),
            &MetadataCache::new(),
            AdminOptions::new().reverse("name"),
            Collaborators::default(),
        );
        assert!(matches!(result, Err(AdminError::NotAReference { .. })));
    }

    #[tokio::test]
    async fn test_get_object_by_unique_field() {
        let store = MemoryStore::new();
        store.insert(Record::with_id("Person", "p1").with_value("code", json!("ADA")));
        let controller = controller(&store, Arc::new(MemoryAuditLog::new()));

        let found = controller.get_object("ADA", Some("code")).await.unwrap();
        assert_eq!(found.and_then(|r| r.id).as_deref(), Some("p1"));
        assert!(controller.get_object("p1", None).await.unwrap().is_some());
        assert!(controller.get_object("nobody", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_get_prefills_from_query() {
        let store = MemoryStore::new();
        let controller = controller(&store, Arc::new(MemoryAuditLog::new()));
        let request = AdminRequest::get(
            UserContext::default(),
            QueryDict::new().with("name", "Ada").with("home_addr", "a1"),
        );

        let response = controller.changeform_view(&request, None).await.unwrap();
        let context = response.context().unwrap();
        assert_eq!(context.title, "Add person");
        assert_eq!(context.template, ChangeFormTemplate::Add);
        assert_eq!(context.form.fields[0].value, "Ada");
        assert_eq!(context.inline_formsets.len(), 1);
        assert_eq!(context.inline_formsets[0].formset.forms.len(), 1);
        assert!(context.errors.is_empty());
    }

    #[tokio::test]
    async fn test_change_message_lists_child_changes() {
        let store = MemoryStore::new();
        store.insert(Record::with_id("Address", "a1").with_value("street", json!("Main St")));
        store.insert(
            Record::with_id("Person", "p1")
                .with_value("name", json!("Ada"))
                .with_value("home_addr", json!("a1")),
        );
        let audit = Arc::new(MemoryAuditLog::new());
        let controller = controller(&store, Arc::clone(&audit));

        let data = QueryDict::new()
            .with("name", "Ada")
            .with("home_addr-TOTAL_FORMS", "1")
            .with("home_addr-INITIAL_FORMS", "1")
            .with("home_addr-0-street", "Side St");
        let request = AdminRequest::post(UserContext::default(), data);
        controller.changeform_view(&request, Some("p1")).await.unwrap();

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].change_message.entries(),
            [ChangeEntry::Changed {
                name: Some("Home Addr".to_string()),
                object: Some("Side St".to_string()),
                fields: vec!["street".to_string()],
            }]
        );
    }
}
