use crate::admin::changeform::CompositeEditController;
use crate::admin::collaborators::AdminResponse;
use crate::admin::error::AdminError;
use crate::admin::inline::{bind_inline, InlineController, InlineFormSetView, NestedGroupView, PrefixAllocator};
use crate::admin::request::AdminRequest;
use crate::forms::{form_prefix, FormSet, InlineFormSet};
use crate::model::QueryDict;
use crate::store::{RecordStore, StoreTransaction};
use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Form sets bound beneath one form of an owning form set
#[derive(Clone)]
pub struct NestedGroup {
    pub form_index: usize,
    pub formsets: Vec<NestedFormSet>,
}

#[derive(Clone)]
pub struct NestedFormSet {
    pub controller: Arc<dyn InlineController>,
    pub formset: InlineFormSet,
    pub children: Vec<NestedGroup>,
}

/// Capability that lets the forms of an inline carry their own inlines
#[async_trait::async_trait]
pub trait NestedInlines: Send + Sync {
    /// Bind nested form sets under every form of `owners`. Prefixes are
    /// `<owner form prefix>-<nested prefix>`.
    async fn bind_nested(
        &self,
        store: &dyn RecordStore,
        request: &AdminRequest,
        owner_entity: &str,
        owners: &dyn FormSet,
        data: Option<&QueryDict>,
    ) -> Result<Vec<NestedGroup>>;

    /// Persist nested rows of every surviving owner, depth first.
    /// Returns the number of rows written.
    async fn save_nested(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: &str,
        owners: &dyn FormSet,
        groups: &mut [NestedGroup],
    ) -> Result<usize>;

    fn is_valid(&self, owners: &dyn FormSet, groups: &[NestedGroup]) -> bool {
        groups.iter().all(|group| {
            owners.is_deleted(group.form_index)
                || group
                    .formsets
                    .iter()
                    .all(|nested| nested.formset.is_valid() && self.is_valid(&nested.formset, &nested.children))
        })
    }

    fn errors(&self, owners: &dyn FormSet, groups: &[NestedGroup]) -> Vec<String> {
        let mut errors = Vec::new();
        for group in groups.iter().filter(|group| !owners.is_deleted(group.form_index)) {
            for nested in &group.formsets {
                errors.extend(formset_errors(&nested.formset));
                errors.extend(self.errors(&nested.formset, &nested.children));
            }
        }
        errors
    }

    fn views(&self, groups: &[NestedGroup]) -> Vec<NestedGroupView> {
        groups
            .iter()
            .map(|group| NestedGroupView {
                form_index: group.form_index,
                formsets: group
                    .formsets
                    .iter()
                    .map(|nested| {
                        InlineFormSetView::new(
                            nested.controller.display_label(),
                            nested.controller.display_label_plural(),
                            nested.controller.template(),
                            nested.controller.media(),
                            &nested.formset,
                        )
                        .with_nested(self.views(&nested.children))
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Error messages of a form set, skipping forms marked for deletion
pub fn formset_errors(formset: &dyn FormSet) -> Vec<String> {
    let mut errors = formset.non_form_errors().to_vec();
    for (index, form) in formset.forms().iter().enumerate() {
        if formset.is_deleted(index) {
            continue;
        }
        errors.extend(form.errors().values().flatten().cloned());
    }
    errors
}

/// Nested inline controllers keyed by the entity that owns them
#[derive(Clone, Default)]
pub struct NestedInlineRegistry {
    inlines: HashMap<String, Vec<Arc<dyn InlineController>>>,
}

impl NestedInlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, owner_entity: &str, controller: Arc<dyn InlineController>) {
        self.inlines
            .entry(owner_entity.to_string())
            .or_default()
            .push(controller);
    }

    pub fn with(mut self, owner_entity: &str, controller: Arc<dyn InlineController>) -> Self {
        self.register(owner_entity, controller);
        self
    }

    pub fn inlines_for(&self, owner_entity: &str) -> &[Arc<dyn InlineController>] {
        self.inlines
            .get(owner_entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait::async_trait]
impl NestedInlines for NestedInlineRegistry {
    async fn bind_nested(
        &self,
        store: &dyn RecordStore,
        request: &AdminRequest,
        owner_entity: &str,
        owners: &dyn FormSet,
        data: Option<&QueryDict>,
    ) -> Result<Vec<NestedGroup>> {
        let controllers = self.inlines_for(owner_entity);
        if controllers.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups = Vec::new();
        for (form_index, owner) in owners.forms().iter().enumerate() {
            let owner_prefix = owner
                .prefix()
                .map(str::to_string)
                .unwrap_or_else(|| form_prefix(owners.prefix(), form_index));
            let mut prefixes = PrefixAllocator::new();
            let mut formsets = Vec::new();

            for controller in controllers {
                let prefix = format!("{}-{}", owner_prefix, prefixes.allocate(&controller.default_prefix()));
                let formset = bind_inline(store, controller.as_ref(), request, owner.instance(), &prefix, data).await?;
                let children = self
                    .bind_nested(store, request, controller.child_entity(), &formset, data)
                    .await?;
                formsets.push(NestedFormSet {
                    controller: Arc::clone(controller),
                    formset,
                    children,
                });
            }
            groups.push(NestedGroup { form_index, formsets });
        }
        Ok(groups)
    }

    async fn save_nested(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: &str,
        owners: &dyn FormSet,
        groups: &mut [NestedGroup],
    ) -> Result<usize> {
        let mut written = 0;
        for group in groups.iter_mut() {
            let Some(owner) = owners.forms().get(group.form_index) else {
                continue;
            };
            if owners.is_deleted(group.form_index) || owner.instance().is_new() {
                continue;
            }

            for nested in group.formsets.iter_mut() {
                let rows = nested.formset.save(&mut *tx, owner.instance(), user_id).await?;
                debug!(
                    "Saved {} nested {} row(s) under {} {:?}",
                    rows.len(),
                    nested.formset.child_entity(),
                    owner.instance().entity,
                    owner.instance().id
                );
                written += rows.len();
                written += self
                    .save_nested(&mut *tx, user_id, &nested.formset, &mut nested.children)
                    .await?;
            }
        }
        Ok(written)
    }
}

/// Edit controller whose inline forms may carry nested inlines. Delegates
/// the whole lifecycle to the wrapped controller.
pub struct NestedCompositeEditController {
    base: CompositeEditController,
    nested: Arc<dyn NestedInlines>,
}

impl NestedCompositeEditController {
    pub fn new(base: CompositeEditController, nested: Arc<dyn NestedInlines>) -> Self {
        Self { base, nested }
    }

    pub fn base(&self) -> &CompositeEditController {
        &self.base
    }

    pub async fn changeform_view(
        &self,
        request: &AdminRequest,
        object_id: Option<&str>,
    ) -> Result<AdminResponse, AdminError> {
        self.base
            .changeform_view_with(request, object_id, Some(self.nested.as_ref()))
            .await
    }
}
