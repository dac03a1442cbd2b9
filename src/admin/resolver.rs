use crate::admin::error::AdminError;
use crate::model::{title_case, ReverseFieldSpec, SchemaRegistry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a declared reverse field into the metadata needed to edit its
/// target inline
#[derive(Debug, Clone)]
pub struct ReverseFieldResolver {
    registry: Arc<SchemaRegistry>,
}

impl ReverseFieldResolver {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, parent_entity: &str, field_name: &str) -> Result<ReverseFieldSpec, AdminError> {
        let parent = self
            .registry
            .get(parent_entity)
            .ok_or_else(|| AdminError::UnknownEntity(parent_entity.to_string()))?;
        let field = parent.get_field(field_name).ok_or_else(|| AdminError::UnknownField {
            entity: parent_entity.to_string(),
            field: field_name.to_string(),
        })?;

        let child_entity = match field.kind.related_entity() {
            Some(child) if field.kind.is_single_reference() => child.to_string(),
            _ => {
                return Err(AdminError::NotAReference {
                    entity: parent_entity.to_string(),
                    field: field_name.to_string(),
                })
            }
        };
        if self.registry.get(&child_entity).is_none() {
            return Err(AdminError::UnknownEntity(child_entity));
        }

        // Help text, when present, replaces the singular label
        let display_label_plural = title_case(&field.verbose_name);
        let display_label = if field.help_text.is_empty() {
            display_label_plural.clone()
        } else {
            field.help_text.clone()
        };

        Ok(ReverseFieldSpec {
            parent_entity: parent_entity.to_string(),
            field_name: field.name.clone(),
            child_entity,
            back_reference_field: field.name.clone(),
            display_label,
            display_label_plural,
            help_text: field.help_text.clone(),
        })
    }
}

/// Resolved reverse field metadata keyed by `(parent entity, field name)`.
/// Filled while controllers are constructed and only read afterwards.
#[derive(Debug, Default)]
pub struct MetadataCache {
    specs: RwLock<HashMap<(String, String), Arc<ReverseFieldSpec>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        resolver: &ReverseFieldResolver,
        parent_entity: &str,
        field_name: &str,
    ) -> Result<Arc<ReverseFieldSpec>, AdminError> {
        let key = (parent_entity.to_string(), field_name.to_string());
        if let Some(spec) = self.specs.read().get(&key) {
            return Ok(Arc::clone(spec));
        }

        let spec = Arc::new(resolver.resolve(parent_entity, field_name)?);
        Ok(Arc::clone(self.specs.write().entry(key).or_insert(spec)))
    }

    pub fn get(&self, parent_entity: &str, field_name: &str) -> Option<Arc<ReverseFieldSpec>> {
        self.specs
            .read()
            .get(&(parent_entity.to_string(), field_name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }
}
