use reverse_admin::admin::{
    AdminError, AdminOptions, AdminRequest, AdminResponse, ChangeFormTemplate, Collaborators,
    CompositeEditController, LogAction, MemoryAuditLog, MetadataCache, NestedCompositeEditController,
    NestedInlineRegistry, ReverseFieldResolver, StackedInline,
};
use reverse_admin::forms::{FormSet, SingleChildFormSet, EMPTY_CHILD_FORM, REQUIRED_MESSAGE};
use reverse_admin::model::{
    ChangeEntry, EntitySchema, FieldDef, QueryDict, Record, SchemaRegistry, UserContext,
};
use reverse_admin::seed::demo_registry;
use reverse_admin::store::{MemoryStore, QueryScope, RecordQuery, RecordStore, WriteEvent};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    registry: Arc<SchemaRegistry>,
    store: MemoryStore,
    audit: Arc<MemoryAuditLog>,
}

impl Harness {
    fn new() -> Self {
        Self::with_registry(demo_registry())
    }

    fn with_registry(registry: SchemaRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            store: MemoryStore::new(),
            audit: Arc::new(MemoryAuditLog::new()),
        }
    }

    fn controller(&self, options: AdminOptions) -> CompositeEditController {
        CompositeEditController::new(
            "Person",
            Arc::clone(&self.registry),
            Arc::new(self.store.clone()),
            &MetadataCache::new(),
            options,
            Collaborators::default().with_audit_log(self.audit.clone()),
        )
        .unwrap()
    }

    fn home_only(&self) -> CompositeEditController {
        self.controller(AdminOptions::new().reverse("home_addr"))
    }

    fn both_addresses(&self) -> CompositeEditController {
        self.controller(AdminOptions::new().reverse("home_addr").reverse("business_addr"))
    }

    fn with_phones(&self) -> CompositeEditController {
        let phones = StackedInline::new(&self.registry, "Person", "Phone", "person").unwrap();
        self.controller(AdminOptions::new().reverse("home_addr").inline(Arc::new(phones)))
    }

    fn people(&self) -> Vec<Record> {
        stored_people(&self.store)
    }
}

fn stored_people(store: &MemoryStore) -> Vec<Record> {
    store
        .save_calls()
        .into_iter()
        .filter(|record| record.entity == "Person")
        .filter_map(|record| record.id.and_then(|id| store.get("Person", &id)))
        .collect()
}

fn management(data: QueryDict, prefix: &str, total: usize, initial: usize) -> QueryDict {
    data.with(format!("{}-TOTAL_FORMS", prefix), total.to_string())
        .with(format!("{}-INITIAL_FORMS", prefix), initial.to_string())
}

fn post(data: QueryDict) -> AdminRequest {
    AdminRequest::post(UserContext::default_user(), data)
}

fn seed_ada(store: &MemoryStore) {
    store.insert(
        Record::with_id("Address", "a1")
            .with_value("street", json!("Main St"))
            .with_value("city", json!("London")),
    );
    store.insert(
        Record::with_id("Person", "p1")
            .with_value("name", json!("Ada"))
            .with_value("home_addr", json!("a1")),
    );
}

fn rendered(response: AdminResponse) -> reverse_admin::admin::RenderContext {
    match response {
        AdminResponse::Rendered { context, .. } => *context,
        other => panic!("expected a rendered screen, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_add_parent_with_new_child() {
    let harness = Harness::new();
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St")
        .with("home_addr-0-city", "London");
    let response = controller.changeform_view(&post(data), None).await.unwrap();

    match &response {
        AdminResponse::Redirect { location, message } => {
            assert_eq!(location, "/admin/person/");
            assert_eq!(message, "The person \"Ada\" was added successfully.");
        }
        other => panic!("expected a redirect, got {:?}", other),
    }

    assert_eq!(harness.store.count("Person"), 1);
    assert_eq!(harness.store.count("Address"), 1);
    let person = &harness.people()[0];
    let address_id = person.reference("home_addr").unwrap();
    let address = harness.store.get("Address", &address_id).unwrap();
    assert_eq!(address.get("street"), Some(&json!("Main St")));

    let entries = harness.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, LogAction::Addition);
    assert_eq!(entries[0].object_repr, "Ada");
    assert_eq!(
        entries[0].change_message.entries()[0],
        ChangeEntry::Added { name: None, object: None }
    );
}

#[tokio::test]
async fn test_scenario_blank_child_rerenders_with_errors() {
    let harness = Harness::new();
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "")
        .with("home_addr-0-city", "");
    let context = rendered(controller.changeform_view(&post(data), None).await.unwrap());

    let child_form = &context.inline_formsets[0].formset.forms[0];
    let street = child_form.fields.iter().find(|f| f.name == "street").unwrap();
    assert_eq!(street.errors, vec![REQUIRED_MESSAGE.to_string()]);
    assert!(context.is_add);
    assert!(context.errors.contains(&REQUIRED_MESSAGE.to_string()));

    assert_eq!(harness.store.total_rows(), 0);
    assert!(harness.store.save_calls().is_empty());
    assert!(harness.audit.entries().is_empty());
}

#[tokio::test]
async fn test_scenario_change_existing_child() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 1)
        .with("home_addr-0-street", "Side St")
        .with("home_addr-0-city", "London");
    let response = controller.changeform_view(&post(data), Some("p1")).await.unwrap();
    assert!(matches!(response, AdminResponse::Redirect { .. }));

    let address = harness.store.get("Address", &"a1".to_string()).unwrap();
    assert_eq!(address.get("street"), Some(&json!("Side St")));
    assert_eq!(harness.store.count("Address"), 1);
    let person = harness.store.get("Person", &"p1".to_string()).unwrap();
    assert_eq!(person.reference("home_addr").as_deref(), Some("a1"));

    let entries = harness.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, LogAction::Change);
    assert_eq!(entries[0].object_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_scenario_failed_save_as_new_hides_save_controls() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    let controller = harness.home_only();
    let rows_before = harness.store.total_rows();

    let data = management(QueryDict::new().with("name", "").with("_saveasnew", "1"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let context = rendered(controller.changeform_view(&post(data), Some("p1")).await.unwrap());

    assert!(!context.show_save);
    assert!(!context.show_save_and_continue);
    assert_eq!(context.template, ChangeFormTemplate::Change);
    assert!(context.is_add);
    assert_eq!(context.title, "Add person");
    assert_eq!(harness.store.total_rows(), rows_before);
    assert!(harness.store.journal().is_empty());
}

#[tokio::test]
async fn test_scenario_disallowed_to_field_is_rejected_before_binding() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Eve").with("_to_field", "name"), "home_addr", 1, 1)
        .with("home_addr-0-street", "Elsewhere");
    let result = controller.changeform_view(&post(data), Some("p1")).await;

    assert!(matches!(result, Err(AdminError::DisallowedToField(field)) if field == "name"));
    assert!(harness.store.journal().is_empty());
    assert!(harness.audit.entries().is_empty());

    let get = AdminRequest::get(
        UserContext::default_user(),
        QueryDict::new().with("_to_field", "street"),
    );
    assert!(matches!(
        controller.changeform_view(&get, None).await,
        Err(AdminError::DisallowedToField(_))
    ));
}

#[tokio::test]
async fn test_unique_to_field_selects_lookup_column() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    harness.store.insert(
        Record::with_id("Person", "p2")
            .with_value("name", json!("Grace"))
            .with_value("code", json!("GRACE")),
    );
    let controller = harness.home_only();

    let request = AdminRequest::get(UserContext::default_user(), QueryDict::new().with("_to_field", "code"));
    let context = rendered(controller.changeform_view(&request, Some("GRACE")).await.unwrap());
    assert_eq!(context.original.and_then(|r| r.id).as_deref(), Some("p2"));
    assert_eq!(context.to_field.as_deref(), Some("code"));
}

#[tokio::test]
async fn test_child_identity_reaches_parent_before_parent_save() {
    let harness = Harness::new();
    let controller = harness.both_addresses();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Home St");
    let data = management(data, "business_addr", 1, 0).with("business_addr-0-street", "Office St");
    controller.changeform_view(&post(data), None).await.unwrap();

    let saves = harness.store.save_calls();
    let entities: Vec<&str> = saves.iter().map(|r| r.entity.as_str()).collect();
    assert_eq!(entities, ["Address", "Address", "Person"]);

    let home_id = saves[0].id.clone().unwrap();
    let business_id = saves[1].id.clone().unwrap();
    assert_eq!(saves[0].get("street"), Some(&json!("Home St")));
    assert_eq!(saves[2].reference("home_addr"), Some(home_id));
    assert_eq!(saves[2].reference("business_addr"), Some(business_id));
    assert_eq!(harness.store.journal().last(), Some(&WriteEvent::Committed));
}

#[tokio::test]
async fn test_invalid_submission_writes_nothing() {
    let harness = Harness::new();
    let controller = harness.both_addresses();

    // Parent and the first child are valid, the second child is not
    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Home St");
    let data = management(data, "business_addr", 1, 0).with("business_addr-0-city", "Paris");
    let context = rendered(controller.changeform_view(&post(data), None).await.unwrap());

    assert!(!context.errors.is_empty());
    assert_eq!(harness.store.total_rows(), 0);
    assert!(harness.store.journal().is_empty());
}

#[tokio::test]
async fn test_missing_management_form_invalidates_submission() {
    let harness = Harness::new();
    let controller = harness.with_phones();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Home St");
    let context = rendered(controller.changeform_view(&post(data), None).await.unwrap());

    assert_eq!(context.inline_formsets.len(), 2);
    assert!(!context.inline_formsets[1].formset.non_form_errors.is_empty());
    assert_eq!(harness.store.total_rows(), 0);
}

#[tokio::test]
async fn test_emptied_existing_child_is_rejected() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 1)
        .with("home_addr-0-street", "")
        .with("home_addr-0-city", "");
    let context = rendered(controller.changeform_view(&post(data), Some("p1")).await.unwrap());

    let child_form = &context.inline_formsets[0].formset.forms[0];
    assert!(child_form.non_field_errors.contains(&EMPTY_CHILD_FORM.to_string()));
    let address = harness.store.get("Address", &"a1".to_string()).unwrap();
    assert_eq!(address.get("street"), Some(&json!("Main St")));
    assert!(harness.store.journal().is_empty());
}

#[tokio::test]
async fn test_parent_without_child_offers_one_blank_form() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    harness
        .store
        .insert(Record::with_id("Person", "p2").with_value("name", json!("Grace")));
    let controller = harness.home_only();

    let request = AdminRequest::get(UserContext::default_user(), QueryDict::new());
    let context = rendered(controller.changeform_view(&request, Some("p2")).await.unwrap());
    let formset = &context.inline_formsets[0].formset;
    assert_eq!(formset.forms.len(), 1);
    assert_eq!(formset.management_form.initial_forms, 0);
    assert_eq!(formset.forms[0].instance_id, None);

    let spec = Arc::new(controller.reverse_controllers()[0].form_spec(&request, &Default::default()));
    let parent = harness.store.get("Person", &"p2".to_string()).unwrap();
    let formset = SingleChildFormSet::build(&harness.store, spec, "home_addr", Some(&parent), "home_addr", None)
        .await
        .unwrap();
    assert_eq!(formset.query().scope, QueryScope::Nothing);
    assert_eq!(formset.extra(), 1);
    assert!(!formset.forms()[0].empty_permitted());
    assert!(harness
        .store
        .filter_records(formset.query())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_dangling_reference_offers_blank_form() {
    let harness = Harness::new();
    harness.store.insert(
        Record::with_id("Person", "p3")
            .with_value("name", json!("Lost"))
            .with_value("home_addr", json!("gone")),
    );
    let controller = harness.home_only();

    let request = AdminRequest::get(UserContext::default_user(), QueryDict::new());
    let context = rendered(controller.changeform_view(&request, Some("p3")).await.unwrap());
    assert_eq!(context.inline_formsets[0].formset.management_form.initial_forms, 0);
}

#[test]
fn test_metadata_resolution_is_idempotent() {
    let registry = Arc::new(demo_registry());
    let resolver = ReverseFieldResolver::new(Arc::clone(&registry));
    assert_eq!(
        resolver.resolve("Person", "home_addr").unwrap(),
        resolver.resolve("Person", "home_addr").unwrap()
    );

    let cache = MetadataCache::new();
    let first = cache.resolve(&resolver, "Person", "business_addr").unwrap();
    let second = cache.resolve(&resolver, "Person", "business_addr").unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
    assert_eq!(first.child_entity, "Address");
    assert_eq!(first.display_label, "Business Address");
}

#[tokio::test]
async fn test_store_failure_rolls_everything_back() {
    let harness = Harness::new();
    harness.store.fail_saves_for("Person");
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let result = controller.changeform_view(&post(data), None).await;

    assert!(matches!(result, Err(AdminError::TransactionAborted(_))));
    assert_eq!(harness.store.total_rows(), 0);
    assert_eq!(harness.store.journal().last(), Some(&WriteEvent::RolledBack));
    assert!(harness.audit.entries().is_empty());
}

#[tokio::test]
async fn test_ordinary_inline_rows_point_at_saved_parent() {
    let harness = Harness::new();
    let controller = harness.with_phones();

    let data = management(QueryDict::new().with("name", "Ada").with("_continue", "1"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let data = management(data, "phone_set", 2, 0).with("phone_set-0-number", "555-0100");
    let response = controller.changeform_view(&post(data), None).await.unwrap();

    let person = &harness.people()[0];
    let person_id = person.id.clone().unwrap();
    match response {
        AdminResponse::Redirect { location, message } => {
            assert_eq!(location, format!("/admin/person/{}/change", person_id));
            assert!(message.ends_with("You may edit it again below."));
        }
        other => panic!("expected a redirect, got {:?}", other),
    }

    let phones = harness
        .store
        .filter_records(&RecordQuery::all("Phone"))
        .await
        .unwrap();
    assert_eq!(phones.len(), 1);
    assert_eq!(phones[0].reference("person"), Some(person_id));

    let message = harness.audit.entries()[0].change_message.clone();
    assert!(message.entries().iter().any(|entry| matches!(
        entry,
        ChangeEntry::Added { object: Some(object), .. } if object == "555-0100"
    )));
}

#[tokio::test]
async fn test_popup_add_returns_saved_key() {
    let harness = Harness::new();
    let controller = harness.home_only();

    let data = management(QueryDict::new().with("name", "Ada").with("_popup", "1"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let response = controller.changeform_view(&post(data), None).await.unwrap();

    let person_id = harness.people()[0].id.clone().unwrap();
    assert!(matches!(
        response,
        AdminResponse::Popup { value, repr } if value == person_id && repr == "Ada"
    ));
}

#[tokio::test]
async fn test_permission_and_lookup_errors_short_circuit() {
    let harness = Harness::new();
    seed_ada(&harness.store);
    let controller = harness.home_only();
    let clerk = UserContext::new("clerk".to_string()).with_permissions(&["add_person"]);

    let change = AdminRequest::post(clerk.clone(), QueryDict::new().with("name", "Eve"));
    assert!(matches!(
        controller.changeform_view(&change, Some("p1")).await,
        Err(AdminError::PermissionDenied)
    ));
    // Without change rights a missing row is still a permission failure
    assert!(matches!(
        controller.changeform_view(&change, Some("missing")).await,
        Err(AdminError::PermissionDenied)
    ));

    let reader = UserContext::new("reader".to_string()).with_permissions(&["change_person"]);
    let add = AdminRequest::post(reader, QueryDict::new().with("name", "Eve"));
    assert!(matches!(
        controller.changeform_view(&add, None).await,
        Err(AdminError::PermissionDenied)
    ));

    let request = post(QueryDict::new().with("name", "Eve"));
    assert!(matches!(
        controller.changeform_view(&request, Some("missing")).await,
        Err(AdminError::NotFound { key, .. }) if key == "missing"
    ));
    assert!(harness.store.journal().is_empty());
}

fn registry_with_notes() -> SchemaRegistry {
    demo_registry().with(EntitySchema::new(
        "Note",
        vec![
            FieldDef::string("text").required(),
            FieldDef::string("author"),
            FieldDef::foreign_key("address", "Address"),
        ],
    ))
}

fn nested_controller(harness: &Harness) -> NestedCompositeEditController {
    let notes = StackedInline::new(&harness.registry, "Address", "Note", "address").unwrap();
    NestedCompositeEditController::new(
        harness.home_only(),
        Arc::new(NestedInlineRegistry::new().with("Address", Arc::new(notes))),
    )
}

#[tokio::test]
async fn test_nested_rows_are_saved_under_new_child() {
    let harness = Harness::with_registry(registry_with_notes());
    let controller = nested_controller(&harness);

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let data = management(data, "home_addr-0-note_set", 1, 0).with("home_addr-0-note_set-0-text", "Ring twice");
    let response = controller.changeform_view(&post(data), None).await.unwrap();
    assert!(matches!(response, AdminResponse::Redirect { .. }));

    let saves = harness.store.save_calls();
    let entities: Vec<&str> = saves.iter().map(|r| r.entity.as_str()).collect();
    assert_eq!(entities, ["Address", "Note", "Person"]);
    assert_eq!(saves[1].reference("address"), saves[0].id.clone());
    assert_eq!(harness.store.count("Note"), 1);
}

#[tokio::test]
async fn test_invalid_nested_row_blocks_the_whole_save() {
    let harness = Harness::with_registry(registry_with_notes());
    let controller = nested_controller(&harness);

    let data = management(QueryDict::new().with("name", "Ada"), "home_addr", 1, 0)
        .with("home_addr-0-street", "Main St");
    let data = management(data, "home_addr-0-note_set", 1, 0).with("home_addr-0-note_set-0-author", "Ada");
    let context = rendered(controller.changeform_view(&post(data), None).await.unwrap());

    assert_eq!(context.inline_formsets[0].nested.len(), 1);
    assert!(context.errors.contains(&REQUIRED_MESSAGE.to_string()));
    assert_eq!(harness.store.total_rows(), 0);
}

#[tokio::test]
async fn test_optional_reverse_slot_left_blank_keeps_parent_key_unset() {
    let registry = Arc::new(
        SchemaRegistry::new()
            .with(EntitySchema::new("Memo", vec![FieldDef::string("text")]))
            .with(
                EntitySchema::new(
                    "Member",
                    vec![
                        FieldDef::string("name").required(),
                        FieldDef::one_to_one("note", "Memo"),
                    ],
                )
                .with_display_field("name"),
            ),
    );
    let store = MemoryStore::new();
    let controller = CompositeEditController::new(
        "Member",
        registry,
        Arc::new(store.clone()),
        &MetadataCache::new(),
        AdminOptions::new().reverse("note"),
        Collaborators::default(),
    )
    .unwrap();

    let data = management(QueryDict::new().with("name", "Bob"), "note", 1, 0).with("note-0-text", "");
    let response = controller.changeform_view(&post(data), None).await.unwrap();
    assert!(matches!(response, AdminResponse::Redirect { .. }));

    let members = store.filter_records(&RecordQuery::all("Member")).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].get("name"), Some(&json!("Bob")));
    assert_eq!(members[0].reference("note"), None);
    assert_eq!(store.count("Memo"), 0);

    let entities: Vec<String> = store.save_calls().into_iter().map(|r| r.entity).collect();
    assert_eq!(entities, ["Member"]);
}
