use anyhow::Result;
use log::info;
use serde_json::json;
use std::sync::Arc;

use crate::admin::{
    AdminError, AdminOptions, AdminSite, Collaborators, CompositeEditController, MetadataCache, StackedInline,
};
use crate::config::AdminConfig;
use crate::model::{EntitySchema, FieldDef, Record, SchemaRegistry};
use crate::store::{RecordQuery, RecordStore};

/// People with a home and a business address plus any number of phones
pub fn demo_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            EntitySchema::new(
                "Address",
                vec![
                    FieldDef::string("street").required().max_length(200),
                    FieldDef::string("city"),
                ],
            )
            .with_display_field("street"),
        )
        .with(
            EntitySchema::new(
                "Person",
                vec![
                    FieldDef::string("name").required().max_length(100),
                    FieldDef::string("code").unique(),
                    FieldDef::one_to_one("home_addr", "Address").help_text("Home address"),
                    FieldDef::foreign_key("business_addr", "Address").verbose_name("business address"),
                ],
            )
            .with_display_field("name"),
        )
        .with(
            EntitySchema::new(
                "Phone",
                vec![
                    FieldDef::string("number").required(),
                    FieldDef::foreign_key("person", "Person"),
                ],
            )
            .with_display_field("number"),
        )
}

/// Register the demo edit screens
pub fn build_site(
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RecordStore>,
    config: &AdminConfig,
    collaborators: Collaborators,
) -> Result<AdminSite, AdminError> {
    let cache = MetadataCache::new();
    let phones = StackedInline::new(&registry, "Person", "Phone", "person")?.tabular();

    let person = CompositeEditController::new(
        "Person",
        Arc::clone(&registry),
        Arc::clone(&store),
        &cache,
        AdminOptions::new()
            .reverse("home_addr")
            .reverse("business_addr")
            .inline(Arc::new(phones))
            .with_inline_type(config.inline_type)
            .with_site_header(&config.site_header),
        collaborators.clone(),
    )?;
    let address = CompositeEditController::new(
        "Address",
        registry,
        store,
        &cache,
        AdminOptions::new().with_site_header(&config.site_header),
        collaborators,
    )?;

    let mut site = AdminSite::new(&config.site_header);
    site.register(Arc::new(person));
    site.register(Arc::new(address));
    info!("Admin site ready: [{}]", site.url_names().join(", "));
    Ok(site)
}

/// Write a couple of demo rows unless people already exist
pub async fn load_seed_data(store: &dyn RecordStore) -> Result<()> {
    if !store.filter_records(&RecordQuery::all("Person")).await?.is_empty() {
        info!("Seed data already present, skipping");
        return Ok(());
    }

    let mut tx = store.begin().await?;

    let mut home = Record::new("Address")
        .with_value("street", json!("12 Analytical Row"))
        .with_value("city", json!("London"));
    home.touch("system");
    tx.save_record(&mut home).await?;

    let mut office = Record::new("Address")
        .with_value("street", json!("1 Engine House"))
        .with_value("city", json!("London"));
    office.touch("system");
    tx.save_record(&mut office).await?;

    let mut ada = Record::new("Person")
        .with_value("name", json!("Ada Lovelace"))
        .with_value("code", json!("ADA"));
    if let (Some(home_id), Some(office_id)) = (&home.id, &office.id) {
        ada.set_reference("home_addr", home_id);
        ada.set_reference("business_addr", office_id);
    }
    ada.touch("system");
    tx.save_record(&mut ada).await?;

    let mut grace = Record::new("Person")
        .with_value("name", json!("Grace Hopper"))
        .with_value("code", json!("GRACE"));
    grace.touch("system");
    tx.save_record(&mut grace).await?;

    if let Some(ada_id) = &ada.id {
        let mut phone = Record::new("Phone").with_value("number", json!("+44 20 7946 0000"));
        phone.set_reference("person", ada_id);
        phone.touch("system");
        tx.save_record(&mut phone).await?;
    }

    tx.commit().await?;
    info!("Seed data loaded: 2 people, 2 addresses, 1 phone");
    Ok(())
}
