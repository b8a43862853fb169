mod common;

use common::*;
use octofhir_cda::*;

fn ids(templates: &[EnhancedTemplateDefinition]) -> Vec<&str> {
    templates.iter().map(|t| t.template_id()).collect()
}

#[tokio::test]
async fn test_lookup_by_metadata() {
    let engine = create_test_engine().await;
    let discovery = engine.discovery();

    assert_eq!(
        ids(&discovery.by_author("HL7 Structured Documents").await),
        vec![US_REALM_HEADER, CCD]
    );
    assert_eq!(
        ids(&discovery.by_status(TemplateStatus::Draft).await),
        vec![PROGRESS_NOTE]
    );
    assert_eq!(ids(&discovery.by_tag("ccd").await), vec![CCD]);
    assert_eq!(ids(&discovery.search("progress").await), vec![PROGRESS_NOTE]);
    assert!(discovery.search("radiology").await.is_empty());
}

#[tokio::test]
async fn test_combined_query() {
    let engine = create_test_engine().await;

    let query = TemplateQuery::new()
        .with_parent(US_REALM_HEADER)
        .with_status(TemplateStatus::Active);
    let found = engine.discovery().query(&query).await;

    assert_eq!(ids(&found), vec![CCD]);
}

#[tokio::test]
async fn test_plain_registrations_are_discoverable() {
    let engine = create_test_engine().await;
    engine
        .register(TemplateDefinition::new("2.16.840.1.113883.10.20.22.2.5.1", "Problem Section"))
        .await;

    let found = engine.discovery().search("problem section").await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].status, TemplateStatus::Draft);
    assert!(found[0].parent_template_ids.is_empty());
}

#[tokio::test]
async fn test_hierarchy_queries() {
    let engine = create_test_engine().await;
    let discovery = engine.discovery();

    assert_eq!(
        discovery.ancestors(CCD).await.unwrap(),
        vec![US_REALM_HEADER.to_string()]
    );
    assert!(discovery.ancestors(US_REALM_HEADER).await.unwrap().is_empty());

    let descendants = discovery.descendants(US_REALM_HEADER).await;
    assert_eq!(descendants.len(), 2);
    assert!(descendants.contains(CCD));
    assert!(descendants.contains(PROGRESS_NOTE));
}

#[tokio::test]
async fn test_tag_counts_track_registrations() {
    let engine = create_test_engine().await;

    let tags = engine.discovery().tags().await;
    assert_eq!(tags.get("ccd"), Some(&1));
    assert_eq!(tags.get("progress-note"), Some(&1));

    engine
        .register_enhanced(
            EnhancedTemplateDefinition::new(TemplateDefinition::new("ccd-r3", "CCD R3"))
                .with_parent(CCD)
                .with_tag("CCD"),
        )
        .await;

    assert_eq!(engine.discovery().tags().await.get("ccd"), Some(&2));
}
