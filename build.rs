use std::collections::HashSet;
use std::path::Path;

fn main() {
    let catalog_path = Path::new("catalogs/demo_keys.json");
    validate_catalog_file(catalog_path);
    set_build_dependencies();
}

fn validate_catalog_file(catalog_path: &Path) {
    // Ensure catalog exists at build time
    assert!(
        catalog_path.exists(),
        "\n\nCATALOG BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the catalog file before building.\n",
        catalog_path.display()
    );

    let catalog_contents = std::fs::read_to_string(catalog_path).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            catalog_path.display()
        );
    });

    let catalog: serde_json::Value = serde_json::from_str(&catalog_contents).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            catalog_path.display()
        );
    });

    validate_catalog_structure(&catalog);
}

fn validate_catalog_structure(catalog: &serde_json::Value) {
    assert!(
        catalog.is_object(),
        "\n\nCATALOG BUILD ERROR: Root must be a JSON object\n\
         Got: {catalog}\n"
    );
    assert!(
        catalog.get("version").and_then(serde_json::Value::as_str).is_some(),
        "\n\nCATALOG BUILD ERROR: Missing 'version' field\n"
    );

    let multi = section(catalog, "multi_access");
    let dichotomous = section(catalog, "dichotomous");

    for (id, key) in multi {
        validate_multi_access_key(id, key);
    }
    let dichotomous_ids: HashSet<&str> = dichotomous.keys().map(String::as_str).collect();
    for (id, key) in dichotomous {
        validate_dichotomous_key(id, key, &dichotomous_ids);
    }

    println!(
        "cargo:warning=Validated catalog: {} multi-access keys, {} dichotomous keys",
        multi.len(),
        dichotomous.len()
    );
}

fn section<'a>(
    catalog: &'a serde_json::Value,
    name: &str,
) -> &'a serde_json::Map<String, serde_json::Value> {
    catalog
        .get(name)
        .and_then(serde_json::Value::as_object)
        .unwrap_or_else(|| {
            panic!(
                "\n\nCATALOG BUILD ERROR: Missing '{name}' field\n\
                 The catalog must have a top-level '{name}' object keyed by key ID.\n"
            );
        })
}

/// Identifiers may be written as numbers or strings
fn id_of(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn array<'a>(key: &'a serde_json::Value, field: &str, key_id: &str) -> &'a Vec<serde_json::Value> {
    key.get(field)
        .and_then(serde_json::Value::as_array)
        .unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Key '{key_id}' missing '{field}' array\n");
        })
}

fn validate_multi_access_key(key_id: &str, key: &serde_json::Value) {
    let features = array(key, "features", key_id);
    assert!(
        !features.is_empty(),
        "\n\nCATALOG BUILD ERROR: Key '{key_id}' has no features\n"
    );

    let mut feature_ids = HashSet::new();
    for (i, feature) in features.iter().enumerate() {
        let id = id_of(feature.get("id")).unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Key '{key_id}' feature {i} missing 'id' field\n");
        });
        let kind = feature.get("type").and_then(serde_json::Value::as_i64);
        assert!(
            matches!(kind, Some(0..=2)),
            "\n\nCATALOG BUILD ERROR: Key '{key_id}' feature '{id}' has invalid 'type'\n\
             Expected 0 (grouping), 1 (discrete) or 2 (numeric).\n"
        );
        assert!(
            feature_ids.insert(id.clone()),
            "\n\nCATALOG BUILD ERROR: Key '{key_id}' declares feature '{id}' twice\n"
        );
    }

    for state in array(key, "states", key_id) {
        let feature = id_of(state.get("feature")).unwrap_or_default();
        assert!(
            feature_ids.contains(&feature),
            "\n\nCATALOG BUILD ERROR: Key '{key_id}' has a state for unknown feature '{feature}'\n"
        );
    }

    let entity_ids: HashSet<String> = array(key, "entities", key_id)
        .iter()
        .filter_map(|e| id_of(e.get("id")))
        .collect();
    let scores = key
        .get("scores")
        .or_else(|| key.get("decompressedScores"))
        .and_then(serde_json::Value::as_object)
        .unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Key '{key_id}' has no score matrix\n");
        });
    for taxon in scores.keys() {
        assert!(
            entity_ids.contains(taxon),
            "\n\nCATALOG BUILD ERROR: Key '{key_id}' scores unknown entity '{taxon}'\n"
        );
    }
}

fn validate_dichotomous_key(key_id: &str, key: &serde_json::Value, known_keys: &HashSet<&str>) {
    let root = key
        .get("first_step")
        .and_then(|step| id_of(step.get("root_node_id")));
    assert!(
        root.is_some(),
        "\n\nCATALOG BUILD ERROR: Key '{key_id}' missing 'first_step.root_node_id'\n"
    );

    let mut item_ids = HashSet::new();
    for item in array(key, "items", key_id) {
        let id = id_of(item.get("item_id")).unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Key '{key_id}' has an item without 'item_id'\n");
        });
        if let Some(target) = id_of(item.get("to_key")) {
            assert!(
                known_keys.contains(target.as_str()),
                "\n\nCATALOG BUILD ERROR: Key '{key_id}' item '{id}' links to missing key '{target}'\n"
            );
        }
        item_ids.insert(id);
    }

    for lead in array(key, "leads", key_id) {
        let lead_id = id_of(lead.get("lead_id")).unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Key '{key_id}' has a lead without 'lead_id'\n");
        });
        assert!(
            id_of(lead.get("parent_id")).is_some(),
            "\n\nCATALOG BUILD ERROR: Key '{key_id}' lead '{lead_id}' missing 'parent_id'\n"
        );
        if let Some(item) = id_of(lead.get("item")) {
            assert!(
                item_ids.contains(&item),
                "\n\nCATALOG BUILD ERROR: Key '{key_id}' lead '{lead_id}' refers to missing item '{item}'\n"
            );
        }
    }
}

fn set_build_dependencies() {
    // Tell cargo to rerun if catalog changes
    println!("cargo:rerun-if-changed=catalogs/demo_keys.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
