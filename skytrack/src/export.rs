use crate::Result;
use crate::category::Category;
use crate::store::RecordStore;
use serde_json::Value;

/// JSON export of one stored record, matching the stored shape
/// (`{"data": {...}, "last_updated": "..."}`).
pub fn category_json(
    store: &RecordStore,
    satellite_name: &str,
    category: Category,
) -> Result<Option<String>> {
    match store.get(satellite_name, category) {
        Some(record) => Ok(Some(serde_json::to_string_pretty(record)?)),
        None => Ok(None),
    }
}

/// Combined export of every stored category for one satellite; absent
/// categories are omitted. Returns `None` when nothing is stored at all.
pub fn combined_json(store: &RecordStore, satellite_name: &str) -> Result<Option<String>> {
    let mut combined = serde_json::Map::new();

    for category in Category::ALL {
        if let Some(record) = store.get(satellite_name, category) {
            combined.insert(category.key().to_string(), serde_json::to_value(record)?);
        }
    }

    if combined.is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::to_string_pretty(&Value::Object(combined))?))
}
