use std::collections::HashMap;

use serde_json::Value;

use crate::area::StorageArea;

/// The old and new persisted representation of a single key.
///
/// `None` means the key was absent on that side of the change.
#[derive(Clone, Debug, Default)]
pub struct KeyChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// A batch of key changes delivered by a host store's change stream, scoped
/// to one storage area.
#[derive(Clone, Debug)]
pub struct AreaChanges {
    pub area: StorageArea,
    pub changes: HashMap<String, KeyChange>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(area: StorageArea, key: &str, change: KeyChange) -> AreaChanges {
        AreaChanges {
            area,
            changes: HashMap::from([(key.to_string(), change)]),
        }
    }

    #[test]
    fn single_change_carries_area_and_key() {
        let ev = single(
            StorageArea::Local,
            "theme",
            KeyChange {
                old_value: None,
                new_value: Some(json!("dark")),
            },
        );

        assert_eq!(ev.area, StorageArea::Local);
        assert_eq!(ev.changes.len(), 1);
        let change = &ev.changes["theme"];
        assert!(change.old_value.is_none());
        assert_eq!(change.new_value, Some(json!("dark")));
    }

    #[test]
    fn clone_is_independent() {
        let ev1 = single(StorageArea::Session, "count", KeyChange::default());
        let mut ev2 = ev1.clone();
        ev2.changes
            .get_mut("count")
            .unwrap()
            .new_value
            .replace(json!(2));

        assert!(ev1.changes["count"].new_value.is_none());
        assert_eq!(ev2.changes["count"].new_value, Some(json!(2)));
    }
}
