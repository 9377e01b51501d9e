//! Property-based tests for descriptor validation
//!
//! Any change text that could break out of its marker, and any change keyed
//! to a target outside `updated_files`, is rejected before mutation.

use std::collections::BTreeMap;

use docdelta_core::descriptor::validate;
use docdelta_core::{ErrorKind, UpdateDescriptor};
use proptest::prelude::*;

fn descriptor(targets: Vec<String>, changes: BTreeMap<String, Vec<String>>) -> UpdateDescriptor {
    UpdateDescriptor {
        name: "prop.yaml".to_string(),
        content_hash: String::new(),
        updated_files: targets,
        changes,
    }
}

proptest! {
    #[test]
    fn prop_marker_terminator_rejected(prefix in "[a-z ]{0,10}", suffix in "[a-z ]{0,10}") {
        let change = format!("{}-->{}", prefix, suffix);
        let mut changes = BTreeMap::new();
        changes.insert("a.md".to_string(), vec![change]);
        let err = validate(&descriptor(vec!["a.md".to_string()], changes)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn prop_unlisted_change_key_rejected(
        listed in r"[a-z]{1,8}\.md",
        stray in r"[a-z]{1,8}\.txt",
    ) {
        let mut changes = BTreeMap::new();
        changes.insert(stray.clone(), vec!["note".to_string()]);
        let err = validate(&descriptor(vec![listed], changes)).unwrap_err();
        prop_assert!(err.to_string().contains(&stray));
    }

    #[test]
    fn prop_plain_changes_accepted(
        targets in prop::collection::btree_set(r"[a-z]{1,6}(/[a-z]{1,6})?\.md", 1..5),
        text in r"[A-Za-z0-9 .,]{0,30}",
    ) {
        let targets: Vec<String> = targets.into_iter().collect();
        let changes = targets
            .iter()
            .map(|t| (t.clone(), vec![text.clone()]))
            .collect();
        prop_assert!(validate(&descriptor(targets, changes)).is_ok());
    }
}
