use std::str::FromStr;
use uuid::Uuid;

use super::id::{CustomerId, DocumentId};

#[test]
fn test_typed_id_creation() {
    let id = DocumentId::new();
    assert!(!id.to_string().is_empty());
}

#[test]
fn test_typed_id_from_uuid() {
    let uuid = Uuid::new_v4();
    let id = DocumentId::from_uuid(uuid);
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_default() {
    let id = CustomerId::default();
    assert!(!id.to_string().is_empty());
}

#[test]
fn test_typed_id_display() {
    let uuid = Uuid::new_v4();
    let id = DocumentId::from_uuid(uuid);
    assert_eq!(format!("{id}"), uuid.to_string());
}

#[test]
fn test_typed_id_from_str() {
    let uuid = Uuid::new_v4();
    let id = DocumentId::from_str(&uuid.to_string()).unwrap();
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_from_str_error() {
    assert!(DocumentId::from_str("invalid").is_err());
}

#[test]
fn test_typed_ids_are_ordered_in_time() {
    let a = DocumentId::new();
    let b = DocumentId::new();
    assert_ne!(a, b);
}
