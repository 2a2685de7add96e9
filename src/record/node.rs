use super::Record;

/// Reference value meaning "this node has no relationships".
pub const NO_NEXT_RELATIONSHIP: i64 = -1;

/// Reference value meaning "this node has no properties".
pub const NO_NEXT_PROPERTY: i64 = -1;

/// Label field value meaning "this node has no labels".
pub const NO_LABELS: u64 = 0;

/// # Node record
///
/// A node points at the head of its relationship chain and of its property chain, and carries a
/// label field that is either an inlined label set or a reference to overflow label records. The
/// store treats the label field as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRecord {
  id: u64,
  /// Whether the slot holds a live node.
  pub in_use: bool,
  /// Set for nodes whose relationships are grouped by type.
  pub dense: bool,
  /// First relationship id, or [`NO_NEXT_RELATIONSHIP`].
  pub first_relationship: i64,
  /// First property id, or [`NO_NEXT_PROPERTY`].
  pub first_property: i64,
  /// Inlined labels or an overflow reference; [`NO_LABELS`] when empty.
  pub label_field: u64,
}

impl NodeRecord {
  /// Creates a node record. The id is fixed for the life of the record.
  pub fn new(id: u64, in_use: bool, dense: bool, first_relationship: i64, first_property: i64, label_field: u64) -> Self {
    NodeRecord { id, in_use, dense, first_relationship, first_property, label_field }
  }

  /// The canonical record for an empty slot.
  pub fn not_in_use(id: u64) -> Self {
    NodeRecord::new(id, false, false, NO_NEXT_RELATIONSHIP, NO_NEXT_PROPERTY, NO_LABELS)
  }
}

impl Record for NodeRecord {
  fn id(&self) -> u64 {
    self.id
  }

  fn in_use(&self) -> bool {
    self.in_use
  }
}
