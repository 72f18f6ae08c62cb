//! Method naming policy and tag indexing
//!
//! Every operation is exposed under one or more method names. The default
//! policy derives them from `x-operation-name`, `operationId` and the tag;
//! callers may plug in their own [`MapToMethods`] function instead.

use heck::ToLowerCamelCase;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use crate::types::ApiOperation;

/// Tag used for operations that declare none
pub const DEFAULT_TAG: &str = "default";

/// Result of a naming policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodNames {
    One(String),
    Many(Vec<String>),
    /// Do not expose the operation under this slot
    Skip,
}

impl MethodNames {
    /// Normalize to a list of names
    pub fn into_names(self) -> Vec<String> {
        match self {
            MethodNames::One(name) => vec![name],
            MethodNames::Many(names) => names,
            MethodNames::Skip => Vec::new(),
        }
    }
}

impl From<Vec<String>> for MethodNames {
    fn from(names: Vec<String>) -> Self {
        MethodNames::Many(names)
    }
}

impl From<String> for MethodNames {
    fn from(name: String) -> Self {
        MethodNames::One(name)
    }
}

impl From<&str> for MethodNames {
    fn from(name: &str) -> Self {
        MethodNames::One(name.to_string())
    }
}

/// Naming policy: `(tag, operation, existing names) -> names`.
///
/// `tag` is `None` when computing the names visible inside a tag group.
/// `existing_names` is `None` in that case too; otherwise the policy is
/// expected to skip names already in use and record the ones it returns.
pub type MapToMethods =
    Arc<dyn Fn(Option<&str>, &ApiOperation, Option<&mut Vec<String>>) -> MethodNames + Send + Sync>;

/// lodash-style camelCase: `get_pet_by_id` -> `getPetById`
pub fn camel_case(name: &str) -> String {
    name.to_lower_camel_case()
}

/// Default naming policy
pub fn map_to_methods(
    tag: Option<&str>,
    operation: &ApiOperation,
    existing_names: Option<&mut Vec<String>>,
) -> MethodNames {
    let mut methods: Vec<String> = Vec::new();

    // Stops at the first empty or already collected candidate
    let mut add_methods = |names: [Option<String>; 2]| {
        for name in names {
            match name {
                Some(name) if !name.is_empty() && !methods.contains(&name) => methods.push(name),
                _ => break,
            }
        }
    };

    let op_name = operation.operation_name.as_deref().filter(|n| !n.is_empty());
    let op_id = Some(operation.operation_id.as_str()).filter(|id| !id.is_empty());
    let tag = tag.filter(|t| !t.is_empty());

    add_methods([op_name.map(str::to_string), op_name.map(camel_case)]);
    add_methods([op_id.map(str::to_string), op_id.map(camel_case)]);

    if let (Some(tag), Some(op_name)) = (tag, op_name) {
        let name = format!("{}_{}", tag, op_name);
        let camel = camel_case(&name);
        add_methods([Some(name), Some(camel)]);
    }
    if let (Some(tag), Some(op_id)) = (tag, op_id) {
        // The camelCase form is taken from the bare operationId here
        add_methods([Some(format!("{}_{}", tag, op_id)), Some(camel_case(op_id))]);
    }

    let Some(existing) = existing_names else {
        return MethodNames::Many(methods);
    };

    methods.retain(|m| {
        if existing.contains(m) {
            return false;
        }
        existing.push(m.clone());
        true
    });
    MethodNames::Many(methods)
}

/// Names computed for one `(tag, operation)` pair
#[derive(Debug, Clone)]
pub struct IndexedOperation {
    /// Tag group the entry belongs to
    pub tag: String,
    /// Position of the operation in the extracted operation list
    pub operation: usize,
    /// Top-level method names, de-duplicated against earlier entries
    pub names: Vec<String>,
    /// Names inside the tag group
    pub names_within_tag: Vec<String>,
}

/// Builds the name index for a list of operations
pub struct OperationIndexer {
    policy: MapToMethods,
}

impl OperationIndexer {
    /// Create an indexer using the default naming policy
    pub fn new() -> Self {
        Self {
            policy: Arc::new(map_to_methods),
        }
    }

    /// Create an indexer using a caller-supplied naming policy
    pub fn with_policy(policy: MapToMethods) -> Self {
        Self { policy }
    }

    /// Group operation positions by tag, tags in first-seen order
    pub fn group_by_tag(operations: &[ApiOperation]) -> IndexMap<String, Vec<usize>> {
        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (index, op) in operations.iter().enumerate() {
            if op.tags.is_empty() {
                groups.entry(DEFAULT_TAG.to_string()).or_default().push(index);
                continue;
            }
            for tag in &op.tags {
                let group = groups.entry(tag.clone()).or_default();
                if !group.contains(&index) {
                    group.push(index);
                }
            }
        }
        groups
    }

    /// Compute the names of every `(tag, operation)` pair
    pub fn index(&self, operations: &[ApiOperation]) -> Vec<IndexedOperation> {
        let mut existing_names: Vec<String> = Vec::new();
        let mut entries = Vec::new();

        for (tag, members) in Self::group_by_tag(operations) {
            for index in members {
                let operation = &operations[index];

                let names =
                    (self.policy)(Some(tag.as_str()), operation, Some(&mut existing_names)).into_names();
                let names_within_tag = (self.policy)(None, operation, None).into_names();

                debug!(
                    "Indexed operation {} under {} as {:?} / {:?}",
                    operation.operation_id, tag, names, names_within_tag
                );

                entries.push(IndexedOperation {
                    tag: tag.clone(),
                    operation: index,
                    names,
                    names_within_tag,
                });
            }
        }

        entries
    }
}

impl Default for OperationIndexer {
    fn default() -> Self {
        Self::new()
    }
}
