use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Human-readable, phantom-typed identifier taken from the input files.
///
/// Arena lookups inside the simulation use `slotmap` keys; these names only
/// travel to logs and reports.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize)]
#[serde(transparent, bound = "")]
pub struct Id<T> {
    pub id: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct WorkflowTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct TaskTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct VmTypeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct VmTag;

pub type WorkflowName = Id<WorkflowTag>;
pub type TaskName = Id<TaskTag>;
pub type VmTypeId = Id<VmTypeTag>;
pub type VmName = Id<VmTag>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_uses_tag_name() {
        let name = TaskName::new("ID00001");
        assert_eq!(format!("{:?}", name), "TaskId: \"ID00001\"");
        assert_eq!(name.to_string(), "ID00001");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let name = VmName::new("vm-3");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"vm-3\"");
    }
}
