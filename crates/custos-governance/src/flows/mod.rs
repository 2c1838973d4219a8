//! Built-in approval flows.

pub mod resource_update;

pub use resource_update::{RESOURCE_UPDATE_FLOW_ID, ResourceUpdateFlow};
