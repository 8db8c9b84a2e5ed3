//! Azure DevOps work-item-tracking API integration.

pub mod api_types;
pub mod client;
pub mod types;
