pub mod integration_item;

pub use integration_item::IntegrationItem;
