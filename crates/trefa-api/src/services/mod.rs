//! Application services shared through `AppState`.

pub mod inventory;

pub use inventory::InventoryService;
