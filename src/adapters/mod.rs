pub mod explorer;
pub mod price;
pub mod store;
