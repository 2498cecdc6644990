pub mod cache;
pub mod client_factory;
pub mod mock;
pub mod provider;
pub mod store;
