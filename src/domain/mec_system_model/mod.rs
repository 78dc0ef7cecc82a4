pub mod coordinator;
pub mod messages;
pub mod node_resource;
pub mod profile;
pub mod reachability;
pub mod request;
pub mod scheduler_config;
pub mod scheme;
pub mod utils;
pub mod vehicle_link;
