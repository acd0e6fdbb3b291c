pub mod device_hub;
pub mod routes;
pub mod server_state;
pub mod tracker_endpoint;
