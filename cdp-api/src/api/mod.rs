//! HTTP API route modules

mod customers;
mod events;
mod export;
mod health;
mod leads;
mod offers;
mod upload;

pub use customers::customer_routes;
pub use events::event_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use leads::lead_routes;
pub use offers::offer_routes;
pub use upload::upload_routes;
