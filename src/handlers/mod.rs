pub mod health_handlers;
pub mod post_handlers;
