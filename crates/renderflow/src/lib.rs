pub mod api;
pub mod config;
pub mod db;
pub mod integrations;
pub mod jobs;
pub mod queues;
pub mod render;
pub mod webhooks;

pub use db::Broker;
pub use queues::QueueName;
