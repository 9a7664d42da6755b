pub mod auto_publish;
pub mod publish_queue;
pub mod scheduled_posts;
pub mod settings;
