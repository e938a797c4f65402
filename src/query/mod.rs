pub mod server;

pub use server::GridServer;
