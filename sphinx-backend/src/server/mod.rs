mod server;

pub use server::start_http;
