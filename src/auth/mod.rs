pub mod context;
pub mod credentials;
pub mod session;

pub use context::RequestContext;
