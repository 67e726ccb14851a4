pub mod config;
pub mod identity;
pub mod interceptor;
pub mod object;
pub mod scope;
pub mod validate;
