pub mod cache;
pub mod candidate;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod mime;
pub mod resolve;
pub mod scan;
pub mod select;
pub mod urlnorm;
