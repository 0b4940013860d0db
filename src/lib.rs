pub mod aggregate;
pub mod api;
pub mod chrono_util;
pub mod credentials;
pub mod error;
pub mod history;
pub mod parser;
pub mod results;
pub mod schema;
pub mod session;
pub mod tabular;
