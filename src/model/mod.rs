pub mod change_message;
pub mod common;
pub mod query_dict;
pub mod record;
pub mod schema;
pub mod user_context;

pub use change_message::*;
pub use common::*;
pub use query_dict::*;
pub use record::*;
pub use schema::*;
pub use user_context::*;
