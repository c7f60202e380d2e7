pub mod enums;
pub mod schema;
pub mod structs;

pub use enums::*;
pub use schema::*;
pub use structs::*;
