pub mod backend;
pub mod layout;
pub mod table;
pub mod words;
