pub mod document;
pub mod grade;
pub mod profile;
pub mod role_block;
