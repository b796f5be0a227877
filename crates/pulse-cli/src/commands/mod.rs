pub mod core_check;
pub mod core_project;
pub mod field_build;
pub mod field_check;
