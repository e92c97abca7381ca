pub mod file_info;
pub mod file_list;
pub mod text_file_write;
